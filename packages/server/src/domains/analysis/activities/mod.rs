//! Analysis domain activities - business logic functions
//!
//! Activities are plain async functions over `ServerDeps`. Workflow step
//! handlers call them and translate their typed errors into retry
//! classifications; API handlers call the read-side ones directly.

use anyhow::Result;
use tracing::info;
use url::Url;

use ratchet::WorkflowId;

use crate::domains::analysis::models::SiteAnalysis;
use crate::kernel::{ContentBlock, ScrapeError, ScrapeResult, ServerDeps, SummarizeError};

/// Validate that a submitted URL names a real top-level domain.
///
/// Only http(s) URLs with a dotted, alphabetic TLD pass. Anything else is an
/// `InvalidDomain` failure, which the workflow treats as permanent: retrying
/// cannot fix a malformed submission.
pub fn validate_site_url(raw: &str) -> Result<Url, ScrapeError> {
    let invalid = || ScrapeError::InvalidDomain {
        url: raw.to_string(),
    };

    let parsed = Url::parse(raw).map_err(|_| invalid())?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(invalid());
    }
    let host = parsed.host_str().ok_or_else(invalid)?;
    let tld_ok = host
        .rsplit_once('.')
        .map(|(name, tld)| {
            !name.is_empty() && tld.len() >= 2 && tld.chars().all(|c| c.is_ascii_alphabetic())
        })
        .unwrap_or(false);
    if !tld_ok {
        return Err(invalid());
    }
    Ok(parsed)
}

/// Scrape a site and return its markdown content.
///
/// A page without usable content is a permanent `NoContent` failure: the
/// summarize step must never run against nothing.
pub async fn scrape_site(site_url: &str, deps: &ServerDeps) -> Result<ScrapeResult, ScrapeError> {
    let url = validate_site_url(site_url)?;
    info!(site_url = %url, "Scraping site");

    let page = deps.scraper.scrape(url.as_str()).await?;
    if page.markdown.trim().is_empty() {
        return Err(ScrapeError::NoContent);
    }
    Ok(page)
}

/// Summarize scraped content into structured blocks.
pub async fn summarize_content(
    content: &str,
    deps: &ServerDeps,
) -> Result<Vec<ContentBlock>, SummarizeError> {
    info!(content_len = content.len(), "Summarizing site content");

    deps.summarizer.summarize(content).await
}

/// Store the final analysis against the workflow's record.
///
/// Find-by-workflow-id, never blind insert: under at-least-once execution
/// this step may run twice, and the second run must update the same record.
/// The placeholder is recreated only if it is somehow missing (e.g. deleted
/// mid-run, which is allowed and does not cancel the workflow).
pub async fn store_analysis(
    site_url: &str,
    workflow_id: WorkflowId,
    analysis: &str,
    deps: &ServerDeps,
) -> Result<SiteAnalysis> {
    let existing = deps.results.find_by_workflow_id(workflow_id).await?;

    let record = match existing {
        Some(record) => record,
        None => {
            deps.results
                .create_placeholder(site_url, workflow_id)
                .await?
        }
    };

    info!(workflow_id = %workflow_id, record_id = %record.id, "Storing analysis result");
    deps.results.update_analysis(record.id, analysis).await
}
