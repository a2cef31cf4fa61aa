// Trait definitions for dependency injection
//
// These are INFRASTRUCTURE traits only - no business logic.
// Business logic (like "analyze this site") lives in domain activities that
// use these traits.
//
// Naming convention: Base* for trait names (e.g., BaseWebScraper)

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use ratchet::WorkflowId;

use crate::domains::analysis::models::SiteAnalysis;

// =============================================================================
// Web Scraper Trait (Infrastructure - page fetching)
// =============================================================================

/// A scraped page, markdown-rendered.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScrapeResult {
    pub url: String,
    pub markdown: String,
    pub title: Option<String>,
}

/// Errors from the scraping provider.
///
/// The retryable split drives workflow behavior: transient variants are
/// retried under the engine policy, the rest fail the workflow immediately.
#[derive(Debug, Clone, Error)]
pub enum ScrapeError {
    /// The URL does not name a valid top-level domain. Never retried.
    #[error("invalid domain: {url}")]
    InvalidDomain { url: String },

    /// The provider returned no usable content. Never retried.
    #[error("No site content found")]
    NoContent,

    /// Provider rate limit hit.
    #[error("rate limit exceeded")]
    RateLimited,

    /// The request timed out.
    #[error("timeout scraping: {url}")]
    Timeout { url: String },

    /// Transport-level failure (connection, TLS, serialization).
    #[error("scrape request failed: {0}")]
    Http(String),

    /// The provider answered with a non-success status.
    #[error("scrape API error ({status}): {message}")]
    Api { status: u16, message: String },
}

impl ScrapeError {
    /// Returns true if the failure is worth retrying.
    pub fn is_retryable(&self) -> bool {
        match self {
            ScrapeError::RateLimited | ScrapeError::Timeout { .. } | ScrapeError::Http(_) => true,
            ScrapeError::Api { status, .. } => *status >= 500,
            ScrapeError::InvalidDomain { .. } | ScrapeError::NoContent => false,
        }
    }
}

#[async_trait]
pub trait BaseWebScraper: Send + Sync {
    /// Fetch a URL and return its content as markdown.
    async fn scrape(&self, url: &str) -> Result<ScrapeResult, ScrapeError>;
}

// =============================================================================
// Summarizer Trait (Infrastructure - LLM inference)
// =============================================================================

/// One content block from the summarization provider.
///
/// Blocks carry a type discriminator and (for text blocks) the text itself.
/// Unknown block types are tolerated and carried through untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentBlock {
    #[serde(rename = "type")]
    pub block_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

impl ContentBlock {
    /// Create a text block.
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            block_type: "text".to_string(),
            text: Some(text.into()),
        }
    }
}

/// Errors from the summarization provider.
#[derive(Debug, Clone, Error)]
pub enum SummarizeError {
    /// Provider rate limit hit.
    #[error("rate limit exceeded")]
    RateLimited,

    /// Transport-level failure (connection, TLS, serialization).
    #[error("summarize request failed: {0}")]
    Http(String),

    /// The provider answered with a non-success status.
    #[error("summarize API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// The provider's response did not match the expected shape.
    #[error("unexpected summarize response: {0}")]
    InvalidResponse(String),
}

impl SummarizeError {
    /// Returns true if the failure is worth retrying.
    pub fn is_retryable(&self) -> bool {
        match self {
            SummarizeError::RateLimited | SummarizeError::Http(_) => true,
            SummarizeError::Api { status, .. } => *status >= 500,
            SummarizeError::InvalidResponse(_) => false,
        }
    }
}

#[async_trait]
pub trait BaseSummarizer: Send + Sync {
    /// Summarize page content into structured content blocks.
    async fn summarize(&self, content: &str) -> Result<Vec<ContentBlock>, SummarizeError>;
}

// =============================================================================
// Result Store Trait (Infrastructure - keyed analysis records)
// =============================================================================

/// Keyed store of analysis records, one per workflow.
///
/// The placeholder is created eagerly at workflow start so readers see the
/// record before the workflow finishes; `update_analysis` is the single
/// mutation after creation and belongs solely to the workflow's final step.
#[async_trait]
pub trait BaseResultStore: Send + Sync {
    /// Create the empty placeholder record for a freshly started workflow.
    async fn create_placeholder(
        &self,
        site_url: &str,
        workflow_id: WorkflowId,
    ) -> anyhow::Result<SiteAnalysis>;

    /// Look up the record owned by a workflow.
    async fn find_by_workflow_id(
        &self,
        workflow_id: WorkflowId,
    ) -> anyhow::Result<Option<SiteAnalysis>>;

    /// Overwrite the record's analysis content. Called at most once per
    /// record, by the owning workflow's final step.
    async fn update_analysis(&self, id: Uuid, analysis: &str) -> anyhow::Result<SiteAnalysis>;

    /// Fetch a record by identity.
    async fn get(&self, id: Uuid) -> anyhow::Result<Option<SiteAnalysis>>;

    /// All records, ordered by creation time ascending.
    async fn list(&self) -> anyhow::Result<Vec<SiteAnalysis>>;

    /// Delete a record. Running workflows are unaffected.
    async fn delete(&self, id: Uuid) -> anyhow::Result<bool>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scrape_error_retryability() {
        assert!(ScrapeError::RateLimited.is_retryable());
        assert!(ScrapeError::Http("reset".into()).is_retryable());
        assert!(ScrapeError::Timeout {
            url: "https://example.com".into()
        }
        .is_retryable());
        assert!(ScrapeError::Api {
            status: 503,
            message: "unavailable".into()
        }
        .is_retryable());

        assert!(!ScrapeError::InvalidDomain {
            url: "not-a-url".into()
        }
        .is_retryable());
        assert!(!ScrapeError::NoContent.is_retryable());
        assert!(!ScrapeError::Api {
            status: 400,
            message: "bad request".into()
        }
        .is_retryable());
    }

    #[test]
    fn test_no_content_message_is_stable() {
        // Surfaced verbatim to workflow observers
        assert_eq!(ScrapeError::NoContent.to_string(), "No site content found");
    }

    #[test]
    fn test_summarize_error_retryability() {
        assert!(SummarizeError::RateLimited.is_retryable());
        assert!(SummarizeError::Api {
            status: 529,
            message: "overloaded".into()
        }
        .is_retryable());
        assert!(!SummarizeError::Api {
            status: 401,
            message: "bad key".into()
        }
        .is_retryable());
        assert!(!SummarizeError::InvalidResponse("garbage".into()).is_retryable());
    }

    #[test]
    fn test_content_block_serde_uses_type_field() {
        let block = ContentBlock::text("Summary.");
        let value = serde_json::to_value(&block).unwrap();
        assert_eq!(value["type"], "text");
        assert_eq!(value["text"], "Summary.");

        let parsed: ContentBlock =
            serde_json::from_value(serde_json::json!({"type": "tool_use"})).unwrap();
        assert_eq!(parsed.block_type, "tool_use");
        assert!(parsed.text.is_none());
    }
}
