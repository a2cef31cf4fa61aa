//! The site analysis workflow: scrape → summarize → store.
//!
//! Step handlers are thin adapters: they pull arguments out of the step
//! input, call the domain activity, and translate its typed error into a
//! retry classification for the engine.

use std::sync::Arc;

use anyhow::Result;
use serde_json::{json, Value};
use tracing::info;

use ratchet::{
    Engine, StepCall, StepError, StepRegistry, WorkflowId, WorkflowInstance,
};

use crate::domains::analysis::activities;
use crate::domains::analysis::models::SiteAnalysis;
use crate::kernel::{ScrapeError, ServerDeps, SummarizeError};

/// The workflow engine type used across the application.
pub type AppEngine = Engine<ServerDeps>;

pub const WORKFLOW_SITE_ANALYZE: &str = "site:analyze";
pub const STEP_SCRAPE: &str = "site:scrape";
pub const STEP_SUMMARIZE: &str = "site:summarize";
pub const STEP_STORE_RESULT: &str = "site:store_result";

/// Register the analysis domain's steps into a registry.
pub fn register_analysis_steps(registry: &mut StepRegistry<ServerDeps>) {
    registry.register(STEP_SCRAPE, |deps: Arc<ServerDeps>, _ctx, input| async move {
        let site_url = required_str(&input.args, "site_url")?;
        let page = activities::scrape_site(&site_url, &deps)
            .await
            .map_err(scrape_step_error)?;
        to_step_value(&page)
    });

    registry.register(
        STEP_SUMMARIZE,
        |deps: Arc<ServerDeps>, _ctx, input| async move {
            let page = input
                .prev
                .ok_or_else(|| StepError::permanent("missing scraped content"))?;
            let markdown = page
                .get("markdown")
                .and_then(Value::as_str)
                .ok_or_else(|| StepError::permanent("scraped content carried no markdown"))?;
            let blocks = activities::summarize_content(markdown, &deps)
                .await
                .map_err(summarize_step_error)?;
            to_step_value(&blocks)
        },
    );

    registry.register(
        STEP_STORE_RESULT,
        |deps: Arc<ServerDeps>, ctx, input| async move {
            let site_url = required_str(&input.args, "site_url")?;
            let content = input
                .prev
                .ok_or_else(|| StepError::permanent("missing summary content"))?;
            let analysis = serde_json::to_string(&content)
                .map_err(|e| StepError::permanent(format!("unserializable summary: {e}")))?;
            let record =
                activities::store_analysis(&site_url, ctx.workflow_id, &analysis, &deps)
                    .await
                    .map_err(|e| StepError::transient(e.to_string()))?;
            Ok(json!({ "analysis_id": record.id, "content": content }))
        },
    );
}

/// The step plan for analyzing one site.
pub fn analyze_site_steps(site_url: &str) -> Vec<StepCall> {
    vec![
        StepCall::new(STEP_SCRAPE, json!({ "site_url": site_url })),
        StepCall::new(STEP_SUMMARIZE, json!({})),
        StepCall::new(STEP_STORE_RESULT, json!({ "site_url": site_url })),
    ]
}

/// Start the analysis workflow for a URL.
///
/// The placeholder record is created before the driver runs its first step,
/// so observers can find the record the moment this returns — and so the
/// final step always has a record to update rather than insert.
pub async fn kickoff_site_analysis(
    site_url: &str,
    engine: &AppEngine,
    deps: &ServerDeps,
) -> Result<(WorkflowId, SiteAnalysis)> {
    let instance = WorkflowInstance::new(WORKFLOW_SITE_ANALYZE, analyze_site_steps(site_url));
    let workflow_id = instance.id;

    let record = deps
        .results
        .create_placeholder(site_url, workflow_id)
        .await?;

    engine.start_instance(instance).await?;
    info!(workflow_id = %workflow_id, site_url, "Site analysis workflow started");

    Ok((workflow_id, record))
}

/// Ids of workflows whose records exist but have not reached a terminal
/// state.
pub async fn active_workflow_ids(
    engine: &AppEngine,
    deps: &ServerDeps,
) -> Result<Vec<WorkflowId>> {
    let mut ids = Vec::new();
    for record in deps.results.list().await? {
        let status = engine.status(record.workflow_id).await;
        if status.exists() && !status.is_complete && !ids.contains(&record.workflow_id) {
            ids.push(record.workflow_id);
        }
    }
    Ok(ids)
}

fn required_str(args: &Value, key: &str) -> Result<String, StepError> {
    args.get(key)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| StepError::permanent(format!("missing step argument: {key}")))
}

fn to_step_value<T: serde::Serialize>(value: &T) -> Result<Value, StepError> {
    serde_json::to_value(value)
        .map_err(|e| StepError::permanent(format!("unserializable step output: {e}")))
}

fn scrape_step_error(err: ScrapeError) -> StepError {
    if err.is_retryable() {
        StepError::transient(err.to_string())
    } else {
        StepError::permanent(err.to_string())
    }
}

fn summarize_step_error(err: SummarizeError) -> StepError {
    if err.is_retryable() {
        StepError::transient(err.to_string())
    } else {
        StepError::permanent(err.to_string())
    }
}
