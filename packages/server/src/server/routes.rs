//! HTTP route handlers.
//!
//! Thin adapters between the JSON API and the domain: parse, call the
//! activity or engine, shape the response. Status reads never fault — an
//! unknown or malformed workflow id yields a well-formed empty status.

use std::time::Duration;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use ratchet::{WorkflowId, WorkflowStatus};

use crate::domains::analysis::models::{AnalysisContent, SiteAnalysis};
use crate::domains::analysis::workflows::{active_workflow_ids, kickoff_site_analysis};
use crate::server::app::AxumAppState;

/// Longest a status long-poll may wait before answering anyway.
const MAX_WAIT_MS: u64 = 25_000;

// =============================================================================
// Error mapping
// =============================================================================

pub enum ApiError {
    NotFound(&'static str),
    Internal(anyhow::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::NotFound(what) => (
                StatusCode::NOT_FOUND,
                Json(json!({ "error": format!("{what} not found") })),
            )
                .into_response(),
            ApiError::Internal(err) => {
                tracing::error!(error = %err, "request failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({ "error": "internal error" })),
                )
                    .into_response()
            }
        }
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        ApiError::Internal(err)
    }
}

// =============================================================================
// Request/Response types
// =============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartAnalysisRequest {
    pub site_url: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StartAnalysisResponse {
    pub workflow_id: WorkflowId,
    pub analysis_id: Uuid,
}

#[derive(Debug, Deserialize)]
pub struct StatusParams {
    /// Long-poll: wait up to this many milliseconds for a journal
    /// transition before responding.
    pub wait_ms: Option<u64>,
}

/// An analysis record plus its display rendering.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisView {
    #[serde(flatten)]
    pub record: SiteAnalysis,
    /// Displayable text decoded from the stored analysis, absent while the
    /// record is still a placeholder.
    pub rendered: Option<String>,
}

impl From<SiteAnalysis> for AnalysisView {
    fn from(record: SiteAnalysis) -> Self {
        let rendered = AnalysisContent::decode(&record.analysis).map(|c| c.display_text());
        Self { record, rendered }
    }
}

// =============================================================================
// Handlers
// =============================================================================

/// POST /api/analyses — start a workflow for a URL.
pub async fn start_analysis(
    State(state): State<AxumAppState>,
    Json(req): Json<StartAnalysisRequest>,
) -> Result<Json<StartAnalysisResponse>, ApiError> {
    let (workflow_id, record) =
        kickoff_site_analysis(&req.site_url, &state.engine, &state.deps).await?;
    Ok(Json(StartAnalysisResponse {
        workflow_id,
        analysis_id: record.id,
    }))
}

/// GET /api/workflows/:id/status — the status projection, optionally
/// long-polled via `?wait_ms=`.
pub async fn workflow_status(
    State(state): State<AxumAppState>,
    Path(id): Path<String>,
    Query(params): Query<StatusParams>,
) -> Json<WorkflowStatus> {
    let Ok(workflow_id) = id.parse::<WorkflowId>() else {
        return Json(WorkflowStatus::absent());
    };

    if let Some(wait_ms) = params.wait_ms {
        let current = state.engine.status(workflow_id).await;
        if current.exists() && !current.is_complete {
            let mut rx = state.engine.subscribe(workflow_id);
            let _ = tokio::time::timeout(
                Duration::from_millis(wait_ms.min(MAX_WAIT_MS)),
                rx.changed(),
            )
            .await;
        }
    }

    Json(state.engine.status(workflow_id).await)
}

/// GET /api/workflows/active — ids of workflows that are not complete.
pub async fn active_workflows(
    State(state): State<AxumAppState>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let ids = active_workflow_ids(&state.engine, &state.deps).await?;
    Ok(Json(json!({ "workflowIds": ids })))
}

/// GET /api/analyses — all records, creation order ascending.
pub async fn list_analyses(
    State(state): State<AxumAppState>,
) -> Result<Json<Vec<AnalysisView>>, ApiError> {
    let records = state.deps.results.list().await?;
    Ok(Json(records.into_iter().map(AnalysisView::from).collect()))
}

/// GET /api/analyses/:id — one record.
pub async fn get_analysis(
    State(state): State<AxumAppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<AnalysisView>, ApiError> {
    let record = state
        .deps
        .results
        .get(id)
        .await?
        .ok_or(ApiError::NotFound("analysis"))?;
    Ok(Json(record.into()))
}

/// DELETE /api/analyses/:id — remove a record. The owning workflow, if
/// still running, is not cancelled.
pub async fn delete_analysis(
    State(state): State<AxumAppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    if state.deps.results.delete(id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound("analysis"))
    }
}

/// GET /health
pub async fn health_handler() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}
