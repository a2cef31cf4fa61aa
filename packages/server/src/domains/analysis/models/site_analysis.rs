//! The analysis record: one per workflow, visible before completion.

use chrono::{DateTime, Utc};
use ratchet::WorkflowId;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One site analysis record.
///
/// Created as an empty placeholder the moment its workflow starts, so
/// observers can see and poll the record before any step has run. The
/// `analysis` field is overwritten exactly once, by the workflow's final
/// step, with the serialized summary content.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SiteAnalysis {
    /// Record identity (distinct from the workflow id).
    pub id: Uuid,
    /// The URL that was submitted.
    pub site_url: String,
    /// The workflow that owns this record.
    pub workflow_id: WorkflowId,
    /// Serialized summary content; empty until the workflow completes.
    pub analysis: String,
    /// When the record was created.
    pub created_at: DateTime<Utc>,
}

impl SiteAnalysis {
    /// Create the empty placeholder for a freshly started workflow.
    pub fn placeholder(site_url: impl Into<String>, workflow_id: WorkflowId) -> Self {
        Self {
            id: Uuid::new_v4(),
            site_url: site_url.into(),
            workflow_id,
            analysis: String::new(),
            created_at: Utc::now(),
        }
    }

    /// Returns true once the final step has written the analysis.
    pub fn has_analysis(&self) -> bool {
        !self.analysis.trim().is_empty()
    }
}
