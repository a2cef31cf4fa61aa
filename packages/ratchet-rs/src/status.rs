//! Status projection: a read-only view derived from the journal.
//!
//! The projection holds no state of its own. It can be recomputed at any
//! instant — including mid-retry — from the instance and its entries alone,
//! and always yields a well-formed object, even for a workflow that has
//! never been observed.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::{JournalEntry, RunResult, StepStatus, WorkflowId, WorkflowInstance};
use crate::journal::{latest_entry, unsettled_attempt};

/// Longest error message surfaced through the projection. The journal keeps
/// the full text; observers get a display-sized slice.
const ERROR_DISPLAY_LIMIT: usize = 240;

/// A step attempt currently executing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepSnapshot {
    /// Index of the step in the plan.
    pub step_index: usize,
    /// Registered name of the step.
    pub step_name: String,
    /// Attempt number of the running attempt.
    pub attempt: u32,
    /// When the attempt started.
    pub started_at: DateTime<Utc>,
}

/// Summary of the instance itself, embedded in the projection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstanceSummary {
    /// The workflow's id.
    pub id: WorkflowId,
    /// Name of the workflow definition.
    pub workflow_name: String,
    /// Number of planned steps.
    pub step_count: usize,
    /// Index of the next step to run.
    pub cursor: usize,
    /// Terminal result, if reached.
    pub run_result: Option<RunResult>,
    /// When the workflow started.
    pub started_at: DateTime<Utc>,
}

/// The externally observable state of one workflow.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowStatus {
    /// At least one entry exists and no terminal result has been recorded.
    pub is_running: bool,
    /// A terminal result has been recorded.
    pub is_complete: bool,
    /// The terminal result is a failure.
    pub has_failed: bool,
    /// Terminal error message, truncated for display.
    pub error: Option<String>,
    /// Attempts currently executing.
    pub in_progress: Vec<StepSnapshot>,
    /// Step indexes whose latest entry is a failure while the workflow is
    /// still running — another attempt will follow or is in flight.
    pub retrying: Vec<usize>,
    /// The full journal, in append order.
    pub journal_entries: Vec<JournalEntry>,
    /// Instance summary, absent for an unknown workflow id.
    pub workflow: Option<InstanceSummary>,
}

impl WorkflowStatus {
    /// The well-formed status of a workflow that does not exist.
    ///
    /// An unknown id is not a fault: observers may poll before creation is
    /// visible or after administrative cleanup.
    pub fn absent() -> Self {
        Self {
            is_running: false,
            is_complete: false,
            has_failed: false,
            error: None,
            in_progress: Vec::new(),
            retrying: Vec::new(),
            journal_entries: Vec::new(),
            workflow: None,
        }
    }

    /// Returns true for a status produced from an existing workflow.
    pub fn exists(&self) -> bool {
        self.workflow.is_some()
    }
}

/// Project an instance and its journal into the observable status.
pub fn project(instance: &WorkflowInstance, entries: &[JournalEntry]) -> WorkflowStatus {
    let is_complete = instance.run_result.is_some();
    let has_failed = instance
        .run_result
        .as_ref()
        .map(RunResult::is_failed)
        .unwrap_or(false);
    let error = instance
        .run_result
        .as_ref()
        .and_then(RunResult::error)
        .map(|e| truncate_for_display(&e.message));
    let is_running = !entries.is_empty() && !is_complete;

    let in_progress = entries
        .iter()
        .filter(|e| {
            e.status == StepStatus::InProgress
                && unsettled_attempt(entries, e.step_index) == Some(e.attempt)
        })
        .map(|e| StepSnapshot {
            step_index: e.step_index,
            step_name: e.step_name.clone(),
            attempt: e.attempt,
            started_at: e.timestamp,
        })
        .collect();

    let retrying = if is_running {
        (0..instance.step_count())
            .filter(|&index| {
                latest_entry(entries, index)
                    .map(|e| e.status == StepStatus::Failed)
                    .unwrap_or(false)
            })
            .collect()
    } else {
        Vec::new()
    };

    WorkflowStatus {
        is_running,
        is_complete,
        has_failed,
        error,
        in_progress,
        retrying,
        journal_entries: entries.to_vec(),
        workflow: Some(InstanceSummary {
            id: instance.id,
            workflow_name: instance.workflow_name.clone(),
            step_count: instance.step_count(),
            cursor: instance.cursor,
            run_result: instance.run_result.clone(),
            started_at: instance.started_at,
        }),
    }
}

fn truncate_for_display(message: &str) -> String {
    if message.chars().count() <= ERROR_DISPLAY_LIMIT {
        return message.to_string();
    }
    let truncated: String = message.chars().take(ERROR_DISPLAY_LIMIT).collect();
    format!("{}…", truncated)
}
