//! The journal: an append-only, per-workflow log of step attempts.
//!
//! # The Contract
//!
//! 1. **Append-only.** Existing entries are never mutated or removed. A retry
//!    is a new entry, not an edit.
//!
//! 2. **One attempt in flight.** For a given step index, at most one
//!    `InProgress` entry may be unsettled at any instant. A second append is
//!    rejected with [`JournalError::Conflict`]; this serializes re-entrant
//!    drivers without locks in the executor.
//!
//! 3. **Succeeded is final.** Once a step index has a `Succeeded` entry, any
//!    further append for that index is rejected.
//!
//! 4. **Terminal once.** The run result is recorded at most once.
//!
//! The [`Journal`] trait is the persistence seam: the engine ships an
//! in-memory implementation and treats anything durable as a backend concern
//! behind the same contract.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use crate::core::{JournalEntry, RunResult, StepStatus, WorkflowId, WorkflowInstance};

// =============================================================================
// Journal Error
// =============================================================================

/// Errors from journal operations.
///
/// The distinction matters for correct behavior:
/// - [`JournalError::Conflict`] means the append would violate an invariant
///   (usually a concurrent attempt). The caller backs off; nothing is broken.
/// - [`JournalError::Backend`] means storage failed. For the executor this is
///   the one fatal condition: bookkeeping can no longer be trusted.
#[derive(Debug, Error)]
pub enum JournalError {
    /// No workflow with this id has been created.
    #[error("unknown workflow: {id}")]
    UnknownWorkflow {
        /// The id that was not found.
        id: WorkflowId,
    },

    /// The append would violate an attempt invariant.
    #[error("conflicting append for step {step_index}: {reason}")]
    Conflict {
        /// The step index the append targeted.
        step_index: usize,
        /// What the append would have violated.
        reason: &'static str,
    },

    /// A terminal result has already been recorded.
    #[error("terminal result already recorded for workflow {id}")]
    TerminalAlreadyRecorded {
        /// The workflow that is already terminal.
        id: WorkflowId,
    },

    /// Storage backend failed (connection, serialization, etc).
    #[error("journal backend error: {0}")]
    Backend(#[source] anyhow::Error),
}

// =============================================================================
// Journal Trait
// =============================================================================

/// Append-only storage for workflow instances and their attempt logs.
///
/// Implementations must enforce the invariants documented at module level;
/// the executor relies on `append` rejecting conflicting writes rather than
/// taking its own locks around the invoke path.
#[async_trait]
pub trait Journal: Send + Sync {
    /// Create a new workflow instance. No entries are appended.
    async fn create_instance(&self, instance: WorkflowInstance) -> Result<(), JournalError>;

    /// Load an instance, or `None` if the id is unknown.
    async fn load_instance(&self, id: WorkflowId)
        -> Result<Option<WorkflowInstance>, JournalError>;

    /// Append one entry, validating the attempt invariants.
    async fn append(&self, id: WorkflowId, entry: JournalEntry) -> Result<(), JournalError>;

    /// All entries for a workflow, in append order.
    async fn entries(&self, id: WorkflowId) -> Result<Vec<JournalEntry>, JournalError>;

    /// Advance the instance cursor.
    async fn record_cursor(&self, id: WorkflowId, cursor: usize) -> Result<(), JournalError>;

    /// Record the terminal result. Rejected if one already exists.
    async fn record_run_result(
        &self,
        id: WorkflowId,
        result: RunResult,
    ) -> Result<(), JournalError>;

    /// Ids of workflows that have no terminal result yet.
    ///
    /// Used for crash recovery: these are the instances an engine must
    /// resume after a restart.
    async fn list_incomplete(&self) -> Result<Vec<WorkflowId>, JournalError>;

    /// Remove a workflow and its entries (administrative cleanup only).
    async fn remove(&self, id: WorkflowId) -> Result<(), JournalError>;
}

// =============================================================================
// Entry Queries
// =============================================================================

/// Number of attempts started for a step index (count of `InProgress` entries).
pub fn attempts_for(entries: &[JournalEntry], step_index: usize) -> u32 {
    entries
        .iter()
        .filter(|e| e.step_index == step_index && e.status == StepStatus::InProgress)
        .count() as u32
}

/// Returns true if an attempt for this step index has started but not settled.
pub fn has_unsettled_attempt(entries: &[JournalEntry], step_index: usize) -> bool {
    unsettled_attempt(entries, step_index).is_some()
}

/// The attempt number of the unsettled `InProgress` entry, if any.
pub fn unsettled_attempt(entries: &[JournalEntry], step_index: usize) -> Option<u32> {
    let mut open: Option<u32> = None;
    for entry in entries.iter().filter(|e| e.step_index == step_index) {
        match entry.status {
            StepStatus::InProgress => open = Some(entry.attempt),
            StepStatus::Succeeded | StepStatus::Failed => {
                if open == Some(entry.attempt) {
                    open = None;
                }
            }
            StepStatus::Pending => {}
        }
    }
    open
}

/// The result payload of the step's `Succeeded` entry, if it has one.
pub fn succeeded_result(entries: &[JournalEntry], step_index: usize) -> Option<&Value> {
    entries
        .iter()
        .find(|e| e.step_index == step_index && e.status == StepStatus::Succeeded)
        .and_then(|e| e.result.as_ref())
}

/// The most recent entry for a step index, in append order.
pub fn latest_entry(entries: &[JournalEntry], step_index: usize) -> Option<&JournalEntry> {
    entries.iter().rev().find(|e| e.step_index == step_index)
}

// =============================================================================
// In-Memory Journal
// =============================================================================

struct JournalState {
    instance: WorkflowInstance,
    entries: Vec<JournalEntry>,
}

/// In-memory journal.
///
/// The provided implementation: correct under concurrency, gone on restart.
/// Durable backends implement [`Journal`] behind the same invariants.
pub struct InMemoryJournal {
    workflows: RwLock<HashMap<WorkflowId, JournalState>>,
}

impl Default for InMemoryJournal {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryJournal {
    /// Create a new empty journal.
    pub fn new() -> Self {
        Self {
            workflows: RwLock::new(HashMap::new()),
        }
    }

    /// Number of workflows tracked.
    pub fn workflow_count(&self) -> usize {
        self.workflows.read().unwrap().len()
    }

    /// Number of entries for a workflow (0 for unknown ids).
    pub fn entry_count(&self, id: WorkflowId) -> usize {
        self.workflows
            .read()
            .unwrap()
            .get(&id)
            .map(|s| s.entries.len())
            .unwrap_or(0)
    }

    /// Drop all workflows and entries.
    pub fn clear(&self) {
        self.workflows.write().unwrap().clear();
    }

    fn validate_append(
        state: &JournalState,
        entry: &JournalEntry,
    ) -> Result<(), JournalError> {
        let step_index = entry.step_index;

        if state
            .entries
            .iter()
            .any(|e| e.step_index == step_index && e.status == StepStatus::Succeeded)
        {
            return Err(JournalError::Conflict {
                step_index,
                reason: "step already succeeded",
            });
        }

        match entry.status {
            StepStatus::InProgress => {
                if has_unsettled_attempt(&state.entries, step_index) {
                    return Err(JournalError::Conflict {
                        step_index,
                        reason: "an attempt is already in progress",
                    });
                }
                let expected = attempts_for(&state.entries, step_index) + 1;
                if entry.attempt != expected {
                    return Err(JournalError::Conflict {
                        step_index,
                        reason: "attempt number is not the next attempt",
                    });
                }
            }
            StepStatus::Succeeded | StepStatus::Failed => {
                if unsettled_attempt(&state.entries, step_index) != Some(entry.attempt) {
                    return Err(JournalError::Conflict {
                        step_index,
                        reason: "no matching in-progress attempt to settle",
                    });
                }
            }
            StepStatus::Pending => {
                return Err(JournalError::Conflict {
                    step_index,
                    reason: "pending is a derived state, never stored",
                });
            }
        }

        Ok(())
    }
}

#[async_trait]
impl Journal for InMemoryJournal {
    async fn create_instance(&self, instance: WorkflowInstance) -> Result<(), JournalError> {
        let mut workflows = self.workflows.write().unwrap();
        workflows.insert(
            instance.id,
            JournalState {
                instance,
                entries: Vec::new(),
            },
        );
        Ok(())
    }

    async fn load_instance(
        &self,
        id: WorkflowId,
    ) -> Result<Option<WorkflowInstance>, JournalError> {
        Ok(self
            .workflows
            .read()
            .unwrap()
            .get(&id)
            .map(|s| s.instance.clone()))
    }

    async fn append(&self, id: WorkflowId, entry: JournalEntry) -> Result<(), JournalError> {
        let mut workflows = self.workflows.write().unwrap();
        let state = workflows
            .get_mut(&id)
            .ok_or(JournalError::UnknownWorkflow { id })?;

        Self::validate_append(state, &entry)?;
        state.entries.push(entry);
        Ok(())
    }

    async fn entries(&self, id: WorkflowId) -> Result<Vec<JournalEntry>, JournalError> {
        self.workflows
            .read()
            .unwrap()
            .get(&id)
            .map(|s| s.entries.clone())
            .ok_or(JournalError::UnknownWorkflow { id })
    }

    async fn record_cursor(&self, id: WorkflowId, cursor: usize) -> Result<(), JournalError> {
        let mut workflows = self.workflows.write().unwrap();
        let state = workflows
            .get_mut(&id)
            .ok_or(JournalError::UnknownWorkflow { id })?;
        state.instance.cursor = cursor;
        Ok(())
    }

    async fn record_run_result(
        &self,
        id: WorkflowId,
        result: RunResult,
    ) -> Result<(), JournalError> {
        let mut workflows = self.workflows.write().unwrap();
        let state = workflows
            .get_mut(&id)
            .ok_or(JournalError::UnknownWorkflow { id })?;
        if state.instance.run_result.is_some() {
            return Err(JournalError::TerminalAlreadyRecorded { id });
        }
        state.instance.run_result = Some(result);
        Ok(())
    }

    async fn list_incomplete(&self) -> Result<Vec<WorkflowId>, JournalError> {
        Ok(self
            .workflows
            .read()
            .unwrap()
            .values()
            .filter(|s| s.instance.run_result.is_none())
            .map(|s| s.instance.id)
            .collect())
    }

    async fn remove(&self, id: WorkflowId) -> Result<(), JournalError> {
        self.workflows.write().unwrap().remove(&id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{StepCall, StepError};
    use serde_json::json;

    fn two_step_instance() -> WorkflowInstance {
        WorkflowInstance::new(
            "test",
            vec![
                StepCall::new("a", json!({})),
                StepCall::new("b", json!({})),
            ],
        )
    }

    #[tokio::test]
    async fn test_create_and_load_instance() {
        let journal = InMemoryJournal::new();
        let instance = two_step_instance();
        let id = instance.id;

        journal.create_instance(instance).await.unwrap();

        let loaded = journal.load_instance(id).await.unwrap().unwrap();
        assert_eq!(loaded.id, id);
        assert_eq!(loaded.cursor, 0);
        assert_eq!(journal.entry_count(id), 0);
    }

    #[tokio::test]
    async fn test_load_unknown_returns_none() {
        let journal = InMemoryJournal::new();
        let loaded = journal.load_instance(WorkflowId::new()).await.unwrap();
        assert!(loaded.is_none());
    }

    #[tokio::test]
    async fn test_append_to_unknown_workflow_fails() {
        let journal = InMemoryJournal::new();
        let result = journal
            .append(WorkflowId::new(), JournalEntry::in_progress(0, "a", 1))
            .await;
        assert!(matches!(result, Err(JournalError::UnknownWorkflow { .. })));
    }

    #[tokio::test]
    async fn test_attempt_lifecycle() {
        let journal = InMemoryJournal::new();
        let instance = two_step_instance();
        let id = instance.id;
        journal.create_instance(instance).await.unwrap();

        journal
            .append(id, JournalEntry::in_progress(0, "a", 1))
            .await
            .unwrap();
        journal
            .append(id, JournalEntry::succeeded(0, "a", 1, json!("out")))
            .await
            .unwrap();

        let entries = journal.entries(id).await.unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(attempts_for(&entries, 0), 1);
        assert_eq!(succeeded_result(&entries, 0), Some(&json!("out")));
        assert!(!has_unsettled_attempt(&entries, 0));
    }

    #[tokio::test]
    async fn test_double_in_progress_is_conflict() {
        let journal = InMemoryJournal::new();
        let instance = two_step_instance();
        let id = instance.id;
        journal.create_instance(instance).await.unwrap();

        journal
            .append(id, JournalEntry::in_progress(0, "a", 1))
            .await
            .unwrap();

        let result = journal
            .append(id, JournalEntry::in_progress(0, "a", 2))
            .await;
        assert!(matches!(
            result,
            Err(JournalError::Conflict {
                step_index: 0,
                reason: "an attempt is already in progress",
            })
        ));
    }

    #[tokio::test]
    async fn test_append_after_succeeded_is_conflict() {
        let journal = InMemoryJournal::new();
        let instance = two_step_instance();
        let id = instance.id;
        journal.create_instance(instance).await.unwrap();

        journal
            .append(id, JournalEntry::in_progress(0, "a", 1))
            .await
            .unwrap();
        journal
            .append(id, JournalEntry::succeeded(0, "a", 1, json!(null)))
            .await
            .unwrap();

        let result = journal
            .append(id, JournalEntry::in_progress(0, "a", 2))
            .await;
        assert!(matches!(result, Err(JournalError::Conflict { .. })));
    }

    #[tokio::test]
    async fn test_settle_without_start_is_conflict() {
        let journal = InMemoryJournal::new();
        let instance = two_step_instance();
        let id = instance.id;
        journal.create_instance(instance).await.unwrap();

        let result = journal
            .append(id, JournalEntry::succeeded(0, "a", 1, json!(null)))
            .await;
        assert!(matches!(result, Err(JournalError::Conflict { .. })));
    }

    #[tokio::test]
    async fn test_attempt_numbers_must_advance_by_one() {
        let journal = InMemoryJournal::new();
        let instance = two_step_instance();
        let id = instance.id;
        journal.create_instance(instance).await.unwrap();

        journal
            .append(id, JournalEntry::in_progress(0, "a", 1))
            .await
            .unwrap();
        journal
            .append(
                id,
                JournalEntry::failed(0, "a", 1, StepError::transient("x")),
            )
            .await
            .unwrap();

        // Skipping attempt 2 is rejected
        let result = journal
            .append(id, JournalEntry::in_progress(0, "a", 3))
            .await;
        assert!(matches!(result, Err(JournalError::Conflict { .. })));

        journal
            .append(id, JournalEntry::in_progress(0, "a", 2))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_retries_append_new_entries() {
        let journal = InMemoryJournal::new();
        let instance = two_step_instance();
        let id = instance.id;
        journal.create_instance(instance).await.unwrap();

        for attempt in 1..=3u32 {
            journal
                .append(id, JournalEntry::in_progress(0, "a", attempt))
                .await
                .unwrap();
            journal
                .append(
                    id,
                    JournalEntry::failed(0, "a", attempt, StepError::transient("503")),
                )
                .await
                .unwrap();
        }

        let entries = journal.entries(id).await.unwrap();
        assert_eq!(entries.len(), 6);
        assert_eq!(attempts_for(&entries, 0), 3);

        let failed: Vec<_> = entries
            .iter()
            .filter(|e| e.status == StepStatus::Failed)
            .collect();
        assert_eq!(failed.len(), 3);
        // Attempts are monotonically non-decreasing
        assert!(failed.windows(2).all(|w| w[0].attempt <= w[1].attempt));
    }

    #[tokio::test]
    async fn test_run_result_recorded_once() {
        let journal = InMemoryJournal::new();
        let instance = two_step_instance();
        let id = instance.id;
        journal.create_instance(instance).await.unwrap();

        journal
            .record_run_result(id, RunResult::Succeeded { value: json!(1) })
            .await
            .unwrap();

        let result = journal
            .record_run_result(
                id,
                RunResult::Failed {
                    error: StepError::permanent("late"),
                },
            )
            .await;
        assert!(matches!(
            result,
            Err(JournalError::TerminalAlreadyRecorded { .. })
        ));
    }

    #[tokio::test]
    async fn test_list_incomplete() {
        let journal = InMemoryJournal::new();

        let open = two_step_instance();
        let open_id = open.id;
        journal.create_instance(open).await.unwrap();

        let done = two_step_instance();
        let done_id = done.id;
        journal.create_instance(done).await.unwrap();
        journal
            .record_run_result(done_id, RunResult::Succeeded { value: json!(null) })
            .await
            .unwrap();

        let incomplete = journal.list_incomplete().await.unwrap();
        assert_eq!(incomplete, vec![open_id]);
    }

    #[tokio::test]
    async fn test_remove_deletes_instance_and_entries() {
        let journal = InMemoryJournal::new();
        let instance = two_step_instance();
        let id = instance.id;
        journal.create_instance(instance).await.unwrap();
        journal
            .append(id, JournalEntry::in_progress(0, "a", 1))
            .await
            .unwrap();

        journal.remove(id).await.unwrap();

        assert!(journal.load_instance(id).await.unwrap().is_none());
        assert_eq!(journal.workflow_count(), 0);
    }

    #[test]
    fn test_unsettled_attempt_tracking() {
        let entries = vec![
            JournalEntry::in_progress(0, "a", 1),
            JournalEntry::failed(0, "a", 1, StepError::transient("x")),
            JournalEntry::in_progress(0, "a", 2),
        ];
        assert_eq!(unsettled_attempt(&entries, 0), Some(2));
        assert_eq!(unsettled_attempt(&entries, 1), None);
    }

    #[test]
    fn test_latest_entry() {
        let entries = vec![
            JournalEntry::in_progress(0, "a", 1),
            JournalEntry::failed(0, "a", 1, StepError::transient("x")),
            JournalEntry::in_progress(1, "b", 1),
        ];
        assert_eq!(latest_entry(&entries, 0).unwrap().status, StepStatus::Failed);
        assert_eq!(
            latest_entry(&entries, 1).unwrap().status,
            StepStatus::InProgress
        );
        assert!(latest_entry(&entries, 2).is_none());
    }
}
