//! Core types for the ratchet workflow engine.
//!
//! # Overview
//!
//! Ratchet separates **the plan** from **the record**:
//! - [`WorkflowInstance`] = the plan (an immutable, ordered list of steps)
//! - [`JournalEntry`] = the record (what actually happened, attempt by attempt)
//!
//! The key principle: **the journal is the single source of truth**. The
//! cursor and terminal result are conveniences derived from (and kept
//! consistent with) the journal; everything an observer can ask is answerable
//! from the entries alone.
//!
//! # Attempts
//!
//! Attempt numbers are 1-based. An attempt produces an `InProgress` entry
//! when it starts and exactly one `Succeeded` or `Failed` entry when it
//! settles. A step index that reaches `Succeeded` is settled forever: no
//! further entries for that index are ever appended.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

// =============================================================================
// Workflow Identity
// =============================================================================

/// Opaque identifier for one workflow instance.
///
/// Serializes as a plain UUID string so callers can hand it back through any
/// external interface (HTTP, logs, stored records) without caring what it is.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct WorkflowId(Uuid);

impl WorkflowId {
    /// Create a new random workflow id.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Get the inner UUID value.
    pub fn into_inner(self) -> Uuid {
        self.0
    }

    /// Get a reference to the inner UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for WorkflowId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Uuid> for WorkflowId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl From<WorkflowId> for Uuid {
    fn from(id: WorkflowId) -> Uuid {
        id.0
    }
}

impl std::str::FromStr for WorkflowId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

impl fmt::Display for WorkflowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// =============================================================================
// Step Errors
// =============================================================================

/// Classification of step failures for retry decisions.
///
/// The executor consults this, together with the retry policy, to decide
/// whether a failed attempt gets another one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ErrorKind {
    /// Failure may clear on its own; the attempt should be retried.
    ///
    /// Examples: network timeout, upstream 503, rate limiting
    Transient,

    /// Retrying cannot fix this; the workflow fails immediately.
    ///
    /// Examples: invalid input, malformed domain, empty scraped content
    Permanent,
}

impl ErrorKind {
    /// Returns true if failures of this kind are eligible for retry.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ErrorKind::Transient)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::Transient => write!(f, "transient"),
            ErrorKind::Permanent => write!(f, "permanent"),
        }
    }
}

/// A step failure with its retry classification.
///
/// This is the only error type that crosses the step boundary: handlers
/// return it, the journal stores it, the projector surfaces its message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[error("{kind} step error: {message}")]
pub struct StepError {
    /// Whether this failure is eligible for retry.
    pub kind: ErrorKind,
    /// Human-readable description, surfaced verbatim to observers.
    pub message: String,
}

impl StepError {
    /// Create a transient (retryable) step error.
    pub fn transient(message: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::Transient,
            message: message.into(),
        }
    }

    /// Create a permanent (non-retryable) step error.
    pub fn permanent(message: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::Permanent,
            message: message.into(),
        }
    }

    /// Returns true if this error is eligible for retry.
    pub fn is_retryable(&self) -> bool {
        self.kind.is_retryable()
    }
}

impl From<anyhow::Error> for StepError {
    /// Unclassified failures are treated as transient: retrying an unknown
    /// error is safe under at-least-once semantics, giving up is not.
    fn from(err: anyhow::Error) -> Self {
        StepError::transient(err.to_string())
    }
}

// =============================================================================
// Journal Entries
// =============================================================================

/// Status of one step attempt as recorded in the journal.
///
/// `Pending` never appears in stored entries; it is the derived state of a
/// step the cursor has not reached yet, kept here so projections and stored
/// entries share one vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum StepStatus {
    /// The cursor has not reached this step yet (derived, never stored).
    Pending,
    /// An attempt has started and has not settled.
    InProgress,
    /// The attempt settled successfully. Terminal for the step index.
    Succeeded,
    /// The attempt settled with an error. May be followed by another attempt.
    Failed,
}

impl StepStatus {
    /// Returns true if this status settles an attempt.
    pub fn is_settled(&self) -> bool {
        matches!(self, StepStatus::Succeeded | StepStatus::Failed)
    }
}

/// One attempt transition for one step, as recorded in the journal.
///
/// # Invariants
///
/// For a given `step_index`:
/// - attempts are monotonically non-decreasing across entries
/// - at most one `InProgress` entry is unsettled at any instant
/// - once a `Succeeded` entry exists, no further entries are appended
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JournalEntry {
    /// Index of the step in the workflow's plan.
    pub step_index: usize,
    /// Registered name of the step.
    pub step_name: String,
    /// Attempt number, starting at 1.
    pub attempt: u32,
    /// What this entry records: an attempt starting or settling.
    pub status: StepStatus,
    /// Result payload, present on `Succeeded` entries.
    pub result: Option<Value>,
    /// Error descriptor, present on `Failed` entries.
    pub error: Option<StepError>,
    /// When this transition was recorded.
    pub timestamp: DateTime<Utc>,
}

impl JournalEntry {
    /// Record the start of an attempt.
    pub fn in_progress(step_index: usize, step_name: impl Into<String>, attempt: u32) -> Self {
        Self {
            step_index,
            step_name: step_name.into(),
            attempt,
            status: StepStatus::InProgress,
            result: None,
            error: None,
            timestamp: Utc::now(),
        }
    }

    /// Record a successful settlement of an attempt.
    pub fn succeeded(
        step_index: usize,
        step_name: impl Into<String>,
        attempt: u32,
        result: Value,
    ) -> Self {
        Self {
            step_index,
            step_name: step_name.into(),
            attempt,
            status: StepStatus::Succeeded,
            result: Some(result),
            error: None,
            timestamp: Utc::now(),
        }
    }

    /// Record a failed settlement of an attempt.
    pub fn failed(
        step_index: usize,
        step_name: impl Into<String>,
        attempt: u32,
        error: StepError,
    ) -> Self {
        Self {
            step_index,
            step_name: step_name.into(),
            attempt,
            status: StepStatus::Failed,
            result: None,
            error: Some(error),
            timestamp: Utc::now(),
        }
    }
}

// =============================================================================
// Terminal Result
// =============================================================================

/// The terminal outcome of a workflow, set exactly once.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum RunResult {
    /// Every step succeeded; `value` is the final step's output.
    Succeeded {
        /// Output of the final step.
        value: Value,
    },
    /// A step failed permanently or exhausted its retries.
    Failed {
        /// The error that ended the workflow.
        error: StepError,
    },
}

impl RunResult {
    /// Returns true if this is a failure result.
    pub fn is_failed(&self) -> bool {
        matches!(self, RunResult::Failed { .. })
    }

    /// The terminal error, if this is a failure result.
    pub fn error(&self) -> Option<&StepError> {
        match self {
            RunResult::Failed { error } => Some(error),
            RunResult::Succeeded { .. } => None,
        }
    }

    /// The terminal value, if this is a success result.
    pub fn value(&self) -> Option<&Value> {
        match self {
            RunResult::Succeeded { value } => Some(value),
            RunResult::Failed { .. } => None,
        }
    }
}

// =============================================================================
// Step Plan
// =============================================================================

/// One planned step: a registered name plus its declared arguments.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepCall {
    /// Registered name of the step (e.g. `"site:scrape"`).
    pub name: String,
    /// Arguments declared when the workflow was created.
    pub args: Value,
}

impl StepCall {
    /// Create a new step call.
    pub fn new(name: impl Into<String>, args: Value) -> Self {
        Self {
            name: name.into(),
            args,
        }
    }
}

/// Identity handed to a step handler for the attempt being executed.
///
/// Effectful steps use `workflow_id` to make their writes idempotent
/// (find-or-create by workflow id, never blind insert) because the engine
/// only guarantees at-least-once execution.
#[derive(Debug, Clone, Copy)]
pub struct StepContext {
    /// The workflow this attempt belongs to.
    pub workflow_id: WorkflowId,
    /// Index of the step in the workflow's plan.
    pub step_index: usize,
    /// Attempt number, starting at 1.
    pub attempt: u32,
}

/// Input handed to a step handler.
///
/// Steps chain through `prev` rather than shared mutable state: each step
/// sees its declared arguments plus the settled output of the step before it.
#[derive(Debug, Clone)]
pub struct StepInput {
    /// Arguments declared at workflow creation.
    pub args: Value,
    /// Output of the previous step, absent for the first step.
    pub prev: Option<Value>,
}

impl StepInput {
    /// Create input for a first step (no predecessor).
    pub fn initial(args: Value) -> Self {
        Self { args, prev: None }
    }

    /// Create input carrying a predecessor's output.
    pub fn chained(args: Value, prev: Value) -> Self {
        Self {
            args,
            prev: Some(prev),
        }
    }
}

// =============================================================================
// Workflow Instance
// =============================================================================

/// One workflow: an immutable plan plus the executor's bookkeeping.
///
/// The step list is established at creation and never changes. Only the
/// executor mutates `cursor` and `run_result`, and it does so through the
/// journal so the two never disagree with the entries.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowInstance {
    /// Opaque unique identity.
    pub id: WorkflowId,
    /// Name of the workflow definition (e.g. `"site:analyze"`).
    pub workflow_name: String,
    /// The immutable, ordered plan.
    pub steps: Vec<StepCall>,
    /// Index of the next step to run.
    pub cursor: usize,
    /// Terminal result, absent until the workflow finishes.
    pub run_result: Option<RunResult>,
    /// When the workflow was started.
    pub started_at: DateTime<Utc>,
}

impl WorkflowInstance {
    /// Create a new instance at cursor 0 with no terminal result.
    pub fn new(workflow_name: impl Into<String>, steps: Vec<StepCall>) -> Self {
        Self {
            id: WorkflowId::new(),
            workflow_name: workflow_name.into(),
            steps,
            cursor: 0,
            run_result: None,
            started_at: Utc::now(),
        }
    }

    /// Number of steps in the plan.
    pub fn step_count(&self) -> usize {
        self.steps.len()
    }

    /// Returns true once a terminal result has been recorded.
    pub fn is_terminal(&self) -> bool {
        self.run_result.is_some()
    }

    /// The step at the cursor, if any remain.
    pub fn current_step(&self) -> Option<&StepCall> {
        self.steps.get(self.cursor)
    }
}
