//! Structured error types for engine operations.
//!
//! `EngineError` covers faults in the engine's own bookkeeping. Step
//! failures are not errors at this level: they are recorded facts
//! ([`crate::StepError`] inside journal entries) that the executor handles
//! according to policy.

use thiserror::Error;

use crate::core::WorkflowId;
use crate::journal::JournalError;

/// Errors from engine operations (start, resume, status plumbing).
///
/// Pattern-matchable so callers can distinguish a wiring bug (an
/// unregistered step) from a lookup miss (unknown workflow) from a journal
/// fault.
#[derive(Debug, Error)]
pub enum EngineError {
    /// A workflow plan names a step that was never registered.
    #[error("no step registered for name {name}")]
    StepNotRegistered {
        /// The unregistered step name.
        name: String,
    },

    /// No workflow with this id exists in the journal.
    #[error("unknown workflow: {id}")]
    UnknownWorkflow {
        /// The id that was not found.
        id: WorkflowId,
    },

    /// The journal rejected or failed an operation.
    ///
    /// A backend failure here is the engine's one fatal condition: the
    /// driver cannot continue if its bookkeeping cannot be written.
    #[error("journal failure: {0}")]
    Journal(#[from] JournalError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_step_not_registered_display() {
        let err = EngineError::StepNotRegistered {
            name: "site:scrape".into(),
        };
        assert!(err.to_string().contains("no step registered"));
        assert!(err.to_string().contains("site:scrape"));
    }

    #[test]
    fn test_journal_error_converts() {
        let id = WorkflowId::new();
        let err: EngineError = JournalError::UnknownWorkflow { id }.into();
        assert!(matches!(err, EngineError::Journal(_)));
        assert!(err.to_string().contains(&id.to_string()));
    }

    #[test]
    fn test_error_is_pattern_matchable() {
        let err = EngineError::StepNotRegistered {
            name: "site:summarize".into(),
        };
        match &err {
            EngineError::StepNotRegistered { name } => assert_eq!(name, "site:summarize"),
            _ => panic!("expected StepNotRegistered"),
        }
    }
}
