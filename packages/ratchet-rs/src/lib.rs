//! # Ratchet
//!
//! A durable step-workflow engine where every advance is journaled, retries
//! follow declared policy, and progress is observable mid-flight.
//!
//! ## Core Concepts
//!
//! Ratchet separates **the plan** from **the record**:
//! - [`StepCall`] = the plan (what should run, in order)
//! - [`JournalEntry`] = the record (what actually happened, attempt by attempt)
//!
//! The key principle: **the journal is the single source of truth**. A
//! workflow's cursor only moves forward, and it only moves after the journal
//! says the step at the cursor succeeded.
//!
//! ## Architecture
//!
//! ```text
//! Caller
//!   │ start(name, steps)
//!   ▼
//! Engine ──► Journal.create_instance()
//!   │
//!   ├─► driver task (one per workflow)
//!   │        │
//!   │        ├─► append InProgress ──► StepRegistry.dispatch()
//!   │        │                              │
//!   │        │          ┌───────────────────┤
//!   │        │          ▼                   ▼
//!   │        │     append Succeeded    append Failed
//!   │        │     advance cursor      RetryPolicy.delay_before()
//!   │        │          │                   │
//!   │        └──────────┴──── sleep(backoff) or terminal RunResult
//!   │
//!   └─► status(id) = project(instance, entries)   [pure read, any time]
//! ```
//!
//! ## Key Invariants
//!
//! 1. **Append-only journal** - Entries are never mutated or removed
//! 2. **One attempt in flight** - At most one unsettled `InProgress` per step
//! 3. **Succeeded is final** - A settled step index never gets new entries
//! 4. **Strictly sequential** - Step N+1 starts only after N's `Succeeded`
//! 5. **Terminal once** - The run result is recorded exactly once
//! 6. **At-least-once steps** - Handlers must be safe to re-invoke
//!
//! ## Guarantees
//!
//! - **Observable mid-retry**: status is derivable from the journal at every
//!   suspension point, including while a backoff sleep is pending
//! - **Crash = pause, not failure**: [`Engine::resume`] re-drives from the
//!   last durable entry rather than restarting at step 0
//! - **Step errors never crash the executor**: they are recorded facts;
//!   only a journal write failure aborts a driver
//!
//! ## Example
//!
//! ```ignore
//! use ratchet::{EngineBuilder, RetryPolicy, StepCall, StepError, StepRegistry};
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! struct Deps { /* clients, stores */ }
//!
//! // 1. Register steps (named, idempotent-safe units of work)
//! let mut registry = StepRegistry::new();
//! registry.register("site:scrape", |deps: Arc<Deps>, ctx, input| async move {
//!     // effectful work; classify failures as transient or permanent
//!     Ok(json!({"markdown": "# Hello"}))
//! });
//!
//! // 2. Build an engine (explicit handle, no ambient singleton)
//! let engine = EngineBuilder::new(Deps { /* .. */ })
//!     .with_registry(registry)
//!     .with_retry_policy(RetryPolicy::default())
//!     .build();
//!
//! // 3. Start workflows and observe them
//! let id = engine.start("site:analyze", vec![
//!     StepCall::new("site:scrape", json!({"site_url": "https://example.com"})),
//! ]).await?;
//!
//! let status = engine.status(id).await;
//! assert!(status.is_running || status.is_complete);
//! ```
//!
//! ## What This Is Not
//!
//! Ratchet is **not**:
//! - A DAG scheduler (steps are strictly sequential within a workflow)
//! - An event bus or actor framework
//! - A distributed-consensus system
//!
//! Ratchet **is**:
//! > A durable step-workflow engine where every advance is journaled,
//! > retries follow declared policy, and progress is observable mid-flight.

// Core modules
mod core;
mod error;
mod executor;
mod journal;
mod registry;
mod retry;
mod status;

// Stress tests (test-only)
#[cfg(test)]
mod stress_tests;

// Re-export core types
pub use crate::core::{
    ErrorKind, JournalEntry, RunResult, StepCall, StepContext, StepError, StepInput, StepStatus,
    WorkflowId, WorkflowInstance,
};

// Re-export error types
pub use crate::error::EngineError;

// Re-export journal types and entry queries
pub use crate::journal::{
    attempts_for, has_unsettled_attempt, latest_entry, succeeded_result, unsettled_attempt,
    InMemoryJournal, Journal, JournalError,
};

// Re-export registry types
pub use crate::registry::{StepFn, StepRegistry};

// Re-export retry types
pub use crate::retry::RetryPolicy;

// Re-export executor types (primary entry point)
pub use crate::executor::{Engine, EngineBuilder};

// Re-export status projection types
pub use crate::status::{project, InstanceSummary, StepSnapshot, WorkflowStatus};

// Re-export commonly used external types
pub use async_trait::async_trait;
