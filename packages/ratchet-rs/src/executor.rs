//! Workflow executor: drives instances forward, one journaled step at a time.
//!
//! # Architecture
//!
//! ```text
//! Engine.start() ──► create instance ──► spawn driver task
//!                                              │
//!                                              ▼
//!                               ┌──► append InProgress entry
//!                               │            │
//!                               │            ▼
//!                               │    registry.dispatch(step)
//!                               │            │
//!                               │    ┌───────┴────────┐
//!                               │    ▼                ▼
//!                               │  Succeeded        Failed
//!                               │    │                │
//!                               │  advance      transient + attempts left?
//!                               │  cursor         │           │
//!                               └────┴── yes: sleep(backoff)  no: terminal
//! ```
//!
//! Every transition is appended to the journal before the driver moves on,
//! so the observable status is consistent at every suspension point. The
//! driver holds no state of its own: a crash loses nothing but the in-flight
//! attempt, and [`Engine::resume`] picks the workflow back up from the
//! journal.
//!
//! # Concurrency
//!
//! One driver task per workflow instance; instances are fully independent.
//! Re-entrancy into a single instance is serialized by the journal itself:
//! the driver that loses the `InProgress` append race yields instead of
//! double-running the step.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::core::{
    JournalEntry, RunResult, StepCall, StepContext, StepError, StepInput, StepStatus, WorkflowId,
    WorkflowInstance,
};
use crate::error::EngineError;
use crate::journal::{
    attempts_for, succeeded_result, unsettled_attempt, InMemoryJournal, Journal, JournalError,
};
use crate::registry::StepRegistry;
use crate::retry::RetryPolicy;
use crate::status::{project, WorkflowStatus};

// =============================================================================
// Builder
// =============================================================================

/// Builder for [`Engine`].
///
/// ```ignore
/// let mut registry = StepRegistry::new();
/// register_analysis_steps(&mut registry);
///
/// let engine = EngineBuilder::new(deps)
///     .with_registry(registry)
///     .with_retry_policy(RetryPolicy::default())
///     .build();
/// ```
pub struct EngineBuilder<D> {
    deps: Arc<D>,
    registry: StepRegistry<D>,
    journal: Option<Arc<dyn Journal>>,
    policy: RetryPolicy,
}

impl<D: Send + Sync + 'static> EngineBuilder<D> {
    /// Create a builder around the application dependencies.
    pub fn new(deps: D) -> Self {
        Self::from_arc(Arc::new(deps))
    }

    /// Create a builder around already-shared dependencies.
    pub fn from_arc(deps: Arc<D>) -> Self {
        Self {
            deps,
            registry: StepRegistry::new(),
            journal: None,
            policy: RetryPolicy::default(),
        }
    }

    /// Use a pre-populated step registry.
    pub fn with_registry(mut self, registry: StepRegistry<D>) -> Self {
        self.registry = registry;
        self
    }

    /// Use a specific journal backend. Defaults to [`InMemoryJournal`].
    pub fn with_journal(mut self, journal: Arc<dyn Journal>) -> Self {
        self.journal = Some(journal);
        self
    }

    /// Use a specific retry policy. Defaults to [`RetryPolicy::default`].
    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Build the engine.
    pub fn build(self) -> Engine<D> {
        Engine {
            inner: Arc::new(EngineInner {
                deps: self.deps,
                registry: self.registry,
                journal: self
                    .journal
                    .unwrap_or_else(|| Arc::new(InMemoryJournal::new())),
                policy: self.policy,
                watchers: DashMap::new(),
            }),
        }
    }
}

// =============================================================================
// Engine
// =============================================================================

struct EngineInner<D> {
    deps: Arc<D>,
    registry: StepRegistry<D>,
    journal: Arc<dyn Journal>,
    policy: RetryPolicy,
    /// Per-workflow change counters for subscribers (long-poll, push).
    watchers: DashMap<WorkflowId, watch::Sender<u64>>,
}

impl<D> EngineInner<D> {
    fn watcher(&self, id: WorkflowId) -> watch::Receiver<u64> {
        self.watchers
            .entry(id)
            .or_insert_with(|| watch::channel(0).0)
            .subscribe()
    }

    fn bump(&self, id: WorkflowId) {
        if let Some(tx) = self.watchers.get(&id) {
            tx.send_modify(|version| *version += 1);
        }
    }
}

/// The workflow engine: registry + journal + retry policy behind one handle.
///
/// Construct one per process with [`EngineBuilder`] and pass it by handle to
/// every call site; there is no ambient singleton. Cloning is cheap and
/// shares the same journal and driver state.
pub struct Engine<D> {
    inner: Arc<EngineInner<D>>,
}

impl<D> Clone for Engine<D> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<D: Send + Sync + 'static> Engine<D> {
    /// Start a new workflow and return its id.
    ///
    /// The instance is created at cursor 0 with no journal entries; the
    /// driver task begins executing step 0 immediately. Every step name is
    /// checked against the registry up front so a mis-wired plan fails at
    /// start rather than mid-run.
    pub async fn start(
        &self,
        workflow_name: impl Into<String>,
        steps: Vec<StepCall>,
    ) -> Result<WorkflowId, EngineError> {
        self.start_instance(WorkflowInstance::new(workflow_name, steps))
            .await
    }

    /// Start a pre-built instance.
    ///
    /// Useful when the caller needs the workflow id before any step runs,
    /// e.g. to create an eagerly visible record keyed by it.
    pub async fn start_instance(
        &self,
        instance: WorkflowInstance,
    ) -> Result<WorkflowId, EngineError> {
        for step in &instance.steps {
            if !self.inner.registry.has(&step.name) {
                return Err(EngineError::StepNotRegistered {
                    name: step.name.clone(),
                });
            }
        }

        let id = instance.id;
        info!(
            workflow_id = %id,
            workflow = %instance.workflow_name,
            steps = instance.step_count(),
            "starting workflow"
        );
        self.inner.journal.create_instance(instance).await?;

        // Register the watcher before the driver runs so subscribers never
        // miss the first transition.
        let _ = self.inner.watcher(id);
        spawn_driver(self.inner.clone(), id);
        Ok(id)
    }

    /// The current status of a workflow, derived from the journal.
    ///
    /// Always returns a well-formed status; an unknown id (or a journal
    /// read failure) yields [`WorkflowStatus::absent`], never a fault.
    pub async fn status(&self, id: WorkflowId) -> WorkflowStatus {
        let instance = match self.inner.journal.load_instance(id).await {
            Ok(Some(instance)) => instance,
            Ok(None) => return WorkflowStatus::absent(),
            Err(e) => {
                warn!(workflow_id = %id, error = %e, "status read failed");
                return WorkflowStatus::absent();
            }
        };
        let entries = match self.inner.journal.entries(id).await {
            Ok(entries) => entries,
            Err(e) => {
                warn!(workflow_id = %id, error = %e, "journal read failed");
                return WorkflowStatus::absent();
            }
        };
        project(&instance, &entries)
    }

    /// Subscribe to change notifications for a workflow.
    ///
    /// The receiver's value is bumped on every journal transition. This is
    /// the delivery seam: the engine only promises "something changed";
    /// observers re-read [`Engine::status`] for the actual state.
    pub fn subscribe(&self, id: WorkflowId) -> watch::Receiver<u64> {
        self.inner.watcher(id)
    }

    /// Resume a workflow after a restart.
    ///
    /// Re-drives the instance from its journal cursor rather than from step
    /// 0. An attempt left unsettled by a crash is closed with a transient
    /// failure and retried under the normal policy. Returns `false` if the
    /// workflow is already terminal.
    pub async fn resume(&self, id: WorkflowId) -> Result<bool, EngineError> {
        let instance = self
            .inner
            .journal
            .load_instance(id)
            .await?
            .ok_or(EngineError::UnknownWorkflow { id })?;
        if instance.is_terminal() {
            return Ok(false);
        }

        let entries = self.inner.journal.entries(id).await?;
        if let Some(attempt) = unsettled_attempt(&entries, instance.cursor) {
            let step_name = instance
                .current_step()
                .map(|s| s.name.clone())
                .unwrap_or_default();
            warn!(
                workflow_id = %id,
                step = %step_name,
                attempt,
                "closing attempt left unsettled by restart"
            );
            self.inner
                .journal
                .append(
                    id,
                    JournalEntry::failed(
                        instance.cursor,
                        step_name,
                        attempt,
                        StepError::transient("attempt interrupted by restart"),
                    ),
                )
                .await?;
            self.inner.bump(id);
        }

        spawn_driver(self.inner.clone(), id);
        Ok(true)
    }

    /// Resume every workflow the journal reports as incomplete.
    ///
    /// Call once at process start. Returns the ids that were re-driven.
    pub async fn recover_all(&self) -> Result<Vec<WorkflowId>, EngineError> {
        let mut resumed = Vec::new();
        for id in self.inner.journal.list_incomplete().await? {
            match self.resume(id).await {
                Ok(true) => resumed.push(id),
                Ok(false) => {}
                Err(e) => warn!(workflow_id = %id, error = %e, "failed to resume workflow"),
            }
        }
        if !resumed.is_empty() {
            info!(count = resumed.len(), "recovered incomplete workflows");
        }
        Ok(resumed)
    }

    /// The engine's journal handle (administrative access).
    pub fn journal(&self) -> Arc<dyn Journal> {
        self.inner.journal.clone()
    }

    /// The retry policy applied to every step.
    pub fn retry_policy(&self) -> RetryPolicy {
        self.inner.policy
    }
}

// =============================================================================
// Driver
// =============================================================================

fn spawn_driver<D: Send + Sync + 'static>(inner: Arc<EngineInner<D>>, id: WorkflowId) {
    tokio::spawn(async move {
        if let Err(e) = drive(inner, id).await {
            // Only journal bookkeeping failures land here; step failures are
            // recorded facts handled inside the loop.
            error!(workflow_id = %id, error = %e, "workflow driver aborted");
        }
    });
}

async fn drive<D: Send + Sync + 'static>(
    inner: Arc<EngineInner<D>>,
    id: WorkflowId,
) -> Result<(), EngineError> {
    loop {
        let instance = inner
            .journal
            .load_instance(id)
            .await?
            .ok_or(EngineError::UnknownWorkflow { id })?;
        if instance.is_terminal() {
            return Ok(());
        }

        let cursor = instance.cursor;
        if cursor >= instance.step_count() {
            let entries = inner.journal.entries(id).await?;
            let value = instance
                .steps
                .len()
                .checked_sub(1)
                .and_then(|last| succeeded_result(&entries, last).cloned())
                .unwrap_or(serde_json::Value::Null);
            inner
                .journal
                .record_run_result(id, RunResult::Succeeded { value })
                .await?;
            inner.bump(id);
            info!(workflow_id = %id, workflow = %instance.workflow_name, "workflow completed");
            return Ok(());
        }

        let step = instance.steps[cursor].clone();
        let entries = inner.journal.entries(id).await?;
        let attempt = attempts_for(&entries, cursor) + 1;

        if !inner.policy.allows(attempt) {
            // Reachable after resume closed an exhausted attempt; the normal
            // failure path records the terminal result before looping.
            let error = entries
                .iter()
                .rev()
                .find(|e| e.step_index == cursor && e.status == StepStatus::Failed)
                .and_then(|e| e.error.clone())
                .unwrap_or_else(|| StepError::transient("retry attempts exhausted"));
            inner
                .journal
                .record_run_result(id, RunResult::Failed { error })
                .await?;
            inner.bump(id);
            error!(workflow_id = %id, step = %step.name, "retry attempts exhausted");
            return Ok(());
        }

        match inner
            .journal
            .append(id, JournalEntry::in_progress(cursor, step.name.clone(), attempt))
            .await
        {
            Ok(()) => {}
            Err(JournalError::Conflict { .. }) => {
                // Another driver holds this attempt; exactly one may run.
                debug!(workflow_id = %id, step = %step.name, "step attempt already in flight, yielding");
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        }
        inner.bump(id);

        debug!(
            workflow_id = %id,
            step = %step.name,
            step_index = cursor,
            attempt,
            "executing step"
        );

        let ctx = StepContext {
            workflow_id: id,
            step_index: cursor,
            attempt,
        };
        let prev = cursor
            .checked_sub(1)
            .and_then(|previous| succeeded_result(&entries, previous).cloned());
        let input = StepInput {
            args: step.args.clone(),
            prev,
        };

        match inner
            .registry
            .dispatch(&step.name, inner.deps.clone(), ctx, input)
            .await
        {
            Ok(value) => {
                inner
                    .journal
                    .append(
                        id,
                        JournalEntry::succeeded(cursor, step.name.clone(), attempt, value),
                    )
                    .await?;
                inner.journal.record_cursor(id, cursor + 1).await?;
                inner.bump(id);
                debug!(workflow_id = %id, step = %step.name, attempt, "step succeeded");
            }
            Err(step_error) => {
                inner
                    .journal
                    .append(
                        id,
                        JournalEntry::failed(
                            cursor,
                            step.name.clone(),
                            attempt,
                            step_error.clone(),
                        ),
                    )
                    .await?;
                inner.bump(id);

                let retry_delay = if step_error.is_retryable() {
                    inner.policy.delay_before(attempt + 1)
                } else {
                    None
                };

                match retry_delay {
                    Some(delay) => {
                        warn!(
                            workflow_id = %id,
                            step = %step.name,
                            attempt,
                            delay_ms = delay.as_millis() as u64,
                            error = %step_error.message,
                            "step failed, retry scheduled"
                        );
                        // Backoff is a suspension point, never a blocked thread
                        tokio::time::sleep(delay).await;
                    }
                    None => {
                        error!(
                            workflow_id = %id,
                            step = %step.name,
                            attempt,
                            kind = %step_error.kind,
                            error = %step_error.message,
                            "step failed terminally"
                        );
                        inner
                            .journal
                            .record_run_result(id, RunResult::Failed { error: step_error })
                            .await?;
                        inner.bump(id);
                        return Ok(());
                    }
                }
            }
        }
    }
}
