//! Stress tests designed to break the engine.
//!
//! These exercise many concurrent workflows with randomized transient
//! failures and assert the journal invariants hold at every observable
//! prefix.

#[cfg(test)]
mod stress_tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    use serde_json::json;

    use crate::core::{StepCall, StepError, StepStatus, WorkflowId};
    use crate::executor::{Engine, EngineBuilder};
    use crate::journal::unsettled_attempt;
    use crate::registry::StepRegistry;
    use crate::retry::RetryPolicy;

    // ==========================================================================
    // Test Dependencies
    // ==========================================================================

    struct ChaosDeps {
        /// Probability (percent) that any single invocation fails transiently.
        failure_percent: u32,
        invocations: AtomicUsize,
    }

    fn chaos_engine(failure_percent: u32) -> Engine<ChaosDeps> {
        let mut registry = StepRegistry::new();
        registry.register("work", |deps: Arc<ChaosDeps>, ctx, _input| async move {
            deps.invocations.fetch_add(1, Ordering::SeqCst);
            // Deterministic per (workflow, step, attempt) so reruns reproduce
            let roll = fastrand::Rng::with_seed(
                (ctx.workflow_id.into_inner().as_u128() as u64)
                    ^ ((ctx.step_index as u64) << 8)
                    ^ (ctx.attempt as u64),
            )
            .u32(0..100);
            if roll < deps.failure_percent {
                Err(StepError::transient("injected failure"))
            } else {
                Ok(json!({ "step": ctx.step_index }))
            }
        });

        EngineBuilder::new(ChaosDeps {
            failure_percent,
            invocations: AtomicUsize::new(0),
        })
        .with_registry(registry)
        .with_retry_policy(RetryPolicy::new(3, Duration::from_millis(1), 2))
        .build()
    }

    async fn wait_all_terminal(engine: &Engine<ChaosDeps>, ids: &[WorkflowId]) {
        for &id in ids {
            for _ in 0..1000 {
                if engine.status(id).await.is_complete {
                    break;
                }
                tokio::time::sleep(Duration::from_millis(2)).await;
            }
            assert!(
                engine.status(id).await.is_complete,
                "workflow {} never terminated",
                id
            );
        }
    }

    // ==========================================================================
    // Stress: Concurrent Workflows
    // ==========================================================================

    #[tokio::test(flavor = "multi_thread")]
    async fn stress_concurrent_workflows_preserve_invariants() {
        let engine = chaos_engine(30);
        let steps = || {
            vec![
                StepCall::new("work", json!({})),
                StepCall::new("work", json!({})),
                StepCall::new("work", json!({})),
            ]
        };

        let mut ids = Vec::new();
        for _ in 0..50 {
            ids.push(engine.start("chaos", steps()).await.unwrap());
        }

        wait_all_terminal(&engine, &ids).await;

        for id in ids {
            let status = engine.status(id).await;
            let entries = &status.journal_entries;

            // Invariant: every prefix has at most one unsettled attempt
            for prefix_len in 0..=entries.len() {
                let prefix = &entries[..prefix_len];
                let open = (0..3)
                    .filter(|&i| unsettled_attempt(prefix, i).is_some())
                    .count();
                assert!(open <= 1);
            }

            // Invariant: attempts per step never decrease, never exceed policy
            for index in 0..3 {
                let attempts: Vec<u32> = entries
                    .iter()
                    .filter(|e| e.step_index == index)
                    .map(|e| e.attempt)
                    .collect();
                assert!(attempts.windows(2).all(|w| w[0] <= w[1]));
                assert!(attempts.iter().all(|&a| a <= 3));
            }

            // Invariant: terminal state matches the journal
            if status.has_failed {
                let last_failed_index = status
                    .workflow
                    .as_ref()
                    .map(|w| w.cursor)
                    .unwrap_or_default();
                let failed_attempts = entries
                    .iter()
                    .filter(|e| {
                        e.step_index == last_failed_index && e.status == StepStatus::Failed
                    })
                    .count();
                assert_eq!(failed_attempts, 3, "terminal failure without exhaustion");
            } else {
                // Completed: every step has exactly one succeeded entry
                for index in 0..3 {
                    let succeeded = entries
                        .iter()
                        .filter(|e| {
                            e.step_index == index && e.status == StepStatus::Succeeded
                        })
                        .count();
                    assert_eq!(succeeded, 1);
                }
            }
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn stress_failure_free_workflows_never_retry() {
        let engine = chaos_engine(0);

        let mut ids = Vec::new();
        for _ in 0..20 {
            ids.push(
                engine
                    .start("calm", vec![StepCall::new("work", json!({}))])
                    .await
                    .unwrap(),
            );
        }

        wait_all_terminal(&engine, &ids).await;

        for id in ids {
            let status = engine.status(id).await;
            assert!(!status.has_failed);
            assert_eq!(status.journal_entries.len(), 2); // InProgress + Succeeded
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn stress_always_failing_workflows_exhaust_cleanly() {
        let engine = chaos_engine(100);

        let mut ids = Vec::new();
        for _ in 0..10 {
            ids.push(
                engine
                    .start("doomed", vec![StepCall::new("work", json!({}))])
                    .await
                    .unwrap(),
            );
        }

        wait_all_terminal(&engine, &ids).await;

        for id in ids {
            let status = engine.status(id).await;
            assert!(status.has_failed);
            // 3 attempts, each InProgress + Failed
            assert_eq!(status.journal_entries.len(), 6);
        }
    }
}
