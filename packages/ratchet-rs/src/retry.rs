//! Retry policy evaluation.
//!
//! A pure mapping from attempt counts to "wait this long" or "give up".
//! The executor owns the clock; this module owns the arithmetic.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Retry/backoff policy applied uniformly to every step of a workflow.
///
/// Delay before attempt `k + 1` is `initial_backoff × base^(k-1)`: with the
/// defaults, failures are retried after 100ms, then 200ms, and a third
/// failure is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Maximum attempts per step, counting the first.
    pub max_attempts: u32,
    /// Delay before the second attempt.
    pub initial_backoff: Duration,
    /// Multiplier applied per subsequent attempt.
    pub base: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(100),
            base: 2,
        }
    }
}

impl RetryPolicy {
    /// Create a policy with explicit parameters.
    pub fn new(max_attempts: u32, initial_backoff: Duration, base: u32) -> Self {
        Self {
            max_attempts,
            initial_backoff,
            base,
        }
    }

    /// A policy that never retries (one attempt per step).
    pub fn no_retries() -> Self {
        Self {
            max_attempts: 1,
            initial_backoff: Duration::ZERO,
            base: 1,
        }
    }

    /// Returns true if the given 1-based attempt number is allowed to run.
    pub fn allows(&self, attempt: u32) -> bool {
        attempt >= 1 && attempt <= self.max_attempts
    }

    /// Delay to wait before running `next_attempt`, or `None` when attempts
    /// are exhausted.
    ///
    /// The first attempt runs immediately; exponent arithmetic saturates so
    /// absurd attempt numbers produce a long delay rather than a panic.
    pub fn delay_before(&self, next_attempt: u32) -> Option<Duration> {
        if !self.allows(next_attempt) {
            return None;
        }
        if next_attempt == 1 {
            return Some(Duration::ZERO);
        }
        let exponent = next_attempt - 2;
        let multiplier = self.base.saturating_pow(exponent);
        Some(self.initial_backoff.saturating_mul(multiplier))
    }
}
