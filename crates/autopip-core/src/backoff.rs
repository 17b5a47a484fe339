//! Retry delay policies.
//!
//! - [`BackoffPolicy`]: exponential, bounded by an attempt budget. Drives
//!   PiP enter retries.
//! - [`LinearBackoff`]: step-growing delay with a ceiling. Drives element
//!   lookup while the page is still being built.
//!
//! Both are pure: they compute delays, the runtime sleeps.

use std::time::Duration;

use serde::{Deserialize, Serialize};

// ─── Exponential ─────────────────────────────────────────────────

/// Exponential backoff with an attempt budget.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackoffPolicy {
    /// Delay after the first failure in milliseconds.
    pub base_delay_ms: u64,
    /// Multiplier applied per further failure.
    pub growth: f64,
    /// Upper bound on a single delay in milliseconds.
    pub max_delay_ms: u64,
    /// Total requests allowed per decision cycle.
    pub max_attempts: u32,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            base_delay_ms: 250,
            growth: 2.0,
            max_delay_ms: 8_000,
            max_attempts: 3,
        }
    }
}

impl BackoffPolicy {
    /// Delay to wait after failure number `failure_index` (zero-based).
    #[must_use]
    pub fn delay_for(&self, failure_index: u32) -> Duration {
        let exponent = i32::try_from(failure_index).unwrap_or(i32::MAX);
        let raw = (self.base_delay_ms as f64) * self.growth.powi(exponent);
        let ms = if raw.is_finite() { raw as u64 } else { u64::MAX };
        Duration::from_millis(ms.min(self.max_delay_ms))
    }

    /// Whether every wait the budget can produce is strictly longer than the
    /// one before. A cap or a zero base that flattens the schedule fails.
    #[must_use]
    pub fn escalates(&self) -> bool {
        if self.base_delay_ms == 0 {
            return false;
        }
        // Only failures before the last allowed request are followed by a wait.
        let waits = self.max_attempts.saturating_sub(1);
        (1..waits).all(|i| self.delay_for(i - 1) < self.delay_for(i))
    }

    /// Whether another request is allowed after `failures` consecutive failures.
    #[must_use]
    pub fn allows(&self, failures: u32) -> bool {
        failures < self.max_attempts
    }
}

// ─── Linear ──────────────────────────────────────────────────────

/// Linear backoff: `step * (attempt + 1)`, capped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinearBackoff {
    pub step_ms: u64,
    pub max_delay_ms: u64,
    /// Retries after the initial attempt.
    pub retries: u32,
}

impl Default for LinearBackoff {
    fn default() -> Self {
        Self {
            step_ms: 200,
            max_delay_ms: 1_000,
            retries: 5,
        }
    }
}

impl LinearBackoff {
    #[must_use]
    pub fn delay_for(&self, retry_index: u32) -> Duration {
        let ms = self
            .step_ms
            .saturating_mul(u64::from(retry_index) + 1)
            .min(self.max_delay_ms);
        Duration::from_millis(ms)
    }
}
