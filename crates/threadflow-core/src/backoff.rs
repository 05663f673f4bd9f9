//! # Backoff Policy
//!
//! Deterministic, capped exponential delay between retries.
//!
//! ## Schedule
//! ```text
//! delay(attempt) = min(base × growth^min(attempt, attempt_cap), max)
//!
//! Defaults: base 5s, growth 1.5, cap 10, max 30s
//!
//!   attempt │ 0     1      2       3       4       5+
//!   ────────┼─────────────────────────────────────────────
//!   delay   │ 5s    7.5s   11.25s  16.875s 25.312s 30s
//! ```
//!
//! The exponent input is capped before exponentiation so very large attempt
//! counts cannot overflow; the output is then clamped to the ceiling. No
//! jitter: the same attempt always yields the same delay.

use std::time::Duration;

/// Default base delay before the first retry.
pub const DEFAULT_BASE_DELAY: Duration = Duration::from_millis(5_000);

/// Default multiplier applied per attempt.
pub const DEFAULT_GROWTH_FACTOR: f64 = 1.5;

/// Default ceiling for any single delay.
pub const DEFAULT_MAX_DELAY: Duration = Duration::from_millis(30_000);

/// Default cap on the exponent input.
pub const DEFAULT_ATTEMPT_CAP: u32 = 10;

/// Capped exponential backoff schedule.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BackoffPolicy {
    base: Duration,
    growth_factor: f64,
    max: Duration,
    attempt_cap: u32,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        BackoffPolicy {
            base: DEFAULT_BASE_DELAY,
            growth_factor: DEFAULT_GROWTH_FACTOR,
            max: DEFAULT_MAX_DELAY,
            attempt_cap: DEFAULT_ATTEMPT_CAP,
        }
    }
}

impl BackoffPolicy {
    /// Creates a policy.
    ///
    /// Growth factors below 1.0 (or NaN) are raised to 1.0 so the schedule
    /// stays non-decreasing.
    pub fn new(base: Duration, growth_factor: f64, max: Duration, attempt_cap: u32) -> Self {
        BackoffPolicy {
            base,
            growth_factor: growth_factor.max(1.0),
            max,
            attempt_cap,
        }
    }

    /// Returns the base delay.
    pub fn base(&self) -> Duration {
        self.base
    }

    /// Returns the growth factor.
    pub fn growth_factor(&self) -> f64 {
        self.growth_factor
    }

    /// Returns the ceiling.
    pub fn max_delay(&self) -> Duration {
        self.max
    }

    /// Returns the exponent cap.
    pub fn attempt_cap(&self) -> u32 {
        self.attempt_cap
    }

    /// Computes the delay for a given attempt number.
    pub fn compute_delay(&self, attempt: u32) -> Duration {
        if self.base.is_zero() {
            return Duration::ZERO;
        }
        let exponent = i32::try_from(attempt.min(self.attempt_cap)).unwrap_or(i32::MAX);
        let max_ms = self.max.as_secs_f64() * 1_000.0;
        let raw_ms = self.base.as_secs_f64() * 1_000.0 * self.growth_factor.powi(exponent);

        // powi can reach +inf for absurd caps; min() folds that into the ceiling.
        let capped_ms = if raw_ms.is_finite() {
            raw_ms.min(max_ms)
        } else {
            max_ms
        };
        Duration::from_millis(capped_ms.floor() as u64)
    }
}
