//! Bounded exponential backoff for projection writes
//!
//! `delay = initial_delay_ms * multiplier^(attempt-1)`, clamped to
//! `max_delay_ms`, plus a deterministic jitter of
//! `(attempt * 7919 + 104729) % (delay/4 + 1)`. No randomness, so tests with
//! paused time see the same schedule every run.

use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Attempts after the first one. 0 disables retrying.
    pub max_retries: u32,
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
    pub backoff_multiplier: f64,
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 4,
            initial_delay_ms: 50,
            max_delay_ms: 2_000,
            backoff_multiplier: 2.0,
            jitter: true,
        }
    }
}

impl RetryConfig {
    /// Millisecond delays, no jitter.
    pub fn for_testing() -> Self {
        Self {
            max_retries: 3,
            initial_delay_ms: 1,
            max_delay_ms: 5,
            backoff_multiplier: 2.0,
            jitter: false,
        }
    }

    /// Delay before retry number `attempt` (1-indexed).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        Duration::from_millis(compute_delay(self, attempt))
    }
}

/// Delay in milliseconds before retry number `attempt` (1-indexed).
pub fn compute_delay(config: &RetryConfig, attempt: u32) -> u64 {
    let exponent = attempt.saturating_sub(1).min(i32::MAX as u32) as i32;
    let base = config.initial_delay_ms as f64 * config.backoff_multiplier.powi(exponent);

    let max = config.max_delay_ms as f64;
    let mut delay = if base.is_nan() || base < 0.0 {
        0
    } else if base > max {
        config.max_delay_ms
    } else {
        base as u64
    };

    if config.jitter {
        let quarter = delay / 4;
        if quarter > 0 {
            let jitter = (attempt as u64)
                .wrapping_mul(7919)
                .wrapping_add(104_729)
                % (quarter + 1);
            delay = delay.saturating_add(jitter).min(config.max_delay_ms);
        }
    }
    delay
}
