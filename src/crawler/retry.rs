//! Bounded retry policy for transient fetch errors
//!
//! Independent of strategy escalation: a retry always repeats the same
//! strategy.

use crate::config::RetryConfig;
use std::time::Duration;

const BACKOFF_MULTIPLIER: f64 = 2.0;

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts per URL, the first one included
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    /// Fraction of the delay added or removed at random (0.0 - 1.0)
    pub jitter: f64,
}

impl RetryPolicy {
    pub fn from_config(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts,
            initial_backoff: Duration::from_millis(config.initial_backoff_ms),
            max_backoff: Duration::from_millis(config.max_backoff_ms),
            jitter: config.jitter,
        }
    }

    /// Policy with zero delays, for tests
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            initial_backoff: Duration::ZERO,
            max_backoff: Duration::ZERO,
            jitter: 0.0,
        }
    }

    /// Whether another attempt may follow attempt number `attempt` (1-based)
    pub fn should_retry(&self, attempt: u32) -> bool {
        attempt < self.max_attempts
    }

    /// Delay before the attempt after number `attempt` (1-based)
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(30) as i32;
        let base = self.initial_backoff.as_secs_f64() * BACKOFF_MULTIPLIER.powi(exponent);
        let capped = base.min(self.max_backoff.as_secs_f64());

        let spread = capped * self.jitter;
        let jittered = if spread > 0.0 {
            capped + rand::random_range(-spread..spread)
        } else {
            capped
        };

        Duration::from_secs_f64(jittered.max(0.0))
    }
}
