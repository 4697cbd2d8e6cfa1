//! Backoff arithmetic
//!
//! Exponential backoff with a ceiling. The schedule is pure arithmetic; callers
//! decide whether to sleep on it or to skip work until the window has passed.

use std::time::Duration;

/// Exponential backoff schedule
#[derive(Debug, Clone, PartialEq)]
pub struct BackoffConfig {
    /// Delay after the first failure
    pub initial_delay: Duration,
    /// Upper bound for any delay
    pub max_delay: Duration,
    /// Growth factor per additional failure (2.0 doubles each time)
    pub multiplier: f64,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(5),
            max_delay: Duration::from_secs(15 * 60),
            multiplier: 2.0,
        }
    }
}

impl BackoffConfig {
    /// Create a schedule starting at `initial_delay`
    pub fn new(initial_delay: Duration) -> Self {
        Self { initial_delay, ..Default::default() }
    }

    /// Set the maximum delay
    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Set the growth factor
    pub fn with_multiplier(mut self, multiplier: f64) -> Self {
        self.multiplier = multiplier;
        self
    }

    /// Delay before attempt number `attempt + 1`, zero-based
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.min(i32::MAX as u32) as i32;
        let delay_ms = self.initial_delay.as_millis() as f64 * self.multiplier.powi(exponent);

        if !delay_ms.is_finite() || delay_ms >= self.max_delay.as_millis() as f64 {
            self.max_delay
        } else {
            Duration::from_millis(delay_ms as u64)
        }
    }
}
