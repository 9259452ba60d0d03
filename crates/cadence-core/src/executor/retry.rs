//! Bounded retry policy for prompt submission.
//!
//! Stateless: the caller owns the attempt counter and asks the policy
//! whether another attempt is allowed and how long to wait first.

use std::time::Duration;

use cadence_types::config::PollingConfig;

/// Fixed-backoff retry policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one.
    pub max_attempts: u32,
    /// Pause between consecutive attempts.
    pub backoff: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, backoff: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff,
        }
    }

    pub fn from_config(config: &PollingConfig) -> Self {
        Self::new(
            config.max_send_attempts,
            Duration::from_millis(config.retry_backoff_ms),
        )
    }

    /// Determine whether a retry should be attempted.
    ///
    /// `attempt` is 1-based (first execution is attempt 1).
    pub fn should_retry(&self, attempt: u32) -> bool {
        attempt < self.max_attempts
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&PollingConfig::default())
    }
}
