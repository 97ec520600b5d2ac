//! Retry decisions and backoff timing.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use autoflow_core::Job;

/// Exponential backoff without jitter or cap: `base * 2^attempts`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryController {
    base_delay: Duration,
}

impl Default for RetryController {
    fn default() -> Self {
        Self::new(Duration::from_secs(1))
    }
}

impl RetryController {
    pub fn new(base_delay: Duration) -> Self {
        Self { base_delay }
    }

    pub fn base_delay(&self) -> Duration {
        self.base_delay
    }

    /// More attempts are allowed.
    pub fn should_retry(&self, job: &Job) -> bool {
        job.attempts < job.max_attempts
    }

    /// Delay before the attempt following attempt number `attempts` (1-indexed).
    pub fn backoff_delay(&self, attempts: u32) -> Duration {
        let factor = 1u32.checked_shl(attempts).unwrap_or(u32::MAX);
        self.base_delay.saturating_mul(factor)
    }

    /// Total suspension a job spends in backoff if every attempt fails.
    pub fn worst_case_delay(&self, max_attempts: u32) -> Duration {
        (1..max_attempts)
            .map(|n| self.backoff_delay(n))
            .fold(Duration::ZERO, Duration::saturating_add)
    }

    /// Suspend the caller for the backoff following attempt `attempts`.
    pub async fn wait(&self, attempts: u32) {
        tokio::time::sleep(self.backoff_delay(attempts)).await;
    }
}
