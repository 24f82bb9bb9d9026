use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Upper bound on how long one job is polled before it is declared exhausted.
pub const MAX_WAIT_MS: u64 = 3_600_000;

/// First backoff delay.
pub const FIRST_DELAY_MS: u64 = 500;

/// Backoff ceiling.
pub const MAX_DELAY_MS: u64 = 10_000;

/// Polling budget for one job: what remains of [`MAX_WAIT_MS`] after the
/// ramp-up delays (500 + 1000 + 2000 + 4000 + 8000 + 10000 = 25 500 ms),
/// spent at the ceiling. Evaluates to 357.
pub const DEFAULT_MAX_ATTEMPTS: u32 = ((MAX_WAIT_MS - 25_500) / MAX_DELAY_MS) as u32;

/// Exponential backoff between two status checks of the same job.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackoffStrategy {
    /// Delay after the first unresolved observation.
    pub first_ms: u64,
    /// Ceiling applied after growth.
    pub max_ms: u64,
    /// Growth factor per attempt.
    pub factor: f64,
}

impl Default for BackoffStrategy {
    fn default() -> Self {
        Self {
            first_ms: FIRST_DELAY_MS,
            max_ms: MAX_DELAY_MS,
            factor: 2.0,
        }
    }
}

impl BackoffStrategy {
    /// Delay to wait after the given attempt (1-indexed) came back unresolved.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }
        let exp = (attempt - 1).min(i32::MAX as u32) as i32;
        let grown = self.first_ms as f64 * self.factor.powi(exp);
        let capped = grown.min(self.max_ms as f64).max(0.0);
        Duration::from_millis(capped as u64)
    }
}

/// Budget and pacing for driving one job to a terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PollPolicy {
    pub backoff: BackoffStrategy,
    /// Maximum number of status checks, including the first one.
    pub max_attempts: u32,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            backoff: BackoffStrategy::default(),
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }
}

impl PollPolicy {
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    pub fn with_backoff(mut self, backoff: BackoffStrategy) -> Self {
        self.backoff = backoff;
        self
    }

    /// Whether another status check is allowed after `attempt` checks.
    pub fn should_retry(&self, attempt: u32) -> bool {
        attempt < self.max_attempts
    }

    /// Total time spent sleeping if every check comes back unresolved.
    pub fn worst_case_wait(&self) -> Duration {
        (1..self.max_attempts)
            .map(|attempt| self.backoff.delay_for_attempt(attempt))
            .sum()
    }
}
