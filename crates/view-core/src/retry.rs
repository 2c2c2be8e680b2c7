use std::time::Duration;

use crate::error::SyncError;

/// Exponential backoff policy for transient fetch failures.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    base_delay_ms: u64,
    max_delay_ms: u64,
    max_attempts: u32,
}

impl RetryPolicy {
    /// Create a policy with the given base/cap delays and attempt budget.
    pub fn new(base_delay_ms: u64, max_delay_ms: u64, max_attempts: u32) -> Self {
        Self {
            base_delay_ms,
            max_delay_ms,
            max_attempts,
        }
    }

    /// Maximum number of retry attempts.
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Delay before retrying `error` after `attempt` prior failures.
    ///
    /// Returns `None` when the error is not retryable or the attempt budget
    /// is exhausted. The error's own retry hint wins when it is larger than
    /// the computed backoff.
    pub fn delay_for(&self, attempt: u32, error: &SyncError) -> Option<Duration> {
        if !error.is_retryable() || attempt >= self.max_attempts {
            return None;
        }
        let shift = attempt.min(20);
        let backoff = self.base_delay_ms.saturating_mul(1_u64 << shift);
        let hinted = error.retry_after_ms.unwrap_or(0);
        Some(Duration::from_millis(
            backoff.max(hinted).min(self.max_delay_ms),
        ))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(500, 30_000, 3)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn network_error() -> SyncError {
        SyncError::network("timeout", "request timed out")
    }

    #[test]
    fn backs_off_exponentially_up_to_the_cap() {
        let policy = RetryPolicy::new(100, 10_000, 10);
        let err = network_error();
        assert_eq!(policy.delay_for(0, &err), Some(Duration::from_millis(100)));
        assert_eq!(policy.delay_for(3, &err), Some(Duration::from_millis(800)));
        assert_eq!(
            policy.delay_for(9, &err),
            Some(Duration::from_millis(10_000))
        );
    }

    #[test]
    fn refuses_non_retryable_errors() {
        let policy = RetryPolicy::default();
        let err = SyncError::validation("term_too_short", "term too short");
        assert_eq!(policy.delay_for(0, &err), None);
    }

    #[test]
    fn stops_after_the_attempt_budget() {
        let policy = RetryPolicy::new(100, 10_000, 2);
        let err = network_error();
        assert!(policy.delay_for(1, &err).is_some());
        assert_eq!(policy.delay_for(2, &err), None);
    }

    #[test]
    fn honors_a_larger_retry_after_hint() {
        let policy = RetryPolicy::new(100, 20_000, 5);
        let err = network_error().with_retry_after(Duration::from_secs(5));
        assert_eq!(policy.delay_for(0, &err), Some(Duration::from_secs(5)));
    }
}
