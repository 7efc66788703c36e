//! Retry and split limits.

use std::time::Duration;

/// Limits applied by the state machine when work fails.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Transient failures tolerated per work before the session halts.
    pub max_retries: u32,
    /// Delay before the first retry.
    pub base_delay: Duration,
    /// Upper bound for any backoff delay.
    pub max_delay: Duration,
    /// How many times a modify batch may be halved before giving up.
    pub max_split_depth: u32,
}

impl RetryPolicy {
    /// Backoff before retrying a work that has been retried `retry_count` times.
    ///
    /// Formula: min(max_delay, base_delay * 2^retry_count)
    pub fn backoff(&self, retry_count: u32) -> Duration {
        let factor = 2u32.checked_pow(retry_count).unwrap_or(u32::MAX);
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }

    /// Delay before the next retry, honoring a server retry-after hint.
    pub fn retry_delay(&self, retry_count: u32, retry_after: Option<Duration>) -> Duration {
        let backoff = self.backoff(retry_count);
        match retry_after {
            Some(hint) => backoff.max(hint),
            None => backoff,
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
            max_split_depth: 8,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_per_retry() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.backoff(0), Duration::from_secs(1));
        assert_eq!(policy.backoff(1), Duration::from_secs(2));
        assert_eq!(policy.backoff(2), Duration::from_secs(4));
        assert_eq!(policy.backoff(3), Duration::from_secs(8));
    }

    #[test]
    fn backoff_is_capped() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.backoff(10), Duration::from_secs(60));
        // Huge exponents must not overflow
        assert_eq!(policy.backoff(u32::MAX), Duration::from_secs(60));
    }

    #[test]
    fn retry_after_hint_extends_delay() {
        let policy = RetryPolicy::default();
        assert_eq!(
            policy.retry_delay(0, Some(Duration::from_secs(30))),
            Duration::from_secs(30)
        );
        // A hint shorter than the backoff does not shorten it
        assert_eq!(
            policy.retry_delay(2, Some(Duration::from_millis(10))),
            Duration::from_secs(4)
        );
    }
}
