//! Retry policy for balance requests.

use std::time::Duration;

use super::FetchErrorKind;

/// Bounded, fixed-delay retry policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    delay: Duration,
}

impl RetryPolicy {
    /// Creates a policy allowing `max_attempts` total attempts (at least one).
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay,
        }
    }

    /// A single attempt, never retried.
    pub fn no_retry() -> Self {
        Self::new(1, Duration::ZERO)
    }

    /// Total attempts allowed per fetch.
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Fixed delay between attempts.
    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Whether another attempt should follow `attempt` failing with `error`.
    pub fn should_retry(&self, error: &FetchErrorKind, attempt: u32) -> bool {
        attempt < self.max_attempts && error.is_transient()
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_secs(5))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_attempts_clamps_to_one() {
        let policy = RetryPolicy::new(0, Duration::from_secs(1));
        assert_eq!(policy.max_attempts(), 1);
        assert!(!policy.should_retry(&FetchErrorKind::Timeout, 1));
    }

    #[test]
    fn test_fixed_delay() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay(), Duration::from_secs(5));
        assert_eq!(RetryPolicy::no_retry().delay(), Duration::ZERO);
    }

    #[test]
    fn test_retry_budget() {
        let policy = RetryPolicy::new(3, Duration::ZERO);
        assert!(policy.should_retry(&FetchErrorKind::ConnectionFailure, 1));
        assert!(policy.should_retry(&FetchErrorKind::HttpStatus(503), 2));
        assert!(!policy.should_retry(&FetchErrorKind::HttpStatus(503), 3));
    }

    #[test]
    fn test_permanent_errors_never_retry() {
        let policy = RetryPolicy::new(5, Duration::ZERO);
        assert!(!policy.should_retry(&FetchErrorKind::HttpStatus(404), 1));
        assert!(!policy.should_retry(&FetchErrorKind::MalformedResponse, 1));
    }
}
