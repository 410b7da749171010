//! Backoff schedules per error kind.

use std::time::{Duration, SystemTime};

use reqwest_retry::policies::ExponentialBackoff;
use reqwest_retry::{Jitter, RetryDecision, RetryPolicy as _};

use crate::error::ErrorKind;

/// Decides whether and when a failed attempt is retried.
///
/// Transient kinds (timeouts, network failures, rate limiting) use a short
/// exponential schedule; maintenance kinds use a longer one. A `Retry-After` hint
/// on a rate-limit response replaces the computed delay. Non-retryable kinds are
/// never retried.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    transient: ExponentialBackoff,
    maintenance: ExponentialBackoff,
    max_retries: u32,
}

impl RetryPolicy {
    pub fn new(max_retries: u32) -> Self {
        Self::with_bounds(
            max_retries,
            (Duration::from_millis(500), Duration::from_secs(10)),
            (Duration::from_secs(5), Duration::from_secs(60)),
        )
    }

    /// Custom `(min, max)` delays for the transient and maintenance schedules.
    pub fn with_bounds(
        max_retries: u32,
        transient: (Duration, Duration),
        maintenance: (Duration, Duration),
    ) -> Self {
        let schedule = |(min, max): (Duration, Duration)| {
            ExponentialBackoff::builder()
                .retry_bounds(min, max)
                .jitter(Jitter::Bounded)
                .build_with_max_retries(max_retries)
        };
        Self {
            transient: schedule(transient),
            maintenance: schedule(maintenance),
            max_retries,
        }
    }

    /// No retries at all.
    pub fn none() -> Self {
        Self::new(0)
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Delay before the next attempt, or `None` to give up.
    ///
    /// `past_retries` counts retries already made for this call and `started` is
    /// when its first attempt began.
    pub fn next_delay(
        &self,
        kind: ErrorKind,
        past_retries: u32,
        started: SystemTime,
        retry_after_ms: Option<u64>,
    ) -> Option<Duration> {
        if !kind.is_retryable() || past_retries >= self.max_retries {
            return None;
        }
        if kind == ErrorKind::RateLimitExceeded {
            if let Some(ms) = retry_after_ms {
                return Some(Duration::from_millis(ms));
            }
        }
        let schedule = if kind.is_maintenance() {
            &self.maintenance
        } else {
            &self.transient
        };
        match schedule.should_retry(started, past_retries) {
            RetryDecision::Retry { execute_after } => Some(
                execute_after
                    .duration_since(SystemTime::now())
                    .unwrap_or_default(),
            ),
            RetryDecision::DoNotRetry => None,
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_non_retryable_kinds() {
        let policy = RetryPolicy::new(3);
        let now = SystemTime::now();
        for kind in [
            ErrorKind::Authentication,
            ErrorKind::InvalidNonce,
            ErrorKind::InsufficientFunds,
            ErrorKind::InvalidOrder,
            ErrorKind::BadRequest,
            ErrorKind::Value,
        ] {
            assert_eq!(policy.next_delay(kind, 0, now, None), None, "{kind}");
        }
    }

    #[test]
    fn test_retry_after_hint() {
        let policy = RetryPolicy::new(3);
        let delay = policy.next_delay(ErrorKind::RateLimitExceeded, 0, SystemTime::now(), Some(2000));
        assert_eq!(delay, Some(Duration::from_secs(2)));
    }

    #[test]
    fn test_gives_up_after_max_retries() {
        let policy = RetryPolicy::new(2);
        let now = SystemTime::now();
        assert!(policy.next_delay(ErrorKind::Network, 1, now, None).is_some());
        assert_eq!(policy.next_delay(ErrorKind::Network, 2, now, None), None);
        assert_eq!(RetryPolicy::none().next_delay(ErrorKind::Network, 0, now, None), None);
    }

    #[test]
    fn test_maintenance_waits_longer() {
        let policy = RetryPolicy::new(3);
        let now = SystemTime::now();
        let transient = policy.next_delay(ErrorKind::RequestTimeout, 0, now, None).unwrap();
        let maintenance = policy.next_delay(ErrorKind::OnMaintenance, 0, now, None).unwrap();
        assert!(transient <= Duration::from_secs(1));
        assert!(maintenance >= Duration::from_secs(4));
    }
}
