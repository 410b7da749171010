//! Async FIFO throttler over a [`TokenBucket`].

use std::sync::{Mutex, PoisonError};

use tokio::time::Instant;
use tracing::trace;

use crate::rate_limit::{RateLimitBudget, RateLimitConfig, TokenBucket};

/// Gates outbound calls on a weighted token bucket.
///
/// Callers are served strictly in arrival order: the wait happens while holding a
/// fair [`tokio::sync::Mutex`] turnstile, so a cheap request queued behind an
/// expensive one cannot overtake it.
///
/// # Example
///
/// ```rust
/// use exchange_api_core::rate_limit::{RateLimitConfig, Throttler};
///
/// # async fn run() {
/// let throttler = Throttler::new(RateLimitConfig::new(100.0));
/// let permit = throttler.acquire(1.0).await;
/// // ... sign the request ...
/// permit.commit();
/// # }
/// ```
#[derive(Debug)]
pub struct Throttler {
    config: RateLimitConfig,
    bucket: Mutex<TokenBucket>,
    turnstile: tokio::sync::Mutex<()>,
}

impl Throttler {
    pub fn new(config: RateLimitConfig) -> Self {
        let bucket = TokenBucket::new(config.capacity, config.rate_limit_ms, Instant::now());
        Self {
            config,
            bucket: Mutex::new(bucket),
            turnstile: tokio::sync::Mutex::new(()),
        }
    }

    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    /// Wait until `cost` tokens can be debited, then reserve them.
    ///
    /// Never fails and never drops the request. The reservation is returned to the
    /// bucket if the [`Permit`] is dropped without [`Permit::commit`]. Cancelling
    /// the returned future while it waits reserves nothing.
    pub async fn acquire(&self, cost: f64) -> Permit<'_> {
        if !self.config.enabled || cost <= 0.0 {
            return Permit {
                throttler: self,
                cost: 0.0,
                committed: false,
            };
        }

        let _turn = self.turnstile.lock().await;
        loop {
            let attempt = self.lock_bucket().try_acquire(cost, Instant::now());
            match attempt {
                Ok(()) => {
                    return Permit {
                        throttler: self,
                        cost,
                        committed: false,
                    };
                }
                Err(wait_time) => {
                    trace!(cost, wait_ms = wait_time.as_millis() as u64, "throttling");
                    tokio::time::sleep(wait_time).await;
                }
            }
        }
    }

    /// Snapshot of the shared bucket.
    pub fn budget(&self) -> RateLimitBudget {
        let mut bucket = self.lock_bucket();
        bucket.refill(Instant::now());
        RateLimitBudget {
            capacity: bucket.capacity(),
            refill_rate_per_ms: bucket.refill_per_ms(),
            current_tokens: bucket.tokens(),
            last_refill: bucket.last_refill(),
        }
    }

    fn lock_bucket(&self) -> std::sync::MutexGuard<'_, TokenBucket> {
        // The bucket holds plain numbers, so a poisoned lock is still consistent.
        self.bucket.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// A reservation of throttler tokens.
#[derive(Debug)]
#[must_use = "dropping a permit without committing refunds its tokens"]
pub struct Permit<'a> {
    throttler: &'a Throttler,
    cost: f64,
    committed: bool,
}

impl Permit<'_> {
    /// Make the debit final. Called right before the request goes out.
    pub fn commit(mut self) {
        self.committed = true;
    }

    /// Tokens held by this reservation.
    pub fn cost(&self) -> f64 {
        self.cost
    }
}

impl Drop for Permit<'_> {
    fn drop(&mut self) {
        if !self.committed && self.cost > 0.0 {
            trace!(cost = self.cost, "refunding uncommitted permit");
            self.throttler.lock_bucket().refund(self.cost);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use super::*;

    fn throttler(interval_ms: f64, capacity: f64) -> Throttler {
        Throttler::new(RateLimitConfig::new(interval_ms).with_capacity(capacity))
    }

    #[tokio::test(start_paused = true)]
    async fn test_sequential_calls_are_spaced() {
        let throttler = throttler(100.0, 1.0);
        let start = Instant::now();
        for _ in 0..5 {
            throttler.acquire(1.0).await.commit();
        }
        assert!(start.elapsed() >= Duration::from_millis(400));
        assert!(start.elapsed() < Duration::from_millis(450));
    }

    #[tokio::test(start_paused = true)]
    async fn test_burst_up_to_capacity() {
        let throttler = throttler(100.0, 3.0);
        let start = Instant::now();
        for _ in 0..3 {
            throttler.acquire(1.0).await.commit();
        }
        assert_eq!(start.elapsed(), Duration::ZERO);
        throttler.acquire(1.0).await.commit();
        assert!(start.elapsed() >= Duration::from_millis(100));
    }

    #[tokio::test(start_paused = true)]
    async fn test_fifo_order_with_mixed_costs() {
        let throttler = Arc::new(throttler(100.0, 1.0));
        let completions = Arc::new(std::sync::Mutex::new(Vec::new()));
        let start = Instant::now();

        let mut handles = Vec::new();
        for (index, cost) in [1.0, 3.0, 1.0, 0.5].into_iter().enumerate() {
            let throttler = throttler.clone();
            let completions = completions.clone();
            handles.push(tokio::spawn(async move {
                throttler.acquire(cost).await.commit();
                completions.lock().unwrap().push((index, start.elapsed()));
            }));
            // Let the task reach the turnstile before the next one arrives.
            tokio::task::yield_now().await;
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let completions = completions.lock().unwrap();
        let order: Vec<usize> = completions.iter().map(|(i, _)| *i).collect();
        assert_eq!(order, vec![0, 1, 2, 3]);

        let at = |i: usize| completions[i].1;
        assert_eq!(at(0), Duration::ZERO);
        assert!(at(1) >= Duration::from_millis(100));
        // The cost-3 call leaves a debt of 2, so the next unit call waits 300ms.
        assert!(at(2) >= Duration::from_millis(400));
        assert!(at(3) >= Duration::from_millis(450));
    }

    #[tokio::test(start_paused = true)]
    async fn test_uncommitted_permit_is_refunded() {
        let throttler = throttler(1000.0, 1.0);
        let start = Instant::now();
        {
            let _permit = throttler.acquire(1.0).await;
        }
        throttler.acquire(1.0).await.commit();
        assert_eq!(start.elapsed(), Duration::ZERO);
        assert!(throttler.budget().current_tokens.abs() < 1e-9);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_waiter_reserves_nothing() {
        let throttler = throttler(100.0, 1.0);
        throttler.acquire(1.0).await.commit();

        let waited = tokio::time::timeout(Duration::from_millis(10), throttler.acquire(1.0)).await;
        assert!(waited.is_err());

        // Only the elapsed refill is in the bucket; the cancelled caller took nothing.
        let budget = throttler.budget();
        assert!((budget.current_tokens - 0.1).abs() < 1e-6);
    }

    #[tokio::test(start_paused = true)]
    async fn test_disabled_throttler_never_waits() {
        let throttler = Throttler::new(RateLimitConfig::new(1000.0).with_enabled(false));
        let start = Instant::now();
        for _ in 0..10 {
            throttler.acquire(1.0).await.commit();
        }
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_budget_snapshot() {
        let throttler = throttler(200.0, 2.0);
        throttler.acquire(1.5).await.commit();
        let budget = throttler.budget();
        assert_eq!(budget.capacity, 2.0);
        assert!((budget.refill_rate_per_ms - 0.005).abs() < 1e-12);
        assert!((budget.current_tokens - 0.5).abs() < 1e-9);
    }
}
