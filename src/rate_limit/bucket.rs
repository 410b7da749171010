//! Weighted token bucket.
//!
//! The bucket refills continuously at one token per `interval_ms` milliseconds up
//! to its capacity. A request of cost `c` is admitted once the bucket holds
//! `min(c, capacity)` tokens and then debits the full `c`, so an expensive call can
//! drive the balance negative and the debt delays whoever comes next.

use std::time::Duration;

use tokio::time::Instant;

// Absorbs float drift when the refill lands exactly on the needed balance.
const EPSILON: f64 = 1e-9;

/// Token bucket state. Time is passed in so the math is testable without a clock.
#[derive(Debug, Clone)]
pub struct TokenBucket {
    capacity: f64,
    interval_ms: f64,
    tokens: f64,
    last_refill: Instant,
}

impl TokenBucket {
    /// Create a full bucket.
    pub fn new(capacity: f64, interval_ms: f64, now: Instant) -> Self {
        Self {
            capacity,
            interval_ms,
            tokens: capacity,
            last_refill: now,
        }
    }

    /// Accrue tokens for the time elapsed since the last refill.
    pub fn refill(&mut self, now: Instant) {
        let elapsed_ms = now.saturating_duration_since(self.last_refill).as_micros() as f64 / 1000.0;
        self.tokens = (self.tokens + elapsed_ms / self.interval_ms).min(self.capacity);
        self.last_refill = now;
    }

    /// Try to debit `cost`.
    ///
    /// Returns `Ok(())` if admitted, or `Err(wait_time)` until enough tokens will
    /// have accrued.
    pub fn try_acquire(&mut self, cost: f64, now: Instant) -> Result<(), Duration> {
        self.refill(now);
        let needed = cost.min(self.capacity);
        if self.tokens + EPSILON >= needed {
            self.tokens -= cost;
            return Ok(());
        }
        let missing_ms = (needed - self.tokens) * self.interval_ms;
        Err(Duration::from_micros((missing_ms * 1000.0).ceil() as u64))
    }

    /// Return tokens from a reservation that was never used.
    pub fn refund(&mut self, cost: f64) {
        self.tokens = (self.tokens + cost).min(self.capacity);
    }

    pub fn tokens(&self) -> f64 {
        self.tokens
    }

    pub fn capacity(&self) -> f64 {
        self.capacity
    }

    /// Tokens accrued per millisecond.
    pub fn refill_per_ms(&self) -> f64 {
        1.0 / self.interval_ms
    }

    pub fn last_refill(&self) -> Instant {
        self.last_refill
    }
}
