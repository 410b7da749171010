//! Nonce generation for signed requests.
//!
//! Exchanges reject a signed request whose nonce is not larger than the last one
//! seen for the key, and many also reject nonces too far from their own clock.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::session::SessionClock;

/// Trait for providing nonces for authenticated requests.
///
/// The nonce must be strictly increasing for each request.
pub trait NonceProvider: Send + Sync {
    /// Generate the next nonce value.
    ///
    /// This value must be greater than any previously returned value.
    fn next_nonce(&self) -> u64;
}

/// Unit of a time-based nonce.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum NonceResolution {
    #[default]
    Milliseconds,
    Microseconds,
}

/// A nonce provider that generates strictly increasing nonces based on time.
///
/// The time comes from the session clock, so it follows the measured difference to
/// the exchange. An atomic high-water mark keeps nonces unique and increasing even
/// when the clock steps back after a resync.
#[derive(Debug)]
pub struct IncreasingNonce {
    last_nonce: AtomicU64,
    resolution: NonceResolution,
    clock: Arc<SessionClock>,
}

impl IncreasingNonce {
    /// Millisecond nonces on an unadjusted clock.
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SessionClock::default()), NonceResolution::Milliseconds)
    }

    pub fn with_clock(clock: Arc<SessionClock>, resolution: NonceResolution) -> Self {
        Self {
            last_nonce: AtomicU64::new(0),
            resolution,
            clock,
        }
    }

    fn current_time(&self) -> u64 {
        let now = match self.resolution {
            NonceResolution::Milliseconds => self.clock.now_millis(),
            NonceResolution::Microseconds => self.clock.now_micros(),
        };
        now.max(0) as u64
    }
}

impl Default for IncreasingNonce {
    fn default() -> Self {
        Self::new()
    }
}

impl NonceProvider for IncreasingNonce {
    fn next_nonce(&self) -> u64 {
        let time_nonce = self.current_time();

        // Use the max of current time and last + 1.
        loop {
            let last = self.last_nonce.load(Ordering::SeqCst);
            let next = time_nonce.max(last + 1);

            if self
                .last_nonce
                .compare_exchange(last, next, Ordering::SeqCst, Ordering::SeqCst)
                .is_ok()
            {
                return next;
            }
        }
    }
}

/// Always returns the same value. Test vectors only.
#[derive(Debug, Clone, Copy)]
pub struct FixedNonce(pub u64);

impl NonceProvider for FixedNonce {
    fn next_nonce(&self) -> u64 {
        self.0
    }
}
