//! Rate limiting for exchange calls.
//!
//! Exchanges publish a baseline `rateLimit` (milliseconds per unit of cost) and give
//! each endpoint a weight. The [`Throttler`] holds one weighted token bucket per
//! session and makes callers wait, in arrival order, until their cost fits.
//!
//! ## Example
//!
//! ```rust
//! use exchange_api_core::rate_limit::{RateLimitConfig, Throttler};
//!
//! # async fn run() {
//! // One unit of cost every 50ms, bursts of up to 10 units.
//! let throttler = Throttler::new(RateLimitConfig::new(50.0).with_capacity(10.0));
//!
//! let permit = throttler.acquire(4.0).await;
//! permit.commit();
//! println!("{:?}", throttler.budget());
//! # }
//! ```

mod bucket;
mod throttler;

pub use bucket::TokenBucket;
pub use throttler::{Permit, Throttler};

use serde::{Deserialize, Serialize};
use tokio::time::Instant;

/// Rate limiter configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Milliseconds per unit of cost.
    pub rate_limit_ms: f64,
    /// Maximum tokens the bucket holds (burst size).
    pub capacity: f64,
    /// Whether to enable rate limiting.
    pub enabled: bool,
}

impl RateLimitConfig {
    pub fn new(rate_limit_ms: f64) -> Self {
        Self {
            rate_limit_ms,
            ..Self::default()
        }
    }

    pub fn with_capacity(mut self, capacity: f64) -> Self {
        self.capacity = capacity;
        self
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            rate_limit_ms: 2000.0,
            capacity: 1.0,
            enabled: true,
        }
    }
}

/// Snapshot of a throttler's bucket.
#[derive(Debug, Clone, Copy)]
pub struct RateLimitBudget {
    pub capacity: f64,
    pub refill_rate_per_ms: f64,
    pub current_tokens: f64,
    pub last_refill: Instant,
}
