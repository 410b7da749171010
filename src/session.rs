//! Per-session options and clock.
//!
//! Each exchange client owns one [`Session`]. Nothing here is global: two clients
//! for the same exchange keep independent clocks and options.

use std::sync::atomic::{AtomicI64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::error::ExchangeError;
use crate::precise::RoundingMode;

/// Session configuration read by the signer and dispatcher.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SessionOptions {
    /// Correct nonces for clock skew measured against the exchange's time endpoint.
    pub adjust_for_time_difference: bool,
    /// Validity window (ms) sent with signed requests, where the exchange supports it.
    pub recv_window: Option<u64>,
    /// Use the exchange's test URLs.
    pub sandbox_mode: bool,
    /// Initial clock difference in ms (local minus server).
    pub time_difference: i64,
    /// Rounding applied to prices and divisions.
    pub rounding_mode: RoundingMode,
    /// Attempts after the first for retryable failures.
    pub max_retries: u32,
    /// Disable to bypass the throttler entirely.
    pub enable_rate_limit: bool,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            adjust_for_time_difference: false,
            recv_window: None,
            sandbox_mode: false,
            time_difference: 0,
            rounding_mode: RoundingMode::RoundHalfUp,
            max_retries: 3,
            enable_rate_limit: true,
        }
    }
}

impl SessionOptions {
    /// Read options from `{PREFIX}_*` environment variables, keeping defaults for
    /// the ones that are not set.
    ///
    /// Recognized: `ADJUST_FOR_TIME_DIFFERENCE`, `RECV_WINDOW`, `SANDBOX_MODE`,
    /// `TIME_DIFFERENCE`, `ROUNDING_MODE` (`truncate` or `round_half_up`),
    /// `MAX_RETRIES`, `ENABLE_RATE_LIMIT`.
    pub fn from_env(prefix: &str) -> Result<Self, ExchangeError> {
        Self::from_lookup(prefix, |name| std::env::var(name).ok())
    }

    fn from_lookup(
        prefix: &str,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ExchangeError> {
        let get = |suffix: &str| lookup(&format!("{prefix}_{suffix}"));
        let mut options = Self::default();

        if let Some(v) = get("ADJUST_FOR_TIME_DIFFERENCE") {
            options.adjust_for_time_difference = parse_env("ADJUST_FOR_TIME_DIFFERENCE", &v)?;
        }
        if let Some(v) = get("RECV_WINDOW") {
            options.recv_window = Some(parse_env("RECV_WINDOW", &v)?);
        }
        if let Some(v) = get("SANDBOX_MODE") {
            options.sandbox_mode = parse_env("SANDBOX_MODE", &v)?;
        }
        if let Some(v) = get("TIME_DIFFERENCE") {
            options.time_difference = parse_env("TIME_DIFFERENCE", &v)?;
        }
        if let Some(v) = get("ROUNDING_MODE") {
            options.rounding_mode = serde_json::from_value(serde_json::Value::String(v.clone()))
                .map_err(|_| ExchangeError::Config(format!("invalid ROUNDING_MODE: {v}")))?;
        }
        if let Some(v) = get("MAX_RETRIES") {
            options.max_retries = parse_env("MAX_RETRIES", &v)?;
        }
        if let Some(v) = get("ENABLE_RATE_LIMIT") {
            options.enable_rate_limit = parse_env("ENABLE_RATE_LIMIT", &v)?;
        }
        Ok(options)
    }
}

fn parse_env<T: std::str::FromStr>(name: &str, value: &str) -> Result<T, ExchangeError> {
    value
        .trim()
        .parse()
        .map_err(|_| ExchangeError::Config(format!("invalid {name}: {value}")))
}

/// Local clock corrected by the measured difference to the exchange clock.
#[derive(Debug, Default)]
pub struct SessionClock {
    time_difference_ms: AtomicI64,
}

impl SessionClock {
    pub fn new(time_difference_ms: i64) -> Self {
        Self {
            time_difference_ms: AtomicI64::new(time_difference_ms),
        }
    }

    /// Local time in ms since the UNIX epoch.
    pub fn local_millis() -> i64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as i64
    }

    /// Local minus server time, in ms.
    pub fn time_difference(&self) -> i64 {
        self.time_difference_ms.load(Ordering::SeqCst)
    }

    pub fn set_time_difference(&self, difference_ms: i64) {
        self.time_difference_ms.store(difference_ms, Ordering::SeqCst);
    }

    /// Estimated server time in ms.
    pub fn now_millis(&self) -> i64 {
        Self::local_millis() - self.time_difference()
    }

    /// Estimated server time in µs.
    pub fn now_micros(&self) -> i64 {
        let local = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_micros() as i64;
        local - self.time_difference() * 1000
    }

    /// Record a server timestamp observed at local time `local_ms`.
    pub fn observe_server_time(&self, server_ms: i64, local_ms: i64) {
        self.set_time_difference(local_ms - server_ms);
    }
}

/// Options plus the clock they drive.
#[derive(Debug, Default)]
pub struct Session {
    pub options: SessionOptions,
    pub clock: std::sync::Arc<SessionClock>,
}

impl Session {
    pub fn new(options: SessionOptions) -> Self {
        let clock = std::sync::Arc::new(SessionClock::new(options.time_difference));
        Self { options, clock }
    }
}
