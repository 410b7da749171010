//! # Exchange API Core
//!
//! The exchange-agnostic engine behind cryptocurrency exchange REST clients.
//!
//! ## Features
//!
//! - Exact decimal arithmetic for prices, amounts and fees ([`Precise`])
//! - Weighted FIFO rate limiting with transactional reservations
//! - HMAC, RSA, Ed25519 and JWT request signing
//! - Classification of exchange errors into portable [`ErrorKind`]s
//! - Defensive normalization of raw JSON into canonical entities
//! - Market and currency caching
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use exchange_api_core::auth::{EnvCredentials, HashAlgorithm, KeySigner, Placement};
//! use exchange_api_core::dispatch::{ApiRequest, Dispatcher, ExchangeProfile};
//! use exchange_api_core::normalize::{FieldMap, parse_ticker};
//! use exchange_api_core::rate_limit::RateLimitConfig;
//! use exchange_api_core::session::SessionOptions;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let profile = ExchangeProfile::new("binance")
//!         .url("public", "https://api.binance.com/api/v3")
//!         .url("private", "https://api.binance.com/api/v3")
//!         .rate_limit(RateLimitConfig::new(50.0).with_capacity(20.0))
//!         .signer("private", KeySigner::hmac(HashAlgorithm::Sha256).placement(Placement::query("X-MBX-APIKEY")));
//!
//!     let dispatcher = Dispatcher::builder(profile)
//!         .options(SessionOptions::from_env("BINANCE")?)
//!         .credentials(Arc::new(EnvCredentials::from_env("BINANCE")?))
//!         .build()?;
//!
//!     let raw = dispatcher
//!         .request(ApiRequest::get("/ticker/24hr").param("symbol", "BTCUSDT"))
//!         .await?;
//!     let map = FieldMap::new().field("last", ["lastPrice"]).field("baseVolume", ["volume"]);
//!     let ticker = parse_ticker(&raw, &map, None);
//!     println!("last: {:?}", ticker.last);
//!     Ok(())
//! }
//! ```

pub mod auth;
pub mod dispatch;
pub mod error;
pub mod markets;
pub mod normalize;
pub mod precise;
pub mod rate_limit;
pub mod session;
pub mod types;

// Re-export commonly used types at crate root
pub use error::{ClassifiedError, ErrorKind, ExchangeError};
pub use precise::Precise;

/// Result type alias using ExchangeError
pub type Result<T> = std::result::Result<T, ExchangeError>;
