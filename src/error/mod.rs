//! Error types for the exchange core.
//!
//! Every failure surfaced to callers maps to an [`ErrorKind`] so they can branch on
//! the kind of failure without parsing exchange-specific strings. Raw exchange
//! payloads are mapped to kinds by the [`ErrorClassifier`].

mod classifier;

pub use classifier::{Classification, ErrorClassifier};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::precise::PreciseError;

/// Longest raw-body excerpt carried by a [`ClassifiedError`].
pub const BODY_EXCERPT_LEN: usize = 512;

/// Portable failure kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Bad or missing API key, secret or signature
    Authentication,
    /// Nonce too small or out of the exchange's recv window
    InvalidNonce,
    InsufficientFunds,
    InvalidOrder,
    OrderNotFound,
    BadSymbol,
    BadRequest,
    RateLimitExceeded,
    /// Blocked by an anti-DDoS front (Cloudflare, Incapsula)
    DdosProtection,
    PermissionDenied,
    OnMaintenance,
    ExchangeNotAvailable,
    RequestTimeout,
    Network,
    NotSupported,
    /// Malformed numeric input
    Value,
    /// Anything the tables do not recognize
    Exchange,
}

impl ErrorKind {
    /// Whether the dispatcher may retry a call that failed with this kind.
    pub fn is_retryable(self) -> bool {
        matches!(
            self,
            ErrorKind::RequestTimeout
                | ErrorKind::Network
                | ErrorKind::RateLimitExceeded
                | ErrorKind::DdosProtection
                | ErrorKind::ExchangeNotAvailable
                | ErrorKind::OnMaintenance
        )
    }

    /// Kinds that get the longer backoff schedule.
    pub fn is_maintenance(self) -> bool {
        matches!(self, ErrorKind::ExchangeNotAvailable | ErrorKind::OnMaintenance)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::Authentication => "AuthenticationError",
            ErrorKind::InvalidNonce => "InvalidNonce",
            ErrorKind::InsufficientFunds => "InsufficientFunds",
            ErrorKind::InvalidOrder => "InvalidOrder",
            ErrorKind::OrderNotFound => "OrderNotFound",
            ErrorKind::BadSymbol => "BadSymbol",
            ErrorKind::BadRequest => "BadRequest",
            ErrorKind::RateLimitExceeded => "RateLimitExceeded",
            ErrorKind::DdosProtection => "DDoSProtection",
            ErrorKind::PermissionDenied => "PermissionDenied",
            ErrorKind::OnMaintenance => "OnMaintenance",
            ErrorKind::ExchangeNotAvailable => "ExchangeNotAvailable",
            ErrorKind::RequestTimeout => "RequestTimeout",
            ErrorKind::Network => "NetworkError",
            ErrorKind::NotSupported => "NotSupported",
            ErrorKind::Value => "ValueError",
            ErrorKind::Exchange => "ExchangeError",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A failure attributed to one exchange call.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{exchange} {kind}{}: {message}{}", on_endpoint(.endpoint), body_suffix(.body, .message))]
pub struct ClassifiedError {
    pub kind: ErrorKind,
    /// Exchange identifier (e.g. "binance")
    pub exchange: String,
    /// Endpoint path the call targeted
    pub endpoint: String,
    /// The matched error code or message
    pub message: String,
    /// Start of the raw response body, at most [`BODY_EXCERPT_LEN`] bytes
    pub body: String,
    /// HTTP status, when a response was received
    pub status: Option<u16>,
    /// Exchange-provided retry hint
    pub retry_after_ms: Option<u64>,
}

impl ClassifiedError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            exchange: String::new(),
            endpoint: String::new(),
            message: message.into(),
            body: String::new(),
            status: None,
            retry_after_ms: None,
        }
    }

    /// Attach the exchange id and endpoint.
    pub fn with_context(mut self, exchange: impl Into<String>, endpoint: impl Into<String>) -> Self {
        self.exchange = exchange.into();
        self.endpoint = endpoint.into();
        self
    }

    /// Attach a raw-body excerpt.
    pub fn with_body(mut self, body: &str) -> Self {
        self.body = excerpt(body, BODY_EXCERPT_LEN).to_string();
        self
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_retry_after(mut self, retry_after_ms: Option<u64>) -> Self {
        self.retry_after_ms = retry_after_ms;
        self
    }
}

fn on_endpoint(endpoint: &str) -> String {
    if endpoint.is_empty() {
        String::new()
    } else {
        format!(" on {endpoint}")
    }
}

fn body_suffix(body: &str, message: &str) -> String {
    if body.is_empty() || body == message {
        String::new()
    } else {
        format!(" (body: {body})")
    }
}

/// The main error type for all exchange core operations.
#[derive(Error, Debug)]
pub enum ExchangeError {
    /// An exchange call failed and was classified
    #[error("{0}")]
    Classified(ClassifiedError),

    /// Malformed number
    #[error("Value error: {0}")]
    Value(#[from] PreciseError),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// URL parsing error
    #[error("URL parsing error: {0}")]
    Url(#[from] url::ParseError),

    /// Signing failed (bad key material, unsupported key)
    #[error("Authentication error: {0}")]
    Auth(String),

    /// A credential the endpoint needs is not configured
    #[error("Missing credentials: {0} required")]
    MissingCredentials(String),

    /// Invalid response from the API
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Invalid client configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Symbol or market id not in the loaded markets
    #[error("Unknown symbol: {0}")]
    BadSymbol(String),

    #[error("Not supported: {0}")]
    NotSupported(String),
}

impl ExchangeError {
    /// The portable kind of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            ExchangeError::Classified(e) => e.kind,
            ExchangeError::Value(_) => ErrorKind::Value,
            ExchangeError::Auth(_) | ExchangeError::MissingCredentials(_) => {
                ErrorKind::Authentication
            }
            ExchangeError::Url(_) => ErrorKind::BadRequest,
            ExchangeError::BadSymbol(_) => ErrorKind::BadSymbol,
            ExchangeError::NotSupported(_) => ErrorKind::NotSupported,
            ExchangeError::Json(_) | ExchangeError::InvalidResponse(_) | ExchangeError::Config(_) => {
                ErrorKind::Exchange
            }
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.kind().is_retryable()
    }

    /// The classified details, if this error came from an exchange call.
    pub fn classified(&self) -> Option<&ClassifiedError> {
        match self {
            ExchangeError::Classified(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ClassifiedError> for ExchangeError {
    fn from(error: ClassifiedError) -> Self {
        ExchangeError::Classified(error)
    }
}

/// Longest prefix of `text` within `max` bytes, cut on a char boundary.
pub(crate) fn excerpt(text: &str, max: usize) -> &str {
    if text.len() <= max {
        return text;
    }
    let mut end = max;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_kinds() {
        assert!(ErrorKind::RequestTimeout.is_retryable());
        assert!(ErrorKind::Network.is_retryable());
        assert!(ErrorKind::RateLimitExceeded.is_retryable());
        assert!(ErrorKind::OnMaintenance.is_retryable());
        assert!(!ErrorKind::Authentication.is_retryable());
        assert!(!ErrorKind::InvalidNonce.is_retryable());
        assert!(!ErrorKind::InsufficientFunds.is_retryable());
        assert!(!ErrorKind::Value.is_retryable());
        assert!(!ErrorKind::Exchange.is_retryable());
    }

    #[test]
    fn test_error_kind_mapping() {
        let value: ExchangeError = PreciseError::InvalidNumber("x".into()).into();
        assert_eq!(value.kind(), ErrorKind::Value);
        assert_eq!(ExchangeError::MissingCredentials("secret".into()).kind(), ErrorKind::Authentication);

        let classified: ExchangeError = ClassifiedError::new(ErrorKind::InvalidOrder, "bad qty").into();
        assert_eq!(classified.kind(), ErrorKind::InvalidOrder);
        assert!(classified.classified().is_some());
    }

    #[test]
    fn test_classified_display_carries_context() {
        let err = ClassifiedError::new(ErrorKind::InsufficientFunds, "-2010")
            .with_context("binance", "/api/v3/order")
            .with_body(r#"{"code":-2010,"msg":"Account has insufficient balance"}"#);
        let text = err.to_string();
        assert!(text.contains("binance"));
        assert!(text.contains("InsufficientFunds"));
        assert!(text.contains("/api/v3/order"));
        assert!(text.contains("insufficient balance"));
    }

    #[test]
    fn test_classified_display_without_endpoint_or_body() {
        let err = ClassifiedError::new(ErrorKind::Network, "connection reset").with_context("demo", "");
        assert_eq!(err.to_string(), "demo NetworkError: connection reset");

        let same = ClassifiedError::new(ErrorKind::Exchange, "oops")
            .with_context("demo", "GET /x")
            .with_body("oops");
        assert_eq!(same.to_string(), "demo ExchangeError on GET /x: oops");
    }

    #[test]
    fn test_excerpt_respects_char_boundaries() {
        let body = "é".repeat(400);
        let cut = excerpt(&body, BODY_EXCERPT_LEN);
        assert!(cut.len() <= BODY_EXCERPT_LEN);
        assert!(cut.chars().all(|c| c == 'é'));
        assert_eq!(excerpt("short", 10), "short");
    }
}
