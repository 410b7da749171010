//! The HTTP seam.
//!
//! The dispatcher only needs to send one [`RequestDescriptor`] and get the status,
//! headers and body back. [`HttpTransport`] does that with reqwest behind
//! reqwest-middleware, with a [`TracingMiddleware`] span around each request.
//! Retries are the dispatcher's job, so no retry middleware is installed here.

use std::collections::BTreeMap;
use std::future::Future;
use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use reqwest_tracing::TracingMiddleware;
use thiserror::Error;

use crate::auth::RequestDescriptor;
use crate::error::ErrorKind;

/// Longest `Retry-After` hint honoured, in milliseconds.
pub const MAX_RETRY_AFTER_MS: u64 = 60_000;

/// Response as received, before any classification.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawResponse {
    pub status: u16,
    /// Header names are lower-case
    pub headers: BTreeMap<String, String>,
    pub body: String,
}

impl RawResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            headers: BTreeMap::new(),
            body: body.into(),
        }
    }

    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.insert(name.to_ascii_lowercase(), value.into());
        self
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    /// `Retry-After` in milliseconds, when given in seconds. Capped at
    /// [`MAX_RETRY_AFTER_MS`].
    pub fn retry_after_ms(&self) -> Option<u64> {
        self.header("retry-after")?
            .trim()
            .parse::<u64>()
            .ok()
            .map(|secs| secs.saturating_mul(1000).min(MAX_RETRY_AFTER_MS))
    }
}

/// Failure to get any response at all.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("request timed out: {0}")]
    Timeout(String),

    #[error("network error: {0}")]
    Network(String),
}

impl TransportError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            TransportError::Timeout(_) => ErrorKind::RequestTimeout,
            TransportError::Network(_) => ErrorKind::Network,
        }
    }
}

/// Sends signed requests.
///
/// Implement this to plug in another HTTP stack or a scripted fake in tests.
pub trait Transport: Send + Sync {
    fn send(
        &self,
        request: RequestDescriptor,
    ) -> impl Future<Output = Result<RawResponse, TransportError>> + Send;
}

/// reqwest-backed [`Transport`].
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: ClientWithMiddleware,
}

impl HttpTransport {
    /// Client with a 10 second timeout and the crate user agent.
    pub fn new() -> Self {
        Self::with_timeout(Duration::from_secs(10))
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        let mut headers = HeaderMap::new();
        let user_agent = format!("exchange-api-core/{}", env!("CARGO_PKG_VERSION"));
        let header_value = HeaderValue::from_str(&user_agent)
            .unwrap_or_else(|_| HeaderValue::from_static("exchange-api-core"));
        headers.insert(USER_AGENT, header_value);

        let reqwest_client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self::from_client(reqwest_client)
    }

    /// Wrap an existing reqwest client.
    pub fn from_client(client: reqwest::Client) -> Self {
        let client = ClientBuilder::new(client)
            .with(TracingMiddleware::default())
            .build();
        Self { client }
    }
}

impl Default for HttpTransport {
    fn default() -> Self {
        Self::new()
    }
}

fn transport_error(error: reqwest_middleware::Error) -> TransportError {
    match error {
        reqwest_middleware::Error::Reqwest(e) if e.is_timeout() => {
            TransportError::Timeout(e.to_string())
        }
        other => TransportError::Network(other.to_string()),
    }
}

impl Transport for HttpTransport {
    async fn send(&self, request: RequestDescriptor) -> Result<RawResponse, TransportError> {
        let mut builder = self.client.request(request.method, &request.url);
        for (name, value) in &request.headers {
            builder = builder.header(name, value);
        }
        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let response = builder.send().await.map_err(transport_error)?;
        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect();
        let body = response
            .text()
            .await
            .map_err(|e| transport_error(e.into()))?;

        Ok(RawResponse {
            status,
            headers,
            body,
        })
    }
}
