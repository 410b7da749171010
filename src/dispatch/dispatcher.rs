//! The per-call pipeline: throttle, sign, commit, send, classify, retry.

use std::future::Future;
use std::sync::Arc;
use std::time::SystemTime;

use serde_json::Value;
use tracing::{debug, instrument, warn};
use url::Url;

use crate::auth::{
    Credentials, CredentialsProvider, IncreasingNonce, NonceProvider, NonceResolution, SignRequest,
};
use crate::dispatch::endpoint::{ApiRequest, implode_params};
use crate::dispatch::profile::ExchangeProfile;
use crate::dispatch::retry::RetryPolicy;
use crate::dispatch::transport::{HttpTransport, RawResponse, Transport};
use crate::error::{ClassifiedError, ErrorKind, ExchangeError};
use crate::markets::{MarketCache, MarketTable};
use crate::normalize::{amount_to_precision, price_to_precision};
use crate::rate_limit::{RateLimitBudget, Throttler};
use crate::session::{Session, SessionClock, SessionOptions};
use crate::types::{Currency, Market};

/// One exchange session: throttler, clock, credentials and market cache.
///
/// Shareable across tasks behind an `Arc`.
///
/// # Example
///
/// ```rust,no_run
/// use exchange_api_core::dispatch::{ApiRequest, Dispatcher, ExchangeProfile};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let profile = ExchangeProfile::new("demo").url("public", "https://api.example.com");
///     let dispatcher = Dispatcher::builder(profile).build()?;
///
///     let time = dispatcher.request(ApiRequest::get("/v1/time")).await?;
///     println!("{time}");
///     Ok(())
/// }
/// ```
pub struct Dispatcher<T = HttpTransport> {
    profile: ExchangeProfile,
    session: Session,
    throttler: Throttler,
    transport: T,
    credentials: Option<Arc<dyn CredentialsProvider>>,
    nonce: Arc<dyn NonceProvider>,
    retry: RetryPolicy,
    markets: MarketCache,
}

impl Dispatcher<HttpTransport> {
    pub fn builder(profile: ExchangeProfile) -> DispatcherBuilder<HttpTransport> {
        DispatcherBuilder::new(profile)
    }
}

impl<T: Transport> Dispatcher<T> {
    pub fn profile(&self) -> &ExchangeProfile {
        &self.profile
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn options(&self) -> &SessionOptions {
        &self.session.options
    }

    pub fn budget(&self) -> RateLimitBudget {
        self.throttler.budget()
    }

    pub fn markets(&self) -> &MarketCache {
        &self.markets
    }

    /// Run one logical call and return the parsed JSON body.
    #[instrument(
        skip(self, request),
        fields(exchange = %self.profile.id(), method = %request.method, endpoint = %request.path, context = ?request.context)
    )]
    pub async fn request(&self, request: ApiRequest) -> Result<Value, ExchangeError> {
        let endpoint = format!("{} {}", request.method, request.path);
        let base_url = self
            .profile
            .base_url(&request.api, self.session.options.sandbox_mode)
            .map_err(|e| self.attach_context(e, &endpoint))?;
        let (path, params) = implode_params(&request.path, &request.params);
        let cost = request
            .cost
            .or_else(|| {
                self.profile
                    .endpoint_cost(&request.api, &request.method, &request.path)
            })
            .unwrap_or(1.0);
        let signer = self.profile.signer_for(&request.api);
        let credentials = if signer.is_private() {
            Some(
                self.credentials()
                    .map_err(|e| self.attach_context(e, &endpoint))?,
            )
        } else {
            None
        };
        let started = SystemTime::now();

        let mut retries = 0;
        loop {
            let permit = self.throttler.acquire(cost).await;
            let nonce = if signer.is_private() {
                self.nonce.next_nonce()
            } else {
                0
            };
            let sign_request = SignRequest {
                base_url,
                path: &path,
                method: &request.method,
                params: &params,
                headers: &request.headers,
                body: request.body.as_deref(),
                nonce,
                recv_window: self.session.options.recv_window,
            };
            // A signing failure drops the permit, which refunds its tokens.
            let descriptor = signer
                .sign(&sign_request, credentials)
                .map_err(|e| self.attach_context(e, &endpoint))?;
            permit.commit();

            debug!(attempt = retries + 1, url = %descriptor.url, "sending request");
            let error = match self.transport.send(descriptor).await {
                Ok(response) => match self.handle_response(&response, &endpoint) {
                    Ok(value) => {
                        if self.session.options.adjust_for_time_difference
                            && self.profile.is_time_endpoint(&request.api, &request.path)
                        {
                            self.observe_time(&value);
                        }
                        return Ok(value);
                    }
                    Err(error) => error,
                },
                Err(error) => ClassifiedError::new(error.kind(), error.to_string())
                    .with_context(self.profile.id(), endpoint.as_str()),
            };

            match self
                .retry
                .next_delay(error.kind, retries, started, error.retry_after_ms)
            {
                Some(delay) => {
                    warn!(
                        kind = %error.kind,
                        retries,
                        delay_ms = delay.as_millis() as u64,
                        "retrying failed request"
                    );
                    tokio::time::sleep(delay).await;
                    retries += 1;
                }
                None => return Err(error.into()),
            }
        }
    }

    /// Measure the clock difference against the exchange's time endpoint and
    /// store it in the session clock. Returns the difference (local minus server).
    pub async fn sync_time(&self) -> Result<i64, ExchangeError> {
        let endpoint = self.profile.time().ok_or_else(|| {
            ExchangeError::NotSupported(format!("{} has no time endpoint", self.profile.id()))
        })?;
        let request = ApiRequest::get(endpoint.path.clone()).api(endpoint.api.clone());
        let value = self.request(request).await?;
        self.observe_time(&value).ok_or_else(|| {
            ExchangeError::InvalidResponse(format!("no server time in response: {value}"))
        })
    }

    /// Load markets through `loader` once; later calls reuse the cached table
    /// unless `reload` is set.
    pub async fn load_markets<F, Fut>(&self, reload: bool, loader: F) -> Result<Arc<MarketTable>, ExchangeError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<(Vec<Market>, Option<Vec<Currency>>), ExchangeError>>,
    {
        self.markets.load_markets(reload, loader).await
    }

    /// `amount` truncated to the market's amount step.
    pub fn amount_to_precision(&self, symbol: &str, amount: &str) -> Result<String, ExchangeError> {
        amount_to_precision(&self.markets.market(symbol)?, amount)
    }

    /// `price` rounded to the market's price step with the session rounding mode.
    pub fn price_to_precision(&self, symbol: &str, price: &str) -> Result<String, ExchangeError> {
        price_to_precision(
            &self.markets.market(symbol)?,
            price,
            self.session.options.rounding_mode,
        )
    }

    fn credentials(&self) -> Result<&Credentials, ExchangeError> {
        let provider = self.credentials.as_ref().ok_or_else(|| {
            ExchangeError::MissingCredentials(format!("{} apiKey", self.profile.id()))
        })?;
        let credentials = provider.get_credentials();
        credentials.check_required(self.profile.credentials_required())?;
        Ok(credentials)
    }

    /// Wrap a failure raised before any response so it names the exchange and
    /// endpoint. The kind is kept.
    fn attach_context(&self, error: ExchangeError, endpoint: &str) -> ExchangeError {
        match error {
            ExchangeError::Classified(classified) if !classified.exchange.is_empty() => {
                classified.into()
            }
            other => ClassifiedError::new(other.kind(), other.to_string())
                .with_context(self.profile.id(), endpoint)
                .into(),
        }
    }

    fn handle_response(&self, response: &RawResponse, endpoint: &str) -> Result<Value, ClassifiedError> {
        let exchange = self.profile.id();
        if let Some(hit) = self
            .profile
            .error_classifier()
            .classify_response(response.status, &response.body)
        {
            return Err(ClassifiedError::new(hit.kind, hit.message)
                .with_context(exchange, endpoint)
                .with_body(&response.body)
                .with_status(response.status)
                .with_retry_after(response.retry_after_ms()));
        }
        if response.body.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&response.body).map_err(|e| {
            ClassifiedError::new(ErrorKind::Exchange, format!("invalid JSON response: {e}"))
                .with_context(exchange, endpoint)
                .with_body(&response.body)
                .with_status(response.status)
        })
    }

    fn observe_time(&self, response: &Value) -> Option<i64> {
        let server = self.profile.server_time(response)?;
        self.session
            .clock
            .observe_server_time(server, SessionClock::local_millis());
        let difference = self.session.clock.time_difference();
        debug!(server, difference, "clock difference updated");
        Some(difference)
    }
}

impl<T> std::fmt::Debug for Dispatcher<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("profile", &self.profile)
            .field("options", &self.session.options)
            .field("has_credentials", &self.credentials.is_some())
            .finish_non_exhaustive()
    }
}

/// Builder for [`Dispatcher`].
pub struct DispatcherBuilder<T = HttpTransport> {
    profile: ExchangeProfile,
    options: SessionOptions,
    transport: T,
    credentials: Option<Arc<dyn CredentialsProvider>>,
    nonce_provider: Option<Arc<dyn NonceProvider>>,
    nonce_resolution: NonceResolution,
    retry: Option<RetryPolicy>,
}

impl DispatcherBuilder<HttpTransport> {
    pub fn new(profile: ExchangeProfile) -> Self {
        Self {
            profile,
            options: SessionOptions::default(),
            transport: HttpTransport::new(),
            credentials: None,
            nonce_provider: None,
            nonce_resolution: NonceResolution::Milliseconds,
            retry: None,
        }
    }
}

impl<T: Transport> DispatcherBuilder<T> {
    pub fn options(mut self, options: SessionOptions) -> Self {
        self.options = options;
        self
    }

    /// Set the credentials provider for private endpoints.
    pub fn credentials(mut self, credentials: Arc<dyn CredentialsProvider>) -> Self {
        self.credentials = Some(credentials);
        self
    }

    /// Set a custom nonce provider. The default follows the session clock.
    pub fn nonce_provider(mut self, provider: Arc<dyn NonceProvider>) -> Self {
        self.nonce_provider = Some(provider);
        self
    }

    pub fn nonce_resolution(mut self, resolution: NonceResolution) -> Self {
        self.nonce_resolution = resolution;
        self
    }

    /// Override the backoff schedule. By default it follows `max_retries`.
    pub fn retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = Some(retry);
        self
    }

    /// Swap the HTTP transport.
    pub fn transport<U: Transport>(self, transport: U) -> DispatcherBuilder<U> {
        DispatcherBuilder {
            profile: self.profile,
            options: self.options,
            transport,
            credentials: self.credentials,
            nonce_provider: self.nonce_provider,
            nonce_resolution: self.nonce_resolution,
            retry: self.retry,
        }
    }

    /// Build the dispatcher.
    ///
    /// Fails with `NotSupported` when sandbox mode is requested but the profile
    /// has no test URLs, and with a URL error when a base URL does not parse.
    pub fn build(self) -> Result<Dispatcher<T>, ExchangeError> {
        for base_url in self.profile.base_urls() {
            Url::parse(base_url)?;
        }
        if self.options.sandbox_mode && !self.profile.has_test_urls() {
            return Err(ExchangeError::NotSupported(format!(
                "{} does not have a sandbox URL",
                self.profile.id()
            )));
        }

        let session = Session::new(self.options);
        let rate_limit = self.profile.rate_limit_config().clone();
        let enabled = rate_limit.enabled && session.options.enable_rate_limit;
        let throttler = Throttler::new(rate_limit.with_enabled(enabled));
        let nonce = self.nonce_provider.unwrap_or_else(|| {
            Arc::new(IncreasingNonce::with_clock(
                session.clock.clone(),
                self.nonce_resolution,
            ))
        });
        let retry = self
            .retry
            .unwrap_or_else(|| RetryPolicy::new(session.options.max_retries));

        Ok(Dispatcher {
            profile: self.profile,
            session,
            throttler,
            transport: self.transport,
            credentials: self.credentials,
            nonce,
            retry,
            markets: MarketCache::new(),
        })
    }
}
