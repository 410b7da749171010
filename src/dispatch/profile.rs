//! Per-exchange configuration consumed by the dispatcher.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

use reqwest::Method;
use serde_json::Value;

use crate::auth::{PublicSigner, RequiredCredentials, Signer};
use crate::error::{ErrorClassifier, ExchangeError};
use crate::normalize::{TimestampUnit, safe_integer_n, safe_timestamp_n};
use crate::rate_limit::RateLimitConfig;

/// Where the exchange reports its clock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeEndpoint {
    pub api: String,
    pub path: String,
    /// Keys tried in order for the server timestamp; dotted paths are not supported
    pub keys: Vec<String>,
    pub unit: TimestampUnit,
}

/// Everything exchange-specific the dispatcher needs.
///
/// Built by composition: each adapter describes its URLs, signers, endpoint costs
/// and error tables here instead of overriding engine code.
///
/// ```rust
/// use exchange_api_core::auth::{HashAlgorithm, KeySigner, Placement};
/// use exchange_api_core::dispatch::ExchangeProfile;
/// use exchange_api_core::rate_limit::RateLimitConfig;
///
/// let profile = ExchangeProfile::new("binance")
///     .url("public", "https://api.binance.com/api/v3")
///     .url("private", "https://api.binance.com/api/v3")
///     .test_url("public", "https://testnet.binance.vision/api/v3")
///     .test_url("private", "https://testnet.binance.vision/api/v3")
///     .rate_limit(RateLimitConfig::new(50.0).with_capacity(20.0))
///     .signer("private", KeySigner::hmac(HashAlgorithm::Sha256).placement(Placement::query("X-MBX-APIKEY")))
///     .cost("private", "POST", "/order", 1.0)
///     .cost("public", "GET", "/depth", 5.0)
///     .time_endpoint("public", "/time", ["serverTime"]);
/// assert_eq!(profile.id(), "binance");
/// ```
#[derive(Clone)]
pub struct ExchangeProfile {
    id: String,
    urls: BTreeMap<String, String>,
    test_urls: BTreeMap<String, String>,
    rate_limit: RateLimitConfig,
    costs: HashMap<String, f64>,
    signers: HashMap<String, Arc<dyn Signer>>,
    default_signer: Arc<dyn Signer>,
    classifier: ErrorClassifier,
    required_credentials: RequiredCredentials,
    time_endpoint: Option<TimeEndpoint>,
}

fn cost_key(api: &str, method: &str, path: &str) -> String {
    format!("{api} {} {path}", method.to_ascii_uppercase())
}

impl ExchangeProfile {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            urls: BTreeMap::new(),
            test_urls: BTreeMap::new(),
            rate_limit: RateLimitConfig::default(),
            costs: HashMap::new(),
            signers: HashMap::new(),
            default_signer: Arc::new(PublicSigner),
            classifier: ErrorClassifier::new(),
            required_credentials: RequiredCredentials::default(),
            time_endpoint: None,
        }
    }

    /// Base URL for an API type.
    pub fn url(mut self, api: impl Into<String>, base_url: impl Into<String>) -> Self {
        self.urls.insert(api.into(), base_url.into());
        self
    }

    /// Sandbox base URL for an API type.
    pub fn test_url(mut self, api: impl Into<String>, base_url: impl Into<String>) -> Self {
        self.test_urls.insert(api.into(), base_url.into());
        self
    }

    pub fn rate_limit(mut self, config: RateLimitConfig) -> Self {
        self.rate_limit = config;
        self
    }

    /// Cost weight of one endpoint.
    pub fn cost(mut self, api: &str, method: &str, path: &str, cost: f64) -> Self {
        self.costs.insert(cost_key(api, method, path), cost);
        self
    }

    /// Signer for an API type. API types without one are signed as public.
    pub fn signer(mut self, api: impl Into<String>, signer: impl Signer + 'static) -> Self {
        self.signers.insert(api.into(), Arc::new(signer));
        self
    }

    pub fn classifier(mut self, classifier: ErrorClassifier) -> Self {
        self.classifier = classifier;
        self
    }

    pub fn required_credentials(mut self, required: RequiredCredentials) -> Self {
        self.required_credentials = required;
        self
    }

    /// Endpoint returning the server time in milliseconds under one of `keys`.
    pub fn time_endpoint<I, S>(mut self, api: &str, path: &str, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.time_endpoint = Some(TimeEndpoint {
            api: api.to_string(),
            path: path.to_string(),
            keys: keys.into_iter().map(Into::into).collect(),
            unit: TimestampUnit::Milliseconds,
        });
        self
    }

    /// Reported server time is in seconds.
    pub fn time_in_seconds(mut self) -> Self {
        if let Some(endpoint) = self.time_endpoint.as_mut() {
            endpoint.unit = TimestampUnit::Seconds;
        }
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn rate_limit_config(&self) -> &RateLimitConfig {
        &self.rate_limit
    }

    pub fn error_classifier(&self) -> &ErrorClassifier {
        &self.classifier
    }

    pub fn credentials_required(&self) -> &RequiredCredentials {
        &self.required_credentials
    }

    pub fn time(&self) -> Option<&TimeEndpoint> {
        self.time_endpoint.as_ref()
    }

    /// Every configured base URL, live and test.
    pub(crate) fn base_urls(&self) -> impl Iterator<Item = &str> {
        self.urls.values().chain(self.test_urls.values()).map(String::as_str)
    }

    pub fn has_test_urls(&self) -> bool {
        !self.test_urls.is_empty()
    }

    /// Base URL for `api`, from the test set in sandbox mode.
    pub fn base_url(&self, api: &str, sandbox: bool) -> Result<&str, ExchangeError> {
        let (urls, set) = if sandbox {
            (&self.test_urls, "test")
        } else {
            (&self.urls, "api")
        };
        urls.get(api).map(String::as_str).ok_or_else(|| {
            if sandbox && self.test_urls.is_empty() {
                ExchangeError::NotSupported(format!("{} does not have a sandbox URL", self.id))
            } else {
                ExchangeError::Config(format!("{} has no {set} URL for API type {api}", self.id))
            }
        })
    }

    pub fn endpoint_cost(&self, api: &str, method: &Method, path: &str) -> Option<f64> {
        self.costs.get(&cost_key(api, method.as_str(), path)).copied()
    }

    pub fn signer_for(&self, api: &str) -> Arc<dyn Signer> {
        self.signers
            .get(api)
            .cloned()
            .unwrap_or_else(|| self.default_signer.clone())
    }

    pub(crate) fn is_time_endpoint(&self, api: &str, path: &str) -> bool {
        self.time_endpoint
            .as_ref()
            .is_some_and(|t| t.api == api && t.path == path)
    }

    /// Server time in ms read from a time endpoint response.
    pub(crate) fn server_time(&self, response: &Value) -> Option<i64> {
        let endpoint = self.time_endpoint.as_ref()?;
        let keys = endpoint.keys.iter().map(String::as_str);
        match endpoint.unit {
            TimestampUnit::Milliseconds => safe_integer_n(response, keys),
            TimestampUnit::Seconds => safe_timestamp_n(response, keys),
        }
    }
}

impl fmt::Debug for ExchangeProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExchangeProfile")
            .field("id", &self.id)
            .field("urls", &self.urls)
            .field("test_urls", &self.test_urls)
            .field("rate_limit", &self.rate_limit)
            .field("signers", &self.signers.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::auth::{HashAlgorithm, KeySigner};

    fn profile() -> ExchangeProfile {
        ExchangeProfile::new("demo")
            .url("public", "https://api.demo.test")
            .url("private", "https://api.demo.test/private")
            .signer("private", KeySigner::hmac(HashAlgorithm::Sha256))
            .cost("public", "get", "/depth", 5.0)
            .time_endpoint("public", "/time", ["serverTime", "time"])
    }

    #[test]
    fn test_base_urls() {
        let profile = profile();
        assert_eq!(profile.base_url("public", false).unwrap(), "https://api.demo.test");
        assert!(matches!(profile.base_url("margin", false), Err(ExchangeError::Config(_))));
        assert!(matches!(
            profile.base_url("public", true),
            Err(ExchangeError::NotSupported(_))
        ));

        let with_test = profile.test_url("public", "https://testnet.demo.test");
        assert_eq!(with_test.base_url("public", true).unwrap(), "https://testnet.demo.test");
    }

    #[test]
    fn test_costs_and_signers() {
        let profile = profile();
        assert_eq!(profile.endpoint_cost("public", &Method::GET, "/depth"), Some(5.0));
        assert_eq!(profile.endpoint_cost("public", &Method::POST, "/depth"), None);
        assert!(profile.signer_for("private").is_private());
        assert!(!profile.signer_for("public").is_private());
    }

    #[test]
    fn test_server_time() {
        let profile = profile();
        assert!(profile.is_time_endpoint("public", "/time"));
        assert!(!profile.is_time_endpoint("private", "/time"));
        assert_eq!(profile.server_time(&json!({"time": 1700000000000_i64})), Some(1_700_000_000_000));

        let seconds = profile.time_in_seconds();
        assert_eq!(seconds.server_time(&json!({"serverTime": 1700000000})), Some(1_700_000_000_000));
    }
}
