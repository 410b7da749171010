//! Logical API calls and path templating.

use std::collections::BTreeMap;

use reqwest::Method;
use serde::Serialize;

use crate::auth::Params;
use crate::error::ExchangeError;

/// One logical call, before throttling and signing.
///
/// ```rust
/// use exchange_api_core::dispatch::ApiRequest;
///
/// let request = ApiRequest::get("/api/v3/order/{symbol}")
///     .api("private")
///     .param("symbol", "BTCUSDT")
///     .param("orderId", "42")
///     .cost(2.0);
/// assert_eq!(request.api, "private");
/// ```
#[derive(Debug, Clone)]
pub struct ApiRequest {
    /// Path relative to the API base URL; may contain `{param}` placeholders.
    pub path: String,
    /// API type selecting base URL and signer (`public`, `private`, ...).
    pub api: String,
    pub method: Method,
    pub params: Params,
    pub headers: BTreeMap<String, String>,
    /// Raw body, sent and signed verbatim instead of the params
    pub body: Option<String>,
    /// Overrides the profile's endpoint cost
    pub cost: Option<f64>,
    /// Free-form label carried into logs
    pub context: Option<String>,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            api: "public".to_string(),
            method,
            params: Vec::new(),
            headers: BTreeMap::new(),
            body: None,
            cost: None,
            context: None,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::PUT, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    pub fn api(mut self, api: impl Into<String>) -> Self {
        self.api = api.into();
        self
    }

    pub fn param(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.params.push((key.into(), value.to_string()));
        self
    }

    pub fn params<I, K, V>(mut self, params: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: ToString,
    {
        self.params
            .extend(params.into_iter().map(|(k, v)| (k.into(), v.to_string())));
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Serialize `body` as the JSON request body.
    pub fn json_body<B: Serialize + ?Sized>(mut self, body: &B) -> Result<Self, ExchangeError> {
        self.body = Some(serde_json::to_string(body)?);
        Ok(self)
    }

    pub fn cost(mut self, cost: f64) -> Self {
        self.cost = Some(cost);
        self
    }

    pub fn context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }
}

/// Names of the `{param}` placeholders in `path`, in order.
pub fn extract_params(path: &str) -> Vec<String> {
    let mut names = Vec::new();
    let mut rest = path;
    while let Some(start) = rest.find('{') {
        let Some(len) = rest[start + 1..].find('}') else {
            break;
        };
        names.push(rest[start + 1..start + 1 + len].to_string());
        rest = &rest[start + len + 2..];
    }
    names
}

/// Fill `{param}` placeholders from `params`.
///
/// Returns the filled path and the params that were not consumed. Placeholders
/// without a matching param are left in place.
pub fn implode_params(path: &str, params: &[(String, String)]) -> (String, Params) {
    let placeholders = extract_params(path);
    let mut imploded = path.to_string();
    for name in &placeholders {
        if let Some((_, value)) = params.iter().find(|(k, _)| k == name) {
            imploded = imploded.replace(&format!("{{{name}}}"), value);
        }
    }
    let remaining = params
        .iter()
        .filter(|(k, _)| !placeholders.contains(k))
        .cloned()
        .collect();
    (imploded, remaining)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(pairs: &[(&str, &str)]) -> Params {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_extract_params() {
        assert_eq!(extract_params("/v1/{symbol}/orders/{id}"), ["symbol", "id"]);
        assert!(extract_params("/v1/time").is_empty());
        assert_eq!(extract_params("/v1/{broken"), Vec::<String>::new());
    }

    #[test]
    fn test_implode_removes_used_params() {
        let (path, rest) = implode_params(
            "/v1/orders/{id}",
            &params(&[("id", "42"), ("symbol", "BTCUSDT")]),
        );
        assert_eq!(path, "/v1/orders/42");
        assert_eq!(rest, params(&[("symbol", "BTCUSDT")]));
    }

    #[test]
    fn test_missing_placeholder_value_is_kept() {
        let (path, rest) = implode_params("/v1/{market}/ticker", &[]);
        assert_eq!(path, "/v1/{market}/ticker");
        assert!(rest.is_empty());
    }

    #[test]
    fn test_builder() {
        let request = ApiRequest::post("/order")
            .api("private")
            .params([("side", "buy"), ("qty", "1")])
            .header("X-Trace", "abc")
            .json_body(&serde_json::json!({"a": 1}))
            .unwrap();
        assert_eq!(request.method, Method::POST);
        assert_eq!(request.params.len(), 2);
        assert_eq!(request.body.as_deref(), Some(r#"{"a":1}"#));
        assert_eq!(request.cost, None);
    }
}
