//! Mapping of raw exchange error payloads to [`ErrorKind`]s.
//!
//! Lookup runs in two stages over the candidate strings found in a response: an
//! exact match against an ordered table of codes/messages, then a broad (substring)
//! match against a second ordered table. The first hit wins. If nothing matches,
//! the generic [`ErrorKind::Exchange`] is returned with the raw body.
//!
//! ```rust
//! use exchange_api_core::error::{ErrorClassifier, ErrorKind};
//!
//! let classifier = ErrorClassifier::new()
//!     .error_fields(["code", "msg"])
//!     .exact("-2010", ErrorKind::InsufficientFunds)
//!     .broad("Too many requests", ErrorKind::RateLimitExceeded);
//!
//! let hit = classifier.classify(r#"{"code":-2010,"msg":"Account has insufficient balance"}"#);
//! assert_eq!(hit.kind, ErrorKind::InsufficientFunds);
//! ```

use serde_json::Value;

use super::ErrorKind;

/// Outcome of a classification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub kind: ErrorKind,
    /// The candidate string that matched, or the raw body for the fallback
    pub message: String,
}

/// Per-exchange error tables.
#[derive(Debug, Clone)]
pub struct ErrorClassifier {
    exact: Vec<(String, ErrorKind)>,
    broad: Vec<(String, ErrorKind)>,
    error_fields: Vec<String>,
    success_codes: Vec<String>,
    http_status: Vec<(u16, ErrorKind)>,
}

impl Default for ErrorClassifier {
    fn default() -> Self {
        Self::new()
    }
}

impl ErrorClassifier {
    /// Empty exact/broad tables with the default HTTP status table.
    pub fn new() -> Self {
        Self {
            exact: Vec::new(),
            broad: Vec::new(),
            error_fields: Vec::new(),
            success_codes: Vec::new(),
            http_status: default_http_status(),
        }
    }

    /// Append an exact-match entry.
    pub fn exact(mut self, key: impl Into<String>, kind: ErrorKind) -> Self {
        self.exact.push((key.into(), kind));
        self
    }

    /// Append a substring-match entry. Earlier entries win.
    pub fn broad(mut self, key: impl Into<String>, kind: ErrorKind) -> Self {
        self.broad.push((key.into(), kind));
        self
    }

    /// JSON fields holding error codes or messages. Dotted paths reach nested
    /// objects (`"error.code"`); arrays are flattened.
    pub fn error_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.error_fields = fields.into_iter().map(Into::into).collect();
        self
    }

    /// Error-field values that mean success (e.g. `"0"`, `"OK"`).
    pub fn success_codes<I, S>(mut self, codes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.success_codes = codes.into_iter().map(Into::into).collect();
        self
    }

    /// Override the kind for an HTTP status.
    pub fn http_status(mut self, status: u16, kind: ErrorKind) -> Self {
        self.http_status.retain(|(code, _)| *code != status);
        self.http_status.push((status, kind));
        self
    }

    /// Exact lookup only.
    pub fn lookup_exact(&self, candidate: &str) -> Option<ErrorKind> {
        self.exact
            .iter()
            .find(|(key, _)| key == candidate)
            .map(|(_, kind)| *kind)
    }

    /// Broad lookup only: the first key contained in `candidate`.
    pub fn lookup_broad(&self, candidate: &str) -> Option<ErrorKind> {
        self.broad
            .iter()
            .find(|(key, _)| !key.is_empty() && candidate.contains(key.as_str()))
            .map(|(_, kind)| *kind)
    }

    /// Classify an error body. Never fails.
    pub fn classify(&self, body: &str) -> Classification {
        let candidates = self.candidates(body, false);
        self.match_tables(&candidates)
            .unwrap_or_else(|| fallback(ErrorKind::Exchange, body))
    }

    /// Classify a full response. Returns `None` for a successful response.
    ///
    /// A 2xx response is an error only when one of the configured error fields holds
    /// a value outside the success codes.
    pub fn classify_response(&self, status: u16, body: &str) -> Option<Classification> {
        if (200..300).contains(&status) {
            let candidates = self.candidates(body, true);
            if candidates.is_empty() {
                return None;
            }
            return Some(
                self.match_tables(&candidates)
                    .unwrap_or_else(|| fallback(ErrorKind::Exchange, body)),
            );
        }

        let candidates = self.candidates(body, false);
        if let Some(hit) = self.match_tables(&candidates) {
            return Some(hit);
        }

        let lower = body.to_ascii_lowercase();
        let is_json = serde_json::from_str::<Value>(body).is_ok();
        let status_kind = self
            .http_status
            .iter()
            .find(|(code, _)| *code == status)
            .map(|(_, kind)| *kind);

        let kind = match status_kind {
            Some(ErrorKind::ExchangeNotAvailable) if looks_like_ddos(&lower) => {
                ErrorKind::DdosProtection
            }
            Some(kind) => kind,
            None if status >= 500 && !is_json && looks_like_maintenance(&lower) => {
                ErrorKind::OnMaintenance
            }
            None if status >= 500 => ErrorKind::ExchangeNotAvailable,
            None => ErrorKind::Exchange,
        };
        Some(fallback(kind, body))
    }

    fn match_tables(&self, candidates: &[String]) -> Option<Classification> {
        let hit = |kind: ErrorKind, candidate: &String| Classification {
            kind,
            message: candidate.clone(),
        };
        candidates
            .iter()
            .find_map(|c| self.lookup_exact(c).map(|kind| hit(kind, c)))
            .or_else(|| {
                candidates
                    .iter()
                    .find_map(|c| self.lookup_broad(c).map(|kind| hit(kind, c)))
            })
    }

    // Error-field values first, then the whole body. With `errors_only`, success
    // codes and the body itself are skipped.
    fn candidates(&self, body: &str, errors_only: bool) -> Vec<String> {
        let mut out = Vec::new();
        if !self.error_fields.is_empty() {
            if let Ok(json) = serde_json::from_str::<Value>(body) {
                for field in &self.error_fields {
                    if let Some(value) = lookup_path(&json, field) {
                        collect_strings(value, &mut out);
                    }
                }
            }
        }
        if errors_only {
            out.retain(|c| !self.success_codes.iter().any(|s| s == c));
            return out;
        }
        let trimmed = body.trim();
        if !trimmed.is_empty() {
            out.push(trimmed.to_string());
        }
        out
    }
}

fn fallback(kind: ErrorKind, body: &str) -> Classification {
    Classification {
        kind,
        message: body.to_string(),
    }
}

fn lookup_path<'a>(json: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.').try_fold(json, |value, key| value.get(key))
}

fn collect_strings(value: &Value, out: &mut Vec<String>) {
    match value {
        Value::String(s) if !s.is_empty() => out.push(s.clone()),
        Value::Number(n) => out.push(n.to_string()),
        Value::Array(items) => items.iter().for_each(|item| collect_strings(item, out)),
        _ => {}
    }
}

fn looks_like_ddos(lower_body: &str) -> bool {
    ["cloudflare", "incapsula", "overload", "ddos"]
        .iter()
        .any(|needle| lower_body.contains(needle))
}

fn looks_like_maintenance(lower_body: &str) -> bool {
    ["offline", "busy", "retry", "wait", "unavailable", "maintain", "maintenance"]
        .iter()
        .any(|needle| lower_body.contains(needle))
}

fn default_http_status() -> Vec<(u16, ErrorKind)> {
    use ErrorKind::*;
    vec![
        (400, BadRequest),
        (401, Authentication),
        (403, PermissionDenied),
        (404, BadRequest),
        (405, BadRequest),
        (407, Authentication),
        (408, RequestTimeout),
        (418, DdosProtection),
        (422, BadRequest),
        (429, RateLimitExceeded),
        (500, ExchangeNotAvailable),
        (501, ExchangeNotAvailable),
        (502, ExchangeNotAvailable),
        (503, ExchangeNotAvailable),
        (504, RequestTimeout),
        (511, Authentication),
        (520, ExchangeNotAvailable),
        (521, ExchangeNotAvailable),
        (522, ExchangeNotAvailable),
        (525, ExchangeNotAvailable),
        (530, ExchangeNotAvailable),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classifier() -> ErrorClassifier {
        ErrorClassifier::new()
            .error_fields(["code", "msg", "error"])
            .success_codes(["0"])
            .exact("-1021", ErrorKind::InvalidNonce)
            .exact("-2010", ErrorKind::InsufficientFunds)
            .exact("-2013", ErrorKind::OrderNotFound)
            .exact("EAPI:Invalid key", ErrorKind::Authentication)
            .broad("Invalid symbol", ErrorKind::BadSymbol)
            .broad("Too many requests", ErrorKind::RateLimitExceeded)
            .broad("Too many", ErrorKind::DdosProtection)
    }

    #[test]
    fn test_exact_match_wins() {
        let hit = classifier().classify(r#"{"code":-2010,"msg":"Too many requests"}"#);
        assert_eq!(hit.kind, ErrorKind::InsufficientFunds);
        assert_eq!(hit.message, "-2010");
    }

    #[test]
    fn test_broad_match_first_entry_wins() {
        let hit = classifier().classify(r#"{"code":-1003,"msg":"Too many requests; slow down"}"#);
        assert_eq!(hit.kind, ErrorKind::RateLimitExceeded);
    }

    #[test]
    fn test_exact_match_inside_array() {
        let hit = classifier().classify(r#"{"error":["EAPI:Invalid key"],"result":{}}"#);
        assert_eq!(hit.kind, ErrorKind::Authentication);
    }

    #[test]
    fn test_plain_text_body() {
        let hit = classifier().classify("Invalid symbol BTC/XYZ");
        assert_eq!(hit.kind, ErrorKind::BadSymbol);
    }

    #[test]
    fn test_generic_fallback_keeps_body() {
        let body = r#"{"code":-9999,"msg":"something odd"}"#;
        let hit = classifier().classify(body);
        assert_eq!(hit.kind, ErrorKind::Exchange);
        assert_eq!(hit.message, body);

        let empty = classifier().classify("");
        assert_eq!(empty.kind, ErrorKind::Exchange);
    }

    #[test]
    fn test_success_response_is_not_an_error() {
        let c = classifier();
        assert!(c.classify_response(200, r#"{"code":0,"data":[]}"#).is_none());
        assert!(c.classify_response(200, r#"{"error":[],"result":{}}"#).is_none());
        assert!(c.classify_response(200, r#"[1,2,3]"#).is_none());
        assert!(c.classify_response(200, "plain text").is_none());
    }

    #[test]
    fn test_error_payload_with_200_status() {
        let hit = classifier()
            .classify_response(200, r#"{"code":-2013,"msg":"Order does not exist."}"#)
            .unwrap();
        assert_eq!(hit.kind, ErrorKind::OrderNotFound);

        let unknown = classifier()
            .classify_response(200, r#"{"code":"51000","msg":"Parameter error"}"#)
            .unwrap();
        assert_eq!(unknown.kind, ErrorKind::Exchange);
    }

    #[test]
    fn test_http_status_fallbacks() {
        let c = classifier();
        assert_eq!(c.classify_response(429, "").unwrap().kind, ErrorKind::RateLimitExceeded);
        assert_eq!(c.classify_response(401, "nope").unwrap().kind, ErrorKind::Authentication);
        assert_eq!(c.classify_response(504, "").unwrap().kind, ErrorKind::RequestTimeout);
        assert_eq!(c.classify_response(502, "Bad gateway").unwrap().kind, ErrorKind::ExchangeNotAvailable);
        assert_eq!(
            c.classify_response(503, "<html>Attention Required! | Cloudflare</html>").unwrap().kind,
            ErrorKind::DdosProtection
        );
        assert_eq!(
            c.classify_response(599, "System under maintenance").unwrap().kind,
            ErrorKind::OnMaintenance
        );
        assert_eq!(c.classify_response(409, "conflict").unwrap().kind, ErrorKind::Exchange);
    }

    #[test]
    fn test_tables_beat_status() {
        let hit = classifier()
            .classify_response(400, r#"{"code":-1021,"msg":"Timestamp outside recvWindow"}"#)
            .unwrap();
        assert_eq!(hit.kind, ErrorKind::InvalidNonce);
    }

    #[test]
    fn test_nested_error_field() {
        let c = ErrorClassifier::new()
            .error_fields(["error.code"])
            .exact("INVALID_SIGNATURE", ErrorKind::Authentication);
        let hit = c
            .classify_response(200, r#"{"error":{"code":"INVALID_SIGNATURE","message":"x"}}"#)
            .unwrap();
        assert_eq!(hit.kind, ErrorKind::Authentication);
    }

    #[test]
    fn test_status_override() {
        let c = ErrorClassifier::new().http_status(404, ErrorKind::OrderNotFound);
        assert_eq!(c.classify_response(404, "").unwrap().kind, ErrorKind::OrderNotFound);
    }
}
