//! Credential management for exchange authentication.

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::error::ExchangeError;

/// API credentials. Immutable for the lifetime of a session.
#[derive(Clone)]
pub struct Credentials {
    /// The API key (public identifier)
    pub api_key: String,
    /// The API secret: an HMAC secret or a PEM private key
    secret: SecretString,
    /// Passphrase some exchanges require
    password: Option<SecretString>,
    /// Account/user id some exchanges require
    pub uid: Option<String>,
    /// Separate private key material (wallet-based exchanges)
    private_key: Option<SecretString>,
    pub wallet_address: Option<String>,
}

impl Credentials {
    /// Create new credentials from an API key and secret.
    pub fn new(api_key: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            secret: SecretString::from(secret.into()),
            password: None,
            uid: None,
            private_key: None,
            wallet_address: None,
        }
    }

    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(SecretString::from(password.into()));
        self
    }

    pub fn with_uid(mut self, uid: impl Into<String>) -> Self {
        self.uid = Some(uid.into());
        self
    }

    pub fn with_private_key(mut self, private_key: impl Into<String>) -> Self {
        self.private_key = Some(SecretString::from(private_key.into()));
        self
    }

    pub fn with_wallet_address(mut self, address: impl Into<String>) -> Self {
        self.wallet_address = Some(address.into());
        self
    }

    /// Get the API secret for signing.
    ///
    /// This method exposes the secret - use carefully.
    pub fn expose_secret(&self) -> &str {
        self.secret.expose_secret()
    }

    pub fn expose_password(&self) -> Option<&str> {
        self.password.as_ref().map(|p| p.expose_secret())
    }

    pub fn expose_private_key(&self) -> Option<&str> {
        self.private_key.as_ref().map(|k| k.expose_secret())
    }

    /// Key material for asymmetric signing: the private key if set, else the secret.
    pub fn signing_key(&self) -> &str {
        self.expose_private_key().unwrap_or_else(|| self.expose_secret())
    }

    /// Fail with the name of the first required credential that is missing.
    pub fn check_required(&self, required: &RequiredCredentials) -> Result<(), ExchangeError> {
        let missing = |name: &str| Err(ExchangeError::MissingCredentials(name.to_string()));
        if required.api_key && self.api_key.is_empty() {
            return missing("apiKey");
        }
        if required.secret && self.expose_secret().is_empty() {
            return missing("secret");
        }
        if required.password && self.expose_password().is_none_or(str::is_empty) {
            return missing("password");
        }
        if required.uid && self.uid.as_deref().is_none_or(str::is_empty) {
            return missing("uid");
        }
        if required.private_key && self.expose_private_key().is_none_or(str::is_empty) {
            return missing("privateKey");
        }
        if required.wallet_address && self.wallet_address.as_deref().is_none_or(str::is_empty) {
            return missing("walletAddress");
        }
        Ok(())
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let redacted = |present: bool| if present { "[REDACTED]" } else { "None" };
        f.debug_struct("Credentials")
            .field("api_key", &self.api_key)
            .field("secret", &"[REDACTED]")
            .field("password", &redacted(self.password.is_some()))
            .field("uid", &self.uid)
            .field("private_key", &redacted(self.private_key.is_some()))
            .field("wallet_address", &self.wallet_address)
            .finish()
    }
}

/// Which credentials an exchange needs for private endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RequiredCredentials {
    pub api_key: bool,
    pub secret: bool,
    pub password: bool,
    pub uid: bool,
    pub private_key: bool,
    pub wallet_address: bool,
}

impl Default for RequiredCredentials {
    fn default() -> Self {
        Self {
            api_key: true,
            secret: true,
            password: false,
            uid: false,
            private_key: false,
            wallet_address: false,
        }
    }
}

/// Trait for providing API credentials.
///
/// Implement this trait to customize how credentials are retrieved,
/// for example from a secrets manager or environment variables.
pub trait CredentialsProvider: Send + Sync {
    /// Get the credentials.
    fn get_credentials(&self) -> &Credentials;
}

/// Static credentials provider that holds credentials directly.
#[derive(Clone)]
pub struct StaticCredentials {
    credentials: Credentials,
}

impl StaticCredentials {
    /// Create a new static credentials provider.
    pub fn new(api_key: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            credentials: Credentials::new(api_key, secret),
        }
    }
}

impl From<Credentials> for StaticCredentials {
    fn from(credentials: Credentials) -> Self {
        Self { credentials }
    }
}

impl CredentialsProvider for StaticCredentials {
    fn get_credentials(&self) -> &Credentials {
        &self.credentials
    }
}

impl CredentialsProvider for Arc<StaticCredentials> {
    fn get_credentials(&self) -> &Credentials {
        &self.credentials
    }
}

/// Credentials provider that reads from environment variables.
///
/// For prefix `BINANCE` it reads `BINANCE_API_KEY` and `BINANCE_SECRET`, plus the
/// optional `BINANCE_PASSWORD`, `BINANCE_UID`, `BINANCE_PRIVATE_KEY` and
/// `BINANCE_WALLET_ADDRESS`.
pub struct EnvCredentials {
    credentials: Credentials,
}

impl EnvCredentials {
    /// Create credentials from `{prefix}_*` environment variables.
    pub fn from_env(prefix: &str) -> Result<Self, ExchangeError> {
        Self::from_lookup(prefix, |name| std::env::var(name).ok())
    }

    /// Try to create credentials from `{prefix}_*` environment variables.
    ///
    /// Returns `None` if the key or secret is not set.
    pub fn try_from_env(prefix: &str) -> Option<Self> {
        Self::from_env(prefix).ok()
    }

    fn from_lookup(
        prefix: &str,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ExchangeError> {
        let var = |suffix: &str| lookup(&format!("{prefix}_{suffix}"));
        let api_key = var("API_KEY")
            .ok_or_else(|| ExchangeError::MissingCredentials(format!("{prefix}_API_KEY")))?;
        let secret = var("SECRET")
            .ok_or_else(|| ExchangeError::MissingCredentials(format!("{prefix}_SECRET")))?;

        let mut credentials = Credentials::new(api_key, secret);
        if let Some(password) = var("PASSWORD") {
            credentials = credentials.with_password(password);
        }
        if let Some(uid) = var("UID") {
            credentials = credentials.with_uid(uid);
        }
        if let Some(key) = var("PRIVATE_KEY") {
            credentials = credentials.with_private_key(key);
        }
        if let Some(address) = var("WALLET_ADDRESS") {
            credentials = credentials.with_wallet_address(address);
        }
        Ok(Self { credentials })
    }
}

impl CredentialsProvider for EnvCredentials {
    fn get_credentials(&self) -> &Credentials {
        &self.credentials
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    #[test]
    fn test_credentials_debug_redacted() {
        let creds = Credentials::new("my_key", "super_secret").with_password("pass_phrase");
        let debug_str = format!("{:?}", creds);
        assert!(debug_str.contains("my_key"));
        assert!(!debug_str.contains("super_secret"));
        assert!(!debug_str.contains("pass_phrase"));
        assert!(debug_str.contains("[REDACTED]"));
    }

    #[test]
    fn test_static_credentials() {
        let provider = StaticCredentials::new("key", "secret");
        let creds = provider.get_credentials();
        assert_eq!(creds.api_key, "key");
        assert_eq!(creds.expose_secret(), "secret");
        assert_eq!(creds.signing_key(), "secret");
    }

    #[test]
    fn test_check_required() {
        let creds = Credentials::new("key", "secret");
        assert!(creds.check_required(&RequiredCredentials::default()).is_ok());

        let needs_password = RequiredCredentials {
            password: true,
            ..RequiredCredentials::default()
        };
        match creds.check_required(&needs_password) {
            Err(ExchangeError::MissingCredentials(name)) => assert_eq!(name, "password"),
            other => panic!("expected missing password, got {other:?}"),
        }
        assert!(creds.with_password("p").check_required(&needs_password).is_ok());

        let empty = Credentials::new("", "secret");
        assert!(empty.check_required(&RequiredCredentials::default()).is_err());
    }

    #[test]
    fn test_env_credentials_lookup() {
        let vars: HashMap<&str, &str> = [
            ("OKX_API_KEY", "k"),
            ("OKX_SECRET", "s"),
            ("OKX_PASSWORD", "p"),
        ]
        .into_iter()
        .collect();
        let provider =
            EnvCredentials::from_lookup("OKX", |name| vars.get(name).map(|v| v.to_string())).unwrap();
        let creds = provider.get_credentials();
        assert_eq!(creds.api_key, "k");
        assert_eq!(creds.expose_password(), Some("p"));
        assert!(creds.uid.is_none());

        let missing = EnvCredentials::from_lookup("NOPE", |_| None);
        assert!(matches!(missing, Err(ExchangeError::MissingCredentials(_))));
    }
}
