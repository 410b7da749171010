//! Request signing strategies.
//!
//! A [`Signer`] turns an unsigned [`SignRequest`] into the exact
//! [`RequestDescriptor`] that goes on the wire. Exchanges differ in the canonical
//! string they sign and in where the signature travels, so the strategies here are
//! configured per exchange (and per API type) rather than hard-coded.
//!
//! | Strategy       | Canonical string                  | Signature                  |
//! |----------------|-----------------------------------|----------------------------|
//! | [`PublicSigner`] | none                            | none                       |
//! | [`KeySigner`] `hmac` | `nonce + urlencoded(params)` | HMAC-SHA256/384/512, hex or base64 |
//! | [`KeySigner`] `rsa`  | same                         | RSA-SHA256 (PKCS#1 v1.5), base64 |
//! | [`KeySigner`] `ed25519` | same                      | Ed25519, base64            |
//! | [`JwtSigner`]  | HS256 token                       | `Authorization: Bearer`    |
//!
//! With [`Placement::Query`] the nonce travels as a parameter and the full query
//! string (including it) is what gets signed.

use std::collections::BTreeMap;
use std::fmt::Debug;

use reqwest::Method;
use serde::Serialize;

use crate::auth::Credentials;
use crate::auth::signature::{
    self, DigestEncoding, HashAlgorithm, KeyKind, SecretEncoding, decode_secret, detect_key_kind,
};
use crate::error::ExchangeError;

/// Ordered request parameters. Order is preserved into the signed payload.
pub type Params = Vec<(String, String)>;

/// Everything a signer needs to know about one attempt.
#[derive(Debug, Clone)]
pub struct SignRequest<'a> {
    /// Scheme and host, e.g. `https://api.example.com`
    pub base_url: &'a str,
    /// Path with placeholders already filled in
    pub path: &'a str,
    pub method: &'a Method,
    pub params: &'a [(String, String)],
    /// Headers the caller wants on the request
    pub headers: &'a BTreeMap<String, String>,
    /// Raw body supplied by the caller; signed verbatim instead of the params
    pub body: Option<&'a str>,
    pub nonce: u64,
    pub recv_window: Option<u64>,
}

/// A fully built request, produced once per attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestDescriptor {
    pub url: String,
    pub method: Method,
    pub headers: BTreeMap<String, String>,
    pub body: Option<String>,
}

/// Strategy producing a [`RequestDescriptor`].
pub trait Signer: Send + Sync + Debug {
    /// Build the request for one attempt.
    fn sign(
        &self,
        request: &SignRequest<'_>,
        credentials: Option<&Credentials>,
    ) -> Result<RequestDescriptor, ExchangeError>;

    /// Whether this strategy consumes credentials and a nonce.
    fn is_private(&self) -> bool {
        true
    }
}

fn urlencode(params: &[(String, String)]) -> Result<String, ExchangeError> {
    serde_urlencoded::to_string(params).map_err(|e| ExchangeError::InvalidResponse(e.to_string()))
}

fn with_query(base_url: &str, path: &str, query: &str) -> String {
    if query.is_empty() {
        format!("{base_url}{path}")
    } else {
        format!("{base_url}{path}?{query}")
    }
}

fn has_body(method: &Method) -> bool {
    !matches!(*method, Method::GET | Method::DELETE | Method::HEAD)
}

fn require<'c>(credentials: Option<&'c Credentials>) -> Result<&'c Credentials, ExchangeError> {
    credentials.ok_or_else(|| ExchangeError::MissingCredentials("apiKey".to_string()))
}

/// Public endpoints: params go in the query string, nothing is added.
#[derive(Debug, Clone, Copy, Default)]
pub struct PublicSigner;

impl Signer for PublicSigner {
    fn sign(
        &self,
        request: &SignRequest<'_>,
        _credentials: Option<&Credentials>,
    ) -> Result<RequestDescriptor, ExchangeError> {
        let query = urlencode(request.params)?;
        Ok(RequestDescriptor {
            url: with_query(request.base_url, request.path, &query),
            method: request.method.clone(),
            headers: request.headers.clone(),
            body: request.body.map(str::to_string),
        })
    }

    fn is_private(&self) -> bool {
        false
    }
}

/// How a request body is encoded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PayloadEncoding {
    /// `application/x-www-form-urlencoded`
    #[default]
    Form,
    /// `application/json` object of the params
    Json,
}

/// Where the key, nonce and signature travel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Placement {
    /// Key, signature and (optionally) nonce as headers.
    Header {
        key: String,
        signature: String,
        nonce: Option<String>,
    },
    /// Nonce (and recv window) appended to the query, which is signed as a whole;
    /// the signature is appended as the last query field.
    Query {
        nonce_param: String,
        recv_window_param: String,
        signature_param: String,
        key_header: Option<String>,
    },
    /// Nonce and signature appended to the form body.
    Body {
        nonce_field: String,
        signature_field: String,
        key_header: Option<String>,
    },
}

impl Placement {
    pub fn header(key: &str, signature: &str, nonce: Option<&str>) -> Self {
        Placement::Header {
            key: key.to_string(),
            signature: signature.to_string(),
            nonce: nonce.map(str::to_string),
        }
    }

    /// `timestamp`, `recvWindow` and `signature` query fields, key in `key_header`.
    pub fn query(key_header: &str) -> Self {
        Placement::Query {
            nonce_param: "timestamp".to_string(),
            recv_window_param: "recvWindow".to_string(),
            signature_param: "signature".to_string(),
            key_header: Some(key_header.to_string()),
        }
    }

    pub fn body(nonce_field: &str, signature_field: &str, key_header: Option<&str>) -> Self {
        Placement::Body {
            nonce_field: nonce_field.to_string(),
            signature_field: signature_field.to_string(),
            key_header: key_header.map(str::to_string),
        }
    }
}

/// The algorithm a [`KeySigner`] applies to the canonical string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignatureScheme {
    Hmac {
        hash: HashAlgorithm,
        secret: SecretEncoding,
    },
    /// RSA-SHA256 with the PEM key from the credentials
    Rsa,
    /// Ed25519 with the key from the credentials
    Ed25519,
    /// HMAC, RSA or Ed25519 depending on the key material
    Auto {
        hash: HashAlgorithm,
        secret: SecretEncoding,
    },
}

/// Signs with a credential key: HMAC, RSA-SHA256 or Ed25519.
#[derive(Debug, Clone)]
pub struct KeySigner {
    scheme: SignatureScheme,
    placement: Placement,
    payload: PayloadEncoding,
    digest: Option<DigestEncoding>,
}

impl KeySigner {
    fn new(scheme: SignatureScheme) -> Self {
        Self {
            scheme,
            placement: Placement::header("X-API-KEY", "X-SIGNATURE", Some("X-TIMESTAMP")),
            payload: PayloadEncoding::Form,
            digest: None,
        }
    }

    /// HMAC with a raw secret, hex output.
    pub fn hmac(hash: HashAlgorithm) -> Self {
        Self::new(SignatureScheme::Hmac {
            hash,
            secret: SecretEncoding::Raw,
        })
    }

    /// RSA-SHA256, base64 output.
    pub fn rsa() -> Self {
        Self::new(SignatureScheme::Rsa)
    }

    /// Ed25519, base64 output.
    pub fn ed25519() -> Self {
        Self::new(SignatureScheme::Ed25519)
    }

    /// Pick the algorithm from the credential on each call.
    pub fn auto(hash: HashAlgorithm) -> Self {
        Self::new(SignatureScheme::Auto {
            hash,
            secret: SecretEncoding::Raw,
        })
    }

    pub fn placement(mut self, placement: Placement) -> Self {
        self.placement = placement;
        self
    }

    pub fn payload(mut self, payload: PayloadEncoding) -> Self {
        self.payload = payload;
        self
    }

    /// Override the signature encoding (default: hex for HMAC, base64 otherwise).
    pub fn digest(mut self, digest: DigestEncoding) -> Self {
        self.digest = Some(digest);
        self
    }

    /// How the HMAC secret string is turned into key bytes.
    pub fn secret_encoding(mut self, encoding: SecretEncoding) -> Self {
        match &mut self.scheme {
            SignatureScheme::Hmac { secret, .. } | SignatureScheme::Auto { secret, .. } => {
                *secret = encoding;
            }
            SignatureScheme::Rsa | SignatureScheme::Ed25519 => {}
        }
        self
    }

    /// Sign `canonical` with the credential and encode the result.
    pub fn signature(&self, credentials: &Credentials, canonical: &str) -> Result<String, ExchangeError> {
        let (kind, hash, secret_encoding) = match self.scheme {
            SignatureScheme::Hmac { hash, secret } => (KeyKind::Hmac, hash, secret),
            SignatureScheme::Rsa => (KeyKind::Rsa, HashAlgorithm::Sha256, SecretEncoding::Raw),
            SignatureScheme::Ed25519 => (KeyKind::Ed25519, HashAlgorithm::Sha256, SecretEncoding::Raw),
            SignatureScheme::Auto { hash, secret } => {
                (detect_key_kind(credentials.signing_key()), hash, secret)
            }
        };
        let bytes = match kind {
            KeyKind::Hmac => {
                let key = decode_secret(credentials.expose_secret(), secret_encoding)?;
                signature::hmac(&key, canonical.as_bytes(), hash)?
            }
            KeyKind::Rsa => signature::rsa_sign(credentials.signing_key(), canonical.as_bytes())?,
            KeyKind::Ed25519 => {
                signature::ed25519_sign(credentials.signing_key(), canonical.as_bytes())?
            }
        };
        let encoding = self.digest.unwrap_or(match kind {
            KeyKind::Hmac => DigestEncoding::Hex,
            KeyKind::Rsa | KeyKind::Ed25519 => DigestEncoding::Base64,
        });
        Ok(signature::encode(&bytes, encoding))
    }

    fn encode_payload(&self, params: &[(String, String)]) -> Result<String, ExchangeError> {
        match self.payload {
            PayloadEncoding::Form => urlencode(params),
            PayloadEncoding::Json => {
                let object: serde_json::Map<String, serde_json::Value> = params
                    .iter()
                    .map(|(k, v)| (k.clone(), serde_json::Value::String(v.clone())))
                    .collect();
                Ok(serde_json::to_string(&object)?)
            }
        }
    }

    fn content_type(&self) -> &'static str {
        match self.payload {
            PayloadEncoding::Form => "application/x-www-form-urlencoded",
            PayloadEncoding::Json => "application/json",
        }
    }
}

impl Signer for KeySigner {
    fn sign(
        &self,
        request: &SignRequest<'_>,
        credentials: Option<&Credentials>,
    ) -> Result<RequestDescriptor, ExchangeError> {
        let credentials = require(credentials)?;
        let nonce = request.nonce.to_string();
        let mut headers = request.headers.clone();
        let method = request.method.clone();

        let (url, body) = match &self.placement {
            Placement::Header {
                key,
                signature,
                nonce: nonce_header,
            } => {
                let (url, body, payload) = if has_body(&method) {
                    let payload = match request.body {
                        Some(raw) => raw.to_string(),
                        None => self.encode_payload(request.params)?,
                    };
                    let url = with_query(request.base_url, request.path, "");
                    (url, Some(payload.clone()), payload)
                } else {
                    let query = urlencode(request.params)?;
                    (with_query(request.base_url, request.path, &query), None, query)
                };
                let signed = self.signature(credentials, &format!("{nonce}{payload}"))?;
                headers.insert(key.clone(), credentials.api_key.clone());
                headers.insert(signature.clone(), signed);
                if let Some(nonce_header) = nonce_header {
                    headers.insert(nonce_header.clone(), nonce.clone());
                }
                (url, body)
            }
            Placement::Query {
                nonce_param,
                recv_window_param,
                signature_param,
                key_header,
            } => {
                let mut params: Params = request.params.to_vec();
                params.push((nonce_param.clone(), nonce.clone()));
                if let Some(window) = request.recv_window {
                    params.push((recv_window_param.clone(), window.to_string()));
                }
                let query = urlencode(&params)?;
                let signed = self.signature(credentials, &query)?;
                let query = format!("{query}&{}", urlencode(&[(signature_param.clone(), signed)])?);
                if let Some(header) = key_header {
                    headers.insert(header.clone(), credentials.api_key.clone());
                }
                (
                    with_query(request.base_url, request.path, &query),
                    request.body.map(str::to_string),
                )
            }
            Placement::Body {
                nonce_field,
                signature_field,
                key_header,
            } => {
                let canonical = format!("{nonce}{}", urlencode(request.params)?);
                let signed = self.signature(credentials, &canonical)?;
                let mut fields: Params = request.params.to_vec();
                fields.push((nonce_field.clone(), nonce.clone()));
                fields.push((signature_field.clone(), signed));
                if let Some(header) = key_header {
                    headers.insert(header.clone(), credentials.api_key.clone());
                }
                (
                    with_query(request.base_url, request.path, ""),
                    Some(urlencode(&fields)?),
                )
            }
        };

        if body.is_some() && !headers.keys().any(|k| k.eq_ignore_ascii_case("content-type")) {
            let content_type = match self.placement {
                Placement::Body { .. } => "application/x-www-form-urlencoded",
                _ => self.content_type(),
            };
            headers.insert("Content-Type".to_string(), content_type.to_string());
        }

        Ok(RequestDescriptor {
            url,
            method,
            headers,
            body,
        })
    }
}

#[derive(Serialize)]
struct JwtClaims<'a> {
    access_key: &'a str,
    nonce: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    query_hash: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    query_hash_alg: Option<&'static str>,
}

/// HS256 JWT in `Authorization: Bearer`, with a SHA-512 hash of the query.
#[derive(Debug, Clone, Copy, Default)]
pub struct JwtSigner;

impl Signer for JwtSigner {
    fn sign(
        &self,
        request: &SignRequest<'_>,
        credentials: Option<&Credentials>,
    ) -> Result<RequestDescriptor, ExchangeError> {
        let credentials = require(credentials)?;
        let query = urlencode(request.params)?;
        let query_hash = (!query.is_empty())
            .then(|| hex::encode(signature::digest(query.as_bytes(), HashAlgorithm::Sha512)));
        let claims = JwtClaims {
            access_key: &credentials.api_key,
            nonce: request.nonce.to_string(),
            query_hash_alg: query_hash.as_ref().map(|_| "SHA512"),
            query_hash,
        };
        let token = signature::jwt_hs256(&claims, credentials.expose_secret().as_bytes())?;

        let mut headers = request.headers.clone();
        headers.insert("Authorization".to_string(), format!("Bearer {token}"));

        let (url, body) = if has_body(request.method) {
            let object: serde_json::Map<String, serde_json::Value> = request
                .params
                .iter()
                .map(|(k, v)| (k.clone(), serde_json::Value::String(v.clone())))
                .collect();
            headers.insert("Content-Type".to_string(), "application/json".to_string());
            (
                with_query(request.base_url, request.path, ""),
                Some(serde_json::to_string(&object)?),
            )
        } else {
            (with_query(request.base_url, request.path, &query), None)
        };

        Ok(RequestDescriptor {
            url,
            method: request.method.clone(),
            headers,
            body,
        })
    }
}
