//! Authentication: credentials, nonces and request signing.
//!
//! This module provides:
//! - Credential management with secure secret storage
//! - Strictly increasing nonces that follow the session clock
//! - Signature primitives (HMAC-SHA256/384/512, RSA-SHA256, Ed25519, HS256 JWT)
//! - [`Signer`] strategies that place key, nonce and signature per exchange convention

mod credentials;
mod nonce;
pub mod signature;
mod signer;

pub use credentials::{
    Credentials, CredentialsProvider, EnvCredentials, RequiredCredentials, StaticCredentials,
};
pub use nonce::{FixedNonce, IncreasingNonce, NonceProvider, NonceResolution};
pub use signature::{DigestEncoding, HashAlgorithm, KeyKind, SecretEncoding};
pub use signer::{
    JwtSigner, KeySigner, Params, PayloadEncoding, Placement, PublicSigner, RequestDescriptor,
    SignRequest, SignatureScheme, Signer,
};
