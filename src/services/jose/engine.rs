//! Crypto engine interface used by the request object pipeline.
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::services::jose::keystore::Keystore;

/// Unverified JOSE header fields the pipeline needs.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DecodedHeader {
    pub alg: String,
    #[serde(default)]
    pub enc: Option<String>,
    #[serde(default)]
    pub kid: Option<String>,
}

/// A compact token split into header and claims, signature not checked.
#[derive(Debug, Clone)]
pub struct DecodedToken {
    pub header: DecodedHeader,
    pub claims: Map<String, Value>,
}

/// Claim constraints applied during signature verification.
///
/// `None` means the claim is not checked at all.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VerifyOptions {
    pub issuer: Option<String>,
    pub audience: Option<String>,
}

#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("malformed compact serialization: {0}")]
    Malformed(String),
    #[error("invalid base64url segment: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("invalid JSON segment: {0}")]
    Json(#[from] serde_json::Error),
    #[error("unsupported alg: {0}")]
    UnsupportedAlg(String),
    #[error("no matching key found in keystore")]
    NoMatchingKey,
    #[error("invalid key: {0}")]
    InvalidKey(String),
    #[error(transparent)]
    Jose(#[from] josekit::JoseError),
    #[error(transparent)]
    Jwt(#[from] jsonwebtoken::errors::Error),
    #[error("decrypted payload is not valid UTF-8")]
    NotUtf8,
}

/// The JOSE capability the pipeline depends on.
///
/// `decrypt` and `verify` are the only operations that may suspend; header
/// inspection and decoding are purely structural.
#[async_trait]
pub trait CryptoEngine: Send + Sync {
    /// Parse the protected header without verifying or decrypting.
    fn header(&self, token: &str) -> Result<DecodedHeader, CryptoError>;

    /// Decrypt a JWE compact token with the given keystore, returning the plaintext.
    async fn decrypt(&self, token: &str, keystore: &Keystore) -> Result<Vec<u8>, CryptoError>;

    /// Split a JWS compact token into header and claims without verifying it.
    fn decode(&self, token: &str) -> Result<DecodedToken, CryptoError>;

    /// Verify the signature (and requested claims), returning the verified claims.
    async fn verify(
        &self,
        token: &str,
        keystore: &Keystore,
        options: &VerifyOptions,
    ) -> Result<Map<String, Value>, CryptoError>;
}
