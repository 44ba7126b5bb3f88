//! Structural helpers for JOSE compact serialization.
//!
//! Nothing here checks a signature or decrypts anything.
use base64::Engine as _;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::services::jose::engine::{CryptoError, DecodedHeader, DecodedToken};

/// JWE compact serialization has five segments, JWS three.
pub const JWE_SEGMENTS: usize = 5;
pub const JWS_SEGMENTS: usize = 3;

pub fn segment_count(token: &str) -> usize {
    token.split('.').count()
}

pub fn looks_encrypted(token: &str) -> bool {
    segment_count(token) == JWE_SEGMENTS
}

fn decode_segment<T: DeserializeOwned>(segment: &str) -> Result<T, CryptoError> {
    let bytes = base64::engine::general_purpose::URL_SAFE_NO_PAD.decode(segment)?;
    Ok(serde_json::from_slice(&bytes)?)
}

/// Read the protected header of a JWS or JWE.
pub fn header(token: &str) -> Result<DecodedHeader, CryptoError> {
    let first = token
        .split('.')
        .next()
        .filter(|s| !s.is_empty())
        .ok_or_else(|| CryptoError::Malformed("missing header segment".into()))?;

    decode_segment(first)
}

/// Split a JWS into header and claims. Accepts unsecured (`alg=none`) tokens.
pub fn decode(token: &str) -> Result<DecodedToken, CryptoError> {
    let segments: Vec<&str> = token.split('.').collect();
    if segments.len() != JWS_SEGMENTS {
        return Err(CryptoError::Malformed(format!(
            "expected {} segments, got {}",
            JWS_SEGMENTS,
            segments.len()
        )));
    }

    let header: DecodedHeader = decode_segment(segments[0])?;
    let claims: Value = decode_segment(segments[1])?;
    let Value::Object(claims) = claims else {
        return Err(CryptoError::Malformed("payload is not a JSON object".into()));
    };

    Ok(DecodedToken { header, claims })
}

#[cfg(test)]
pub(crate) mod test_util {
    use base64::Engine as _;

    pub fn b64url_json(value: &serde_json::Value) -> String {
        let s = serde_json::to_string(value).unwrap();
        base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(s.as_bytes())
    }

    /// Build an unsecured JWS (`alg=none`, empty signature).
    pub fn unsecured(claims: &serde_json::Value) -> String {
        let header = serde_json::json!({ "alg": "none" });
        format!("{}.{}.", b64url_json(&header), b64url_json(claims))
    }
}
