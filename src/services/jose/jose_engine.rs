//! Default `CryptoEngine`: josekit for JWE, jsonwebtoken for JWS.
use std::str::FromStr;

use async_trait::async_trait;
use josekit::jwe::{self, JweDecrypter};
use jsonwebtoken::{Algorithm, DecodingKey, Validation, errors::ErrorKind};
use serde_json::{Map, Value};
use tracing::debug;

use crate::services::jose::compact;
use crate::services::jose::engine::{
    CryptoEngine, CryptoError, DecodedHeader, DecodedToken, VerifyOptions,
};
use crate::services::jose::keystore::Keystore;

pub const DEFAULT_CLOCK_TOLERANCE_SECONDS: u64 = 60;

#[derive(Debug, Clone)]
pub struct JoseEngine {
    // Allowed exp/nbf drift (clock skew), seconds.
    clock_tolerance_seconds: u64,
}

impl Default for JoseEngine {
    fn default() -> Self {
        Self::new(DEFAULT_CLOCK_TOLERANCE_SECONDS)
    }
}

impl JoseEngine {
    pub fn new(clock_tolerance_seconds: u64) -> Self {
        Self {
            clock_tolerance_seconds,
        }
    }

    fn validation(&self, alg: Algorithm, options: &VerifyOptions) -> Validation {
        let mut validation = Validation::new(alg);
        // Request objects carry no mandatory claims; exp/nbf are checked only when present.
        validation.required_spec_claims.clear();
        validation.validate_nbf = true;
        validation.leeway = self.clock_tolerance_seconds;

        if let Some(issuer) = options.issuer.as_deref() {
            validation.set_issuer(&[issuer]);
        }
        match options.audience.as_deref() {
            Some(audience) => validation.set_audience(&[audience]),
            None => validation.validate_aud = false,
        }

        validation
    }
}

fn decrypter_for(alg: &str, jwk: &josekit::jwk::Jwk) -> Result<Box<dyn JweDecrypter>, CryptoError> {
    let decrypter: Box<dyn JweDecrypter> = match alg {
        "RSA-OAEP" => Box::new(jwe::RSA_OAEP.decrypter_from_jwk(jwk)?),
        "RSA-OAEP-256" => Box::new(jwe::RSA_OAEP_256.decrypter_from_jwk(jwk)?),
        "ECDH-ES" => Box::new(jwe::ECDH_ES.decrypter_from_jwk(jwk)?),
        "ECDH-ES+A128KW" => Box::new(jwe::ECDH_ES_A128KW.decrypter_from_jwk(jwk)?),
        "ECDH-ES+A256KW" => Box::new(jwe::ECDH_ES_A256KW.decrypter_from_jwk(jwk)?),
        "A128KW" => Box::new(jwe::A128KW.decrypter_from_jwk(jwk)?),
        "A256KW" => Box::new(jwe::A256KW.decrypter_from_jwk(jwk)?),
        "dir" => Box::new(jwe::Dir.decrypter_from_jwk(jwk)?),
        other => return Err(CryptoError::UnsupportedAlg(other.to_string())),
    };
    Ok(decrypter)
}

// Errors that mean "wrong key, try the next one" rather than "bad token".
fn is_key_mismatch(kind: &ErrorKind) -> bool {
    matches!(
        kind,
        ErrorKind::InvalidSignature | ErrorKind::InvalidKeyFormat | ErrorKind::InvalidAlgorithm
    )
}

#[async_trait]
impl CryptoEngine for JoseEngine {
    fn header(&self, token: &str) -> Result<DecodedHeader, CryptoError> {
        compact::header(token)
    }

    async fn decrypt(&self, token: &str, keystore: &Keystore) -> Result<Vec<u8>, CryptoError> {
        let header = compact::header(token)?;
        let mut last_err: Option<CryptoError> = None;

        for key in keystore.candidates(header.kid.as_deref()) {
            let jwk = match josekit::jwk::Jwk::from_map(key.clone()) {
                Ok(jwk) => jwk,
                Err(e) => {
                    last_err = Some(e.into());
                    continue;
                }
            };
            let decrypter = match decrypter_for(&header.alg, &jwk) {
                Ok(d) => d,
                Err(e @ CryptoError::UnsupportedAlg(_)) => return Err(e),
                Err(e) => {
                    debug!(error = %e, "skipping key unusable for JWE alg");
                    last_err = Some(e);
                    continue;
                }
            };

            match jwe::deserialize_compact(token, decrypter.as_ref()) {
                Ok((plaintext, _)) => return Ok(plaintext),
                Err(e) => last_err = Some(e.into()),
            }
        }

        Err(last_err.unwrap_or(CryptoError::NoMatchingKey))
    }

    fn decode(&self, token: &str) -> Result<DecodedToken, CryptoError> {
        compact::decode(token)
    }

    async fn verify(
        &self,
        token: &str,
        keystore: &Keystore,
        options: &VerifyOptions,
    ) -> Result<Map<String, Value>, CryptoError> {
        let header = compact::header(token)?;
        let alg = Algorithm::from_str(&header.alg)
            .map_err(|_| CryptoError::UnsupportedAlg(header.alg.clone()))?;
        let validation = self.validation(alg, options);
        let mut last_err: Option<CryptoError> = None;

        for key in keystore.candidates(header.kid.as_deref()) {
            let jwk: jsonwebtoken::jwk::Jwk = match serde_json::from_value(Value::Object(key.clone())) {
                Ok(jwk) => jwk,
                Err(e) => {
                    last_err = Some(CryptoError::InvalidKey(e.to_string()));
                    continue;
                }
            };
            let decoding_key = match DecodingKey::from_jwk(&jwk) {
                Ok(k) => k,
                Err(e) => {
                    last_err = Some(e.into());
                    continue;
                }
            };

            match jsonwebtoken::decode::<Map<String, Value>>(token, &decoding_key, &validation) {
                Ok(data) => return Ok(data.claims),
                Err(e) if is_key_mismatch(e.kind()) => last_err = Some(e.into()),
                Err(e) => return Err(e.into()),
            }
        }

        Err(last_err.unwrap_or(CryptoError::NoMatchingKey))
    }
}
