//! Request object validation pipeline.
//!
//! Stages run strictly in order: detect/decrypt, decode, consistency and
//! policy checks, signature verification. Each stage only reads the
//! authorization request; the caller-visible mutation is a single
//! [`Promotion::apply`] at the very end, after the last await point, so a
//! rejected or cancelled invocation leaves the request untouched.
use std::borrow::Cow;
use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, warn};

use crate::error::{InvalidRequestObject, Phase};
use crate::services::jose::compact;
use crate::services::jose::{CryptoEngine, CryptoError, DecodedHeader, VerifyOptions};
use crate::services::request_object::types::{
    AuthorizationParams, AuthorizationRequest, ClientContext, Payload, ProvenanceMarker, Provider,
    REQUEST_PARAM, Whitelist,
};

/// Token text after the detection/decryption stage.
struct Detected<'a> {
    token: Cow<'a, str>,
    decrypted: bool,
}

struct Decoded {
    header: DecodedHeader,
    payload: Payload,
}

/// The validated outcome, not yet applied to the request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Promotion {
    pub values: Vec<(String, String)>,
    pub provenance: Option<ProvenanceMarker>,
}

impl Promotion {
    /// Merge promoted values over the top-level parameters and clear the
    /// request object parameter.
    pub fn apply(self, request: &mut AuthorizationRequest) {
        for (name, value) in self.values {
            request.params.insert(name, value);
        }
        if let Some(marker) = self.provenance {
            request.signed = Some(marker);
        }
        request.params.remove(REQUEST_PARAM);
    }
}

/// Top-level parameters are strings; anything else is kept as compact JSON.
fn param_value(value: Value) -> String {
    match value {
        Value::String(s) => s,
        other => other.to_string(),
    }
}

#[derive(Clone)]
pub struct RequestObjectDecoder {
    engine: Arc<dyn CryptoEngine>,
    provider: Arc<Provider>,
    whitelist: Arc<Whitelist>,
}

impl std::fmt::Debug for RequestObjectDecoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestObjectDecoder")
            .field("issuer", &self.provider.issuer)
            .field("policy", &self.provider.policy)
            .field("whitelist", &self.whitelist)
            .finish()
    }
}

impl RequestObjectDecoder {
    pub fn new(engine: Arc<dyn CryptoEngine>, provider: Arc<Provider>, whitelist: Whitelist) -> Self {
        Self {
            engine,
            provider,
            whitelist: Arc::new(whitelist),
        }
    }

    pub fn whitelist(&self) -> &Whitelist {
        &self.whitelist
    }

    pub fn provider(&self) -> &Provider {
        &self.provider
    }

    /// Validate the `request` parameter (if any) and merge its whitelisted
    /// claims into `request.params`.
    ///
    /// Without a `request` parameter this is a no-op.
    pub async fn decode_request(
        &self,
        request: &mut AuthorizationRequest,
        client: &ClientContext,
    ) -> Result<(), InvalidRequestObject> {
        let Some(token) = request.request_object() else {
            return Ok(());
        };

        let promotion = match self.validate(token, &request.params, client).await {
            Ok(p) => p,
            Err(err) => {
                warn!(
                    client_id = %client.client_id,
                    phase = %err.phase,
                    detail = %err.detail,
                    "request object rejected"
                );
                return Err(err);
            }
        };

        debug!(
            client_id = %client.client_id,
            promoted = promotion.values.len(),
            protected = promotion.provenance.is_some(),
            "request object accepted"
        );
        promotion.apply(request);
        Ok(())
    }

    /// Run every stage against `token` without touching the request.
    pub async fn validate(
        &self,
        token: &str,
        params: &AuthorizationParams,
        client: &ClientContext,
    ) -> Result<Promotion, InvalidRequestObject> {
        let detected = self.detect(token).await?;
        let decoded = self.decode(&detected.token)?;
        self.check(&decoded, params, client)?;
        let verified = self.verify(&detected.token, &decoded, client).await?;

        let protected = detected.decrypted || verified.is_some();
        let payload = verified.as_ref().unwrap_or(&decoded.payload);
        Ok(self.project(payload, protected))
    }

    async fn detect<'a>(&self, token: &'a str) -> Result<Detected<'a>, InvalidRequestObject> {
        let policy = &self.provider.policy;
        if !policy.encryption_enabled || !compact::looks_encrypted(token) {
            return Ok(Detected {
                token: Cow::Borrowed(token),
                decrypted: false,
            });
        }

        debug!("decrypting request object");
        let header = self
            .engine
            .header(token)
            .map_err(InvalidRequestObject::decrypt)?;

        if !policy.permits_encryption_alg(&header.alg) {
            return Err(InvalidRequestObject::decrypt(
                "unsupported encrypted request alg",
            ));
        }
        if !policy.permits_encryption_enc(header.enc.as_deref()) {
            return Err(InvalidRequestObject::decrypt(
                "unsupported encrypted request enc",
            ));
        }

        // Always the provider's own keys, never the client's.
        let plaintext = self
            .engine
            .decrypt(token, &self.provider.keystore)
            .await
            .map_err(InvalidRequestObject::decrypt)?;
        let inner = String::from_utf8(plaintext)
            .map_err(|_| InvalidRequestObject::decrypt(CryptoError::NotUtf8))?;

        Ok(Detected {
            token: Cow::Owned(inner),
            decrypted: true,
        })
    }

    fn decode(&self, token: &str) -> Result<Decoded, InvalidRequestObject> {
        let decoded = self.engine.decode(token).map_err(InvalidRequestObject::parse)?;

        Ok(Decoded {
            header: decoded.header,
            payload: Payload::from_claims(decoded.claims),
        })
    }

    fn check(
        &self,
        decoded: &Decoded,
        params: &AuthorizationParams,
        client: &ClientContext,
    ) -> Result<(), InvalidRequestObject> {
        let Decoded { header, payload } = decoded;

        if payload.forbidden_claim().is_some() {
            return Err(InvalidRequestObject::new(
                Phase::ForbiddenField,
                "request object must not contain request or request_uri properties",
            ));
        }

        if !payload.agrees_with("response_type", params) {
            return Err(InvalidRequestObject::new(
                Phase::ResponseTypeMismatch,
                "request response_type must equal the one in request parameters",
            ));
        }

        if !payload.agrees_with("client_id", params) {
            return Err(InvalidRequestObject::new(
                Phase::ClientIdMismatch,
                "request client_id must equal the one in request parameters",
            ));
        }

        if let Some(required) = client.request_object_signing_alg.as_deref() {
            if required != header.alg {
                return Err(InvalidRequestObject::new(
                    Phase::AlgMismatchPreregistered,
                    "the preregistered alg must be used in request or request_uri",
                ));
            }
        }

        if !self.provider.policy.permits_signing_alg(&header.alg) {
            return Err(InvalidRequestObject::new(
                Phase::AlgNotPermitted,
                "unsupported signed request alg",
            ));
        }

        Ok(())
    }

    /// The verified claims, or `None` for an unsigned (`alg=none`) object.
    async fn verify(
        &self,
        token: &str,
        decoded: &Decoded,
        client: &ClientContext,
    ) -> Result<Option<Payload>, InvalidRequestObject> {
        if decoded.header.alg == "none" {
            return Ok(None);
        }

        let options = VerifyOptions {
            issuer: decoded
                .payload
                .declares_issuer()
                .then(|| client.client_id.clone()),
            audience: decoded
                .payload
                .declares_audience()
                .then(|| self.provider.issuer.clone()),
        };

        debug!(alg = %decoded.header.alg, "verifying request object signature");
        let claims = self
            .engine
            .verify(token, &client.keystore, &options)
            .await
            .map_err(InvalidRequestObject::verify)?;

        Ok(Some(Payload::from_claims(claims)))
    }

    fn project(&self, payload: &Payload, protected: bool) -> Promotion {
        let values: Vec<(String, String)> = self
            .whitelist
            .iter()
            .filter_map(|name| {
                payload
                    .get(name)
                    .map(|v| (name.to_string(), param_value(v.clone())))
            })
            .collect();

        let provenance = protected.then(|| {
            ProvenanceMarker::new(values.iter().map(|(name, _)| name.clone()).collect())
        });

        Promotion { values, provenance }
    }
}
