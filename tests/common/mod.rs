//! Common test utilities for request object pipeline tests
#![allow(dead_code)]

pub mod mock_engine;

use std::sync::Arc;

use base64::Engine as _;
use request_object::services::jose::CryptoEngine;
use request_object::{
    AuthorizationParams, AuthorizationRequest, ClientContext, Keystore, Provider, ProviderPolicy,
    RequestObjectDecoder, Whitelist,
};
use serde_json::Value;

#[allow(unused_imports)]
pub use mock_engine::{Call, MockEngine, VerifyBehavior};

pub const ISSUER: &str = "https://op.example.com";
pub const CLIENT_ID: &str = "abc";

fn b64url_json(value: &Value) -> String {
    let s = serde_json::to_string(value).unwrap();
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(s.as_bytes())
}

/// A JWS-shaped token with the given `alg`; the signature segment is a placeholder.
pub fn jws(alg: &str, claims: Value) -> String {
    let header = serde_json::json!({ "alg": alg });
    let sig = if alg == "none" { "" } else { "c2ln" };
    format!("{}.{}.{}", b64url_json(&header), b64url_json(&claims), sig)
}

/// A JWE-shaped token (5 segments) with the given protected header.
pub fn jwe(alg: &str, enc: &str) -> String {
    let header = serde_json::json!({ "alg": alg, "enc": enc });
    format!("{}.ZWs.aXY.Y3Q.dGFn", b64url_json(&header))
}

pub fn provider_keystore() -> Keystore {
    Keystore::from_jwks_json(r#"{"keys":[{"kty":"oct","kid":"provider","k":"cHJvdmlkZXI"}]}"#)
        .unwrap()
}

pub fn policy(encryption_enabled: bool) -> ProviderPolicy {
    ProviderPolicy {
        encryption_enabled,
        ..ProviderPolicy::default()
    }
}

pub fn decoder_with(engine: Arc<dyn CryptoEngine>, policy: ProviderPolicy) -> RequestObjectDecoder {
    let provider = Provider {
        issuer: ISSUER.to_string(),
        policy,
        keystore: provider_keystore(),
    };
    RequestObjectDecoder::new(
        engine,
        Arc::new(provider),
        Whitelist::new(["response_type", "client_id", "scope"]),
    )
}

pub fn client() -> ClientContext {
    ClientContext::new(CLIENT_ID, Keystore::new().with_client_secret("client-secret"))
}

pub fn request(pairs: &[(&str, &str)]) -> AuthorizationRequest {
    AuthorizationRequest::new(
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect::<AuthorizationParams>(),
    )
}
