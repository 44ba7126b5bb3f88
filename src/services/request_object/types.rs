/*
 * Responsibility
 * - request object pipeline が扱う型 (契約) の定義
 * - Payload: 名前付き claim (生の JSON 値、存在と値を区別) + 順序付き拡張 map
 * - Client / Provider / Policy / Whitelist / Provenance
 *
 * Notes
 * - 検証ロジックは core 側の責務。ここは型のみ。
 */
use std::collections::BTreeMap;

use serde_json::{Map, Value};

use crate::services::jose::Keystore;

/// Authorization request parameter carrying the request object.
pub const REQUEST_PARAM: &str = "request";
/// Parameters a request object must never contain.
pub const FORBIDDEN_CLAIMS: [&str; 2] = ["request", "request_uri"];

/// Top-level authorization request parameters (query/form values).
pub type AuthorizationParams = BTreeMap<String, String>;

/// Request object claims.
///
/// The claims the pipeline reasons about are named; everything else stays
/// in `extra` in document order. Named claims keep their raw JSON so that a
/// claim present with an unexpected type (or `null`) is still seen.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Payload {
    pub iss: Option<Value>,
    pub aud: Option<Value>,
    pub response_type: Option<Value>,
    pub client_id: Option<Value>,
    pub extra: Map<String, Value>,
}

// `null`, `false`, `0` and `""` are not a declaration; arrays and objects always are.
fn is_declared(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

impl Payload {
    pub fn from_claims(mut claims: Map<String, Value>) -> Self {
        Self {
            iss: claims.shift_remove("iss"),
            aud: claims.shift_remove("aud"),
            response_type: claims.shift_remove("response_type"),
            client_id: claims.shift_remove("client_id"),
            extra: claims,
        }
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        match name {
            "iss" => self.iss.as_ref(),
            "aud" => self.aud.as_ref(),
            "response_type" => self.response_type.as_ref(),
            "client_id" => self.client_id.as_ref(),
            _ => self.extra.get(name),
        }
    }

    /// The first of `request`/`request_uri` present, if any.
    pub fn forbidden_claim(&self) -> Option<&'static str> {
        FORBIDDEN_CLAIMS
            .into_iter()
            .find(|name| self.extra.contains_key(*name))
    }

    /// `true` when `name` is absent, or present and equal to the top-level string value.
    pub fn agrees_with(&self, name: &str, params: &AuthorizationParams) -> bool {
        match self.get(name) {
            None => true,
            Some(Value::String(value)) => params.get(name) == Some(value),
            Some(_) => false,
        }
    }

    pub fn declares_issuer(&self) -> bool {
        self.iss.as_ref().is_some_and(is_declared)
    }

    /// An empty `aud` array still counts.
    pub fn declares_audience(&self) -> bool {
        self.aud.as_ref().is_some_and(is_declared)
    }
}

/// The resolved client, as seen by the pipeline.
#[derive(Debug, Clone)]
pub struct ClientContext {
    pub client_id: String,
    // Pre-registered `request_object_signing_alg`; `Some("none")` is a real requirement.
    pub request_object_signing_alg: Option<String>,
    pub keystore: Keystore,
}

impl ClientContext {
    pub fn new(client_id: impl Into<String>, keystore: Keystore) -> Self {
        Self {
            client_id: client_id.into(),
            request_object_signing_alg: None,
            keystore,
        }
    }

    pub fn with_request_object_signing_alg(mut self, alg: impl Into<String>) -> Self {
        self.request_object_signing_alg = Some(alg.into());
        self
    }
}

pub const DEFAULT_SIGNING_ALG_VALUES: &[&str] = &[
    "none", "HS256", "HS384", "HS512", "RS256", "RS384", "RS512", "PS256", "PS384", "PS512",
    "ES256", "ES384", "EdDSA",
];

pub const DEFAULT_ENCRYPTION_ALG_VALUES: &[&str] = &[
    "RSA-OAEP",
    "RSA-OAEP-256",
    "ECDH-ES",
    "ECDH-ES+A128KW",
    "ECDH-ES+A256KW",
    "A128KW",
    "A256KW",
    "dir",
];

pub const DEFAULT_ENCRYPTION_ENC_VALUES: &[&str] =
    &["A128CBC-HS256", "A256CBC-HS512", "A128GCM", "A256GCM"];

/// Deployment-wide request object policy. Read-only once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderPolicy {
    pub encryption_enabled: bool,
    pub encryption_alg_values: Vec<String>,
    pub encryption_enc_values: Vec<String>,
    pub signing_alg_values: Vec<String>,
}

fn owned(values: &[&str]) -> Vec<String> {
    values.iter().map(|s| s.to_string()).collect()
}

impl Default for ProviderPolicy {
    fn default() -> Self {
        Self {
            encryption_enabled: false,
            encryption_alg_values: owned(DEFAULT_ENCRYPTION_ALG_VALUES),
            encryption_enc_values: owned(DEFAULT_ENCRYPTION_ENC_VALUES),
            signing_alg_values: owned(DEFAULT_SIGNING_ALG_VALUES),
        }
    }
}

impl ProviderPolicy {
    pub fn permits_encryption_alg(&self, alg: &str) -> bool {
        self.encryption_alg_values.iter().any(|v| v == alg)
    }

    pub fn permits_encryption_enc(&self, enc: Option<&str>) -> bool {
        enc.is_some_and(|enc| self.encryption_enc_values.iter().any(|v| v == enc))
    }

    pub fn permits_signing_alg(&self, alg: &str) -> bool {
        self.signing_alg_values.iter().any(|v| v == alg)
    }
}

/// The authorization server itself: its issuer identifier, policy and
/// decryption keys.
#[derive(Debug, Clone)]
pub struct Provider {
    pub issuer: String,
    pub policy: ProviderPolicy,
    pub keystore: Keystore,
}

pub const DEFAULT_WHITELIST: &[&str] = &[
    "acr_values",
    "claims",
    "claims_locales",
    "client_id",
    "code_challenge",
    "code_challenge_method",
    "display",
    "id_token_hint",
    "login_hint",
    "max_age",
    "nonce",
    "prompt",
    "redirect_uri",
    "registration",
    "response_mode",
    "response_type",
    "scope",
    "state",
    "ui_locales",
];

/// Parameter names that may be promoted from a request object, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Whitelist(Vec<String>);

impl Whitelist {
    /// Duplicates keep their first position; `request`/`request_uri` are dropped.
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut out: Vec<String> = Vec::new();
        for name in names {
            let name = name.into();
            if FORBIDDEN_CLAIMS.contains(&name.as_str()) || out.contains(&name) {
                continue;
            }
            out.push(name);
        }
        Self(out)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

}

impl Default for Whitelist {
    fn default() -> Self {
        Self::new(DEFAULT_WHITELIST.iter().copied())
    }
}

/// Names of parameters that came from a signed and/or encrypted request object.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProvenanceMarker(Vec<String>);

impl ProvenanceMarker {
    pub fn new(fields: Vec<String>) -> Self {
        Self(fields)
    }

    pub fn fields(&self) -> &[String] {
        &self.0
    }
}

/// Per-request state the pipeline reads and, on success, mutates.
#[derive(Debug, Clone, Default)]
pub struct AuthorizationRequest {
    pub params: AuthorizationParams,
    pub signed: Option<ProvenanceMarker>,
}

impl AuthorizationRequest {
    pub fn new(params: AuthorizationParams) -> Self {
        Self {
            params,
            signed: None,
        }
    }

    pub fn request_object(&self) -> Option<&str> {
        self.params.get(REQUEST_PARAM).map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn payload(v: Value) -> Payload {
        let Value::Object(map) = v else { unreachable!() };
        Payload::from_claims(map)
    }

    fn params(pairs: &[(&str, &str)]) -> AuthorizationParams {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn splits_named_claims_from_extra() {
        let p = payload(json!({
            "scope": "openid",
            "client_id": "abc",
            "nonce": "n-0S6",
            "response_type": null,
            "claims": { "userinfo": { "email": null } }
        }));
        assert_eq!(p.client_id, Some(json!("abc")));
        assert_eq!(p.response_type, Some(Value::Null));
        assert_eq!(p.get("claims"), Some(&json!({ "userinfo": { "email": null } })));
        assert_eq!(p.get("state"), None);
        assert_eq!(
            p.extra.keys().map(String::as_str).collect::<Vec<_>>(),
            ["scope", "nonce", "claims"]
        );
    }

    #[test]
    fn detects_forbidden_claims() {
        assert_eq!(
            payload(json!({ "request_uri": "https://x" })).forbidden_claim(),
            Some("request_uri")
        );
        assert_eq!(
            payload(json!({ "request": null })).forbidden_claim(),
            Some("request")
        );
        assert_eq!(payload(json!({ "scope": "openid" })).forbidden_claim(), None);
    }

    #[test]
    fn agreement_needs_an_equal_string() {
        let top = params(&[("client_id", "abc"), ("response_type", "code")]);

        assert!(payload(json!({})).agrees_with("client_id", &top));
        assert!(payload(json!({ "client_id": "abc" })).agrees_with("client_id", &top));
        assert!(!payload(json!({ "client_id": "xyz" })).agrees_with("client_id", &top));
        assert!(!payload(json!({ "client_id": 42 })).agrees_with("client_id", &top));
        assert!(!payload(json!({ "response_type": null })).agrees_with("response_type", &top));
        assert!(!payload(json!({ "state": "s" })).agrees_with("state", &top));
    }

    #[test]
    fn declared_issuer_and_audience() {
        assert!(!payload(json!({ "iss": "" })).declares_issuer());
        assert!(!payload(json!({ "iss": null })).declares_issuer());
        assert!(payload(json!({ "iss": "abc" })).declares_issuer());
        assert!(payload(json!({ "aud": [] })).declares_audience());
        assert!(!payload(json!({ "aud": "" })).declares_audience());
        assert!(!payload(json!({})).declares_audience());
    }

    #[test]
    fn whitelist_dedups_and_drops_forbidden_names() {
        let wl = Whitelist::new(["scope", "request", "scope", "state", "request_uri"]);
        assert_eq!(wl.iter().collect::<Vec<_>>(), vec!["scope", "state"]);
    }

    #[test]
    fn default_policy_allows_none_and_rs256() {
        let policy = ProviderPolicy::default();
        assert!(policy.permits_signing_alg("none"));
        assert!(policy.permits_signing_alg("RS256"));
        assert!(!policy.encryption_enabled);
        assert!(!policy.permits_encryption_enc(None));
    }
}
