use base64::Engine as _;
use serde::Deserialize;
use serde_json::{Map, Value};

/// Errors raised while loading a JWKS document.
#[derive(Debug, thiserror::Error)]
pub enum KeystoreError {
    #[error("invalid JWKS document: {0}")]
    Json(#[from] serde_json::Error),
    #[error("JWK at index {0} is not a JSON object")]
    NotAnObject(usize),
    #[error("JWK at index {0} has no 'kty'")]
    MissingKty(usize),
}

#[derive(Deserialize)]
struct JwksDocument {
    keys: Vec<Value>,
}

/// An ordered set of JWKs (public or private) as raw JSON members.
///
/// Engines convert the members into their own key types on use, so the same
/// keystore can feed both the JWE and the JWS backends.
#[derive(Clone, Default, PartialEq)]
pub struct Keystore {
    keys: Vec<Map<String, Value>>,
}

impl std::fmt::Debug for Keystore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Do not print key material
        let kids: Vec<Option<&str>> = self.keys.iter().map(key_id).collect();
        f.debug_struct("Keystore").field("kids", &kids).finish()
    }
}

impl Keystore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a JWKS document: `{"keys": [ ... ]}`.
    pub fn from_jwks_json(json: &str) -> Result<Self, KeystoreError> {
        let doc: JwksDocument = serde_json::from_str(json)?;

        let mut keys = Vec::with_capacity(doc.keys.len());
        for (idx, key) in doc.keys.into_iter().enumerate() {
            let Value::Object(map) = key else {
                return Err(KeystoreError::NotAnObject(idx));
            };
            if !map.get("kty").is_some_and(Value::is_string) {
                return Err(KeystoreError::MissingKty(idx));
            }
            keys.push(map);
        }

        Ok(Self { keys })
    }

    /// Append a symmetric `oct` key derived from a client secret (for `HS*`).
    pub fn with_client_secret(mut self, secret: &str) -> Self {
        let k = base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(secret.as_bytes());
        let mut key = Map::new();
        key.insert("kty".to_string(), Value::String("oct".to_string()));
        key.insert("k".to_string(), Value::String(k));
        self.keys.push(key);
        self
    }

    pub fn keys(&self) -> &[Map<String, Value>] {
        &self.keys
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Keys eligible for a token header carrying `kid`.
    ///
    /// With a `kid` only exact matches qualify; without one every key does.
    pub fn candidates<'a>(
        &'a self,
        kid: Option<&'a str>,
    ) -> impl Iterator<Item = &'a Map<String, Value>> + 'a {
        self.keys
            .iter()
            .filter(move |key| kid.is_none_or(|kid| key_id(key) == Some(kid)))
    }
}

fn key_id(key: &Map<String, Value>) -> Option<&str> {
    key.get("kid").and_then(Value::as_str)
}

#[cfg(test)]
mod tests {
    use super::*;

    const JWKS: &str = r#"{"keys":[
        {"kty":"oct","kid":"a","k":"c2VjcmV0"},
        {"kty":"RSA","kid":"b","n":"AQAB","e":"AQAB"},
        {"kty":"oct","k":"b3RoZXI"}
    ]}"#;

    #[test]
    fn loads_jwks_document() {
        let ks = Keystore::from_jwks_json(JWKS).unwrap();
        assert_eq!(ks.len(), 3);
    }

    #[test]
    fn rejects_keys_without_kty() {
        let err = Keystore::from_jwks_json(r#"{"keys":[{"k":"x"}]}"#).unwrap_err();
        assert!(matches!(err, KeystoreError::MissingKty(0)));
    }

    #[test]
    fn candidates_filter_by_kid() {
        let ks = Keystore::from_jwks_json(JWKS).unwrap();
        assert_eq!(ks.candidates(Some("b")).count(), 1);
        assert_eq!(ks.candidates(Some("zzz")).count(), 0);
        assert_eq!(ks.candidates(None).count(), 3);
    }

    #[test]
    fn client_secret_becomes_oct_key() {
        let ks = Keystore::new().with_client_secret("secret");
        let key = &ks.keys()[0];
        assert_eq!(key["kty"], "oct");
        assert_eq!(key["k"], "c2VjcmV0");
    }

    #[test]
    fn debug_hides_key_material() {
        let ks = Keystore::from_jwks_json(JWKS).unwrap();
        let printed = format!("{ks:?}");
        assert!(!printed.contains("c2VjcmV0"));
        assert!(printed.contains("\"a\""));
    }
}
