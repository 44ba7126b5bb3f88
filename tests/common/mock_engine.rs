use std::sync::Mutex;

use async_trait::async_trait;
use request_object::services::jose::{
    CryptoEngine, CryptoError, DecodedHeader, DecodedToken, Keystore, VerifyOptions, compact,
};
use serde_json::{Map, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Call {
    Header,
    Decrypt,
    Decode,
    Verify,
}

/// What `verify` should do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerifyBehavior {
    Accept,
    Reject,
    // Never completes; for cancellation tests.
    Hang,
}

/// Structural operations are real (compact decoding); decrypt/verify are scripted.
pub struct MockEngine {
    plaintext: Option<String>,
    verify: VerifyBehavior,
    verified_claims: Option<Map<String, Value>>,
    calls: Mutex<Vec<Call>>,
    verify_options: Mutex<Option<VerifyOptions>>,
    decrypt_keystore: Mutex<Option<Keystore>>,
}

impl MockEngine {
    pub fn new() -> Self {
        Self {
            plaintext: None,
            verify: VerifyBehavior::Accept,
            verified_claims: None,
            calls: Mutex::new(Vec::new()),
            verify_options: Mutex::new(None),
            decrypt_keystore: Mutex::new(None),
        }
    }

    /// `decrypt` returns this plaintext; without it, `decrypt` fails.
    pub fn decrypting_to(mut self, plaintext: impl Into<String>) -> Self {
        self.plaintext = Some(plaintext.into());
        self
    }

    pub fn verifying(mut self, verify: VerifyBehavior) -> Self {
        self.verify = verify;
        self
    }

    /// `verify` accepts and returns these claims instead of the token's own.
    pub fn verifying_to(mut self, claims: Map<String, Value>) -> Self {
        self.verify = VerifyBehavior::Accept;
        self.verified_claims = Some(claims);
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn verify_options(&self) -> Option<VerifyOptions> {
        self.verify_options.lock().unwrap().clone()
    }

    pub fn decrypt_keystore(&self) -> Option<Keystore> {
        self.decrypt_keystore.lock().unwrap().clone()
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl CryptoEngine for MockEngine {
    fn header(&self, token: &str) -> Result<DecodedHeader, CryptoError> {
        self.record(Call::Header);
        compact::header(token)
    }

    async fn decrypt(&self, _token: &str, keystore: &Keystore) -> Result<Vec<u8>, CryptoError> {
        self.record(Call::Decrypt);
        *self.decrypt_keystore.lock().unwrap() = Some(keystore.clone());
        self.plaintext
            .clone()
            .map(String::into_bytes)
            .ok_or(CryptoError::NoMatchingKey)
    }

    fn decode(&self, token: &str) -> Result<DecodedToken, CryptoError> {
        self.record(Call::Decode);
        compact::decode(token)
    }

    async fn verify(
        &self,
        token: &str,
        _keystore: &Keystore,
        options: &VerifyOptions,
    ) -> Result<Map<String, Value>, CryptoError> {
        self.record(Call::Verify);
        *self.verify_options.lock().unwrap() = Some(options.clone());

        match self.verify {
            VerifyBehavior::Accept => match &self.verified_claims {
                Some(claims) => Ok(claims.clone()),
                None => Ok(compact::decode(token)?.claims),
            },
            VerifyBehavior::Reject => Err(CryptoError::Malformed("signature mismatch".into())),
            VerifyBehavior::Hang => std::future::pending().await,
        }
    }
}
