pub mod compact;
pub mod engine;
pub mod jose_engine;
pub mod keystore;

pub use engine::{CryptoEngine, CryptoError, DecodedHeader, DecodedToken, VerifyOptions};
pub use jose_engine::JoseEngine;
pub use keystore::{Keystore, KeystoreError};
