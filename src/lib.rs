/*
 * Responsibility
 * - OAuth 2.0 / OIDC request object (JAR) の復号・検証・パラメータ統合
 * - crate の公開 API の re-export (ロジックは services 配下に置く)
 */
pub mod config;
pub mod error;
pub mod services;

pub use config::{AppEnv, Config, ConfigError};
pub use error::{InvalidRequestObject, Phase};
pub use services::jose::{CryptoEngine, CryptoError, JoseEngine, Keystore, VerifyOptions};
pub use services::request_object::{
    AuthorizationParams, AuthorizationRequest, ClientContext, Payload, ProvenanceMarker, Provider,
    ProviderPolicy, RequestObjectDecoder, Whitelist, build_request_object_decoder,
};
