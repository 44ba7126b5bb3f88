/// Factory: build `RequestObjectDecoder` from application `Config`.
use std::sync::Arc;

use crate::config::Config;
use crate::services::jose::JoseEngine;
use crate::services::request_object::{Provider, RequestObjectDecoder};

pub fn build_request_object_decoder(config: &Config) -> Arc<RequestObjectDecoder> {
    let provider = Provider {
        issuer: config.issuer.clone(),
        policy: config.policy(),
        keystore: config.provider_keystore.clone(),
    };
    let engine = JoseEngine::new(config.clock_tolerance_seconds);

    Arc::new(RequestObjectDecoder::new(
        Arc::new(engine),
        Arc::new(provider),
        config.whitelist.clone(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decoder_carries_config() {
        let config = Config::from_lookup(|key| match key {
            "OIDC_ISSUER" => Some("https://op.example.com".to_string()),
            "REQUEST_OBJECT_WHITELIST" => Some("scope".to_string()),
            _ => None,
        })
        .unwrap();

        let decoder = build_request_object_decoder(&config);
        assert_eq!(decoder.provider().issuer, "https://op.example.com");
        assert_eq!(decoder.whitelist().iter().collect::<Vec<_>>(), vec!["scope"]);
    }
}
