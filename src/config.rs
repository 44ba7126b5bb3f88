/*
 * Responsibility
 * - 環境変数から provider の request object 設定を読み込む
 *   (issuer, 暗号化 feature flag, 許可 alg/enc 一覧, provider JWKS, whitelist)
 * - 設定値のバリデーション (不足・不正なら起動失敗)
 */
use std::fmt;

use tracing::warn;

use crate::services::jose::Keystore;
use crate::services::jose::jose_engine::DEFAULT_CLOCK_TOLERANCE_SECONDS;
use crate::services::request_object::types::{
    DEFAULT_ENCRYPTION_ALG_VALUES, DEFAULT_ENCRYPTION_ENC_VALUES, DEFAULT_SIGNING_ALG_VALUES,
    ProviderPolicy, Whitelist,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnv {
    Development,
    Production,
}

impl AppEnv {
    fn parse(value: Option<String>) -> Self {
        match value
            .unwrap_or_else(|| "development".to_string())
            .to_ascii_lowercase()
            .as_str()
        {
            "production" | "prod" => Self::Production,
            _ => Self::Development,
        }
    }

    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum ConfigError {
    Missing(&'static str),
    Invalid(&'static str),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Missing(key) => write!(f, "missing configuration: {}", key),
            ConfigError::Invalid(key) => write!(f, "invalid configuration: {}", key),
        }
    }
}

impl std::error::Error for ConfigError {}

#[derive(Debug, Clone)]
pub struct Config {
    pub app_env: AppEnv,
    pub issuer: String,

    pub encryption_enabled: bool,
    pub signing_alg_values: Vec<String>,
    pub encryption_alg_values: Vec<String>,
    pub encryption_enc_values: Vec<String>,

    // Provider's own (private) keys used to decrypt request objects.
    pub provider_keystore: Keystore,
    pub whitelist: Whitelist,
    pub clock_tolerance_seconds: u64,
}

fn parse_list(
    raw: Option<String>,
    key: &'static str,
    default: &[&str],
) -> Result<Vec<String>, ConfigError> {
    let Some(raw) = raw else {
        return Ok(default.iter().map(|s| s.to_string()).collect());
    };

    let values = raw
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>();

    if values.is_empty() {
        return Err(ConfigError::Invalid(key));
    }
    Ok(values)
}

fn parse_bool(raw: Option<String>, key: &'static str) -> Result<bool, ConfigError> {
    match raw.as_deref().map(str::trim) {
        None | Some("") => Ok(false),
        Some(v) if v.eq_ignore_ascii_case("true") || v == "1" => Ok(true),
        Some(v) if v.eq_ignore_ascii_case("false") || v == "0" => Ok(false),
        Some(_) => Err(ConfigError::Invalid(key)),
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup (the process environment in production).
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let app_env = AppEnv::parse(lookup("APP_ENV"));

        let issuer = lookup("OIDC_ISSUER").ok_or(ConfigError::Missing("OIDC_ISSUER"))?;
        url::Url::parse(&issuer).map_err(|_| ConfigError::Invalid("OIDC_ISSUER"))?;

        let encryption_enabled = parse_bool(
            lookup("OIDC_FEATURE_ENCRYPTION"),
            "OIDC_FEATURE_ENCRYPTION",
        )?;

        let signing_alg_values = parse_list(
            lookup("REQUEST_OBJECT_SIGNING_ALG_VALUES"),
            "REQUEST_OBJECT_SIGNING_ALG_VALUES",
            DEFAULT_SIGNING_ALG_VALUES,
        )?;
        let encryption_alg_values = parse_list(
            lookup("REQUEST_OBJECT_ENCRYPTION_ALG_VALUES"),
            "REQUEST_OBJECT_ENCRYPTION_ALG_VALUES",
            DEFAULT_ENCRYPTION_ALG_VALUES,
        )?;
        let encryption_enc_values = parse_list(
            lookup("REQUEST_OBJECT_ENCRYPTION_ENC_VALUES"),
            "REQUEST_OBJECT_ENCRYPTION_ENC_VALUES",
            DEFAULT_ENCRYPTION_ENC_VALUES,
        )?;

        let provider_keystore = match lookup("PROVIDER_JWKS") {
            Some(json) => Keystore::from_jwks_json(&json).map_err(|e| {
                warn!(error = %e, "failed to parse PROVIDER_JWKS");
                ConfigError::Invalid("PROVIDER_JWKS")
            })?,
            None => Keystore::new(),
        };

        let whitelist = match lookup("REQUEST_OBJECT_WHITELIST") {
            Some(raw) => Whitelist::new(parse_list(
                Some(raw),
                "REQUEST_OBJECT_WHITELIST",
                &[],
            )?),
            None => Whitelist::default(),
        };

        let clock_tolerance_seconds = lookup("CLOCK_TOLERANCE_SECONDS")
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(DEFAULT_CLOCK_TOLERANCE_SECONDS);

        if encryption_enabled && provider_keystore.is_empty() {
            warn!("encryption is enabled but PROVIDER_JWKS holds no keys");
        }
        if app_env.is_production() && signing_alg_values.iter().any(|alg| alg == "none") {
            warn!("unsigned request objects (alg=none) are permitted in production");
        }

        Ok(Self {
            app_env,
            issuer,
            encryption_enabled,
            signing_alg_values,
            encryption_alg_values,
            encryption_enc_values,
            provider_keystore,
            whitelist,
            clock_tolerance_seconds,
        })
    }

    pub fn policy(&self) -> ProviderPolicy {
        ProviderPolicy {
            encryption_enabled: self.encryption_enabled,
            encryption_alg_values: self.encryption_alg_values.clone(),
            encryption_enc_values: self.encryption_enc_values.clone(),
            signing_alg_values: self.signing_alg_values.clone(),
        }
    }
}
