use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result, bail};
use clap::Parser;
use josekit::{
    jwe::{self, JweEncrypter, JweHeader},
    jwk::Jwk,
    jws::{self, JwsHeader},
    jwt::{self, JwtPayload},
};
use serde_json::{Map, Value};
use tracing::debug;
use uuid::Uuid;

/// Mint an OAuth 2.0 request object (JAR) for manual testing.
///
/// - Builds the claims from `--param name=value` pairs (plus iss/aud/iat/exp/jti)
/// - Signs them with HS256 using the client secret, or leaves them unsecured (alg=none)
/// - Optionally wraps the result in a JWE for the provider's public key
/// - Outputs the compact token, ready for the `request` parameter
#[derive(Parser, Debug)]
#[command(name = "ro-gen", version, about)]
struct Args {
    /// client_id of the requesting client (also used as `iss`)
    #[arg(long)]
    client_id: String,

    /// Provider issuer identifier, used as `aud`
    #[arg(long)]
    audience: Option<String>,

    /// Authorization parameter to embed, e.g. --param scope="openid profile"
    #[arg(long = "param", value_name = "NAME=VALUE")]
    params: Vec<String>,

    /// Signing alg: HS256 or none
    #[arg(long, default_value = "HS256")]
    alg: String,

    /// Client secret for HS256
    #[arg(long)]
    client_secret: Option<String>,

    /// Lifetime of the request object, seconds
    #[arg(long, default_value_t = 300)]
    ttl: i64,

    /// Path to the provider's public encryption JWK (JSON). Enables JWE wrapping.
    #[arg(long, value_name = "FILE")]
    encrypt_jwk: Option<PathBuf>,

    /// JWE key management alg
    #[arg(long, default_value = "RSA-OAEP")]
    encrypt_alg: String,

    /// JWE content encryption
    #[arg(long, default_value = "A128CBC-HS256")]
    enc: String,

    /// Print only the token (no extra lines)
    #[arg(long, default_value_t = false)]
    quiet: bool,
}

fn parse_param(raw: &str) -> Result<(String, Value)> {
    let (name, value) = raw
        .split_once('=')
        .with_context(|| format!("--param expects NAME=VALUE, got {raw:?}"))?;
    // JSON objects/arrays (e.g. `claims`) are embedded as JSON; everything else as a string.
    let value = match value.trim_start().chars().next() {
        Some('{') | Some('[') => serde_json::from_str(value)
            .with_context(|| format!("invalid JSON for --param {name}"))?,
        _ => Value::String(value.to_string()),
    };
    Ok((name.to_string(), value))
}

fn build_claims(args: &Args) -> Result<Map<String, Value>> {
    let now = chrono::Utc::now().timestamp();

    let mut claims = Map::new();
    claims.insert("iss".to_string(), Value::String(args.client_id.clone()));
    if let Some(aud) = &args.audience {
        claims.insert("aud".to_string(), Value::String(aud.clone()));
    }
    claims.insert(
        "client_id".to_string(),
        Value::String(args.client_id.clone()),
    );
    claims.insert("iat".to_string(), Value::Number(now.into()));
    claims.insert("exp".to_string(), Value::Number((now + args.ttl).into()));
    claims.insert(
        "jti".to_string(),
        Value::String(Uuid::new_v4().to_string()),
    );

    for raw in &args.params {
        let (name, value) = parse_param(raw)?;
        if name == "request" || name == "request_uri" {
            bail!("{name} cannot be embedded in a request object");
        }
        claims.insert(name, value);
    }

    Ok(claims)
}

fn sign(args: &Args, claims: Map<String, Value>) -> Result<String> {
    let payload = JwtPayload::from_map(claims)?;
    let mut header = JwsHeader::new();
    header.set_token_type("JWT");

    let token = match args.alg.as_str() {
        "none" => jwt::encode_unsecured(&payload, &header)?,
        "HS256" => {
            let secret = args
                .client_secret
                .as_deref()
                .context("--client-secret is required for HS256")?;
            let signer = jws::HS256.signer_from_bytes(secret.as_bytes())?;
            jwt::encode_with_signer(&payload, &header, &signer)?
        }
        other => bail!("unsupported signing alg: {other}"),
    };
    Ok(token)
}

fn encrypter_for(alg: &str, jwk: &Jwk) -> Result<Box<dyn JweEncrypter>> {
    let encrypter: Box<dyn JweEncrypter> = match alg {
        "RSA-OAEP" => Box::new(jwe::RSA_OAEP.encrypter_from_jwk(jwk)?),
        "RSA-OAEP-256" => Box::new(jwe::RSA_OAEP_256.encrypter_from_jwk(jwk)?),
        "ECDH-ES" => Box::new(jwe::ECDH_ES.encrypter_from_jwk(jwk)?),
        "ECDH-ES+A128KW" => Box::new(jwe::ECDH_ES_A128KW.encrypter_from_jwk(jwk)?),
        "ECDH-ES+A256KW" => Box::new(jwe::ECDH_ES_A256KW.encrypter_from_jwk(jwk)?),
        "A128KW" => Box::new(jwe::A128KW.encrypter_from_jwk(jwk)?),
        "A256KW" => Box::new(jwe::A256KW.encrypter_from_jwk(jwk)?),
        "dir" => Box::new(jwe::Dir.encrypter_from_jwk(jwk)?),
        other => bail!("unsupported encryption alg: {other}"),
    };
    Ok(encrypter)
}

fn encrypt(args: &Args, path: &Path, inner: &str) -> Result<String> {
    let raw = fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    let jwk = Jwk::from_bytes(&raw)?;
    let encrypter = encrypter_for(&args.encrypt_alg, &jwk)?;
    debug!(alg = %args.encrypt_alg, enc = %args.enc, kid = ?jwk.key_id(), "encrypting request object");

    let mut header = JweHeader::new();
    header.set_content_encryption(&args.enc);
    header.set_content_type("JWT");
    if let Some(kid) = jwk.key_id() {
        header.set_key_id(kid);
    }

    Ok(jwe::serialize_compact(
        inner.as_bytes(),
        &header,
        encrypter.as_ref(),
    )?)
}

fn main() -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let claims = build_claims(&args)?;
    debug!(claims = %serde_json::Value::Object(claims.clone()), "request object claims");
    let signed = sign(&args, claims)?;

    let token = match &args.encrypt_jwk {
        Some(path) => encrypt(&args, path, &signed)?,
        None => signed.clone(),
    };

    if args.quiet {
        println!("{}", token);
        return Ok(());
    }

    println!("request: {}", token);
    println!("alg: {}", args.alg);
    if args.encrypt_jwk.is_some() {
        println!("encrypted: {} / {}", args.encrypt_alg, args.enc);
        println!("inner: {}", signed);
    } else {
        println!("encrypted: (no)");
    }

    Ok(())
}
