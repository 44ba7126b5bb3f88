/*
 * Responsibility
 * - request object 検証の唯一の外部エラー InvalidRequestObject の定義
 * - phase (machine-readable) と detail (human-readable) を必ず対で持つ
 * - IntoResponse 実装 (HTTP 400 / OAuth error body)
 */
use std::fmt;

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

/// OAuth error code carried by every rejection of this pipeline.
pub const INVALID_REQUEST_OBJECT: &str = "invalid_request_object";

/// Which check rejected the request object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    Decrypt,
    Parse,
    ForbiddenField,
    ResponseTypeMismatch,
    ClientIdMismatch,
    AlgMismatchPreregistered,
    AlgNotPermitted,
    Verify,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Decrypt => "decrypt",
            Phase::Parse => "parse",
            Phase::ForbiddenField => "forbidden-field",
            Phase::ResponseTypeMismatch => "response-type-mismatch",
            Phase::ClientIdMismatch => "client-id-mismatch",
            Phase::AlgMismatchPreregistered => "alg-mismatch-preregistered",
            Phase::AlgNotPermitted => "alg-not-permitted",
            Phase::Verify => "verify",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid_request_object [{phase}]: {detail}")]
pub struct InvalidRequestObject {
    pub phase: Phase,
    pub detail: String,
}

impl InvalidRequestObject {
    pub fn new(phase: Phase, detail: impl Into<String>) -> Self {
        Self {
            phase,
            detail: detail.into(),
        }
    }

    pub fn decrypt(reason: impl fmt::Display) -> Self {
        Self::new(
            Phase::Decrypt,
            format!("could not decrypt request object ({reason})"),
        )
    }

    pub fn parse(reason: impl fmt::Display) -> Self {
        Self::new(
            Phase::Parse,
            format!("could not parse request object as valid JWT ({reason})"),
        )
    }

    pub fn verify(reason: impl fmt::Display) -> Self {
        Self::new(
            Phase::Verify,
            format!("could not validate request object ({reason})"),
        )
    }

    pub fn error_code(&self) -> &'static str {
        INVALID_REQUEST_OBJECT
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: &'static str,
    pub error_description: String,
}

impl IntoResponse for InvalidRequestObject {
    fn into_response(self) -> Response {
        let body = ErrorResponse {
            error: INVALID_REQUEST_OBJECT,
            error_description: self.detail,
        };

        (StatusCode::BAD_REQUEST, Json(body)).into_response()
    }
}
