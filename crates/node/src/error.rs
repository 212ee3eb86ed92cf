// SPDX-License-Identifier: MIT OR Apache-2.0

use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::model::StatusCodeTag;

/// Error kinds for the Rosenbridge API (spec §7).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RosenbridgeError {
    BadRequest,
    Unauthorized,
    NotFound,
    Conflict,
    BridgeNotFound,
    Offline,
    TooManyBridges,
    TooManyBridgesForClient,
    Timeout,
    Transport,
    Internal,
}

impl RosenbridgeError {
    pub fn http_status(&self) -> u16 {
        match self {
            Self::BadRequest => 400,
            Self::Unauthorized => 401,
            Self::NotFound => 404,
            Self::Conflict => 409,
            Self::BridgeNotFound => 404,
            Self::Offline => 409,
            Self::TooManyBridges | Self::TooManyBridgesForClient => 429,
            Self::Timeout => 504,
            Self::Transport => 502,
            Self::Internal => 500,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BadRequest => "BAD_REQUEST",
            Self::Unauthorized => "UNAUTHORIZED",
            Self::NotFound => "NOT_FOUND",
            Self::Conflict => "CONFLICT",
            Self::BridgeNotFound => "BRIDGE_NOT_FOUND",
            Self::Offline => "OFFLINE",
            Self::TooManyBridges => "TOO_MANY_BRIDGES",
            Self::TooManyBridgesForClient => "TOO_MANY_BRIDGES_FOR_CLIENT",
            Self::Timeout => "TIMEOUT",
            Self::Transport => "TRANSPORT",
            Self::Internal => "INTERNAL",
        }
    }

    /// Map to the per-bridge status code tag used in send responses.
    pub fn as_status_tag(&self) -> StatusCodeTag {
        match self {
            Self::Offline => StatusCodeTag::Offline,
            Self::BridgeNotFound => StatusCodeTag::BridgeNotFound,
            Self::Unauthorized => StatusCodeTag::Unauthorized,
            Self::Timeout => StatusCodeTag::Timeout,
            Self::Transport => StatusCodeTag::Transport,
            _ => StatusCodeTag::Internal,
        }
    }

    pub fn to_error_body(&self, reason: impl Into<String>) -> ErrorBody {
        ErrorBody { code: self.as_str().to_owned(), reason: reason.into() }
    }

    pub fn to_http_response(&self, reason: impl Into<String>) -> (StatusCode, Json<ErrorResponse>) {
        let status = StatusCode::from_u16(self.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(ErrorResponse { error: self.to_error_body(reason) }))
    }
}

impl fmt::Display for RosenbridgeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Top-level error response envelope (HTTP surface).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: ErrorBody,
}

/// Error body with machine-readable code and human-readable reason. This is
/// also the body of a bridge-framed `ERROR_RES` (spec §6, §7).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub code: String,
    pub reason: String,
}

impl axum::response::IntoResponse for RosenbridgeError {
    fn into_response(self) -> axum::response::Response {
        self.to_http_response(self.as_str()).into_response()
    }
}
