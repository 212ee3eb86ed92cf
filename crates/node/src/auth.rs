// SPDX-License-Identifier: MIT OR Apache-2.0

//! Intra-cluster HTTP Basic Auth (spec §4.4, §6): guards
//! `POST /api/internal/message`, the only endpoint peers call on each other.
//!
//! Validation is header-based and returns a typed error; comparison runs
//! in constant time since the intercom channel uses a shared cluster
//! username and password rather than a per-call token.

use axum::http::HeaderMap;
use base64::Engine;

use crate::error::RosenbridgeError;
use crate::intercom::ClusterCredential;

fn constant_time_eq(a: &str, b: &str) -> bool {
    let a = a.as_bytes();
    let b = b.as_bytes();
    if a.len() != b.len() {
        return false;
    }
    let mut acc = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        acc |= x ^ y;
    }
    acc == 0
}

/// Validate the `Authorization: Basic ...` header against `expected`.
pub fn validate_basic(headers: &HeaderMap, expected: &ClusterCredential) -> Result<(), RosenbridgeError> {
    let header =
        headers.get("authorization").and_then(|v| v.to_str().ok()).ok_or(RosenbridgeError::Unauthorized)?;

    let encoded = header.strip_prefix("Basic ").ok_or(RosenbridgeError::Unauthorized)?;
    let decoded = base64::engine::general_purpose::STANDARD
        .decode(encoded)
        .map_err(|_| RosenbridgeError::Unauthorized)?;
    let decoded = String::from_utf8(decoded).map_err(|_| RosenbridgeError::Unauthorized)?;

    let Some((username, password)) = decoded.split_once(':') else {
        return Err(RosenbridgeError::Unauthorized);
    };

    if constant_time_eq(username, &expected.username) && constant_time_eq(password, &expected.password) {
        Ok(())
    } else {
        Err(RosenbridgeError::Unauthorized)
    }
}
