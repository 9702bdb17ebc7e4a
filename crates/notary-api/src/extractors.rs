//! # Extractors & Validation
//!
//! The [`Validate`] trait for request DTOs, JSON body helpers, and
//! path/body field parsers shared by the route modules.

use std::collections::BTreeSet;

use axum::extract::rejection::JsonRejection;
use axum::Json;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use notary_core::{ContentDigest, UserId};

use crate::error::AppError;

/// Request types with business rules beyond what serde checks.
pub trait Validate {
    /// Validate business rules. Returns an error message on failure.
    fn validate(&self) -> Result<(), String>;
}

/// Extract a JSON body, mapping deserialization errors to [`AppError::BadRequest`].
pub fn extract_json<T>(result: Result<Json<T>, JsonRejection>) -> Result<T, AppError> {
    result
        .map(|Json(v)| v)
        .map_err(|err| AppError::BadRequest(err.body_text()))
}

/// Extract a JSON body and validate it using the [`Validate`] trait.
pub fn extract_validated_json<T: Validate>(
    result: Result<Json<T>, JsonRejection>,
) -> Result<T, AppError> {
    let value = extract_json(result)?;
    value.validate().map_err(AppError::Validation)?;
    Ok(value)
}

/// Parse a hex content hash from a path segment.
pub fn parse_hash(raw: &str) -> Result<ContentDigest, AppError> {
    Ok(ContentDigest::from_hex(raw)?)
}

/// Decode base64 content, enforcing `max_bytes` on the decoded size.
pub fn decode_content(encoded: &str, max_bytes: usize) -> Result<Vec<u8>, AppError> {
    // Base64 expands by 4/3; reject oversized input before decoding.
    if encoded.len() / 4 * 3 > max_bytes.saturating_add(3) {
        return Err(AppError::Validation(format!(
            "content exceeds {max_bytes} bytes"
        )));
    }
    let bytes = STANDARD
        .decode(encoded.trim())
        .map_err(|e| AppError::Validation(format!("content is not valid base64: {e}")))?;
    if bytes.len() > max_bytes {
        return Err(AppError::Validation(format!(
            "content exceeds {max_bytes} bytes"
        )));
    }
    Ok(bytes)
}

/// Parse a list of user ids into a set.
pub fn parse_signers(raw: &[String]) -> Result<BTreeSet<UserId>, AppError> {
    raw.iter()
        .map(|s| UserId::new(s.as_str()).map_err(AppError::from))
        .collect()
}
