//! # API Error Types
//!
//! Structured error type implementing `axum::response::IntoResponse`.
//! Maps [`NotaryError`] variants to HTTP status codes and returns JSON
//! bodies `{ "error": { "code", "message" } }`. Internal details are never
//! exposed.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use notary_core::{NotaryError, ValidationError};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::service::ServiceError;

/// Structured JSON error response body.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

/// Inner error detail.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorDetail {
    /// Machine-readable error code (e.g., "NOT_FOUND", "CONFLICT").
    pub code: String,
    /// Human-readable error message.
    pub message: String,
}

/// Application-level error type that implements [`IntoResponse`] for Axum.
#[derive(Error, Debug)]
pub enum AppError {
    /// A domain error from the notary core.
    #[error(transparent)]
    Notary(#[from] NotaryError),

    /// Request body could not be parsed (400).
    #[error("bad request: {0}")]
    BadRequest(String),

    /// Request validation failed (422).
    #[error("validation error: {0}")]
    Validation(String),

    /// Authentication failure: missing or invalid token (401).
    #[error("unauthorized: {0}")]
    Unauthenticated(String),

    /// Internal server error (500). Message is logged but not returned to client.
    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// HTTP status and machine-readable code for this error.
    pub(crate) fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            Self::Notary(e) => {
                let status = match e {
                    NotaryError::NotFound { .. } => StatusCode::NOT_FOUND,
                    NotaryError::Unauthorized(_) | NotaryError::InvalidClaim(_) => {
                        StatusCode::FORBIDDEN
                    }
                    NotaryError::InvalidInput(_) => StatusCode::UNPROCESSABLE_ENTITY,
                    NotaryError::Conflict { .. }
                    | NotaryError::DuplicateHash(_)
                    | NotaryError::NotPending { .. }
                    | NotaryError::InvalidTransition { .. } => StatusCode::CONFLICT,
                    NotaryError::AnchorFailure(_) => StatusCode::BAD_GATEWAY,
                };
                (status, e.code())
            }
            Self::BadRequest(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST"),
            Self::Validation(_) => (StatusCode::UNPROCESSABLE_ENTITY, "VALIDATION_ERROR"),
            Self::Unauthenticated(_) => (StatusCode::UNAUTHORIZED, "UNAUTHENTICATED"),
            Self::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();

        // Never expose internal error messages to clients.
        let message = match &self {
            Self::Internal(_) => "An internal error occurred".to_string(),
            other => other.to_string(),
        };

        match &self {
            Self::Internal(_) => tracing::error!(error = %self, "internal server error"),
            Self::Notary(NotaryError::InvalidTransition { .. }) => {
                tracing::error!(error = %self, "invalid state transition reached the API")
            }
            _ => {}
        }

        let body = ErrorBody {
            error: ErrorDetail {
                code: code.to_string(),
                message,
            },
        };

        (status, Json(body)).into_response()
    }
}

impl From<ValidationError> for AppError {
    fn from(err: ValidationError) -> Self {
        Self::Validation(err.to_string())
    }
}

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Notary(e) => Self::Notary(e),
            ServiceError::Persistence(e) => Self::Internal(e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;

    fn status_of(e: NotaryError) -> StatusCode {
        AppError::from(e).status_and_code().0
    }

    #[test]
    fn notary_errors_map_to_statuses() {
        assert_eq!(
            status_of(NotaryError::document_not_found("x")),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status_of(NotaryError::Unauthorized("x".into())),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            status_of(NotaryError::InvalidInput("x".into())),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            status_of(NotaryError::Conflict {
                expected: "a".into(),
                actual: "b".into()
            }),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status_of(NotaryError::DuplicateHash("x".into())),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status_of(NotaryError::InvalidClaim("x".into())),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            status_of(NotaryError::AnchorFailure("x".into())),
            StatusCode::BAD_GATEWAY
        );
    }

    #[test]
    fn codes_come_from_the_variant() {
        let (_, code) = AppError::from(NotaryError::NotPending {
            version: "v".into(),
            status: "APPROVED".into(),
        })
        .status_and_code();
        assert_eq!(code, "NOT_PENDING");
    }

    #[tokio::test]
    async fn internal_error_hides_message() {
        let resp = AppError::Internal("db password=hunter2".into()).into_response();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        let body: ErrorBody = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body.error.code, "INTERNAL_ERROR");
        assert!(!body.error.message.contains("hunter2"));
    }

    #[tokio::test]
    async fn body_carries_code_and_message() {
        let resp = AppError::from(NotaryError::document_not_found("abc")).into_response();
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        let body: ErrorBody = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body.error.code, "NOT_FOUND");
        assert!(body.error.message.contains("abc"));
    }
}
