//! # Error Taxonomy
//!
//! Structured errors for the notary, built with `thiserror`. Every failure
//! the core can report to a caller is a distinct [`NotaryError`] variant;
//! transports map variants to status codes and callers branch on the
//! variant, never on the message text.
//!
//! `AlreadySigned` is deliberately absent: a repeated signature is an
//! idempotent success outcome, modelled by the collector's result type.

use thiserror::Error;

/// Top-level error type for notary operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NotaryError {
    /// Unknown document, version or claim. Not retried.
    #[error("{kind} not found: {id}")]
    NotFound {
        /// What was looked up ("document", "version", "claim").
        kind: &'static str,
        /// The identifier that was not found.
        id: String,
    },

    /// The actor is not permitted to perform the operation. Not retried.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Malformed request, e.g. an empty signer set.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Optimistic-concurrency loss on append. The caller should refresh the
    /// current version and retry; the core never retries on its own.
    #[error("conflict: expected current version {expected}, found {actual}")]
    Conflict {
        /// The current version hash the caller based its append on.
        expected: String,
        /// The current version hash actually stored.
        actual: String,
    },

    /// A version with this content hash already exists.
    #[error("duplicate content hash: {0}")]
    DuplicateHash(String),

    /// The version is no longer accepting signatures.
    #[error("version {version} is not pending (status {status})")]
    NotPending {
        /// The version hash.
        version: String,
        /// The terminal status it is in.
        status: String,
    },

    /// The identity claim is missing, expired, revoked or belongs to
    /// another user.
    #[error("invalid identity claim: {0}")]
    InvalidClaim(String),

    /// The external ledger call failed. Local state is already committed;
    /// anchoring is retried independently.
    #[error("anchoring failed: {0}")]
    AnchorFailure(String),

    /// A status transition not permitted by the approval state machine.
    #[error("invalid transition from {from} to {to}")]
    InvalidTransition {
        /// Current status.
        from: String,
        /// Requested status.
        to: String,
    },
}

impl NotaryError {
    /// Shorthand for a missing document.
    pub fn document_not_found(id: impl ToString) -> Self {
        Self::NotFound {
            kind: "document",
            id: id.to_string(),
        }
    }

    /// Shorthand for a missing version.
    pub fn version_not_found(id: impl ToString) -> Self {
        Self::NotFound {
            kind: "version",
            id: id.to_string(),
        }
    }

    /// Machine-readable code for transports and logs.
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "NOT_FOUND",
            Self::Unauthorized(_) => "UNAUTHORIZED",
            Self::InvalidInput(_) => "INVALID_INPUT",
            Self::Conflict { .. } => "CONFLICT",
            Self::DuplicateHash(_) => "DUPLICATE_HASH",
            Self::NotPending { .. } => "NOT_PENDING",
            Self::InvalidClaim(_) => "INVALID_CLAIM",
            Self::AnchorFailure(_) => "ANCHOR_FAILURE",
            Self::InvalidTransition { .. } => "INVALID_TRANSITION",
        }
    }
}

impl From<ValidationError> for NotaryError {
    fn from(err: ValidationError) -> Self {
        Self::InvalidInput(err.to_string())
    }
}

impl From<CanonicalizationError> for NotaryError {
    fn from(err: CanonicalizationError) -> Self {
        Self::InvalidInput(err.to_string())
    }
}

/// Errors during canonical serialization.
#[derive(Error, Debug)]
pub enum CanonicalizationError {
    /// Float values are not permitted in ledger commitments.
    #[error("float values are not permitted in canonical representations: {0}")]
    FloatRejected(f64),

    /// JSON serialization failed.
    #[error("serialization failed: {0}")]
    SerializationFailed(#[from] serde_json::Error),
}

/// Validation errors for identifier newtypes and wire formats.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// User identifier is empty, too long, or contains forbidden characters.
    #[error("invalid user id: \"{0}\" (expected 1-128 printable characters without ':' or whitespace)")]
    InvalidUserId(String),

    /// Claim reference is empty or too long.
    #[error("invalid claim reference: \"{0}\" (expected 1-256 characters)")]
    InvalidClaimReference(String),

    /// Digest is not a 64-character hex string.
    #[error("invalid content digest: \"{0}\" (expected 64 hex characters)")]
    InvalidDigest(String),

    /// Timestamp string is not valid UTC RFC 3339.
    #[error("invalid timestamp: \"{value}\" ({reason})")]
    InvalidTimestamp {
        /// The string that failed to parse.
        value: String,
        /// Why it was rejected.
        reason: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_display() {
        let err = NotaryError::document_not_found("abc");
        assert_eq!(err.to_string(), "document not found: abc");
        assert_eq!(err.code(), "NOT_FOUND");
    }

    #[test]
    fn conflict_display_carries_both_hashes() {
        let err = NotaryError::Conflict {
            expected: "aaa".into(),
            actual: "bbb".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("aaa"));
        assert!(msg.contains("bbb"));
    }

    #[test]
    fn validation_error_maps_to_invalid_input() {
        let err: NotaryError = ValidationError::InvalidDigest("zz".into()).into();
        assert!(matches!(err, NotaryError::InvalidInput(_)));
    }

    #[test]
    fn canonicalization_error_maps_to_invalid_input() {
        let err: NotaryError = CanonicalizationError::FloatRejected(0.5).into();
        assert_eq!(err.code(), "INVALID_INPUT");
    }

    #[test]
    fn every_variant_has_distinct_code() {
        let all = [
            NotaryError::version_not_found("v"),
            NotaryError::Unauthorized("x".into()),
            NotaryError::InvalidInput("x".into()),
            NotaryError::Conflict {
                expected: "a".into(),
                actual: "b".into(),
            },
            NotaryError::DuplicateHash("h".into()),
            NotaryError::NotPending {
                version: "v".into(),
                status: "APPROVED".into(),
            },
            NotaryError::InvalidClaim("x".into()),
            NotaryError::AnchorFailure("x".into()),
            NotaryError::InvalidTransition {
                from: "APPROVED".into(),
                to: "REJECTED".into(),
            },
        ];
        let mut codes: Vec<_> = all.iter().map(NotaryError::code).collect();
        codes.sort_unstable();
        codes.dedup();
        assert_eq!(codes.len(), all.len());
    }

    #[test]
    fn invalid_timestamp_display() {
        let err = ValidationError::InvalidTimestamp {
            value: "not-a-date".into(),
            reason: "parse failed".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("not-a-date"));
        assert!(msg.contains("parse failed"));
    }
}
