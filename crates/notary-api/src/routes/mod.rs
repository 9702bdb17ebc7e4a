//! # API Route Modules
//!
//! - `documents`: document creation, version appends, signing the current
//!   version, and history with the ledger's records.
//! - `versions`: signing, rejecting and expiring a specific version.
//! - `claims`: identity claim issuance and revocation.
//! - `users`: the documents each user created or must sign.
//! - `anchors`: inspection and repair of unanchored events.

pub mod anchors;
pub mod claims;
pub mod documents;
pub mod users;
pub mod versions;

use serde::Deserialize;

use crate::extractors::Validate;

/// Body for signature submissions.
#[derive(Debug, Deserialize)]
pub struct SignRequest {
    /// Opaque signature blob.
    pub signature_data: String,
    /// Identity claim presented as evidence.
    pub claim_reference: String,
}

impl Validate for SignRequest {
    fn validate(&self) -> Result<(), String> {
        if self.signature_data.trim().is_empty() {
            return Err("signature_data must not be empty".to_string());
        }
        if self.claim_reference.trim().is_empty() {
            return Err("claim_reference must not be empty".to_string());
        }
        Ok(())
    }
}
