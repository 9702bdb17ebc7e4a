//! # Identity Claims
//!
//! An [`IdentityClaim`] is a time-bounded assertion, issued by an
//! authority, that a user holds a verified attribute. Claims gate two
//! operations: document creation (the creator must hold a valid claim) and
//! signing (the referenced claim must be usable by the signer).
//!
//! Validity is re-evaluated against wall-clock time on every call. The
//! validator holds no cache.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use notary_core::{ClaimReference, NotaryError, Timestamp, UserId};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::version::Metadata;

/// Revocation status of a claim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ClaimStatus {
    /// In force until expiration.
    Valid,
    /// Withdrawn by the authority.
    Revoked,
}

impl ClaimStatus {
    /// Stable string form.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Valid => "VALID",
            Self::Revoked => "REVOKED",
        }
    }
}

impl fmt::Display for ClaimStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An identity claim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdentityClaim {
    /// Claim identifier.
    pub reference: ClaimReference,
    /// Holder.
    pub user_id: UserId,
    /// Issuing authority.
    pub authority_id: String,
    /// Attribute kind, e.g. `"kyc"`.
    pub claim_type: String,
    /// Attribute value.
    pub claim_value: String,
    /// Authority signature over the claim. Opaque.
    pub signature: String,
    /// Valid strictly before this instant.
    pub expiration: Timestamp,
    /// Free-form metadata.
    #[serde(default)]
    pub metadata: Metadata,
    /// Revocation status.
    pub status: ClaimStatus,
    /// When the claim was recorded.
    pub issued_at: Timestamp,
}

impl IdentityClaim {
    /// Whether the claim is in force at `now`.
    pub fn is_valid_at(&self, now: Timestamp) -> bool {
        self.status == ClaimStatus::Valid && now < self.expiration
    }
}

// ─── Source ──────────────────────────────────────────────────────────

/// Where claims come from.
pub trait IdentityClaimSource: Send + Sync {
    /// A claim held by `user` that is valid at `now`, if any.
    fn find_valid_claim(&self, user: &UserId, now: Timestamp) -> Option<IdentityClaim>;

    /// Lookup by reference, regardless of validity.
    fn get_claim(&self, reference: &ClaimReference) -> Option<IdentityClaim>;
}

/// In-memory claim registry.
#[derive(Debug, Default)]
pub struct InMemoryClaimRegistry {
    claims: RwLock<HashMap<ClaimReference, IdentityClaim>>,
}

impl InMemoryClaimRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a new claim.
    ///
    /// # Errors
    ///
    /// [`NotaryError::InvalidInput`] if the reference is taken or the claim
    /// is not marked valid.
    pub fn issue(&self, claim: IdentityClaim) -> Result<(), NotaryError> {
        if claim.status != ClaimStatus::Valid {
            return Err(NotaryError::InvalidInput(
                "new claims must have status VALID".to_string(),
            ));
        }
        let mut claims = self.claims.write();
        if claims.contains_key(&claim.reference) {
            return Err(NotaryError::InvalidInput(format!(
                "claim {} already exists",
                claim.reference
            )));
        }
        tracing::info!(claim = %claim.reference, user = %claim.user_id, "identity claim issued");
        claims.insert(claim.reference.clone(), claim);
        Ok(())
    }

    /// Revoke a claim. Revoking twice is a no-op.
    ///
    /// # Errors
    ///
    /// [`NotaryError::NotFound`] for an unknown reference.
    pub fn revoke(&self, reference: &ClaimReference) -> Result<IdentityClaim, NotaryError> {
        let mut claims = self.claims.write();
        let claim = claims.get_mut(reference).ok_or_else(|| NotaryError::NotFound {
            kind: "claim",
            id: reference.to_string(),
        })?;
        if claim.status != ClaimStatus::Revoked {
            claim.status = ClaimStatus::Revoked;
            tracing::info!(claim = %reference, "identity claim revoked");
        }
        Ok(claim.clone())
    }

    /// Insert or replace a claim as-is. Used when hydrating from storage.
    pub fn restore(&self, claim: IdentityClaim) {
        self.claims.write().insert(claim.reference.clone(), claim);
    }

    /// Every claim held by `user`.
    pub fn list_for_user(&self, user: &UserId) -> Vec<IdentityClaim> {
        let mut out: Vec<IdentityClaim> = self
            .claims
            .read()
            .values()
            .filter(|c| &c.user_id == user)
            .cloned()
            .collect();
        out.sort_by(|a, b| a.issued_at.cmp(&b.issued_at));
        out
    }

    /// Number of claims.
    pub fn len(&self) -> usize {
        self.claims.read().len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl IdentityClaimSource for InMemoryClaimRegistry {
    fn find_valid_claim(&self, user: &UserId, now: Timestamp) -> Option<IdentityClaim> {
        self.claims
            .read()
            .values()
            .filter(|c| &c.user_id == user && c.is_valid_at(now))
            .max_by_key(|c| c.expiration)
            .cloned()
    }

    fn get_claim(&self, reference: &ClaimReference) -> Option<IdentityClaim> {
        self.claims.read().get(reference).cloned()
    }
}

// ─── Validator ───────────────────────────────────────────────────────

/// Decides whether identity evidence is currently acceptable.
#[derive(Clone)]
pub struct IdentityClaimValidator {
    source: Arc<dyn IdentityClaimSource>,
}

impl fmt::Debug for IdentityClaimValidator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IdentityClaimValidator").finish_non_exhaustive()
    }
}

impl IdentityClaimValidator {
    /// Validate against `source`.
    pub fn new(source: Arc<dyn IdentityClaimSource>) -> Self {
        Self { source }
    }

    /// Whether `user` holds a claim valid right now.
    pub fn is_valid(&self, user: &UserId) -> bool {
        self.is_valid_at(user, Timestamp::now())
    }

    /// Whether `user` holds a claim valid at `now`.
    pub fn is_valid_at(&self, user: &UserId, now: Timestamp) -> bool {
        self.source.find_valid_claim(user, now).is_some()
    }

    /// Whether `reference` names a claim held by `signer` and valid right now.
    pub fn is_claim_usable(&self, reference: &ClaimReference, signer: &UserId) -> bool {
        self.is_claim_usable_at(reference, signer, Timestamp::now())
    }

    /// Whether `reference` names a claim held by `signer` and valid at `now`.
    pub fn is_claim_usable_at(
        &self,
        reference: &ClaimReference,
        signer: &UserId,
        now: Timestamp,
    ) -> bool {
        self.source
            .get_claim(reference)
            .is_some_and(|c| &c.user_id == signer && c.is_valid_at(now))
    }
}
