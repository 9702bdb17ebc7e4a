//! # Versions and Signatures
//!
//! A [`Version`] is one content-addressed revision of a document. Its hash
//! is the SHA-256 of the payload bytes and nothing else; title and metadata
//! are descriptive.
//!
//! Mutation after creation is limited to three things: appending a
//! [`Signature`] (see `collector.rs`), a status transition (see
//! `approval.rs`), and attaching ledger proof references, which are
//! write-once.

use std::collections::BTreeSet;

use notary_anchor::AnchorRef;
use notary_core::{ClaimReference, ContentDigest, Timestamp, UserId};
use serde::{Deserialize, Serialize};

use crate::approval::{StatusTransitionRecord, VersionStatus};

/// Caller-supplied descriptive metadata. Never hashed.
pub type Metadata = serde_json::Map<String, serde_json::Value>;

/// A signature collected on a version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signature {
    /// Who signed.
    pub signer_id: UserId,
    /// When the signature was accepted.
    pub timestamp: Timestamp,
    /// Opaque signature blob. Verification is delegated elsewhere.
    pub signature_data: String,
    /// Identity claim presented as evidence.
    pub claim_reference: ClaimReference,
    /// Ledger proof of the signature, once anchored.
    #[serde(default)]
    pub anchor_ref: Option<AnchorRef>,
}

impl Signature {
    /// Attach a ledger reference. Returns `false` if one is already set;
    /// the existing reference is kept.
    pub fn attach_anchor(&mut self, anchor: AnchorRef) -> bool {
        if self.anchor_ref.is_some() {
            return false;
        }
        self.anchor_ref = Some(anchor);
        true
    }
}

/// One revision of a document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Version {
    /// Content hash of the payload bytes.
    pub hash: ContentDigest,
    /// Hash of the preceding version; `None` for the root.
    pub parent_hash: Option<ContentDigest>,
    /// Human-readable title.
    pub title: String,
    /// Descriptive metadata.
    #[serde(default)]
    pub metadata: Metadata,
    /// Who created this version.
    pub creator_id: UserId,
    /// When this version was created.
    pub created_at: Timestamp,
    /// Parties that must sign. Fixed at creation.
    pub required_signers: BTreeSet<UserId>,
    /// Collected signatures, in acceptance order.
    #[serde(default)]
    pub signatures: Vec<Signature>,
    /// Approval status.
    pub status: VersionStatus,
    /// Status change log.
    #[serde(default)]
    pub transitions: Vec<StatusTransitionRecord>,
    /// Ledger proof of the version commitment, once anchored.
    #[serde(default)]
    pub anchor_ref: Option<AnchorRef>,
}

impl Version {
    /// Whether this is the root of its chain.
    pub fn is_root(&self) -> bool {
        self.parent_hash.is_none()
    }

    /// Whether `signer` has already signed.
    pub fn has_signed(&self, signer: &UserId) -> bool {
        self.signatures.iter().any(|s| &s.signer_id == signer)
    }

    /// The signature by `signer`, if any.
    pub fn signature_of(&self, signer: &UserId) -> Option<&Signature> {
        self.signatures.iter().find(|s| &s.signer_id == signer)
    }

    /// Whether every required signer has signed.
    pub fn is_complete(&self) -> bool {
        self.signatures.len() == self.required_signers.len()
    }

    /// Required signers who have not signed yet.
    pub fn missing_signers(&self) -> Vec<&UserId> {
        self.required_signers
            .iter()
            .filter(|u| !self.has_signed(u))
            .collect()
    }

    /// Attach the version's ledger reference. Returns `false` if one is
    /// already set.
    pub fn attach_anchor(&mut self, anchor: AnchorRef) -> bool {
        if self.anchor_ref.is_some() {
            return false;
        }
        self.anchor_ref = Some(anchor);
        true
    }

    /// Attach a ledger reference to `signer`'s signature. Returns `false`
    /// if there is no such signature or it is already anchored.
    pub fn attach_signature_anchor(&mut self, signer: &UserId, anchor: AnchorRef) -> bool {
        self.signatures
            .iter_mut()
            .find(|s| &s.signer_id == signer)
            .is_some_and(|s| s.attach_anchor(anchor))
    }
}
