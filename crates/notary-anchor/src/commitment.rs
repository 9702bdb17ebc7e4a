//! # Anchor Commitments
//!
//! An [`AnchorCommitment`] is what the notary writes to the ledger for one
//! event: the document root, the subject hash (version or root), the event
//! kind, the signer when there is one, and the resulting status.
//!
//! The payload is produced through [`CanonicalBytes`] so the same event
//! always yields the same bytes. The ledger label is `doc:{root hex}` so
//! `LedgerAnchor::history(root)` finds every event for a document.
//!
//! [`AnchorKey`] identifies an event independently of its timestamp. The
//! journal deduplicates on it, which makes repeated submission idempotent.

use std::fmt;

use notary_core::{CanonicalBytes, CanonicalizationError, ContentDigest, Timestamp, UserId};
use serde::{Deserialize, Serialize};

/// Kind of event being anchored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnchorKind {
    /// Root version of a new document.
    DocumentCreated,
    /// A later version appended to the chain.
    VersionAppended,
    /// A signature accepted on a version.
    SignatureAccepted,
    /// Version reached full approval.
    VersionApproved,
    /// Version was rejected.
    VersionRejected,
    /// Version expired.
    VersionExpired,
}

impl AnchorKind {
    /// Stable string form, used in labels and the database.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DocumentCreated => "document_created",
            Self::VersionAppended => "version_appended",
            Self::SignatureAccepted => "signature_accepted",
            Self::VersionApproved => "version_approved",
            Self::VersionRejected => "version_rejected",
            Self::VersionExpired => "version_expired",
        }
    }
}

impl fmt::Display for AnchorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity of an anchored event. At most one anchor is recorded per key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AnchorKey {
    /// Version hash, or the root hash for document-level events.
    pub subject: ContentDigest,
    /// Event kind.
    pub kind: AnchorKind,
    /// Signer, for signature events.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signer: Option<UserId>,
}

impl fmt::Display for AnchorKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind, self.subject.short())?;
        if let Some(signer) = &self.signer {
            write!(f, ":{signer}")?;
        }
        Ok(())
    }
}

/// One event submitted to the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnchorCommitment {
    /// Root hash of the document the event belongs to.
    pub document: ContentDigest,
    /// Version hash (or root hash for document creation).
    pub subject: ContentDigest,
    /// Parent version hash, for appended versions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<ContentDigest>,
    /// Event kind.
    pub kind: AnchorKind,
    /// Signer, for signature events.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signer: Option<UserId>,
    /// Version status after the event (`PENDING`, `APPROVED`, ...).
    pub status: String,
    /// When the event was committed locally.
    pub occurred_at: Timestamp,
}

impl AnchorCommitment {
    /// Deduplication key for this event.
    pub fn key(&self) -> AnchorKey {
        AnchorKey {
            subject: self.subject,
            kind: self.kind,
            signer: self.signer.clone(),
        }
    }

    /// Ledger label.
    pub fn label(&self) -> String {
        document_label(&self.document)
    }

    /// Canonical payload bytes submitted to the ledger.
    ///
    /// # Errors
    ///
    /// Propagates [`CanonicalizationError`]; commitments carry no floats, so
    /// this only fails if serialization itself fails.
    pub fn payload(&self) -> Result<Vec<u8>, CanonicalizationError> {
        Ok(CanonicalBytes::new(self)?.into_vec())
    }
}

/// Ledger label for every event of the document rooted at `root`.
pub fn document_label(root: &ContentDigest) -> String {
    format!("doc:{}", root.to_hex())
}

#[cfg(test)]
mod tests {
    use super::*;
    use notary_core::content_hash;

    fn commitment(kind: AnchorKind, signer: Option<&str>) -> AnchorCommitment {
        let root = content_hash(b"root");
        AnchorCommitment {
            document: root,
            subject: root,
            parent: None,
            kind,
            signer: signer.map(|s| UserId::new(s).unwrap()),
            status: "PENDING".to_string(),
            occurred_at: Timestamp::parse("2026-01-15T12:00:00Z").unwrap(),
        }
    }

    #[test]
    fn payload_is_deterministic_and_sorted() {
        let c = commitment(AnchorKind::SignatureAccepted, Some("alice"));
        let a = c.payload().unwrap();
        let b = c.clone().payload().unwrap();
        assert_eq!(a, b);
        let text = String::from_utf8(a).unwrap();
        let doc_pos = text.find("\"document\"").unwrap();
        let status_pos = text.find("\"status\"").unwrap();
        assert!(doc_pos < status_pos);
        assert!(text.contains("\"kind\":\"signature_accepted\""));
    }

    #[test]
    fn key_ignores_timestamp() {
        let a = commitment(AnchorKind::SignatureAccepted, Some("alice"));
        let mut b = a.clone();
        b.occurred_at = b.occurred_at.plus_secs(60);
        assert_eq!(a.key(), b.key());
    }

    #[test]
    fn key_distinguishes_signers_and_kinds() {
        let alice = commitment(AnchorKind::SignatureAccepted, Some("alice"));
        let bob = commitment(AnchorKind::SignatureAccepted, Some("bob"));
        let approved = commitment(AnchorKind::VersionApproved, None);
        assert_ne!(alice.key(), bob.key());
        assert_ne!(alice.key(), approved.key());
    }

    #[test]
    fn label_names_the_root() {
        let c = commitment(AnchorKind::DocumentCreated, None);
        assert_eq!(c.label(), format!("doc:{}", content_hash(b"root").to_hex()));
    }

    #[test]
    fn absent_signer_is_omitted_from_payload() {
        let c = commitment(AnchorKind::DocumentCreated, None);
        let text = String::from_utf8(c.payload().unwrap()).unwrap();
        assert!(!text.contains("signer"));
        assert!(!text.contains("parent"));
    }
}
