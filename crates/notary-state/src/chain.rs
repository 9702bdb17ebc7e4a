//! # Version Chain
//!
//! A [`Document`] is an append-only chain of [`Version`]s linked by content
//! hash:
//!
//! ```text
//! v0 (root, parent = none) ◀── v1 ◀── v2 ◀── ... ◀── current
//! ```
//!
//! The chain never branches. Appends name the version they build on and
//! fail with `Conflict` when that is no longer current; a hash that already
//! exists anywhere in the chain fails with `DuplicateHash`, which also makes
//! retried appends of identical bytes safe.
//!
//! `Document` keeps its fields private so its invariants hold after
//! construction:
//!
//! - `versions` is non-empty and `root_hash == versions[0].hash`
//! - `current_version == versions.last().hash`
//! - `versions[i].parent_hash == versions[i - 1].hash` for `i > 0`
//! - every version requires exactly the document's signer set
//!
//! Stored or imported histories come back through [`Document::from_record`],
//! which re-verifies them.

use std::collections::{BTreeSet, HashSet};

use notary_anchor::{AnchorCommitment, AnchorKind, AnchorRef};
use notary_core::{content_hash, ContentDigest, NotaryError, Timestamp, UserId};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::approval::{ApprovalEvent, TerminalStatus, VersionStatus};
use crate::collector::{SignatureCandidate, SignatureCollector, SubmitOutcome};
use crate::version::{Metadata, Version};

/// Longest accepted title, in bytes.
pub const MAX_TITLE_LEN: usize = 512;

// ─── Errors ──────────────────────────────────────────────────────────

/// A broken chain invariant found by [`Document::verify_chain`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChainViolation {
    /// No versions at all.
    #[error("document has no versions")]
    Empty,

    /// Root hash differs from the first version's hash.
    #[error("root hash {root} does not match first version {first}")]
    RootMismatch {
        /// Declared root.
        root: String,
        /// First version's hash.
        first: String,
    },

    /// The first version has a parent.
    #[error("root version {0} has a parent")]
    RootHasParent(String),

    /// A version does not point at its predecessor.
    #[error("version {index} has parent {found:?}, expected {expected}")]
    BrokenLink {
        /// Position in the chain.
        index: usize,
        /// Predecessor hash.
        expected: String,
        /// Declared parent.
        found: Option<String>,
    },

    /// The same hash appears twice.
    #[error("version {0} appears more than once")]
    DuplicateVersion(String),

    /// `current_version` is not the last version.
    #[error("current version {current} is not the last version {last}")]
    CurrentMismatch {
        /// Declared current.
        current: String,
        /// Last version's hash.
        last: String,
    },

    /// A version's required signers differ from the document's signers.
    #[error("version {0} does not require the document signer set")]
    SignerSetMismatch(String),

    /// A signer appears twice on one version.
    #[error("version {version} has more than one signature by {signer}")]
    DuplicateSigner {
        /// Version hash.
        version: String,
        /// Signer.
        signer: String,
    },

    /// A signature by someone who is not a required signer.
    #[error("version {version} carries a signature by non-signer {signer}")]
    UnknownSigner {
        /// Version hash.
        version: String,
        /// Signer.
        signer: String,
    },

    /// Status disagrees with the signature count.
    #[error("version {version} is {status} with {signatures}/{required} signatures")]
    StatusMismatch {
        /// Version hash.
        version: String,
        /// Declared status.
        status: String,
        /// Signatures present.
        signatures: usize,
        /// Signatures required.
        required: usize,
    },
}

impl From<ChainViolation> for NotaryError {
    fn from(v: ChainViolation) -> Self {
        NotaryError::InvalidInput(v.to_string())
    }
}

// ─── Document ────────────────────────────────────────────────────────

/// Upload provenance of the root content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadInfo {
    /// Original file name.
    pub file_name: String,
    /// Size in bytes.
    pub file_size: u64,
    /// MIME type as reported by the uploader.
    pub mime_type: String,
}

/// Unchecked document shape, as stored or exported.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentRecord {
    /// Hash of the first version.
    pub root_hash: ContentDigest,
    /// Document title (the root version's title).
    pub title: String,
    /// Signer set fixed at creation.
    pub signers: BTreeSet<UserId>,
    /// Creator.
    pub creator_id: UserId,
    /// Creation time.
    pub created_at: Timestamp,
    /// Upload provenance.
    #[serde(default)]
    pub upload: Option<UploadInfo>,
    /// Versions, root first.
    pub versions: Vec<Version>,
    /// Hash of the last version.
    pub current_version: ContentDigest,
}

/// A document and its version chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "DocumentRecord")]
pub struct Document {
    root_hash: ContentDigest,
    title: String,
    signers: BTreeSet<UserId>,
    creator_id: UserId,
    created_at: Timestamp,
    upload: Option<UploadInfo>,
    versions: Vec<Version>,
    current_version: ContentDigest,
}

impl TryFrom<DocumentRecord> for Document {
    type Error = ChainViolation;

    fn try_from(record: DocumentRecord) -> Result<Self, Self::Error> {
        Self::from_record(record)
    }
}

impl From<Document> for DocumentRecord {
    fn from(d: Document) -> Self {
        Self {
            root_hash: d.root_hash,
            title: d.title,
            signers: d.signers,
            creator_id: d.creator_id,
            created_at: d.created_at,
            upload: d.upload,
            versions: d.versions,
            current_version: d.current_version,
        }
    }
}

impl Document {
    /// Rebuild a document from a stored record, verifying the chain.
    ///
    /// # Errors
    ///
    /// The first [`ChainViolation`] found.
    pub fn from_record(record: DocumentRecord) -> Result<Self, ChainViolation> {
        let doc = Self {
            root_hash: record.root_hash,
            title: record.title,
            signers: record.signers,
            creator_id: record.creator_id,
            created_at: record.created_at,
            upload: record.upload,
            versions: record.versions,
            current_version: record.current_version,
        };
        doc.verify_chain()?;
        Ok(doc)
    }

    /// Document identifier: the root version's hash.
    pub fn root_hash(&self) -> &ContentDigest {
        &self.root_hash
    }

    /// Title given at creation.
    pub fn title(&self) -> &str {
        &self.title
    }

    /// Signer set.
    pub fn signers(&self) -> &BTreeSet<UserId> {
        &self.signers
    }

    /// Creator.
    pub fn creator_id(&self) -> &UserId {
        &self.creator_id
    }

    /// Creation time.
    pub fn created_at(&self) -> Timestamp {
        self.created_at
    }

    /// Upload provenance, if recorded.
    pub fn upload(&self) -> Option<&UploadInfo> {
        self.upload.as_ref()
    }

    /// All versions, root first.
    pub fn versions(&self) -> &[Version] {
        &self.versions
    }

    /// Hash of the current version.
    pub fn current_hash(&self) -> &ContentDigest {
        &self.current_version
    }

    /// The current (last) version.
    pub fn current(&self) -> &Version {
        // `versions` is never empty once constructed.
        &self.versions[self.versions.len() - 1]
    }

    /// The version with `hash`, if it belongs to this document.
    pub fn version(&self, hash: &ContentDigest) -> Option<&Version> {
        self.versions.iter().find(|v| &v.hash == hash)
    }

    /// Whether `hash` is a version of this document.
    pub fn contains(&self, hash: &ContentDigest) -> bool {
        self.version(hash).is_some()
    }

    fn version_mut(&mut self, hash: &ContentDigest) -> Result<&mut Version, NotaryError> {
        self.versions
            .iter_mut()
            .find(|v| &v.hash == hash)
            .ok_or_else(|| NotaryError::version_not_found(hash))
    }

    /// Append `version` as the new current version.
    ///
    /// With `expected_current`, the append only succeeds if that is still the
    /// current version (optimistic concurrency). The version's parent must be
    /// the current version in any case.
    ///
    /// # Errors
    ///
    /// `Conflict` when the chain moved on, `DuplicateHash` when the hash is
    /// already present, `InvalidInput` when the signer set differs.
    pub fn push_version(
        &mut self,
        version: Version,
        expected_current: Option<&ContentDigest>,
    ) -> Result<(), NotaryError> {
        let current = self.current_version;
        if let Some(expected) = expected_current {
            if expected != &current {
                return Err(NotaryError::Conflict {
                    expected: expected.to_hex(),
                    actual: current.to_hex(),
                });
            }
        }
        if self.contains(&version.hash) {
            return Err(NotaryError::DuplicateHash(version.hash.to_hex()));
        }
        match version.parent_hash {
            Some(parent) if parent == current => {}
            other => {
                return Err(NotaryError::Conflict {
                    expected: other.map(|p| p.to_hex()).unwrap_or_default(),
                    actual: current.to_hex(),
                })
            }
        }
        if version.required_signers != self.signers {
            return Err(NotaryError::InvalidInput(
                "version signers must equal the document signer set".to_string(),
            ));
        }
        self.current_version = version.hash;
        self.versions.push(version);
        Ok(())
    }

    /// Run `collector` on version `hash`. The caller holds exclusive
    /// access to the document for the duration, which makes the submission
    /// atomic.
    ///
    /// # Errors
    ///
    /// `NotFound` for an unknown version, otherwise whatever the collector
    /// returns.
    pub fn collect_signature(
        &mut self,
        hash: &ContentDigest,
        candidate: SignatureCandidate,
        collector: &SignatureCollector<'_>,
        now: Timestamp,
    ) -> Result<SubmitOutcome, NotaryError> {
        let version = self.version_mut(hash)?;
        collector.submit_at(version, candidate, now)
    }

    /// Transition version `hash` to `target`.
    ///
    /// # Errors
    ///
    /// `NotFound` or `InvalidTransition`.
    pub fn transition_version(
        &mut self,
        hash: &ContentDigest,
        target: TerminalStatus,
        reason: &str,
        actor: Option<UserId>,
    ) -> Result<ApprovalEvent, NotaryError> {
        self.version_mut(hash)?.transition(target, reason, actor)
    }

    /// Attach the ledger reference for an anchored commitment to the
    /// matching version or signature. Returns `true` if a reference was
    /// newly stored; existing references are never replaced.
    pub fn attach_anchor(&mut self, commitment: &AnchorCommitment, anchor: AnchorRef) -> bool {
        let Ok(version) = self.version_mut(&commitment.subject) else {
            return false;
        };
        match (commitment.kind, &commitment.signer) {
            (AnchorKind::DocumentCreated | AnchorKind::VersionAppended, _) => {
                version.attach_anchor(anchor)
            }
            (AnchorKind::SignatureAccepted, Some(signer)) => {
                version.attach_signature_anchor(signer, anchor)
            }
            (
                AnchorKind::VersionApproved | AnchorKind::VersionRejected | AnchorKind::VersionExpired,
                _,
            ) => {
                match version
                    .transitions
                    .iter_mut()
                    .find(|t| t.to.as_str() == commitment.status)
                {
                    Some(record) if record.anchor_ref.is_none() => {
                        record.anchor_ref = Some(anchor);
                        true
                    }
                    _ => false,
                }
            }
            (AnchorKind::SignatureAccepted, None) => false,
        }
    }

    /// Commitments for every event in this document that has no ledger
    /// reference yet, in chain order.
    pub fn unanchored_commitments(&self) -> Vec<AnchorCommitment> {
        let root = self.root_hash;
        let mut out = Vec::new();
        for version in &self.versions {
            if version.anchor_ref.is_none() {
                out.push(version_commitment(root, version));
            }
            for sig in version.signatures.iter().filter(|s| s.anchor_ref.is_none()) {
                if let Some(c) = signature_commitment(root, version, &sig.signer_id) {
                    out.push(c);
                }
            }
            for record in version.transitions.iter().filter(|t| t.anchor_ref.is_none()) {
                if let Some(c) = record.commitment(root, version.hash) {
                    out.push(c);
                }
            }
        }
        out
    }

    /// Check every chain invariant.
    ///
    /// # Errors
    ///
    /// The first [`ChainViolation`] found.
    pub fn verify_chain(&self) -> Result<(), ChainViolation> {
        verify_versions(
            &self.root_hash,
            &self.current_version,
            &self.signers,
            &self.versions,
        )
    }
}

/// Check chain invariants over a raw version list.
///
/// # Errors
///
/// The first [`ChainViolation`] found.
pub fn verify_versions(
    root: &ContentDigest,
    current: &ContentDigest,
    signers: &BTreeSet<UserId>,
    versions: &[Version],
) -> Result<(), ChainViolation> {
    let (first, last) = match (versions.first(), versions.last()) {
        (Some(f), Some(l)) => (f, l),
        _ => return Err(ChainViolation::Empty),
    };
    if &first.hash != root {
        return Err(ChainViolation::RootMismatch {
            root: root.to_hex(),
            first: first.hash.to_hex(),
        });
    }
    if first.parent_hash.is_some() {
        return Err(ChainViolation::RootHasParent(first.hash.to_hex()));
    }
    if &last.hash != current {
        return Err(ChainViolation::CurrentMismatch {
            current: current.to_hex(),
            last: last.hash.to_hex(),
        });
    }

    let mut seen = HashSet::new();
    for (index, version) in versions.iter().enumerate() {
        if !seen.insert(version.hash) {
            return Err(ChainViolation::DuplicateVersion(version.hash.to_hex()));
        }
        if index > 0 {
            let expected = versions[index - 1].hash;
            if version.parent_hash != Some(expected) {
                return Err(ChainViolation::BrokenLink {
                    index,
                    expected: expected.to_hex(),
                    found: version.parent_hash.map(|p| p.to_hex()),
                });
            }
        }
        if &version.required_signers != signers {
            return Err(ChainViolation::SignerSetMismatch(version.hash.to_hex()));
        }
        verify_signatures(version)?;
    }
    Ok(())
}

fn verify_signatures(version: &Version) -> Result<(), ChainViolation> {
    let mut signed = HashSet::new();
    for sig in &version.signatures {
        if !version.required_signers.contains(&sig.signer_id) {
            return Err(ChainViolation::UnknownSigner {
                version: version.hash.to_hex(),
                signer: sig.signer_id.to_string(),
            });
        }
        if !signed.insert(&sig.signer_id) {
            return Err(ChainViolation::DuplicateSigner {
                version: version.hash.to_hex(),
                signer: sig.signer_id.to_string(),
            });
        }
    }
    if version.is_complete() != (version.status == VersionStatus::Approved) {
        return Err(ChainViolation::StatusMismatch {
            version: version.hash.to_hex(),
            status: version.status.to_string(),
            signatures: version.signatures.len(),
            required: version.required_signers.len(),
        });
    }
    Ok(())
}

// ─── Chain Operations ────────────────────────────────────────────────

/// Constructs versions and documents.
#[derive(Debug, Clone, Copy, Default)]
pub struct VersionChain;

impl VersionChain {
    /// Build a root version.
    ///
    /// # Errors
    ///
    /// `InvalidInput` for an empty signer set, empty content or a bad
    /// title.
    pub fn create_root(
        bytes: &[u8],
        title: &str,
        signers: BTreeSet<UserId>,
        metadata: Metadata,
        creator: UserId,
    ) -> Result<Version, NotaryError> {
        if signers.is_empty() {
            return Err(NotaryError::InvalidInput(
                "signer set must not be empty".to_string(),
            ));
        }
        Self::build(bytes, title, None, signers, metadata, creator)
    }

    /// Build a new document around its root version.
    ///
    /// # Errors
    ///
    /// As [`create_root`](Self::create_root).
    pub fn create_document(
        creator: UserId,
        bytes: &[u8],
        title: &str,
        signers: BTreeSet<UserId>,
        metadata: Metadata,
        upload: Option<UploadInfo>,
    ) -> Result<Document, NotaryError> {
        let root = Self::create_root(bytes, title, signers.clone(), metadata, creator.clone())?;
        Ok(Document {
            root_hash: root.hash,
            title: root.title.clone(),
            signers,
            creator_id: creator,
            created_at: root.created_at,
            upload,
            current_version: root.hash,
            versions: vec![root],
        })
    }

    /// Build the next version of `document`. Does not modify the document;
    /// pair with [`Document::push_version`].
    ///
    /// # Errors
    ///
    /// `Unauthorized` if `actor` is not a document signer, `DuplicateHash`
    /// if the content is already in the chain, `InvalidInput` for empty
    /// content or a bad title.
    pub fn append_version(
        document: &Document,
        bytes: &[u8],
        title: &str,
        metadata: Metadata,
        actor: &UserId,
    ) -> Result<Version, NotaryError> {
        if !document.signers.contains(actor) {
            return Err(NotaryError::Unauthorized(format!(
                "{actor} is not a signer of document {}",
                document.root_hash.short()
            )));
        }
        let hash = content_hash(bytes);
        if document.contains(&hash) {
            return Err(NotaryError::DuplicateHash(hash.to_hex()));
        }
        Self::build(
            bytes,
            title,
            Some(*document.current_hash()),
            document.signers.clone(),
            metadata,
            actor.clone(),
        )
    }

    fn build(
        bytes: &[u8],
        title: &str,
        parent_hash: Option<ContentDigest>,
        required_signers: BTreeSet<UserId>,
        metadata: Metadata,
        creator: UserId,
    ) -> Result<Version, NotaryError> {
        if bytes.is_empty() {
            return Err(NotaryError::InvalidInput("content must not be empty".to_string()));
        }
        if title.trim().is_empty() || title.len() > MAX_TITLE_LEN {
            return Err(NotaryError::InvalidInput(format!(
                "title must be 1-{MAX_TITLE_LEN} bytes and not blank"
            )));
        }
        Ok(Version {
            hash: content_hash(bytes),
            parent_hash,
            title: title.to_string(),
            metadata,
            creator_id: creator,
            created_at: Timestamp::now(),
            required_signers,
            signatures: Vec::new(),
            status: VersionStatus::Pending,
            transitions: Vec::new(),
            anchor_ref: None,
        })
    }
}

/// Ledger commitment for the creation of `version` in document `root`.
pub fn version_commitment(root: ContentDigest, version: &Version) -> AnchorCommitment {
    AnchorCommitment {
        document: root,
        subject: version.hash,
        parent: version.parent_hash,
        kind: if version.is_root() {
            AnchorKind::DocumentCreated
        } else {
            AnchorKind::VersionAppended
        },
        signer: None,
        status: version.status.to_string(),
        occurred_at: version.created_at,
    }
}

/// Ledger commitment for `signer`'s signature on `version`.
pub fn signature_commitment(
    root: ContentDigest,
    version: &Version,
    signer: &UserId,
) -> Option<AnchorCommitment> {
    let sig = version.signature_of(signer)?;
    Some(AnchorCommitment {
        document: root,
        subject: version.hash,
        parent: None,
        kind: AnchorKind::SignatureAccepted,
        signer: Some(sig.signer_id.clone()),
        status: version.status.to_string(),
        occurred_at: sig.timestamp,
    })
}

// ─── Tests ───────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn user(s: &str) -> UserId {
        UserId::new(s).unwrap()
    }

    fn signers(names: &[&str]) -> BTreeSet<UserId> {
        names.iter().map(|n| user(n)).collect()
    }

    fn doc() -> Document {
        VersionChain::create_document(
            user("a"),
            b"v0",
            "Contract",
            signers(&["a", "b"]),
            Metadata::new(),
            None,
        )
        .unwrap()
    }

    #[test]
    fn root_version_shape() {
        let d = doc();
        assert_eq!(d.root_hash(), &content_hash(b"v0"));
        assert_eq!(d.current_hash(), d.root_hash());
        assert!(d.current().is_root());
        assert_eq!(d.current().status, VersionStatus::Pending);
        assert_eq!(d.current().required_signers, signers(&["a", "b"]));
        assert!(d.verify_chain().is_ok());
    }

    #[test]
    fn empty_signer_set_is_invalid() {
        let err =
            VersionChain::create_root(b"x", "t", BTreeSet::new(), Metadata::new(), user("a"))
                .unwrap_err();
        assert!(matches!(err, NotaryError::InvalidInput(_)));
    }

    #[test]
    fn empty_content_and_blank_title_are_invalid() {
        let root = |bytes: &[u8], title: &str| {
            VersionChain::create_root(bytes, title, signers(&["a"]), Metadata::new(), user("a"))
        };
        assert!(root(b"", "t").is_err());
        assert!(root(b"x", "  ").is_err());
        assert!(root(b"x", &"t".repeat(MAX_TITLE_LEN + 1)).is_err());
        assert!(root(b"x", "t").is_ok());
    }

    #[test]
    fn append_links_to_current_and_inherits_signers() {
        let mut d = doc();
        for (i, body) in [&b"v1"[..], &b"v2"[..], &b"v3"[..]].into_iter().enumerate() {
            let title = format!("rev {i}");
            let v = VersionChain::append_version(&d, body, &title, Metadata::new(), &user("b"))
                .unwrap();
            assert_eq!(v.parent_hash, Some(*d.current_hash()));
            assert_eq!(v.required_signers, *d.signers());
            d.push_version(v, None).unwrap();
        }
        assert_eq!(d.versions().len(), 4);
        assert!(d.versions()[0].parent_hash.is_none());
        for w in d.versions().windows(2) {
            assert_eq!(w[1].parent_hash, Some(w[0].hash));
        }
        assert!(d.verify_chain().is_ok());
    }

    #[test]
    fn non_signer_cannot_append() {
        let d = doc();
        let err = VersionChain::append_version(&d, b"v1", "t", Metadata::new(), &user("mallory"))
            .unwrap_err();
        assert!(matches!(err, NotaryError::Unauthorized(_)));
    }

    #[test]
    fn duplicate_content_is_rejected_anywhere_in_chain() {
        let mut d = doc();
        let v1 = VersionChain::append_version(&d, b"v1", "t", Metadata::new(), &user("a")).unwrap();
        d.push_version(v1, None).unwrap();
        let err =
            VersionChain::append_version(&d, b"v0", "t", Metadata::new(), &user("a")).unwrap_err();
        assert!(matches!(err, NotaryError::DuplicateHash(_)));
    }

    #[test]
    fn identical_content_hashes_identically_regardless_of_metadata() {
        let mut meta = Metadata::new();
        meta.insert("note".into(), serde_json::json!("different"));
        let a = VersionChain::create_root(b"same", "Title A", signers(&["a"]), Metadata::new(), user("a"))
            .unwrap();
        let b = VersionChain::create_root(b"same", "Title B", signers(&["a"]), meta, user("a"))
            .unwrap();
        assert_eq!(a.hash, b.hash);
    }

    #[test]
    fn stale_expected_current_conflicts_and_leaves_document_unchanged() {
        let mut d = doc();
        let root = *d.root_hash();
        let v1 = VersionChain::append_version(&d, b"v1", "t", Metadata::new(), &user("a")).unwrap();
        d.push_version(v1, Some(&root)).unwrap();

        let before = d.clone();
        let v2 = VersionChain::append_version(&d, b"v2", "t", Metadata::new(), &user("a")).unwrap();
        let err = d.push_version(v2, Some(&root)).unwrap_err();
        assert!(matches!(err, NotaryError::Conflict { .. }));
        assert_eq!(d, before);
    }

    #[test]
    fn version_built_on_old_parent_conflicts() {
        let mut d = doc();
        let stale =
            VersionChain::append_version(&d, b"v1a", "t", Metadata::new(), &user("a")).unwrap();
        let winner =
            VersionChain::append_version(&d, b"v1b", "t", Metadata::new(), &user("b")).unwrap();
        d.push_version(winner, None).unwrap();
        assert!(matches!(d.push_version(stale, None), Err(NotaryError::Conflict { .. })));
        assert_eq!(d.versions().len(), 2);
    }

    #[test]
    fn record_round_trip_verifies() {
        let d = doc();
        let json = serde_json::to_string(&d).unwrap();
        let back: Document = serde_json::from_str(&json).unwrap();
        assert_eq!(back, d);
    }

    #[test]
    fn tampered_record_is_rejected() {
        let mut record = DocumentRecord::from(doc());
        record.versions[0].parent_hash = Some(content_hash(b"elsewhere"));
        assert!(matches!(
            Document::from_record(record),
            Err(ChainViolation::RootHasParent(_))
        ));

        let mut record = DocumentRecord::from(doc());
        record.versions[0].status = VersionStatus::Approved;
        assert!(matches!(
            Document::from_record(record),
            Err(ChainViolation::StatusMismatch { .. })
        ));

        let mut record = DocumentRecord::from(doc());
        record.current_version = content_hash(b"nope");
        assert!(matches!(
            Document::from_record(record),
            Err(ChainViolation::CurrentMismatch { .. })
        ));
    }

    #[test]
    fn commitments_describe_the_event() {
        let mut d = doc();
        let root = *d.root_hash();
        let c = version_commitment(root, d.current());
        assert_eq!(c.kind, AnchorKind::DocumentCreated);
        let v1 = VersionChain::append_version(&d, b"v1", "t", Metadata::new(), &user("a")).unwrap();
        d.push_version(v1, None).unwrap();
        let c = version_commitment(root, d.current());
        assert_eq!(c.kind, AnchorKind::VersionAppended);
        assert_eq!(c.parent, Some(root));
        assert!(signature_commitment(root, d.current(), &user("a")).is_none());
    }

    fn anchor(seq: u64) -> AnchorRef {
        AnchorRef {
            network: "local".into(),
            transaction_id: format!("tx-{seq}"),
            sequence: seq,
            label: "doc:x".into(),
            payload_digest: content_hash(b"p"),
            anchored_at: Timestamp::now(),
        }
    }

    #[test]
    fn unanchored_events_shrink_as_anchors_attach() {
        let mut d = doc();
        let root = *d.root_hash();
        d.transition_version(&root, TerminalStatus::Rejected, "no", Some(user("b")))
            .unwrap();

        let pending = d.unanchored_commitments();
        assert_eq!(pending.len(), 2);
        assert_eq!(pending[0].kind, AnchorKind::DocumentCreated);
        assert_eq!(pending[1].kind, AnchorKind::VersionRejected);

        assert!(d.attach_anchor(&pending[0], anchor(1)));
        assert!(d.attach_anchor(&pending[1], anchor(2)));
        assert!(!d.attach_anchor(&pending[1], anchor(3)));
        assert!(d.unanchored_commitments().is_empty());
        assert_eq!(
            d.current().transitions[0].anchor_ref.as_ref().unwrap().sequence,
            2
        );
    }

    #[test]
    fn anchor_for_unknown_version_is_ignored() {
        let mut d = doc();
        let mut c = version_commitment(*d.root_hash(), d.current());
        c.subject = content_hash(b"elsewhere");
        assert!(!d.attach_anchor(&c, anchor(1)));
    }
}
