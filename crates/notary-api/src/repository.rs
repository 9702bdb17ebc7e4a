//! # Document Repository
//!
//! Storage seam for documents. [`InMemoryRepository`] is the authoritative
//! store: every document sits behind its own `parking_lot::Mutex`, and the
//! operations that must be atomic (signature append plus approval, version
//! append with compare-and-swap on the current version) run entirely under
//! that lock. Postgres, when configured, is a write-through copy driven by
//! the service after each committed mutation.
//!
//! A per-user index maps each creator and required signer to the documents
//! they are part of. Signer sets are fixed at creation, so the index only
//! grows on create and restore.
//!
//! ## Lock Order
//!
//! `documents` (read, released) → document mutex → `version_index` (write).
//! Creation takes `version_index` (write) → `documents` (write) →
//! `user_index` (write) and never holds a document mutex. No lock is held
//! across an `.await`.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use notary_anchor::{AnchorCommitment, AnchorRef};
use notary_core::{ContentDigest, NotaryError, Timestamp, UserId};
use notary_state::{
    ApprovalEvent, Document, SignatureCandidate, SignatureCollector, SubmitOutcome,
    TerminalStatus, Version,
};
use parking_lot::{Mutex, RwLock};

/// Result of an atomic signature submission.
#[derive(Debug, Clone)]
pub struct SignatureReceipt {
    /// Document the version belongs to.
    pub root: ContentDigest,
    /// What the collector decided.
    pub outcome: SubmitOutcome,
    /// The version as committed, including the new signature.
    pub version: Version,
}

/// Result of a status transition.
#[derive(Debug, Clone)]
pub struct TransitionReceipt {
    /// Document the version belongs to.
    pub root: ContentDigest,
    /// The transition.
    pub event: ApprovalEvent,
    /// The version as committed.
    pub version: Version,
}

/// Document storage.
///
/// All methods are synchronous; implementations must not block on I/O
/// while holding a lock.
pub trait DocumentRepository: Send + Sync {
    /// Snapshot of a document.
    fn get_document(&self, root: &ContentDigest) -> Result<Document, NotaryError>;

    /// A version and the root of the document holding it.
    fn find_version(&self, hash: &ContentDigest) -> Result<(ContentDigest, Version), NotaryError>;

    /// Store a new document.
    ///
    /// # Errors
    ///
    /// `DuplicateHash` if the root hash is already a version anywhere.
    fn create_document(&self, document: Document) -> Result<(), NotaryError>;

    /// Append `version` to document `root`.
    ///
    /// # Errors
    ///
    /// `NotFound`, `Conflict` when `expected_current` (or the version's
    /// parent) is no longer current, `DuplicateHash` when the hash exists
    /// anywhere in the system.
    fn append_version(
        &self,
        root: &ContentDigest,
        expected_current: Option<&ContentDigest>,
        version: Version,
    ) -> Result<Version, NotaryError>;

    /// Run the collector on version `version_hash` under the document lock.
    /// Duplicate check, append, completion and approval form one unit.
    fn append_signature_and_maybe_transition(
        &self,
        version_hash: &ContentDigest,
        candidate: SignatureCandidate,
        collector: &SignatureCollector<'_>,
    ) -> Result<SignatureReceipt, NotaryError>;

    /// Move version `version_hash` to a terminal status.
    fn transition_version(
        &self,
        version_hash: &ContentDigest,
        target: TerminalStatus,
        reason: &str,
        actor: Option<UserId>,
    ) -> Result<TransitionReceipt, NotaryError>;

    /// Store the ledger reference for an anchored commitment. Returns
    /// `true` if it was newly attached.
    fn attach_anchor(
        &self,
        commitment: &AnchorCommitment,
        anchor: AnchorRef,
    ) -> Result<bool, NotaryError>;

    /// Roots of every document `user` created or must sign.
    fn documents_for_user(&self, user: &UserId) -> Vec<ContentDigest>;
}

// ─── In-Memory Repository ────────────────────────────────────────────

/// Per-document-locked in-memory store.
#[derive(Debug, Default)]
pub struct InMemoryRepository {
    documents: RwLock<HashMap<ContentDigest, Arc<Mutex<Document>>>>,
    /// Every version hash in the system → its document root.
    version_index: RwLock<HashMap<ContentDigest, ContentDigest>>,
    /// Creator and signers → documents they are part of.
    user_index: RwLock<HashMap<UserId, BTreeSet<ContentDigest>>>,
}

impl InMemoryRepository {
    /// Create an empty repository.
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self, root: &ContentDigest) -> Result<Arc<Mutex<Document>>, NotaryError> {
        self.documents
            .read()
            .get(root)
            .cloned()
            .ok_or_else(|| NotaryError::document_not_found(root))
    }

    fn root_of(&self, version: &ContentDigest) -> Result<ContentDigest, NotaryError> {
        self.version_index
            .read()
            .get(version)
            .copied()
            .ok_or_else(|| NotaryError::version_not_found(version))
    }

    fn index_participants(&self, document: &Document) {
        let root = *document.root_hash();
        let mut users = self.user_index.write();
        for user in document.signers().iter().chain([document.creator_id()]) {
            users.entry(user.clone()).or_default().insert(root);
        }
    }

    /// Insert a document loaded from storage, replacing any in-memory copy.
    pub fn restore(&self, document: Document) {
        let root = *document.root_hash();
        {
            let mut index = self.version_index.write();
            for v in document.versions() {
                index.insert(v.hash, root);
            }
        }
        self.index_participants(&document);
        self.documents
            .write()
            .insert(root, Arc::new(Mutex::new(document)));
    }

    /// Snapshot of every document.
    pub fn list(&self) -> Vec<Document> {
        let slots: Vec<_> = self.documents.read().values().cloned().collect();
        slots.iter().map(|s| s.lock().clone()).collect()
    }

    /// Number of documents.
    pub fn len(&self) -> usize {
        self.documents.read().len()
    }

    /// Whether the repository is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl DocumentRepository for InMemoryRepository {
    fn get_document(&self, root: &ContentDigest) -> Result<Document, NotaryError> {
        Ok(self.slot(root)?.lock().clone())
    }

    fn find_version(&self, hash: &ContentDigest) -> Result<(ContentDigest, Version), NotaryError> {
        let root = self.root_of(hash)?;
        let slot = self.slot(&root)?;
        let doc = slot.lock();
        let version = doc
            .version(hash)
            .cloned()
            .ok_or_else(|| NotaryError::version_not_found(hash))?;
        Ok((root, version))
    }

    fn create_document(&self, document: Document) -> Result<(), NotaryError> {
        let root = *document.root_hash();
        let mut index = self.version_index.write();
        if index.contains_key(&root) {
            return Err(NotaryError::DuplicateHash(root.to_hex()));
        }
        index.insert(root, root);
        let mut documents = self.documents.write();
        self.index_participants(&document);
        documents.insert(root, Arc::new(Mutex::new(document)));
        Ok(())
    }

    fn append_version(
        &self,
        root: &ContentDigest,
        expected_current: Option<&ContentDigest>,
        version: Version,
    ) -> Result<Version, NotaryError> {
        let slot = self.slot(root)?;
        let mut doc = slot.lock();
        let mut index = self.version_index.write();
        if index.contains_key(&version.hash) && !doc.contains(&version.hash) {
            return Err(NotaryError::DuplicateHash(version.hash.to_hex()));
        }
        let hash = version.hash;
        doc.push_version(version, expected_current)?;
        index.insert(hash, *root);
        Ok(doc.current().clone())
    }

    fn append_signature_and_maybe_transition(
        &self,
        version_hash: &ContentDigest,
        candidate: SignatureCandidate,
        collector: &SignatureCollector<'_>,
    ) -> Result<SignatureReceipt, NotaryError> {
        let root = self.root_of(version_hash)?;
        let slot = self.slot(&root)?;
        let mut doc = slot.lock();
        let outcome = doc.collect_signature(version_hash, candidate, collector, Timestamp::now())?;
        let version = doc
            .version(version_hash)
            .cloned()
            .ok_or_else(|| NotaryError::version_not_found(version_hash))?;
        Ok(SignatureReceipt {
            root,
            outcome,
            version,
        })
    }

    fn transition_version(
        &self,
        version_hash: &ContentDigest,
        target: TerminalStatus,
        reason: &str,
        actor: Option<UserId>,
    ) -> Result<TransitionReceipt, NotaryError> {
        let root = self.root_of(version_hash)?;
        let slot = self.slot(&root)?;
        let mut doc = slot.lock();
        let event = doc.transition_version(version_hash, target, reason, actor)?;
        let version = doc
            .version(version_hash)
            .cloned()
            .ok_or_else(|| NotaryError::version_not_found(version_hash))?;
        Ok(TransitionReceipt {
            root,
            event,
            version,
        })
    }

    fn attach_anchor(
        &self,
        commitment: &AnchorCommitment,
        anchor: AnchorRef,
    ) -> Result<bool, NotaryError> {
        let slot = self.slot(&commitment.document)?;
        let attached = slot.lock().attach_anchor(commitment, anchor);
        Ok(attached)
    }

    fn documents_for_user(&self, user: &UserId) -> Vec<ContentDigest> {
        self.user_index
            .read()
            .get(user)
            .map(|roots| roots.iter().copied().collect())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use notary_core::{content_hash, ClaimReference};
    use notary_state::{
        ClaimStatus, IdentityClaim, IdentityClaimValidator, InMemoryClaimRegistry, Metadata,
        VersionChain, VersionStatus,
    };
    use std::collections::BTreeSet;

    fn user(s: &str) -> UserId {
        UserId::new(s).unwrap()
    }

    fn doc(bytes: &[u8], signers: &[&str]) -> Document {
        VersionChain::create_document(
            user(signers[0]),
            bytes,
            "Contract",
            signers.iter().map(|s| user(s)).collect::<BTreeSet<_>>(),
            Metadata::new(),
            None,
        )
        .unwrap()
    }

    fn validator(holders: &[&str]) -> IdentityClaimValidator {
        let registry = Arc::new(InMemoryClaimRegistry::new());
        for h in holders {
            registry
                .issue(IdentityClaim {
                    reference: ClaimReference::new(format!("claim-{h}")).unwrap(),
                    user_id: user(h),
                    authority_id: "registry".into(),
                    claim_type: "kyc".into(),
                    claim_value: "verified".into(),
                    signature: "sig".into(),
                    expiration: Timestamp::now().plus_secs(3600),
                    metadata: Metadata::new(),
                    status: ClaimStatus::Valid,
                    issued_at: Timestamp::now(),
                })
                .unwrap();
        }
        IdentityClaimValidator::new(registry)
    }

    fn candidate(signer: &str) -> SignatureCandidate {
        SignatureCandidate {
            signer_id: user(signer),
            signature_data: format!("sig-{signer}"),
            claim_reference: ClaimReference::new(format!("claim-{signer}")).unwrap(),
        }
    }

    #[test]
    fn create_and_get() {
        let repo = InMemoryRepository::new();
        let d = doc(b"v0", &["a"]);
        let root = *d.root_hash();
        repo.create_document(d.clone()).unwrap();
        assert_eq!(repo.get_document(&root).unwrap(), d);
        let (found_root, v) = repo.find_version(&root).unwrap();
        assert_eq!(found_root, root);
        assert!(v.is_root());
    }

    #[test]
    fn duplicate_root_rejected() {
        let repo = InMemoryRepository::new();
        repo.create_document(doc(b"v0", &["a"])).unwrap();
        let err = repo.create_document(doc(b"v0", &["b"])).unwrap_err();
        assert!(matches!(err, NotaryError::DuplicateHash(_)));
        assert_eq!(repo.len(), 1);
    }

    #[test]
    fn unknown_lookups_are_not_found() {
        let repo = InMemoryRepository::new();
        let h = content_hash(b"nothing");
        assert!(matches!(
            repo.get_document(&h),
            Err(NotaryError::NotFound { kind: "document", .. })
        ));
        assert!(matches!(
            repo.find_version(&h),
            Err(NotaryError::NotFound { kind: "version", .. })
        ));
    }

    #[test]
    fn version_hash_is_unique_across_documents() {
        let repo = InMemoryRepository::new();
        let first = doc(b"first", &["a"]);
        let second = doc(b"second", &["a"]);
        let second_root = *second.root_hash();
        repo.create_document(first).unwrap();
        repo.create_document(second.clone()).unwrap();

        // Content equal to another document's root.
        let v = VersionChain::append_version(&second, b"first", "t", Metadata::new(), &user("a"))
            .unwrap();
        let err = repo.append_version(&second_root, None, v).unwrap_err();
        assert!(matches!(err, NotaryError::DuplicateHash(_)));
        assert_eq!(repo.get_document(&second_root).unwrap().versions().len(), 1);
    }

    #[test]
    fn stale_append_conflicts() {
        let repo = InMemoryRepository::new();
        let d = doc(b"v0", &["a"]);
        let root = *d.root_hash();
        repo.create_document(d.clone()).unwrap();

        let v1 = VersionChain::append_version(&d, b"v1", "t", Metadata::new(), &user("a")).unwrap();
        let v1b = VersionChain::append_version(&d, b"v1b", "t", Metadata::new(), &user("a")).unwrap();
        repo.append_version(&root, Some(&root), v1).unwrap();
        let before = repo.get_document(&root).unwrap();
        let err = repo.append_version(&root, Some(&root), v1b).unwrap_err();
        assert!(matches!(err, NotaryError::Conflict { .. }));
        assert_eq!(repo.get_document(&root).unwrap(), before);
    }

    #[test]
    fn signature_and_approval_are_one_unit() {
        let repo = InMemoryRepository::new();
        let d = doc(b"v0", &["a", "b"]);
        let root = *d.root_hash();
        repo.create_document(d).unwrap();
        let claims = validator(&["a", "b"]);
        let collector = SignatureCollector::new(&claims);

        let first = repo
            .append_signature_and_maybe_transition(&root, candidate("a"), &collector)
            .unwrap();
        assert!(!first.outcome.complete());
        assert_eq!(first.version.signatures.len(), 1);

        let second = repo
            .append_signature_and_maybe_transition(&root, candidate("b"), &collector)
            .unwrap();
        assert!(second.outcome.approval().is_some());
        assert_eq!(second.version.status, VersionStatus::Approved);
        assert_eq!(
            repo.get_document(&root).unwrap().current().status,
            VersionStatus::Approved
        );
    }

    #[test]
    fn concurrent_signers_approve_exactly_once() {
        let names: Vec<String> = (0..8).map(|i| format!("s{i}")).collect();
        let refs: Vec<&str> = names.iter().map(String::as_str).collect();
        let repo = Arc::new(InMemoryRepository::new());
        let d = doc(b"v0", &refs);
        let root = *d.root_hash();
        repo.create_document(d).unwrap();
        let claims = Arc::new(validator(&refs));

        let handles: Vec<_> = names
            .iter()
            .cloned()
            .map(|name| {
                let repo = Arc::clone(&repo);
                let claims = Arc::clone(&claims);
                std::thread::spawn(move || {
                    let collector = SignatureCollector::new(&claims);
                    repo.append_signature_and_maybe_transition(&root, candidate(&name), &collector)
                        .unwrap()
                })
            })
            .collect();
        let approvals = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|r| r.outcome.approval().is_some())
            .count();
        assert_eq!(approvals, 1);
        let doc = repo.get_document(&root).unwrap();
        assert_eq!(doc.current().signatures.len(), 8);
        assert_eq!(doc.current().transitions.len(), 1);
    }

    #[test]
    fn concurrent_appends_on_one_parent_admit_exactly_one() {
        let repo = Arc::new(InMemoryRepository::new());
        let d = doc(b"v0", &["a"]);
        let root = *d.root_hash();
        repo.create_document(d.clone()).unwrap();

        let handles: Vec<_> = (0..16)
            .map(|i| {
                let repo = Arc::clone(&repo);
                let snapshot = d.clone();
                std::thread::spawn(move || {
                    let bytes = format!("revision {i}");
                    let v = VersionChain::append_version(
                        &snapshot,
                        bytes.as_bytes(),
                        "t",
                        Metadata::new(),
                        &user("a"),
                    )
                    .unwrap();
                    repo.append_version(&root, Some(&root), v)
                })
            })
            .collect();

        let mut appended = 0;
        for handle in handles {
            match handle.join().unwrap() {
                Ok(v) => {
                    assert_eq!(v.parent_hash, Some(root));
                    appended += 1;
                }
                Err(e) => assert!(matches!(e, NotaryError::Conflict { .. })),
            }
        }
        assert_eq!(appended, 1);
        let doc = repo.get_document(&root).unwrap();
        assert_eq!(doc.versions().len(), 2);
        assert!(doc.verify_chain().is_ok());
    }

    #[test]
    fn user_index_covers_creator_and_signers() {
        let repo = InMemoryRepository::new();
        let first = doc(b"first", &["a", "b"]);
        let second = doc(b"second", &["b", "c"]);
        let (r1, r2) = (*first.root_hash(), *second.root_hash());
        repo.create_document(first).unwrap();
        repo.create_document(second).unwrap();

        assert_eq!(repo.documents_for_user(&user("a")), vec![r1]);
        let mut for_b = vec![r1, r2];
        for_b.sort();
        assert_eq!(repo.documents_for_user(&user("b")), for_b);
        assert_eq!(repo.documents_for_user(&user("c")), vec![r2]);
        assert!(repo.documents_for_user(&user("z")).is_empty());
    }

    #[test]
    fn duplicate_create_leaves_user_index_alone() {
        let repo = InMemoryRepository::new();
        repo.create_document(doc(b"v0", &["a"])).unwrap();
        repo.create_document(doc(b"v0", &["b"])).unwrap_err();
        assert!(repo.documents_for_user(&user("b")).is_empty());
    }

    #[test]
    fn restore_indexes_every_version() {
        let mut d = doc(b"v0", &["a"]);
        let v1 = VersionChain::append_version(&d, b"v1", "t", Metadata::new(), &user("a")).unwrap();
        let v1_hash = v1.hash;
        d.push_version(v1, None).unwrap();

        let repo = InMemoryRepository::new();
        repo.restore(d.clone());
        assert_eq!(repo.find_version(&v1_hash).unwrap().0, *d.root_hash());
        assert_eq!(repo.list().len(), 1);
        assert_eq!(repo.documents_for_user(&user("a")), vec![*d.root_hash()]);
    }
}
