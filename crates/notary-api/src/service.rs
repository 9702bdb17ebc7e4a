//! # Notary Service
//!
//! Orchestrates the notary use cases over injected collaborators:
//!
//! ```text
//! claims gate ─▶ VersionChain ─▶ repository (atomic) ─▶ Postgres ─▶ anchorer
//! ```
//!
//! Every mutation commits in the repository first. Its ledger commitment is
//! then journaled, the mutation is written through to Postgres when
//! configured, and one bounded anchor attempt is made. Anchoring never rolls
//! a committed mutation back: a failed anchor, or a write-through error that
//! cuts the request short, leaves the commitment pending in the journal,
//! visible through [`NotaryService::pending_anchors`] and repaired by
//! [`NotaryService::retry_pending_anchors`].
//!
//! No lock is held while the ledger is called. Once a reference is stored
//! with its event the journal entry is released.

use std::collections::BTreeSet;
use std::sync::Arc;

use notary_anchor::{AnchorCommitment, AnchorOutcome, AnchorRef, Anchorer, JournalEntry};
use notary_core::{ClaimReference, ContentDigest, NotaryError, Timestamp, UserId};
use notary_state::{
    signature_commitment, version_commitment, ApprovalEvent, Document, DocumentRecord,
    IdentityClaimValidator, Metadata, SignatureCandidate, SignatureCollector, SubmitOutcome,
    TerminalStatus, UploadInfo, Version, VersionChain, VersionStatus,
};
use serde::Serialize;
use sqlx::PgPool;
use thiserror::Error;

use crate::db;
use crate::repository::{DocumentRepository, TransitionReceipt};

// ─── Errors ──────────────────────────────────────────────────────────

/// Failure of a service operation.
#[derive(Error, Debug)]
pub enum ServiceError {
    /// Domain rule violation.
    #[error(transparent)]
    Notary(#[from] NotaryError),

    /// Write-through to Postgres failed after the in-memory commit.
    #[error("persistence failed: {0}")]
    Persistence(#[from] sqlx::Error),
}

// ─── Results ─────────────────────────────────────────────────────────

/// Ledger state of one event, as reported to callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum AnchorStatus {
    /// Anchored; the reference is the proof.
    Anchored {
        /// Ledger reference.
        anchor_ref: AnchorRef,
    },
    /// Not anchored yet; will be retried.
    Pending {
        /// Attempts made so far.
        attempts: u32,
        /// Most recent failure.
        last_error: Option<String>,
    },
}

impl From<AnchorOutcome> for AnchorStatus {
    fn from(outcome: AnchorOutcome) -> Self {
        match outcome {
            AnchorOutcome::Anchored(anchor_ref) => Self::Anchored { anchor_ref },
            AnchorOutcome::Pending {
                attempts,
                last_error,
            } => Self::Pending {
                attempts,
                last_error,
            },
        }
    }
}

impl AnchorStatus {
    /// Whether the event is anchored.
    pub fn is_anchored(&self) -> bool {
        matches!(self, Self::Anchored { .. })
    }
}

/// A newly created document.
#[derive(Debug, Clone, Serialize)]
pub struct CreatedDocument {
    /// Document identifier.
    pub root_hash: ContentDigest,
    /// The root version.
    pub version: Version,
    /// Ledger state of the creation event.
    pub anchor: AnchorStatus,
}

/// A newly appended version.
#[derive(Debug, Clone, Serialize)]
pub struct AppendedVersion {
    /// Document identifier.
    pub root_hash: ContentDigest,
    /// The new current version.
    pub version: Version,
    /// Ledger state of the append event.
    pub anchor: AnchorStatus,
}

/// Result of a signature submission.
#[derive(Debug, Clone, Serialize)]
pub struct SignatureResult {
    /// Document identifier.
    pub root_hash: ContentDigest,
    /// Signed version.
    pub version_hash: ContentDigest,
    /// A new signature was recorded.
    pub accepted: bool,
    /// The signer had signed before; nothing changed.
    pub already_signed: bool,
    /// Every required signer has signed.
    pub complete: bool,
    /// Version status after the submission.
    pub status: VersionStatus,
    /// Ledger state of the signature event, for accepted signatures.
    pub signature_anchor: Option<AnchorStatus>,
    /// The approval, when this signature completed the version.
    pub approval: Option<ApprovalEvent>,
    /// Ledger state of the approval event.
    pub approval_anchor: Option<AnchorStatus>,
}

/// Result of an explicit status transition.
#[derive(Debug, Clone, Serialize)]
pub struct TransitionResult {
    /// Document identifier.
    pub root_hash: ContentDigest,
    /// The transition.
    pub event: ApprovalEvent,
    /// Ledger state of the transition event.
    pub anchor: AnchorStatus,
}

/// A document's history with the ledger's view of it.
#[derive(Debug, Clone, Serialize)]
pub struct History {
    /// The document and all its versions.
    pub document: Document,
    /// Everything the ledger holds for the document, as returned.
    pub ledger: Vec<AnchorRef>,
}

/// One document as seen from a participant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DocumentSummary {
    /// Document identifier.
    pub root_hash: ContentDigest,
    /// Document title.
    pub title: String,
    /// Creation time.
    pub created_at: Timestamp,
    /// The user created the document.
    pub creator: bool,
    /// The user's signature is required on every version.
    pub signer: bool,
    /// Current version.
    pub current_version: ContentDigest,
    /// Status of the current version.
    pub status: VersionStatus,
    /// Whether the user still owes a signature on the current version.
    pub awaiting_signature: bool,
}

/// Outcome of an anchor repair sweep.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RepairReport {
    /// Commitments resubmitted.
    pub attempted: usize,
    /// Now anchored.
    pub anchored: usize,
    /// Still pending.
    pub still_pending: usize,
}

// ─── Notifications ───────────────────────────────────────────────────

/// Post-commit notification hook.
pub trait SignerNotifier: Send + Sync {
    /// A version awaits signatures.
    fn version_created(&self, root: &ContentDigest, version: &Version);

    /// A version reached a terminal status.
    fn version_finalized(&self, root: &ContentDigest, event: &ApprovalEvent);
}

/// Notifier that only logs.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingNotifier;

impl SignerNotifier for TracingNotifier {
    fn version_created(&self, root: &ContentDigest, version: &Version) {
        let signers: Vec<&str> = version.required_signers.iter().map(UserId::as_str).collect();
        tracing::info!(
            document = %root,
            version = %version.hash,
            signers = ?signers,
            "signature requested"
        );
    }

    fn version_finalized(&self, root: &ContentDigest, event: &ApprovalEvent) {
        tracing::info!(
            document = %root,
            version = %event.version_hash,
            status = %event.to,
            "version finalized"
        );
    }
}

// ─── Service ─────────────────────────────────────────────────────────

/// The notary.
pub struct NotaryService {
    repository: Arc<dyn DocumentRepository>,
    claims: IdentityClaimValidator,
    anchorer: Arc<Anchorer>,
    notifier: Arc<dyn SignerNotifier>,
    db: Option<PgPool>,
}

impl std::fmt::Debug for NotaryService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotaryService")
            .field("anchorer", &self.anchorer)
            .field("persistent", &self.db.is_some())
            .finish_non_exhaustive()
    }
}

impl NotaryService {
    /// Create a service with the logging notifier and no database.
    pub fn new(
        repository: Arc<dyn DocumentRepository>,
        claims: IdentityClaimValidator,
        anchorer: Arc<Anchorer>,
    ) -> Self {
        Self {
            repository,
            claims,
            anchorer,
            notifier: Arc::new(TracingNotifier),
            db: None,
        }
    }

    /// Replace the notifier.
    pub fn with_notifier(mut self, notifier: Arc<dyn SignerNotifier>) -> Self {
        self.notifier = notifier;
        self
    }

    /// Write mutations through to `pool`.
    pub fn with_db(mut self, pool: Option<PgPool>) -> Self {
        self.db = pool;
        self
    }

    /// The anchorer.
    pub fn anchorer(&self) -> &Anchorer {
        &self.anchorer
    }

    /// Create a document with its root version.
    ///
    /// # Errors
    ///
    /// `Unauthorized` when the creator holds no valid identity claim, in
    /// which case nothing is stored or anchored. `InvalidInput` and
    /// `DuplicateHash` as for [`VersionChain::create_document`] and the
    /// repository.
    pub async fn create_document(
        &self,
        creator: &UserId,
        bytes: &[u8],
        title: &str,
        signers: BTreeSet<UserId>,
        metadata: Metadata,
        upload: Option<UploadInfo>,
    ) -> Result<CreatedDocument, ServiceError> {
        if !self.claims.is_valid(creator) {
            return Err(NotaryError::Unauthorized(format!(
                "{creator} holds no valid identity claim"
            ))
            .into());
        }
        let document =
            VersionChain::create_document(creator.clone(), bytes, title, signers, metadata, upload)?;
        let root = *document.root_hash();
        let version = document.current().clone();
        let record = DocumentRecord::from(document.clone());

        self.repository.create_document(document)?;
        tracing::info!(document = %root, creator = %creator, "document created");
        let commitment = self.journal(version_commitment(root, &version));
        if let Some(pool) = &self.db {
            db::documents::insert_document(pool, &record).await?;
        }
        self.notifier.version_created(&root, &version);

        let anchor = self.anchor(commitment).await?;
        Ok(CreatedDocument {
            root_hash: root,
            version,
            anchor,
        })
    }

    /// Append a version to document `root`.
    ///
    /// With `expected_current`, the append only succeeds if that is still
    /// the current version.
    ///
    /// # Errors
    ///
    /// `NotFound`, `Unauthorized` for a non-signer, `DuplicateHash`,
    /// `Conflict` when the chain moved on.
    pub async fn append_version(
        &self,
        actor: &UserId,
        root: &ContentDigest,
        bytes: &[u8],
        title: &str,
        metadata: Metadata,
        expected_current: Option<&ContentDigest>,
    ) -> Result<AppendedVersion, ServiceError> {
        let snapshot = self.repository.get_document(root)?;
        let version = VersionChain::append_version(&snapshot, bytes, title, metadata, actor)?;
        let position = snapshot.versions().len();
        let version = self
            .repository
            .append_version(root, expected_current, version)?;
        tracing::info!(document = %root, version = %version.hash, actor = %actor, "version appended");
        let commitment = self.journal(version_commitment(*root, &version));

        if let Some(pool) = &self.db {
            db::documents::insert_version(pool, root, position, &version).await?;
        }
        self.notifier.version_created(root, &version);

        let anchor = self.anchor(commitment).await?;
        Ok(AppendedVersion {
            root_hash: *root,
            version,
            anchor,
        })
    }

    /// Submit `signer`'s signature for version `version_hash`.
    ///
    /// The completion decision and approval come from the repository's
    /// atomic unit. A repeat submission by the same signer returns
    /// `already_signed` and anchors nothing.
    ///
    /// # Errors
    ///
    /// `NotFound`, `NotPending`, `Unauthorized`, `InvalidClaim`.
    pub async fn submit_signature(
        &self,
        signer: &UserId,
        version_hash: &ContentDigest,
        signature_data: String,
        claim_reference: ClaimReference,
    ) -> Result<SignatureResult, ServiceError> {
        let candidate = SignatureCandidate {
            signer_id: signer.clone(),
            signature_data,
            claim_reference,
        };
        let receipt = {
            let collector = SignatureCollector::new(&self.claims);
            self.repository
                .append_signature_and_maybe_transition(version_hash, candidate, &collector)?
        };
        let root = receipt.root;
        let version = receipt.version;

        let (signature_index, approval) = match receipt.outcome {
            SubmitOutcome::AlreadySigned { complete, status } => {
                tracing::debug!(version = %version_hash, signer = %signer, "signature already recorded");
                return Ok(SignatureResult {
                    root_hash: root,
                    version_hash: *version_hash,
                    accepted: false,
                    already_signed: true,
                    complete,
                    status,
                    signature_anchor: None,
                    approval: None,
                    approval_anchor: None,
                });
            }
            SubmitOutcome::Accepted {
                signature_index,
                approval,
                ..
            } => (signature_index, approval),
        };
        tracing::info!(
            document = %root,
            version = %version_hash,
            signer = %signer,
            signatures = version.signatures.len(),
            required = version.required_signers.len(),
            "signature accepted"
        );

        let signed = signature_commitment(root, &version, signer).map(|c| self.journal(c));
        let approval_commitment = approval.as_ref().map(|e| self.journal(e.commitment(root)));

        if let Some(pool) = &self.db {
            db::documents::insert_signature(pool, &version, signature_index, approval.is_some())
                .await?;
        }

        let signature_anchor = match signed {
            Some(c) => Some(self.anchor(c).await?),
            None => None,
        };
        let approval_anchor = match (&approval, approval_commitment) {
            (Some(event), Some(c)) => {
                tracing::info!(document = %root, version = %version_hash, "version approved");
                self.notifier.version_finalized(&root, event);
                Some(self.anchor(c).await?)
            }
            _ => None,
        };

        Ok(SignatureResult {
            root_hash: root,
            version_hash: *version_hash,
            accepted: true,
            already_signed: false,
            complete: version.is_complete(),
            status: version.status,
            signature_anchor,
            approval,
            approval_anchor,
        })
    }

    /// Sign whatever version is current for document `root`.
    ///
    /// # Errors
    ///
    /// As [`submit_signature`](Self::submit_signature).
    pub async fn sign_current_version(
        &self,
        signer: &UserId,
        root: &ContentDigest,
        signature_data: String,
        claim_reference: ClaimReference,
    ) -> Result<SignatureResult, ServiceError> {
        let current = *self.repository.get_document(root)?.current_hash();
        self.submit_signature(signer, &current, signature_data, claim_reference)
            .await
    }

    /// Reject a pending version. Only a required signer may reject.
    ///
    /// # Errors
    ///
    /// `NotFound`, `Unauthorized`, `InvalidTransition` when not pending.
    pub async fn reject_version(
        &self,
        actor: &UserId,
        version_hash: &ContentDigest,
        reason: &str,
    ) -> Result<TransitionResult, ServiceError> {
        let (_, version) = self.repository.find_version(version_hash)?;
        if !version.required_signers.contains(actor) {
            return Err(NotaryError::Unauthorized(format!(
                "{actor} is not a required signer of version {}",
                version_hash.short()
            ))
            .into());
        }
        self.finalize(version_hash, TerminalStatus::Rejected, reason, Some(actor.clone()))
            .await
    }

    /// Expire a pending version. Called by an external deadline policy.
    ///
    /// # Errors
    ///
    /// `NotFound`, `InvalidTransition` when not pending.
    pub async fn expire_version(
        &self,
        version_hash: &ContentDigest,
        reason: &str,
    ) -> Result<TransitionResult, ServiceError> {
        self.finalize(version_hash, TerminalStatus::Expired, reason, None)
            .await
    }

    async fn finalize(
        &self,
        version_hash: &ContentDigest,
        target: TerminalStatus,
        reason: &str,
        actor: Option<UserId>,
    ) -> Result<TransitionResult, ServiceError> {
        let TransitionReceipt {
            root,
            event,
            version,
        } = self
            .repository
            .transition_version(version_hash, target, reason, actor)?;
        tracing::info!(document = %root, version = %version_hash, status = %target, reason, "version finalized");
        let commitment = self.journal(event.commitment(root));

        if let Some(pool) = &self.db {
            db::documents::finalize_status(pool, &version).await?;
        }
        self.notifier.version_finalized(&root, &event);

        let anchor = self.anchor(commitment).await?;
        Ok(TransitionResult {
            root_hash: root,
            event,
            anchor,
        })
    }

    /// Document `root` with the ledger's records for it, passed through
    /// unmodified.
    ///
    /// # Errors
    ///
    /// `NotFound`, or `AnchorFailure` when the ledger query fails.
    pub async fn history(&self, root: &ContentDigest) -> Result<History, ServiceError> {
        let document = self.repository.get_document(root)?;
        let ledger = self
            .anchorer
            .history(root)
            .await
            .map_err(|e| NotaryError::AnchorFailure(e.to_string()))?;
        Ok(History { document, ledger })
    }

    /// A version and the root of its document.
    ///
    /// # Errors
    ///
    /// `NotFound`.
    pub fn get_version(
        &self,
        hash: &ContentDigest,
    ) -> Result<(ContentDigest, Version), ServiceError> {
        Ok(self.repository.find_version(hash)?)
    }

    /// Documents `user` created or must sign, oldest first.
    pub fn documents_for_user(&self, user: &UserId) -> Vec<DocumentSummary> {
        let mut out: Vec<DocumentSummary> = self
            .repository
            .documents_for_user(user)
            .iter()
            .filter_map(|root| self.repository.get_document(root).ok())
            .map(|doc| {
                let current = doc.current();
                let signer = doc.signers().contains(user);
                DocumentSummary {
                    root_hash: *doc.root_hash(),
                    title: doc.title().to_string(),
                    created_at: doc.created_at(),
                    creator: doc.creator_id() == user,
                    signer,
                    current_version: current.hash,
                    status: current.status,
                    awaiting_signature: signer
                        && current.status == VersionStatus::Pending
                        && current.signature_of(user).is_none(),
                }
            })
            .collect();
        out.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.root_hash.cmp(&b.root_hash))
        });
        out
    }

    /// Every commitment not yet anchored.
    pub fn pending_anchors(&self) -> Vec<JournalEntry> {
        self.anchorer.pending()
    }

    /// Queue every unanchored event of `document` for the next sweep.
    /// Returns how many were queued.
    pub fn journal_unanchored(&self, document: &Document) -> usize {
        let commitments = document.unanchored_commitments();
        let count = commitments.len();
        for c in commitments {
            self.anchorer.journal().record(c);
        }
        count
    }

    /// Resubmit every pending commitment and attach the references that
    /// come back. Failures to attach are logged and counted as pending.
    pub async fn retry_pending_anchors(&self) -> RepairReport {
        let results = self.anchorer.retry_pending().await;
        let mut report = RepairReport {
            attempted: results.len(),
            ..RepairReport::default()
        };
        for (commitment, outcome) in results {
            let Some(anchor) = outcome.anchor_ref().cloned() else {
                report.still_pending += 1;
                continue;
            };
            match self.attach(&commitment, anchor).await {
                Ok(()) => report.anchored += 1,
                Err(e) => {
                    tracing::error!(key = %commitment.key(), error = %e, "failed to attach repaired anchor");
                    report.still_pending += 1;
                }
            }
        }
        if report.attempted > 0 {
            tracing::info!(
                attempted = report.attempted,
                anchored = report.anchored,
                still_pending = report.still_pending,
                "anchor repair sweep finished"
            );
        }
        report
    }

    /// Make `commitment` repairable before anything can cut the request short.
    fn journal(&self, commitment: AnchorCommitment) -> AnchorCommitment {
        self.anchorer.journal().record(commitment.clone());
        commitment
    }

    async fn anchor(&self, commitment: AnchorCommitment) -> Result<AnchorStatus, ServiceError> {
        let outcome = self.anchorer.submit(commitment.clone()).await;
        if let Some(anchor) = outcome.anchor_ref() {
            self.attach(&commitment, anchor.clone()).await?;
        }
        Ok(outcome.into())
    }

    async fn attach(
        &self,
        commitment: &AnchorCommitment,
        anchor: AnchorRef,
    ) -> Result<(), ServiceError> {
        if !self.repository.attach_anchor(commitment, anchor)? {
            return Ok(());
        }
        self.anchorer.journal().release(&commitment.key());
        if let Some(pool) = &self.db {
            let (_, version) = self.repository.find_version(&commitment.subject)?;
            db::documents::save_anchor(pool, commitment, &version).await?;
        }
        Ok(())
    }
}
