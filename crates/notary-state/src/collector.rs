//! # Signature Collector
//!
//! Accepts a candidate signature for a version and, in the same call,
//! decides completion and performs the `Pending → Approved` transition when
//! the append is the one that reaches the threshold.
//!
//! The collector works on `&mut Version`. The caller must hold exclusive
//! access to the version for the whole call (the repository holds the
//! per-document lock), which makes check, append, completion test and
//! transition a single atomic unit. Only the threshold-crossing append ever
//! receives an [`ApprovalEvent`], so the approval fires exactly once.
//!
//! ## Check Order
//!
//! 1. Signer already signed → [`SubmitOutcome::AlreadySigned`].
//! 2. Version not pending → `NotPending`.
//! 3. Signer not required → `Unauthorized`.
//! 4. Claim not usable by the signer now → `InvalidClaim`.

use notary_core::{ClaimReference, NotaryError, Timestamp, UserId};
use serde::{Deserialize, Serialize};

use crate::approval::{ApprovalEvent, TerminalStatus, VersionStatus};
use crate::claim::IdentityClaimValidator;
use crate::version::{Signature, Version};

/// A signature offered for a version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignatureCandidate {
    /// Who is signing.
    pub signer_id: UserId,
    /// Opaque signature blob.
    pub signature_data: String,
    /// Identity claim presented as evidence.
    pub claim_reference: ClaimReference,
}

/// Result of a signature submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// The signature was appended.
    Accepted {
        /// Position of the new signature.
        signature_index: usize,
        /// Whether every required signer has now signed.
        complete: bool,
        /// Present only for the append that completed the version.
        approval: Option<ApprovalEvent>,
    },
    /// The signer had already signed. Nothing changed.
    AlreadySigned {
        /// Whether every required signer has signed.
        complete: bool,
        /// Current status.
        status: VersionStatus,
    },
}

impl SubmitOutcome {
    /// Whether a new signature was recorded.
    pub fn accepted(&self) -> bool {
        matches!(self, Self::Accepted { .. })
    }

    /// Whether the version is fully signed.
    pub fn complete(&self) -> bool {
        match self {
            Self::Accepted { complete, .. } | Self::AlreadySigned { complete, .. } => *complete,
        }
    }

    /// The approval event, for the threshold-crossing append.
    pub fn approval(&self) -> Option<&ApprovalEvent> {
        match self {
            Self::Accepted { approval, .. } => approval.as_ref(),
            Self::AlreadySigned { .. } => None,
        }
    }
}

/// Applies signature submissions to versions.
#[derive(Debug, Clone, Copy)]
pub struct SignatureCollector<'a> {
    claims: &'a IdentityClaimValidator,
}

impl<'a> SignatureCollector<'a> {
    /// Collector checking evidence with `claims`.
    pub fn new(claims: &'a IdentityClaimValidator) -> Self {
        Self { claims }
    }

    /// Submit `candidate` to `version` at the current time.
    ///
    /// # Errors
    ///
    /// `NotPending`, `Unauthorized` or `InvalidClaim`, in that order.
    pub fn submit(
        &self,
        version: &mut Version,
        candidate: SignatureCandidate,
    ) -> Result<SubmitOutcome, NotaryError> {
        self.submit_at(version, candidate, Timestamp::now())
    }

    /// [`submit`](Self::submit) with an explicit clock.
    pub fn submit_at(
        &self,
        version: &mut Version,
        candidate: SignatureCandidate,
        now: Timestamp,
    ) -> Result<SubmitOutcome, NotaryError> {
        if version.has_signed(&candidate.signer_id) {
            return Ok(SubmitOutcome::AlreadySigned {
                complete: version.is_complete(),
                status: version.status,
            });
        }
        if version.status != VersionStatus::Pending {
            return Err(NotaryError::NotPending {
                version: version.hash.to_hex(),
                status: version.status.to_string(),
            });
        }
        if !version.required_signers.contains(&candidate.signer_id) {
            return Err(NotaryError::Unauthorized(format!(
                "{} is not a required signer of version {}",
                candidate.signer_id,
                version.hash.short()
            )));
        }
        if !self
            .claims
            .is_claim_usable_at(&candidate.claim_reference, &candidate.signer_id, now)
        {
            return Err(NotaryError::InvalidClaim(format!(
                "claim {} is not usable by {}",
                candidate.claim_reference, candidate.signer_id
            )));
        }

        let signer = candidate.signer_id.clone();
        version.signatures.push(Signature {
            signer_id: candidate.signer_id,
            timestamp: now,
            signature_data: candidate.signature_data,
            claim_reference: candidate.claim_reference,
            anchor_ref: None,
        });
        let signature_index = version.signatures.len() - 1;
        let complete = version.is_complete();

        let approval = if complete {
            match version.transition_at(
                TerminalStatus::Approved,
                "all required signatures collected",
                Some(signer),
                now,
            ) {
                Ok(event) => Some(event),
                Err(e) => {
                    version.signatures.pop();
                    tracing::error!(version = %version.hash, error = %e, "approval transition failed");
                    return Err(e);
                }
            }
        } else {
            None
        };

        Ok(SubmitOutcome::Accepted {
            signature_index,
            complete,
            approval,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::claim::{ClaimStatus, IdentityClaim, InMemoryClaimRegistry};
    use crate::version::Metadata;
    use notary_core::content_hash;
    use std::sync::Arc;

    fn user(s: &str) -> UserId {
        UserId::new(s).unwrap()
    }

    fn now() -> Timestamp {
        Timestamp::parse("2026-06-01T12:00:00Z").unwrap()
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
                    expiration: now().plus_secs(3600),
                    metadata: Metadata::new(),
                    status: ClaimStatus::Valid,
                    issued_at: now(),
                })
                .unwrap();
        }
        IdentityClaimValidator::new(registry)
    }

    fn version(signers: &[&str]) -> Version {
        Version {
            hash: content_hash(b"v"),
            parent_hash: None,
            title: "t".into(),
            metadata: Metadata::new(),
            creator_id: user("a"),
            created_at: now(),
            required_signers: signers.iter().map(|s| user(s)).collect(),
            signatures: Vec::new(),
            status: VersionStatus::Pending,
            transitions: Vec::new(),
            anchor_ref: None,
        }
    }

    fn candidate(signer: &str) -> SignatureCandidate {
        SignatureCandidate {
            signer_id: user(signer),
            signature_data: format!("sig-{signer}"),
            claim_reference: ClaimReference::new(format!("claim-{signer}")).unwrap(),
        }
    }

    #[test]
    fn two_signer_scenario() {
        let claims = validator(&["a", "b"]);
        let collector = SignatureCollector::new(&claims);
        let mut v = version(&["a", "b"]);

        let b = collector.submit_at(&mut v, candidate("b"), now()).unwrap();
        assert!(b.accepted());
        assert!(!b.complete());
        assert!(b.approval().is_none());
        assert_eq!(v.status, VersionStatus::Pending);

        let a = collector.submit_at(&mut v, candidate("a"), now()).unwrap();
        assert!(a.accepted());
        assert!(a.complete());
        assert_eq!(a.approval().unwrap().to, TerminalStatus::Approved);
        assert_eq!(v.status, VersionStatus::Approved);

        let again = collector.submit_at(&mut v, candidate("a"), now()).unwrap();
        assert_eq!(
            again,
            SubmitOutcome::AlreadySigned {
                complete: true,
                status: VersionStatus::Approved,
            }
        );
        assert_eq!(v.signatures.len(), 2);
        assert_eq!(v.transitions.len(), 1);
    }

    #[test]
    fn outsider_is_unauthorized() {
        let claims = validator(&["a", "b", "c"]);
        let collector = SignatureCollector::new(&claims);
        let mut v = version(&["a", "b"]);
        let err = collector.submit_at(&mut v, candidate("c"), now()).unwrap_err();
        assert!(matches!(err, NotaryError::Unauthorized(_)));
        assert!(v.signatures.is_empty());
    }

    #[test]
    fn stale_claim_is_rejected() {
        let claims = validator(&["a"]);
        let collector = SignatureCollector::new(&claims);
        let mut v = version(&["a"]);
        let late = now().plus_secs(3600);
        let err = collector.submit_at(&mut v, candidate("a"), late).unwrap_err();
        assert!(matches!(err, NotaryError::InvalidClaim(_)));
        assert!(v.signatures.is_empty());
        assert_eq!(v.status, VersionStatus::Pending);
    }

    #[test]
    fn terminal_version_rejects_new_signers() {
        let claims = validator(&["a", "b"]);
        let collector = SignatureCollector::new(&claims);
        let mut v = version(&["a", "b"]);
        v.transition_at(TerminalStatus::Rejected, "no", Some(user("a")), now())
            .unwrap();
        let err = collector.submit_at(&mut v, candidate("b"), now()).unwrap_err();
        assert!(matches!(err, NotaryError::NotPending { .. }));
    }

    #[test]
    fn not_pending_precedes_unauthorized() {
        let claims = validator(&[]);
        let collector = SignatureCollector::new(&claims);
        let mut v = version(&["a"]);
        v.transition_at(TerminalStatus::Expired, "deadline", None, now())
            .unwrap();
        let err = collector.submit_at(&mut v, candidate("zed"), now()).unwrap_err();
        assert!(matches!(err, NotaryError::NotPending { .. }));
    }

    #[test]
    fn single_signer_completes_immediately() {
        let claims = validator(&["a"]);
        let collector = SignatureCollector::new(&claims);
        let mut v = version(&["a"]);
        let out = collector.submit_at(&mut v, candidate("a"), now()).unwrap();
        let event = out.approval().unwrap();
        assert_eq!(event.signature_count, 1);
        assert_eq!(event.actor, Some(user("a")));
    }
}
