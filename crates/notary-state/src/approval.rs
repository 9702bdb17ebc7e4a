//! # Approval State Machine
//!
//! ```text
//! Pending ──▶ Approved   (all required signatures present)
//!    │
//!    ├──────▶ Rejected   (explicit rejection by a required signer)
//!    │
//!    └──────▶ Expired    (externally triggered deadline policy)
//! ```
//!
//! All three targets are terminal. The target of a transition is a
//! [`TerminalStatus`], so "transition back to Pending" cannot be expressed;
//! a [`VersionStatus`] that is not terminal fails conversion with
//! `InvalidTransition`.
//!
//! Every transition appends a [`StatusTransitionRecord`] and returns an
//! [`ApprovalEvent`], which the service anchors. Anchoring failure never
//! rolls a transition back.

use std::fmt;

use notary_anchor::{AnchorCommitment, AnchorKind, AnchorRef};
use notary_core::{ContentDigest, NotaryError, Timestamp, UserId};
use serde::{Deserialize, Serialize};

use crate::version::Version;

// ─── Status ──────────────────────────────────────────────────────────

/// Approval status of a version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VersionStatus {
    /// Collecting signatures.
    Pending,
    /// Every required signer signed.
    Approved,
    /// Rejected by a required signer.
    Rejected,
    /// Deadline passed before approval.
    Expired,
}

impl VersionStatus {
    /// Whether no further transition is possible.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending)
    }

    /// Stable string form.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Approved => "APPROVED",
            Self::Rejected => "REJECTED",
            Self::Expired => "EXPIRED",
        }
    }

    /// Parse the stable string form.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "PENDING" => Some(Self::Pending),
            "APPROVED" => Some(Self::Approved),
            "REJECTED" => Some(Self::Rejected),
            "EXPIRED" => Some(Self::Expired),
            _ => None,
        }
    }
}

impl fmt::Display for VersionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A status a pending version may move to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TerminalStatus {
    /// See [`VersionStatus::Approved`].
    Approved,
    /// See [`VersionStatus::Rejected`].
    Rejected,
    /// See [`VersionStatus::Expired`].
    Expired,
}

impl TerminalStatus {
    /// Ledger event kind for a transition into this status.
    pub fn anchor_kind(&self) -> AnchorKind {
        match self {
            Self::Approved => AnchorKind::VersionApproved,
            Self::Rejected => AnchorKind::VersionRejected,
            Self::Expired => AnchorKind::VersionExpired,
        }
    }
}

impl From<TerminalStatus> for VersionStatus {
    fn from(t: TerminalStatus) -> Self {
        match t {
            TerminalStatus::Approved => Self::Approved,
            TerminalStatus::Rejected => Self::Rejected,
            TerminalStatus::Expired => Self::Expired,
        }
    }
}

impl TryFrom<VersionStatus> for TerminalStatus {
    type Error = NotaryError;

    fn try_from(s: VersionStatus) -> Result<Self, Self::Error> {
        match s {
            VersionStatus::Approved => Ok(Self::Approved),
            VersionStatus::Rejected => Ok(Self::Rejected),
            VersionStatus::Expired => Ok(Self::Expired),
            VersionStatus::Pending => Err(NotaryError::InvalidTransition {
                from: "*".to_string(),
                to: s.to_string(),
            }),
        }
    }
}

impl fmt::Display for TerminalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        VersionStatus::from(*self).fmt(f)
    }
}

// ─── Records and Events ──────────────────────────────────────────────

/// One entry of a version's status log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusTransitionRecord {
    /// Status before.
    pub from: VersionStatus,
    /// Status after.
    pub to: VersionStatus,
    /// When.
    pub at: Timestamp,
    /// Why.
    pub reason: String,
    /// Who triggered it; `None` for system policy.
    pub actor: Option<UserId>,
    /// Ledger proof of the transition, once anchored.
    #[serde(default)]
    pub anchor_ref: Option<AnchorRef>,
}

impl StatusTransitionRecord {
    /// Ledger commitment for this transition under document `root`.
    /// `None` for a record whose target is not terminal.
    pub fn commitment(
        &self,
        root: ContentDigest,
        version: ContentDigest,
    ) -> Option<AnchorCommitment> {
        let target = TerminalStatus::try_from(self.to).ok()?;
        Some(AnchorCommitment {
            document: root,
            subject: version,
            parent: None,
            kind: target.anchor_kind(),
            signer: None,
            status: self.to.to_string(),
            occurred_at: self.at,
        })
    }
}

/// Emitted once per successful transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalEvent {
    /// The version that moved.
    pub version_hash: ContentDigest,
    /// Status before (always `Pending`).
    pub from: VersionStatus,
    /// Status after.
    pub to: TerminalStatus,
    /// Why.
    pub reason: String,
    /// Who triggered it.
    pub actor: Option<UserId>,
    /// When.
    pub at: Timestamp,
    /// Signatures present at transition time.
    pub signature_count: usize,
}

impl ApprovalEvent {
    /// Ledger commitment for this event under document `root`.
    pub fn commitment(&self, root: ContentDigest) -> AnchorCommitment {
        AnchorCommitment {
            document: root,
            subject: self.version_hash,
            parent: None,
            kind: self.to.anchor_kind(),
            signer: None,
            status: self.to.to_string(),
            occurred_at: self.at,
        }
    }
}

// ─── Transitions ─────────────────────────────────────────────────────

impl Version {
    /// Move a pending version to `target`.
    ///
    /// # Errors
    ///
    /// [`NotaryError::InvalidTransition`] if the version is not pending.
    pub fn transition(
        &mut self,
        target: TerminalStatus,
        reason: &str,
        actor: Option<UserId>,
    ) -> Result<ApprovalEvent, NotaryError> {
        self.transition_at(target, reason, actor, Timestamp::now())
    }

    /// [`transition`](Self::transition) with an explicit clock.
    pub fn transition_at(
        &mut self,
        target: TerminalStatus,
        reason: &str,
        actor: Option<UserId>,
        now: Timestamp,
    ) -> Result<ApprovalEvent, NotaryError> {
        if self.status != VersionStatus::Pending {
            return Err(NotaryError::InvalidTransition {
                from: self.status.to_string(),
                to: target.to_string(),
            });
        }
        let to = VersionStatus::from(target);
        self.transitions.push(StatusTransitionRecord {
            from: self.status,
            to,
            at: now,
            reason: reason.to_string(),
            actor: actor.clone(),
            anchor_ref: None,
        });
        let from = self.status;
        self.status = to;
        Ok(ApprovalEvent {
            version_hash: self.hash,
            from,
            to: target,
            reason: reason.to_string(),
            actor,
            at: now,
            signature_count: self.signatures.len(),
        })
    }
}

// ─── Tests ───────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::version::Metadata;
    use notary_core::content_hash;

    fn pending_version() -> Version {
        Version {
            hash: content_hash(b"v"),
            parent_hash: None,
            title: "t".into(),
            metadata: Metadata::new(),
            creator_id: UserId::new("alice").unwrap(),
            created_at: Timestamp::now(),
            required_signers: [UserId::new("alice").unwrap()].into_iter().collect(),
            signatures: Vec::new(),
            status: VersionStatus::Pending,
            transitions: Vec::new(),
            anchor_ref: None,
        }
    }

    #[test]
    fn pending_moves_to_each_terminal_status() {
        for target in [
            TerminalStatus::Approved,
            TerminalStatus::Rejected,
            TerminalStatus::Expired,
        ] {
            let mut v = pending_version();
            let event = v.transition(target, "test", None).unwrap();
            assert_eq!(v.status, VersionStatus::from(target));
            assert_eq!(event.from, VersionStatus::Pending);
            assert_eq!(event.to, target);
            assert_eq!(v.transitions.len(), 1);
        }
    }

    #[test]
    fn terminal_statuses_are_final() {
        let mut v = pending_version();
        v.transition(TerminalStatus::Rejected, "no", None).unwrap();
        let err = v
            .transition(TerminalStatus::Approved, "late", None)
            .unwrap_err();
        assert_eq!(
            err,
            NotaryError::InvalidTransition {
                from: "REJECTED".into(),
                to: "APPROVED".into(),
            }
        );
        assert_eq!(v.status, VersionStatus::Rejected);
        assert_eq!(v.transitions.len(), 1);
    }

    #[test]
    fn pending_is_not_a_transition_target() {
        let err = TerminalStatus::try_from(VersionStatus::Pending).unwrap_err();
        assert_eq!(err.code(), "INVALID_TRANSITION");
        assert_eq!(
            TerminalStatus::try_from(VersionStatus::Expired).unwrap(),
            TerminalStatus::Expired
        );
    }

    #[test]
    fn event_commitment_uses_transition_kind() {
        let mut v = pending_version();
        let event = v
            .transition(TerminalStatus::Approved, "done", None)
            .unwrap();
        let root = content_hash(b"root");
        let c = event.commitment(root);
        assert_eq!(c.kind, AnchorKind::VersionApproved);
        assert_eq!(c.document, root);
        assert_eq!(c.subject, v.hash);
        assert_eq!(c.status, "APPROVED");
        let from_record = v.transitions[0].commitment(root, v.hash).unwrap();
        assert_eq!(from_record.key(), c.key());
        assert_eq!(from_record, c);
    }

    #[test]
    fn status_strings_round_trip() {
        for s in ["PENDING", "APPROVED", "REJECTED", "EXPIRED"] {
            assert_eq!(VersionStatus::parse(s).unwrap().as_str(), s);
        }
        assert!(VersionStatus::parse("pending").is_none());
    }
}
