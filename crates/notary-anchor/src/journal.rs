//! # Anchor Journal
//!
//! Every commitment the notary asks to anchor is journaled before the
//! ledger call. An entry stays pending until the ledger returns a
//! reference, so a failed or interrupted anchor is always visible to
//! [`AnchorJournal::pending`] and repairable by a later sweep.
//!
//! Entries are keyed by [`AnchorKey`]. Once an entry holds a reference it
//! never changes, and an entry that is currently being submitted is not
//! handed out a second time. Together these give at most one anchor per
//! event from this process.
//!
//! An anchored entry is dropped with [`AnchorJournal::release`] once its
//! reference is stored with the event itself; from then on the stored
//! reference is what prevents a second anchor.

use std::collections::HashMap;

use parking_lot::Mutex;
use serde::Serialize;

use crate::commitment::{AnchorCommitment, AnchorKey};
use crate::ledger::AnchorRef;

/// Journal state of one commitment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JournalEntry {
    /// Insertion order.
    pub seq: u64,
    /// The commitment.
    pub commitment: AnchorCommitment,
    /// Ledger reference once anchored.
    pub anchor: Option<AnchorRef>,
    /// Ledger attempts made so far.
    pub attempts: u32,
    /// Most recent failure, if any.
    pub last_error: Option<String>,
    /// A submission is currently in progress.
    #[serde(skip)]
    pub in_flight: bool,
}

impl JournalEntry {
    /// Whether the commitment has been anchored.
    pub fn is_anchored(&self) -> bool {
        self.anchor.is_some()
    }
}

/// Result of trying to take a commitment for submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Claim {
    /// The caller owns the submission and must report back with
    /// [`AnchorJournal::record_success`] or [`AnchorJournal::record_failure`].
    Submit,
    /// Already anchored.
    Anchored(AnchorRef),
    /// Another task is submitting this commitment.
    InFlight {
        /// Attempts made so far.
        attempts: u32,
    },
}

#[derive(Debug, Default)]
struct Inner {
    entries: HashMap<AnchorKey, JournalEntry>,
    next_seq: u64,
}

/// Thread-safe journal of anchor commitments.
#[derive(Debug, Default)]
pub struct AnchorJournal {
    inner: Mutex<Inner>,
}

impl AnchorJournal {
    /// Create an empty journal.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `commitment` as pending without claiming it. No-op when the
    /// key is already journaled.
    pub fn record(&self, commitment: AnchorCommitment) {
        let mut inner = self.inner.lock();
        Self::insert_if_absent(&mut inner, commitment);
    }

    /// Journal `commitment` if new and try to take it for submission.
    pub fn claim(&self, commitment: AnchorCommitment) -> Claim {
        let key = commitment.key();
        let mut inner = self.inner.lock();
        Self::insert_if_absent(&mut inner, commitment);
        let Some(entry) = inner.entries.get_mut(&key) else {
            return Claim::InFlight { attempts: 0 };
        };
        if let Some(anchor) = &entry.anchor {
            return Claim::Anchored(anchor.clone());
        }
        if entry.in_flight {
            return Claim::InFlight {
                attempts: entry.attempts,
            };
        }
        entry.in_flight = true;
        Claim::Submit
    }

    /// Take every pending, idle commitment for submission, oldest first.
    pub fn claim_pending(&self) -> Vec<AnchorCommitment> {
        let mut inner = self.inner.lock();
        let mut claimed: Vec<&mut JournalEntry> = inner
            .entries
            .values_mut()
            .filter(|e| e.anchor.is_none() && !e.in_flight)
            .collect();
        claimed.sort_by_key(|e| e.seq);
        claimed
            .into_iter()
            .map(|e| {
                e.in_flight = true;
                e.commitment.clone()
            })
            .collect()
    }

    /// Store the ledger reference for `key`. Returns the stored reference,
    /// which is the first one recorded if the key was already anchored.
    pub fn record_success(&self, key: &AnchorKey, anchor: AnchorRef, attempts: u32) -> AnchorRef {
        let mut inner = self.inner.lock();
        match inner.entries.get_mut(key) {
            Some(entry) => {
                entry.in_flight = false;
                entry.attempts += attempts;
                entry.last_error = None;
                entry.anchor.get_or_insert(anchor).clone()
            }
            None => anchor,
        }
    }

    /// Release `key` after a failed submission. Returns total attempts.
    pub fn record_failure(&self, key: &AnchorKey, attempts: u32, error: String) -> u32 {
        let mut inner = self.inner.lock();
        match inner.entries.get_mut(key) {
            Some(entry) => {
                entry.in_flight = false;
                entry.attempts += attempts;
                entry.last_error = Some(error);
                entry.attempts
            }
            None => attempts,
        }
    }

    /// Drop `key` if it is anchored and idle. Returns whether it was removed.
    pub fn release(&self, key: &AnchorKey) -> bool {
        let mut inner = self.inner.lock();
        let releasable = inner
            .entries
            .get(key)
            .is_some_and(|e| e.anchor.is_some() && !e.in_flight);
        if releasable {
            inner.entries.remove(key);
        }
        releasable
    }

    /// Lookup by key.
    pub fn get(&self, key: &AnchorKey) -> Option<JournalEntry> {
        self.inner.lock().entries.get(key).cloned()
    }

    /// Every commitment without a ledger reference, oldest first.
    pub fn pending(&self) -> Vec<JournalEntry> {
        let inner = self.inner.lock();
        let mut pending: Vec<JournalEntry> = inner
            .entries
            .values()
            .filter(|e| e.anchor.is_none())
            .cloned()
            .collect();
        pending.sort_by_key(|e| e.seq);
        pending
    }

    /// Number of journaled commitments.
    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    /// Whether the journal is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn insert_if_absent(inner: &mut Inner, commitment: AnchorCommitment) {
        let key = commitment.key();
        if inner.entries.contains_key(&key) {
            return;
        }
        let seq = inner.next_seq;
        inner.next_seq += 1;
        inner.entries.insert(
            key,
            JournalEntry {
                seq,
                commitment,
                anchor: None,
                attempts: 0,
                last_error: None,
                in_flight: false,
            },
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commitment::AnchorKind;
    use notary_core::{content_hash, Timestamp, UserId};

    fn commitment(subject: &[u8], signer: Option<&str>) -> AnchorCommitment {
        AnchorCommitment {
            document: content_hash(b"root"),
            subject: content_hash(subject),
            parent: None,
            kind: AnchorKind::SignatureAccepted,
            signer: signer.map(|s| UserId::new(s).unwrap()),
            status: "PENDING".into(),
            occurred_at: Timestamp::now(),
        }
    }

    fn anchor_ref(seq: u64) -> AnchorRef {
        AnchorRef {
            network: "local".into(),
            transaction_id: format!("local-tx-{seq}"),
            sequence: seq,
            label: "doc:x".into(),
            payload_digest: content_hash(b"payload"),
            anchored_at: Timestamp::now(),
        }
    }

    #[test]
    fn claim_is_exclusive_until_released() {
        let journal = AnchorJournal::new();
        let c = commitment(b"v1", Some("alice"));
        assert_eq!(journal.claim(c.clone()), Claim::Submit);
        assert!(matches!(journal.claim(c.clone()), Claim::InFlight { .. }));
        journal.record_failure(&c.key(), 1, "down".into());
        assert_eq!(journal.claim(c), Claim::Submit);
    }

    #[test]
    fn anchored_entries_keep_their_first_reference() {
        let journal = AnchorJournal::new();
        let c = commitment(b"v1", Some("alice"));
        journal.claim(c.clone());
        let first = journal.record_success(&c.key(), anchor_ref(1), 1);
        let second = journal.record_success(&c.key(), anchor_ref(2), 1);
        assert_eq!(first.sequence, 1);
        assert_eq!(second.sequence, 1);
        assert_eq!(journal.claim(c), Claim::Anchored(first));
    }

    #[test]
    fn failures_accumulate_attempts_and_stay_pending() {
        let journal = AnchorJournal::new();
        let c = commitment(b"v1", None);
        journal.claim(c.clone());
        assert_eq!(journal.record_failure(&c.key(), 4, "down".into()), 4);
        journal.claim(c.clone());
        assert_eq!(journal.record_failure(&c.key(), 1, "still down".into()), 5);

        let pending = journal.pending();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].attempts, 5);
        assert_eq!(pending[0].last_error.as_deref(), Some("still down"));
    }

    #[test]
    fn claim_pending_returns_oldest_first_and_skips_in_flight() {
        let journal = AnchorJournal::new();
        let a = commitment(b"a", None);
        let b = commitment(b"b", None);
        let c = commitment(b"c", None);
        journal.record(a.clone());
        journal.record(b.clone());
        journal.record(c.clone());
        assert_eq!(journal.claim(b), Claim::Submit);

        let claimed = journal.claim_pending();
        assert_eq!(claimed, vec![a, c]);
        assert!(journal.claim_pending().is_empty());
    }

    #[test]
    fn record_is_idempotent() {
        let journal = AnchorJournal::new();
        let c = commitment(b"v1", Some("alice"));
        journal.record(c.clone());
        journal.record(c);
        assert_eq!(journal.len(), 1);
    }

    #[test]
    fn release_drops_only_anchored_entries() {
        let journal = AnchorJournal::new();
        let done = commitment(b"done", None);
        let waiting = commitment(b"waiting", None);
        journal.claim(done.clone());
        journal.record_success(&done.key(), anchor_ref(1), 1);
        journal.record(waiting.clone());

        assert!(!journal.release(&waiting.key()));
        assert!(journal.release(&done.key()));
        assert!(!journal.release(&done.key()));
        assert_eq!(journal.len(), 1);
        assert_eq!(journal.pending()[0].commitment, waiting);
    }

    #[test]
    fn in_flight_entries_are_not_released() {
        let journal = AnchorJournal::new();
        let c = commitment(b"v1", None);
        assert_eq!(journal.claim(c.clone()), Claim::Submit);
        assert!(!journal.release(&c.key()));
        assert_eq!(journal.len(), 1);
    }
}
