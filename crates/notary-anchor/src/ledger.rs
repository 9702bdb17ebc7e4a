//! # Ledger Interface
//!
//! [`LedgerAnchor`] is the external immutable ledger as the notary sees it:
//! submit a payload under a label, get back a durable reference; ask which
//! anchored references exist for a hash.
//!
//! Transaction construction, fees and network selection belong to the
//! implementation and are not modelled here.
//!
//! ## Contract
//!
//! `anchor()` returns `Ok` only once the payload is durably recorded.
//! Returning `Ok` for an unrecorded payload would make the notary report
//! proof that does not exist.

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

use async_trait::async_trait;
use notary_core::{content_hash, ContentDigest, Timestamp};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from ledger operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AnchorError {
    /// The ledger endpoint could not be reached.
    #[error("ledger unavailable: {network}")]
    Unavailable {
        /// Ledger network name.
        network: String,
    },

    /// The ledger call did not complete within the configured timeout.
    #[error("ledger call timed out after {secs}s")]
    Timeout {
        /// Timeout that elapsed.
        secs: u64,
    },

    /// The transaction was submitted but failed.
    #[error("ledger transaction failed on {network}: {reason}")]
    TransactionFailed {
        /// Ledger network name.
        network: String,
        /// Failure reason reported by the ledger.
        reason: String,
    },

    /// The ledger refused the payload. Retrying will not help.
    #[error("ledger rejected payload: {0}")]
    Rejected(String),
}

impl AnchorError {
    /// Whether a retry may succeed.
    pub fn is_transient(&self) -> bool {
        !matches!(self, Self::Rejected(_))
    }
}

/// Durable proof that a payload was recorded on the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnchorRef {
    /// Ledger network the transaction lives on.
    pub network: String,
    /// Ledger transaction identifier.
    pub transaction_id: String,
    /// Ledger sequence (block / ledger number) containing the transaction.
    pub sequence: u64,
    /// Label the payload was anchored under.
    pub label: String,
    /// SHA-256 of the anchored payload bytes.
    pub payload_digest: ContentDigest,
    /// When the ledger accepted the payload.
    pub anchored_at: Timestamp,
}

/// External immutable ledger.
#[async_trait]
pub trait LedgerAnchor: Send + Sync {
    /// Anchor `payload` under `label`.
    async fn anchor(&self, payload: Vec<u8>, label: &str) -> Result<AnchorRef, AnchorError>;

    /// All anchored references whose label names `hash`, in ledger order.
    async fn history(&self, hash: &ContentDigest) -> Result<Vec<AnchorRef>, AnchorError>;

    /// Network name, for logs and proofs.
    fn network(&self) -> &str;
}

/// In-process ledger for development and tests.
///
/// Every anchor is final immediately. Supports fault injection
/// ([`fail_next`](Self::fail_next)) and counts calls so tests can assert
/// that no ledger call was made.
///
/// Provides no external tamper-evidence. Production deployments plug in a
/// real ledger client behind [`LedgerAnchor`].
#[derive(Debug)]
pub struct InMemoryLedger {
    network: String,
    next_sequence: AtomicU64,
    fail_remaining: AtomicU32,
    anchor_calls: AtomicU64,
    entries: RwLock<Vec<AnchorRef>>,
}

impl InMemoryLedger {
    /// Create an empty ledger named `network`.
    pub fn new(network: impl Into<String>) -> Self {
        Self {
            network: network.into(),
            next_sequence: AtomicU64::new(1),
            fail_remaining: AtomicU32::new(0),
            anchor_calls: AtomicU64::new(0),
            entries: RwLock::new(Vec::new()),
        }
    }

    /// Make the next `n` anchor calls fail with [`AnchorError::Unavailable`].
    pub fn fail_next(&self, n: u32) {
        self.fail_remaining.store(n, Ordering::SeqCst);
    }

    /// Number of `anchor()` calls received, failed ones included.
    pub fn anchor_calls(&self) -> u64 {
        self.anchor_calls.load(Ordering::SeqCst)
    }

    /// Number of payloads recorded.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Whether nothing has been recorded.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn take_failure(&self) -> bool {
        self.fail_remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

#[async_trait]
impl LedgerAnchor for InMemoryLedger {
    async fn anchor(&self, payload: Vec<u8>, label: &str) -> Result<AnchorRef, AnchorError> {
        self.anchor_calls.fetch_add(1, Ordering::SeqCst);
        if self.take_failure() {
            return Err(AnchorError::Unavailable {
                network: self.network.clone(),
            });
        }
        if label.is_empty() {
            return Err(AnchorError::Rejected("empty label".to_string()));
        }

        let sequence = self.next_sequence.fetch_add(1, Ordering::SeqCst);
        let payload_digest = content_hash(&payload);
        let mut tx_material = payload;
        tx_material.extend_from_slice(&sequence.to_be_bytes());
        let tx_hex = content_hash(&tx_material).to_hex();

        let anchor = AnchorRef {
            network: self.network.clone(),
            transaction_id: format!("{}-tx-{}", self.network, &tx_hex[..24]),
            sequence,
            label: label.to_string(),
            payload_digest,
            anchored_at: Timestamp::now(),
        };
        self.entries.write().push(anchor.clone());
        Ok(anchor)
    }

    async fn history(&self, hash: &ContentDigest) -> Result<Vec<AnchorRef>, AnchorError> {
        let needle = hash.to_hex();
        Ok(self
            .entries
            .read()
            .iter()
            .filter(|a| a.label.contains(&needle))
            .cloned()
            .collect())
    }

    fn network(&self) -> &str {
        &self.network
    }
}
