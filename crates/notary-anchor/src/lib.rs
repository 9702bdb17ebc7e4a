//! # notary-anchor — Ledger Anchoring
//!
//! Anchoring submits a commitment (hash + metadata) to an external
//! immutable ledger and receives an opaque [`AnchorRef`] usable as proof.
//!
//! - **Ledger** (`ledger.rs`): the [`LedgerAnchor`] collaborator interface
//!   and an in-process [`InMemoryLedger`] used for development and tests.
//! - **Commitment** (`commitment.rs`): canonical commitment payloads and
//!   the idempotency key for each anchored event.
//! - **Journal** (`journal.rs`): the record of every commitment the notary
//!   has asked to anchor. Missing anchors stay queryable and repairable.
//!   An entry is released once its reference is stored.
//! - **Retry** (`retry.rs`): exponential backoff with a per-attempt timeout.
//! - **Anchorer** (`anchorer.rs`): ties the above together with
//!   at-least-once delivery: one bounded inline attempt, retries in the sweep.
//!
//! ## Crate Policy
//!
//! - Depends only on `notary-core` internally.
//! - Anchoring never runs inside a state lock. Callers commit local state
//!   first and anchor afterwards.

pub mod anchorer;
pub mod commitment;
pub mod journal;
pub mod ledger;
pub mod retry;

pub use anchorer::{AnchorOutcome, Anchorer};
pub use commitment::{document_label, AnchorCommitment, AnchorKey, AnchorKind};
pub use journal::{AnchorJournal, Claim, JournalEntry};
pub use ledger::{AnchorError, AnchorRef, InMemoryLedger, LedgerAnchor};
pub use retry::{anchor_with_retry, RetryPolicy};
