//! # notary-state — Version Chain and Approval Engine
//!
//! The core of the notary: content-addressed version chains, signature
//! collection with threshold detection, and the approval state machine.
//!
//! ## Modules
//!
//! - **Version** (`version.rs`): [`Version`] and [`Signature`] records.
//!
//! - **Chain** (`chain.rs`): [`Document`] as a non-branching chain of
//!   versions and the [`VersionChain`] constructors. Appends are
//!   compare-and-swap on the current version.
//!
//! - **Approval** (`approval.rs`): `Pending → Approved | Rejected | Expired`,
//!   all terminal. Every transition yields an [`ApprovalEvent`].
//!
//! - **Collector** (`collector.rs`): [`SignatureCollector`] appends a
//!   signature, evaluates completion and fires the approval transition as
//!   one unit under the caller's exclusive borrow.
//!
//! - **Claim** (`claim.rs`): identity claims, the [`IdentityClaimSource`]
//!   seam and the [`IdentityClaimValidator`] gate.
//!
//! ## Concurrency
//!
//! Nothing here locks. Every mutating operation takes `&mut`, so the
//! caller's lock (one per document in the repository) is what makes a
//! submission atomic. Ledger calls never happen here.

pub mod approval;
pub mod chain;
pub mod claim;
pub mod collector;
pub mod version;

pub use approval::{ApprovalEvent, StatusTransitionRecord, TerminalStatus, VersionStatus};
pub use chain::{
    signature_commitment, verify_versions, version_commitment, ChainViolation, Document,
    DocumentRecord, UploadInfo, VersionChain, MAX_TITLE_LEN,
};
pub use claim::{
    ClaimStatus, IdentityClaim, IdentityClaimSource, IdentityClaimValidator,
    InMemoryClaimRegistry,
};
pub use collector::{SignatureCandidate, SignatureCollector, SubmitOutcome};
pub use version::{Metadata, Signature, Version};
