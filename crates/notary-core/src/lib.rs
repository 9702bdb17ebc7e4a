#![deny(missing_docs)]

//! # notary-core — Foundational Types for the DocChain Notary
//!
//! This crate defines the types every other crate in the workspace depends
//! on. It has no internal crate dependencies: only `serde`, `serde_json`,
//! `serde_jcs`, `thiserror`, `chrono`, `sha2`, and `hex`.
//!
//! ## Design Principles
//!
//! 1. **Content identity, not record identity.** A [`ContentDigest`] is
//!    computed over the raw payload bytes and nothing else. Two versions
//!    with identical bytes and different titles share one hash.
//!
//! 2. **[`CanonicalBytes`] for ledger commitments.** Structured payloads
//!    submitted to the ledger are serialized through a single JCS path so
//!    the same event always produces the same commitment bytes.
//!
//! 3. **Newtype wrappers for identifiers.** A [`UserId`] cannot be passed
//!    where a [`ClaimReference`] is expected.
//!
//! 4. **[`NotaryError`] taxonomy.** Callers branch on the variant, never on
//!    message text.

pub mod canonical;
pub mod digest;
pub mod error;
pub mod identity;
pub mod temporal;

pub use canonical::CanonicalBytes;
pub use digest::{content_hash, sha256_digest, ContentDigest};
pub use error::{CanonicalizationError, NotaryError, ValidationError};
pub use identity::{ClaimReference, UserId};
pub use temporal::Timestamp;
