//! # Content Digests
//!
//! [`ContentDigest`] is the identifier of every version in the system: a
//! SHA-256 digest over the version's raw payload bytes. The document's
//! root hash is the digest of its first version.
//!
//! ## Invariant
//!
//! No field other than the payload bytes participates in [`content_hash`].
//! Titles, metadata, signer sets and timestamps never change a hash.
//!
//! Ledger commitments are hashed separately through [`sha256_digest`],
//! which only accepts [`CanonicalBytes`].

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};

use crate::canonical::CanonicalBytes;
use crate::error::ValidationError;

/// A 256-bit SHA-256 content digest.
///
/// Serializes as a lowercase 64-character hex string so that it can be
/// used verbatim in URLs, ledger labels and JSON bodies.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContentDigest([u8; 32]);

impl ContentDigest {
    /// Length of the hex rendering.
    pub const HEX_LEN: usize = 64;

    /// Wrap raw digest bytes.
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// The raw 32 digest bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Render the digest as a lowercase hex string.
    pub fn to_hex(&self) -> String {
        self.0.iter().map(|b| format!("{b:02x}")).collect()
    }

    /// Parse a 64-character hex string.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::InvalidDigest`] if the input is not exactly
    /// 64 hex characters.
    pub fn from_hex(s: &str) -> Result<Self, ValidationError> {
        let s = s.trim();
        if s.len() != Self::HEX_LEN {
            return Err(ValidationError::InvalidDigest(s.to_string()));
        }
        let raw = hex::decode(s).map_err(|_| ValidationError::InvalidDigest(s.to_string()))?;
        let mut bytes = [0u8; 32];
        bytes.copy_from_slice(&raw);
        Ok(Self(bytes))
    }

    /// Short prefix for log lines.
    pub fn short(&self) -> String {
        self.to_hex()[..12].to_string()
    }
}

/// Compute the content hash of a raw byte payload.
///
/// This is the `ContentHash` function of the version chain: deterministic,
/// and dependent on `bytes` only.
pub fn content_hash(bytes: &[u8]) -> ContentDigest {
    let hash = Sha256::digest(bytes);
    let mut out = [0u8; 32];
    out.copy_from_slice(&hash);
    ContentDigest(out)
}

/// Compute a SHA-256 digest over canonical bytes.
///
/// Used for ledger commitment payloads, where the input is structured data
/// rather than an uploaded file.
pub fn sha256_digest(data: &CanonicalBytes) -> ContentDigest {
    content_hash(data.as_bytes())
}

impl fmt::Display for ContentDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for ContentDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContentDigest({})", self.to_hex())
    }
}

impl FromStr for ContentDigest {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

impl Serialize for ContentDigest {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for ContentDigest {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_hex(&s).map_err(serde::de::Error::custom)
    }
}
