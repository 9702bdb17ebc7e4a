//! # Identity Newtypes
//!
//! [`UserId`] names a party (creator, signer, claim holder).
//! [`ClaimReference`] names an identity claim presented as signing evidence.
//! Both validate format at construction time.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Identifier of a user: document creator, signer, or claim holder.
///
/// 1-128 printable characters, no whitespace and no `:` (the bearer token
/// format uses `:` as a separator).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct UserId(String);

impl UserId {
    /// Maximum length in bytes.
    pub const MAX_LEN: usize = 128;

    /// Create a user id, validating format.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::InvalidUserId`] on empty, over-long or
    /// malformed input.
    pub fn new(value: impl Into<String>) -> Result<Self, ValidationError> {
        let s = value.into();
        let ok = !s.is_empty()
            && s.len() <= Self::MAX_LEN
            && s.chars().all(|c| !c.is_whitespace() && !c.is_control() && c != ':');
        if ok {
            Ok(Self(s))
        } else {
            Err(ValidationError::InvalidUserId(s))
        }
    }

    /// The id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for UserId {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<UserId> for String {
    fn from(id: UserId) -> Self {
        id.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Reference to an identity claim used as signing evidence.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ClaimReference(String);

impl ClaimReference {
    /// Maximum length in bytes.
    pub const MAX_LEN: usize = 256;

    /// Create a claim reference, rejecting empty or over-long input.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::InvalidClaimReference`].
    pub fn new(value: impl Into<String>) -> Result<Self, ValidationError> {
        let s = value.into();
        if s.trim().is_empty() || s.len() > Self::MAX_LEN {
            return Err(ValidationError::InvalidClaimReference(s));
        }
        Ok(Self(s))
    }

    /// The reference as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for ClaimReference {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ClaimReference> for String {
    fn from(r: ClaimReference) -> Self {
        r.0
    }
}

impl fmt::Display for ClaimReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
