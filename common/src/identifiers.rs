//! Identifier types for rate locks and quotes.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Opaque token identifying a rate lock.
///
/// Freshly minted ids are v4 UUIDs, but callers must treat the value as an
/// opaque string: lookups accept any text and unknown tokens simply resolve
/// to an expired lock.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RateLockId(String);

impl RateLockId {
    /// Mint a new, globally unique lock ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Get the ID as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for RateLockId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RateLockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for RateLockId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for RateLockId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Unique identifier for a quote.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct QuoteId(Uuid);

impl QuoteId {
    /// Create a new quote ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Parse from string.
    pub fn parse(s: &str) -> Result<Self, uuid::Error> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

impl Default for QuoteId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for QuoteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
