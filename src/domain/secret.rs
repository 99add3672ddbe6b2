//! Redacting wrapper for backend root credentials.
//!
//! Root credentials authorize policy installation, token minting and token
//! revocation on a backend, so they must never reach logs or serialized
//! output. The actual value is only reachable through an explicit call.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// A backend root credential that redacts itself everywhere.
///
/// - Debug output shows `RootCredential([REDACTED])`
/// - Display output shows `[REDACTED]`
/// - Serialization outputs `"[REDACTED]"`, never the value
/// - Deserialization accepts real values (config files carry them)
/// - Memory is zeroed on drop via the `zeroize` crate
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct RootCredential(String);

impl RootCredential {
    /// Wrap a credential value.
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Expose the underlying credential.
    ///
    /// Only call this at the point the value leaves the process (an
    /// authorization header). Never log the result.
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Returns true if the credential is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for RootCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RootCredential([REDACTED])")
    }
}

impl fmt::Display for RootCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[REDACTED]")
    }
}

impl Serialize for RootCredential {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str("[REDACTED]")
    }
}

impl<'de> Deserialize<'de> for RootCredential {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = String::deserialize(deserializer)?;
        Ok(RootCredential(value))
    }
}

impl PartialEq for RootCredential {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}

impl Eq for RootCredential {}

impl From<&str> for RootCredential {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}
