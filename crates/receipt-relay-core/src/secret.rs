// crates/receipt-relay-core/src/secret.rs
// ============================================================================
// Module: Receipt Relay Secrets
// Description: Redacting wrapper for credentials and keys.
// Purpose: Keep pre-shared keys and passwords out of logs and debug output.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! [`Secret`] holds a sensitive string. Its `Debug` and `Display` output is
//! always `***`; the raw value is only reachable through [`Secret::expose`].

use std::fmt;

use serde::Deserialize;

/// Sensitive string value with redacted formatting.
#[derive(Clone, PartialEq, Eq, Default, Deserialize)]
#[serde(transparent)]
pub struct Secret(String);

impl Secret {
    /// Wraps a sensitive value.
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Returns the raw value. Callers must not log the result.
    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Returns true when the value is empty.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("***")
    }
}

impl fmt::Display for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("***")
    }
}
