// crates/receipt-relay-core/src/payload.rs
// ============================================================================
// Module: Receipt Relay Payload
// Description: Decoded survey submission receipt document.
// Purpose: Provide typed read access to the fields the pipeline routes on.
// Dependencies: serde_json
// ============================================================================

//! ## Overview
//! [`DecryptedPayload`] is the JSON object recovered from a token. It lives
//! for one pipeline run and is never persisted. Accessors return `None` for
//! absent fields and for fields of the wrong JSON type.

use serde_json::Map;
use serde_json::Value;

// ============================================================================
// SECTION: Payload
// ============================================================================

/// Decrypted receipt document.
///
/// # Invariants
/// - The root is always a JSON object.
#[derive(Debug, Clone, PartialEq)]
pub struct DecryptedPayload {
    /// Root JSON object.
    fields: Map<String, Value>,
}

/// Reasons plaintext cannot become a payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadParseError {
    /// Plaintext is not valid JSON.
    InvalidJson,
    /// JSON root is not an object.
    NotAnObject,
}

impl DecryptedPayload {
    /// Parses decrypted plaintext.
    ///
    /// # Errors
    ///
    /// Returns [`PayloadParseError`] when the plaintext is not a JSON object.
    pub fn from_slice(plaintext: &[u8]) -> Result<Self, PayloadParseError> {
        let value: Value =
            serde_json::from_slice(plaintext).map_err(|_| PayloadParseError::InvalidJson)?;
        match value {
            Value::Object(fields) => Ok(Self {
                fields,
            }),
            _ => Err(PayloadParseError::NotAnObject),
        }
    }

    /// Returns the transaction id.
    #[must_use]
    pub fn tx_id(&self) -> Option<&str> {
        self.fields.get("tx_id").and_then(Value::as_str)
    }

    /// Returns the response-management case id.
    #[must_use]
    pub fn case_id(&self) -> Option<&str> {
        self.fields.get("case_id").and_then(Value::as_str)
    }

    /// Returns true when a `metadata` member exists, whatever its shape.
    #[must_use]
    pub fn has_metadata(&self) -> bool {
        self.fields.contains_key("metadata")
    }

    /// Returns `metadata.user_id`.
    #[must_use]
    pub fn user_id(&self) -> Option<&str> {
        self.nested_str("metadata", "user_id")
    }

    /// Returns `metadata.ru_ref`.
    #[must_use]
    pub fn ru_ref(&self) -> Option<&str> {
        self.nested_str("metadata", "ru_ref")
    }

    /// Returns `collection.exercise_sid`.
    #[must_use]
    pub fn exercise_sid(&self) -> Option<&str> {
        self.nested_str("collection", "exercise_sid")
    }

    /// Reads a string member of a nested object.
    fn nested_str(&self, parent: &str, key: &str) -> Option<&str> {
        self.fields.get(parent).and_then(|value| value.get(key)).and_then(Value::as_str)
    }
}
