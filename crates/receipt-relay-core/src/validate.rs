// crates/receipt-relay-core/src/validate.rs
// ============================================================================
// Module: Receipt Relay Envelope Validator
// Description: Structural checks on decrypted receipt payloads.
// Purpose: Reject self-inconsistent or incomplete payloads before routing.
// Dependencies: payload, thiserror
// ============================================================================

//! ## Overview
//! [`validate`] applies the required-field checks in a fixed order so the
//! reported reason is deterministic:
//! 1. `tx_id` present and non-empty.
//! 2. `case_id` or `metadata` present.
//! 3. Transport correlation id, when supplied, equals `tx_id`.
//!
//! Every [`ValidationError`] is permanent: redelivery cannot repair the
//! message, so the pipeline quarantines it.

use thiserror::Error;

use crate::payload::DecryptedPayload;
use crate::payload::PayloadParseError;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Structural payload defects.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// Decrypted plaintext is not a JSON object.
    #[error("malformed payload: {0}")]
    Malformed(&'static str),
    /// `tx_id` absent or empty.
    #[error("missing tx_id")]
    MissingTxId,
    /// Neither `case_id` nor `metadata` present.
    #[error("missing metadata")]
    MissingMetadata,
    /// Transport correlation id differs from the payload `tx_id`.
    #[error("tx_id mismatch")]
    TxIdMismatch {
        /// Correlation id supplied by the transport.
        header: String,
        /// `tx_id` carried in the payload.
        payload: String,
    },
    /// Payload matches neither delivery target shape.
    #[error("cannot determine delivery target")]
    UnknownTarget,
}

// ============================================================================
// SECTION: Validation
// ============================================================================

/// Parses decrypted plaintext into a payload.
///
/// # Errors
///
/// Returns [`ValidationError::Malformed`] when the plaintext is not a JSON object.
pub fn parse(plaintext: &[u8]) -> Result<DecryptedPayload, ValidationError> {
    DecryptedPayload::from_slice(plaintext).map_err(|err| match err {
        PayloadParseError::InvalidJson => ValidationError::Malformed("invalid json"),
        PayloadParseError::NotAnObject => ValidationError::Malformed("json root is not an object"),
    })
}

/// Checks required fields and transport consistency.
///
/// # Errors
///
/// Returns the first [`ValidationError`] found, in check order.
pub fn validate(
    payload: DecryptedPayload,
    correlation_id: Option<&str>,
) -> Result<DecryptedPayload, ValidationError> {
    let tx_id = match payload.tx_id() {
        Some(tx_id) if !tx_id.trim().is_empty() => tx_id,
        _ => return Err(ValidationError::MissingTxId),
    };
    if payload.case_id().is_none() && !payload.has_metadata() {
        return Err(ValidationError::MissingMetadata);
    }
    if let Some(header) = correlation_id
        && header != tx_id
    {
        return Err(ValidationError::TxIdMismatch {
            header: header.to_string(),
            payload: tx_id.to_string(),
        });
    }
    Ok(payload)
}
