// crates/receipt-relay-core/src/context.rs
// ============================================================================
// Module: Receipt Relay Log Context
// Description: Immutable identifiers attached to every log record.
// Purpose: Thread tx_id/case_id/user_id through the pipeline explicitly.
// Dependencies: payload
// ============================================================================

//! ## Overview
//! [`LogContext`] is a plain value passed by reference into each stage. Stages
//! never mutate it; [`LogContext::with_payload`] returns an enriched copy once
//! the payload has been validated. Log call sites read fields from it
//! directly, so no logger holds shared mutable state.

use crate::envelope::EncryptedEnvelope;
use crate::payload::DecryptedPayload;

/// Identifiers known about the message being processed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogContext {
    /// Transport correlation id.
    correlation_id: Option<String>,
    /// Broker delivery count.
    delivery_count: u32,
    /// Payload transaction id.
    tx_id: Option<String>,
    /// Payload case id.
    case_id: Option<String>,
    /// Payload respondent id.
    user_id: Option<String>,
    /// Payload reporting unit reference.
    ru_ref: Option<String>,
}

impl LogContext {
    /// Builds the context known before decryption.
    #[must_use]
    pub fn for_envelope(envelope: &EncryptedEnvelope) -> Self {
        Self {
            correlation_id: envelope.correlation_id.clone(),
            delivery_count: envelope.delivery_count,
            ..Self::default()
        }
    }

    /// Returns a copy enriched with identifiers read from the payload.
    #[must_use]
    pub fn with_payload(&self, payload: &DecryptedPayload) -> Self {
        Self {
            correlation_id: self.correlation_id.clone(),
            delivery_count: self.delivery_count,
            tx_id: payload.tx_id().map(str::to_string),
            case_id: payload.case_id().map(str::to_string),
            user_id: payload.user_id().map(str::to_string),
            ru_ref: payload.ru_ref().map(str::to_string),
        }
    }

    /// Transport correlation id.
    #[must_use]
    pub fn correlation_id(&self) -> Option<&str> {
        self.correlation_id.as_deref()
    }

    /// Broker delivery count.
    #[must_use]
    pub const fn delivery_count(&self) -> u32 {
        self.delivery_count
    }

    /// Transaction id, falling back to the correlation id before validation.
    #[must_use]
    pub fn tx_id(&self) -> Option<&str> {
        self.tx_id.as_deref().or(self.correlation_id.as_deref())
    }

    /// Case id.
    #[must_use]
    pub fn case_id(&self) -> Option<&str> {
        self.case_id.as_deref()
    }

    /// Respondent id.
    #[must_use]
    pub fn user_id(&self) -> Option<&str> {
        self.user_id.as_deref()
    }

    /// Reporting unit reference.
    #[must_use]
    pub fn ru_ref(&self) -> Option<&str> {
        self.ru_ref.as_deref()
    }
}
