// crates/receipt-relay-core/src/outcome.rs
// ============================================================================
// Module: Receipt Relay Outcome Classifier
// Description: Error taxonomy and the disposition table.
// Purpose: Map every pipeline failure onto exactly one queue disposition.
// Dependencies: crypto, validate, render, sink, serde, thiserror
// ============================================================================

//! ## Overview
//! [`PipelineError`] unifies the stage errors; [`PipelineError::kind`] names
//! its [`ErrorKind`], and [`ErrorKind::disposition`] is the single table that
//! turns a kind into a [`Disposition`]:
//!
//! | Kind                 | Disposition   |
//! |----------------------|---------------|
//! | `DecryptFailure`     | `Quarantined` |
//! | `ValidationFailure`  | `Quarantined` |
//! | `RenderFailure`      | `Quarantined` |
//! | `ClientRejected`     | `Quarantined` |
//! | `ServerUnavailable`  | `Retry`       |
//! | `TransportExhausted` | `Retry`       |
//!
//! The queue consumer maps `Accepted` to ack, `Quarantined` to reject plus
//! quarantine publish, and `Retry` to nack for redelivery.

use serde::Serialize;
use thiserror::Error;

use crate::crypto::DecryptError;
use crate::render::RenderError;
use crate::sink::DeliveryError;
use crate::validate::ValidationError;

// ============================================================================
// SECTION: Disposition
// ============================================================================

/// Terminal queue decision for one envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "disposition", content = "reason", rename_all = "snake_case")]
pub enum Disposition {
    /// Receipt delivered; acknowledge the message.
    Accepted,
    /// Message can never succeed; reject and publish to quarantine.
    Quarantined(String),
    /// Transient failure; negative-acknowledge for redelivery.
    Retry(String),
}

impl Disposition {
    /// Returns a stable label for logging.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Accepted => "accepted",
            Self::Quarantined(_) => "quarantined",
            Self::Retry(_) => "retry",
        }
    }

    /// Returns the failure reason, if any.
    #[must_use]
    pub fn reason(&self) -> Option<&str> {
        match self {
            Self::Accepted => None,
            Self::Quarantined(reason) | Self::Retry(reason) => Some(reason),
        }
    }
}

// ============================================================================
// SECTION: Error Kind
// ============================================================================

/// Failure classes of the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Token could not be decrypted.
    DecryptFailure,
    /// Payload is structurally defective.
    ValidationFailure,
    /// Payload cannot be rendered for its target.
    RenderFailure,
    /// Downstream refused the receipt permanently.
    ClientRejected,
    /// Downstream failed transiently.
    ServerUnavailable,
    /// Network retries ran out.
    TransportExhausted,
}

impl ErrorKind {
    /// Every kind, for exhaustive checks.
    pub const ALL: [Self; 6] = [
        Self::DecryptFailure,
        Self::ValidationFailure,
        Self::RenderFailure,
        Self::ClientRejected,
        Self::ServerUnavailable,
        Self::TransportExhausted,
    ];

    /// Returns a stable label for logging.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::DecryptFailure => "decrypt_failure",
            Self::ValidationFailure => "validation_failure",
            Self::RenderFailure => "render_failure",
            Self::ClientRejected => "client_rejected",
            Self::ServerUnavailable => "server_unavailable",
            Self::TransportExhausted => "transport_exhausted",
        }
    }

    /// Returns true when redelivery may succeed.
    #[must_use]
    pub const fn is_retryable(self) -> bool {
        match self {
            Self::DecryptFailure
            | Self::ValidationFailure
            | Self::RenderFailure
            | Self::ClientRejected => false,
            Self::ServerUnavailable | Self::TransportExhausted => true,
        }
    }

    /// Builds the disposition for this kind.
    #[must_use]
    pub fn disposition(self, reason: impl Into<String>) -> Disposition {
        if self.is_retryable() {
            Disposition::Retry(reason.into())
        } else {
            Disposition::Quarantined(reason.into())
        }
    }
}

// ============================================================================
// SECTION: Pipeline Error
// ============================================================================

/// Any failure raised while processing one envelope.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PipelineError {
    /// Decryption failed.
    #[error(transparent)]
    Decrypt(#[from] DecryptError),
    /// Validation or target resolution failed.
    #[error(transparent)]
    Validation(#[from] ValidationError),
    /// Rendering failed.
    #[error(transparent)]
    Render(#[from] RenderError),
    /// Delivery failed.
    #[error(transparent)]
    Delivery(#[from] DeliveryError),
}

impl PipelineError {
    /// Returns the failure class.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Decrypt(_) => ErrorKind::DecryptFailure,
            Self::Validation(_) => ErrorKind::ValidationFailure,
            Self::Render(_) => ErrorKind::RenderFailure,
            Self::Delivery(DeliveryError::Rejected {
                ..
            }) => ErrorKind::ClientRejected,
            Self::Delivery(DeliveryError::Unavailable {
                ..
            }) => ErrorKind::ServerUnavailable,
            Self::Delivery(DeliveryError::TransportExhausted {
                ..
            }) => ErrorKind::TransportExhausted,
        }
    }

    /// Returns the disposition for this failure.
    #[must_use]
    pub fn disposition(&self) -> Disposition {
        self.kind().disposition(self.to_string())
    }
}

/// Classifies a pipeline result.
#[must_use]
pub fn classify<T>(result: &Result<T, PipelineError>) -> Disposition {
    match result {
        Ok(_) => Disposition::Accepted,
        Err(err) => err.disposition(),
    }
}
