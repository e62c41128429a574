// crates/receipt-relay-core/src/envelope.rs
// ============================================================================
// Module: Receipt Relay Envelope
// Description: Raw queue message handed over by the transport.
// Purpose: Carry the encrypted token plus transport-supplied metadata.
// Dependencies: std
// ============================================================================

//! ## Overview
//! An [`EncryptedEnvelope`] is built by the queue consumer for each received
//! message and consumed once by [`crate::ReceiptPipeline::process`].
//! Invariants:
//! - The body is opaque until decrypted.
//! - `delivery_count` is informational only and never affects the disposition.

// ============================================================================
// SECTION: Envelope
// ============================================================================

/// Encrypted message as received from the queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptedEnvelope {
    /// Encrypted token bytes.
    pub body: Vec<u8>,
    /// Correlation id supplied by the transport, when present.
    pub correlation_id: Option<String>,
    /// Number of times the broker has delivered this message (1 on first delivery).
    pub delivery_count: u32,
}

impl EncryptedEnvelope {
    /// Creates a first-delivery envelope without a correlation id.
    #[must_use]
    pub fn new(body: impl Into<Vec<u8>>) -> Self {
        Self {
            body: body.into(),
            correlation_id: None,
            delivery_count: 1,
        }
    }

    /// Builds an envelope from transport header values.
    ///
    /// The broker's `x-delivery-count` header counts previous deliveries, so
    /// the effective delivery count is the header value plus one. A missing or
    /// malformed header counts as zero previous deliveries.
    #[must_use]
    pub fn from_headers(
        body: impl Into<Vec<u8>>,
        correlation_id: Option<&str>,
        delivery_count_header: Option<&str>,
    ) -> Self {
        let previous =
            delivery_count_header.and_then(|value| value.trim().parse::<u32>().ok()).unwrap_or(0);
        Self {
            body: body.into(),
            correlation_id: correlation_id
                .map(str::trim)
                .filter(|value| !value.is_empty())
                .map(str::to_string),
            delivery_count: previous.saturating_add(1),
        }
    }

    /// Sets the transport correlation id.
    #[must_use]
    pub fn with_correlation_id(mut self, correlation_id: impl Into<String>) -> Self {
        self.correlation_id = Some(correlation_id.into());
        self
    }
}
