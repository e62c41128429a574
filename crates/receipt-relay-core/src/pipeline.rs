// crates/receipt-relay-core/src/pipeline.rs
// ============================================================================
// Module: Receipt Relay Pipeline
// Description: Wires the decryption gate, validator, resolver, renderer and sink.
// Purpose: Process one envelope into one disposition.
// Dependencies: crypto, validate, target, render, sink, outcome, tracing
// ============================================================================

//! ## Overview
//! [`ReceiptPipeline::process`] runs decrypt → validate → resolve → render →
//! deliver, stopping at the first failure, and classifies the result through
//! [`crate::outcome::classify`]. The outcome is logged exactly once with the
//! identifiers known at the point of failure.
//! Invariants:
//! - Each call is independent; the pipeline holds no per-message state.
//! - Nothing is sent downstream unless validation and rendering succeeded.

// ============================================================================
// SECTION: Imports
// ============================================================================

use tracing::debug;
use tracing::error;
use tracing::info;
use tracing::warn;

use crate::context::LogContext;
use crate::crypto::ReceiptCipher;
use crate::envelope::EncryptedEnvelope;
use crate::outcome::Disposition;
use crate::outcome::PipelineError;
use crate::outcome::classify;
use crate::payload::DecryptedPayload;
use crate::render::render;
use crate::sink::DeliveryReceipt;
use crate::sink::ReceiptSink;
use crate::target::TargetResolver;
use crate::validate;

// ============================================================================
// SECTION: Pipeline
// ============================================================================

/// Receipt processing pipeline.
///
/// # Invariants
/// - Shared configuration (key, endpoints, sink) is read-only after construction.
pub struct ReceiptPipeline {
    /// Decryption gate.
    cipher: ReceiptCipher,
    /// Delivery target resolver.
    resolver: TargetResolver,
    /// Delivery client.
    sink: Box<dyn ReceiptSink>,
}

impl ReceiptPipeline {
    /// Creates a pipeline.
    #[must_use]
    pub fn new(
        cipher: ReceiptCipher,
        resolver: TargetResolver,
        sink: impl ReceiptSink + 'static,
    ) -> Self {
        Self {
            cipher,
            resolver,
            sink: Box::new(sink),
        }
    }

    /// Processes one envelope and returns its disposition.
    pub fn process(&self, envelope: &EncryptedEnvelope) -> Disposition {
        let ctx = LogContext::for_envelope(envelope);
        debug!(
            correlation_id = ctx.correlation_id(),
            delivery_count = ctx.delivery_count(),
            "received envelope"
        );
        let payload = match self.open(envelope) {
            Ok(payload) => payload,
            Err(err) => return finish(&ctx, &Err(err)),
        };
        // Enriched before validation so failure records carry payload ids.
        let ctx = ctx.with_payload(&payload);
        let result = self.receipt(payload, envelope.correlation_id.as_deref(), &ctx);
        finish(&ctx, &result)
    }

    /// Decrypts and parses the envelope body.
    fn open(&self, envelope: &EncryptedEnvelope) -> Result<DecryptedPayload, PipelineError> {
        let plaintext = self.cipher.decrypt(&envelope.body)?;
        Ok(validate::parse(&plaintext)?)
    }

    /// Validates, routes, renders and delivers a parsed payload.
    fn receipt(
        &self,
        payload: DecryptedPayload,
        correlation_id: Option<&str>,
        ctx: &LogContext,
    ) -> Result<DeliveryReceipt, PipelineError> {
        let payload = validate::validate(payload, correlation_id)?;
        let target = self.resolver.resolve(&payload)?;
        let receipt = render(&payload, &target)?;
        Ok(self.sink.deliver(&target, &receipt, ctx)?)
    }
}

// ============================================================================
// SECTION: Outcome Logging
// ============================================================================

/// Classifies the result and writes the single outcome record.
fn finish(ctx: &LogContext, result: &Result<DeliveryReceipt, PipelineError>) -> Disposition {
    let disposition = classify(result);
    match (result, &disposition) {
        (Ok(receipt), _) => info!(
            tx_id = ctx.tx_id(),
            case_id = ctx.case_id(),
            user_id = ctx.user_id(),
            ru_ref = ctx.ru_ref(),
            delivery_count = ctx.delivery_count(),
            target = receipt.target,
            status_code = receipt.status,
            attempts = receipt.attempts,
            action = disposition.label(),
            "receipt delivered"
        ),
        (Err(err), Disposition::Retry(reason)) => warn!(
            tx_id = ctx.tx_id(),
            case_id = ctx.case_id(),
            user_id = ctx.user_id(),
            ru_ref = ctx.ru_ref(),
            delivery_count = ctx.delivery_count(),
            error_kind = err.kind().as_str(),
            action = disposition.label(),
            reason = %reason,
            "receipt failed, will retry"
        ),
        (Err(err), _) => error!(
            tx_id = ctx.tx_id(),
            case_id = ctx.case_id(),
            user_id = ctx.user_id(),
            ru_ref = ctx.ru_ref(),
            delivery_count = ctx.delivery_count(),
            error_kind = err.kind().as_str(),
            action = disposition.label(),
            reason = disposition.reason(),
            "receipt failed, quarantining"
        ),
    }
    disposition
}
