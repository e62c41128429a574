// crates/receipt-relay-core/src/lib.rs
// ============================================================================
// Module: Receipt Relay Core Library
// Description: Decrypt, validate, render, deliver and classify survey receipts.
// Purpose: Turn one encrypted queue envelope into exactly one disposition.
// Dependencies: fernet, quick-xml, reqwest, serde_json, thiserror, tracing, url
// ============================================================================

//! ## Overview
//! Receipt Relay Core implements the receipting pipeline:
//! [`ReceiptCipher`] → [`validate`] → [`TargetResolver`] → [`render`] →
//! [`ReceiptSink`] → [`ErrorKind::disposition`]. The entry point is
//! [`ReceiptPipeline::process`], which always returns a [`Disposition`] for the
//! queue consumer to act on.
//! Invariants:
//! - Exactly one [`Disposition`] is produced per envelope.
//! - Only the delivery client retries, and only for connection-level failures.
//! - Every failure is mapped through the [`ErrorKind`] table; no stage builds a
//!   disposition on its own.
//!
//! Security posture: envelopes and downstream responses are untrusted; the
//! pre-shared secret and basic-auth password are never logged.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod context;
pub mod crypto;
pub mod envelope;
pub mod error_body;
pub mod outcome;
pub mod payload;
pub mod pipeline;
pub mod render;
pub mod secret;
pub mod sink;
pub mod target;
pub mod validate;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use context::LogContext;
pub use crypto::DecryptError;
pub use crypto::InvalidKeyError;
pub use crypto::ReceiptCipher;
pub use envelope::EncryptedEnvelope;
pub use outcome::Disposition;
pub use outcome::ErrorKind;
pub use outcome::PipelineError;
pub use payload::DecryptedPayload;
pub use pipeline::ReceiptPipeline;
pub use render::GatewayReceipt;
pub use render::RenderError;
pub use render::RenderedReceipt;
pub use render::render;
pub use secret::Secret;
pub use sink::BasicAuth;
pub use sink::DeliveryError;
pub use sink::DeliveryReceipt;
pub use sink::HttpSink;
pub use sink::HttpSinkConfig;
pub use sink::ReceiptSink;
pub use sink::RetryPolicy;
pub use sink::SinkSetupError;
pub use sink::SkipSink;
pub use target::LegacyEndpoint;
pub use target::Target;
pub use target::TargetResolver;
pub use target::statistical_unit_id;
pub use validate::ValidationError;
pub use validate::validate;
