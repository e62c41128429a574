// crates/receipt-relay-config/src/lib.rs
// ============================================================================
// Module: Receipt Relay Config Library
// Description: Canonical config model, environment overlay and validation.
// Purpose: Single source of truth for receipt-relay.toml semantics.
// Dependencies: receipt-relay-core, serde, toml, url
// ============================================================================

//! ## Overview
//! `receipt-relay-config` loads the relay configuration from TOML, overlays
//! the environment variables of the deployed service, validates the result
//! fail-closed and builds the core pipeline from it.
//!
//! Security posture: config inputs are untrusted; the decryption key and
//! passwords are held as [`receipt_relay_core::Secret`].

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod config;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use config::*;
