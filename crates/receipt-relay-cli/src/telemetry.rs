// crates/receipt-relay-cli/src/telemetry.rs
// ============================================================================
// Module: Receipt Relay Telemetry
// Description: Process-wide tracing subscriber setup.
// Purpose: Route structured pipeline logs to stderr as text or JSON.
// Dependencies: receipt-relay-config, tracing-subscriber
// ============================================================================

//! ## Overview
//! Installs a `tracing-subscriber` registry with an [`EnvFilter`] and a
//! single `fmt` layer. `RUST_LOG` takes precedence over `logging.level`.
//! Records go to stderr so stdout stays reserved for command output.

use std::io;

use receipt_relay_config::LoggingConfig;
use thiserror::Error;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Telemetry setup failures.
#[derive(Debug, Error)]
pub enum TelemetryError {
    /// Log filter could not be built.
    #[error("invalid log filter: {0}")]
    Filter(String),
    /// A global subscriber is already installed.
    #[error("tracing init failed: {0}")]
    Init(String),
}

/// Installs the global subscriber.
///
/// # Errors
///
/// Returns [`TelemetryError`] when the filter is invalid or a subscriber is
/// already installed.
pub fn init(logging: &LoggingConfig) -> Result<(), TelemetryError> {
    let directive = logging.directive().map_err(|err| TelemetryError::Filter(err.to_string()))?;
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(directive))
        .map_err(|err| TelemetryError::Filter(err.to_string()))?;
    let registry = tracing_subscriber::registry().with(filter);
    let installed = if logging.json {
        let layer = fmt::layer()
            .json()
            .with_target(true)
            .with_current_span(false)
            .with_writer(io::stderr);
        registry.with(layer).try_init()
    } else {
        let layer = fmt::layer().with_target(true).with_ansi(false).with_writer(io::stderr);
        registry.with(layer).try_init()
    };
    installed.map_err(|err| TelemetryError::Init(err.to_string()))
}
