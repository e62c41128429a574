// crates/receipt-relay-core/src/sink.rs
// ============================================================================
// Module: Receipt Relay Delivery Client
// Description: Sink trait and HTTP implementation for receipt delivery.
// Purpose: POST rendered receipts downstream and classify the response.
// Dependencies: reqwest, thiserror, tracing, error_body
// ============================================================================

//! ## Overview
//! Sinks deliver a [`RenderedReceipt`] to a resolved [`Target`]. [`HttpSink`]
//! performs one logical POST with bounded retry for connection-level failures
//! and classifies the response:
//!
//! | Response                          | Result                               |
//! |-----------------------------------|--------------------------------------|
//! | 2xx                               | [`DeliveryReceipt`]                  |
//! | 400                               | [`DeliveryError::Rejected`]          |
//! | 404 with error code 1009          | [`DeliveryError::Rejected`]          |
//! | any other 4xx/5xx                 | [`DeliveryError::Unavailable`]       |
//! | connect failure after retries     | [`DeliveryError::TransportExhausted`] |
//! | any other transport failure       | [`DeliveryError::TransportExhausted`] |
//!
//! Invariants:
//! - HTTP status codes are never retried here.
//! - A request that may have reached the server is never re-sent.
//! - Total wall-clock time is bounded by [`RetryPolicy::budget`].
//!
//! Security posture: basic-auth passwords are held as [`Secret`] and never
//! logged; response bodies are read with a hard cap.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::io::Read;
use std::thread;
use std::time::Duration;

use reqwest::Certificate;
use reqwest::StatusCode;
use reqwest::blocking::Client;
use reqwest::blocking::Response;
use reqwest::header::CONTENT_TYPE;
use reqwest::redirect::Policy;
use thiserror::Error;
use tracing::debug;
use tracing::info;
use tracing::warn;

use crate::context::LogContext;
use crate::error_body::is_no_sample_map_record;
use crate::render::RenderedReceipt;
use crate::secret::Secret;
use crate::target::Target;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Maximum response body bytes read for error classification.
pub const MAX_ERROR_BODY_BYTES: usize = 64 * 1024;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Delivery failures.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeliveryError {
    /// Downstream refused the receipt permanently.
    #[error("receipt rejected (status {status}): {reason}")]
    Rejected {
        /// HTTP status code.
        status: u16,
        /// Human-readable reason.
        reason: String,
    },
    /// Downstream failed in a way that may succeed on redelivery.
    #[error("downstream unavailable (status {status})")]
    Unavailable {
        /// HTTP status code.
        status: u16,
    },
    /// Connection-level failures persisted through every attempt.
    #[error("transport failed after {attempts} attempts: {message}")]
    TransportExhausted {
        /// Attempts made.
        attempts: u32,
        /// Last transport error.
        message: String,
    },
}

/// Sink construction failures.
#[derive(Debug, Error)]
pub enum SinkSetupError {
    /// CA bundle could not be parsed.
    #[error("invalid ca bundle: {0}")]
    CaBundle(String),
    /// HTTP client could not be built.
    #[error("http client build failed: {0}")]
    Client(String),
}

// ============================================================================
// SECTION: Sink Trait
// ============================================================================

/// Successful delivery record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryReceipt {
    /// Target label (`legacy` or `gateway`).
    pub target: &'static str,
    /// Endpoint the receipt was delivered to.
    pub endpoint: String,
    /// Response status, absent when delivery was skipped.
    pub status: Option<u16>,
    /// Attempts made, zero when delivery was skipped.
    pub attempts: u32,
}

/// Delivers rendered receipts to a target.
pub trait ReceiptSink: Send + Sync {
    /// Delivers the receipt.
    ///
    /// # Errors
    ///
    /// Returns [`DeliveryError`] when delivery fails.
    fn deliver(
        &self,
        target: &Target,
        receipt: &RenderedReceipt,
        ctx: &LogContext,
    ) -> Result<DeliveryReceipt, DeliveryError>;
}

// ============================================================================
// SECTION: Retry Policy
// ============================================================================

/// Bounded exponential backoff for connection-level failures.
///
/// # Invariants
/// - `max_attempts` counts the first attempt.
/// - Backoff doubles per attempt and never exceeds `max_backoff`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub max_attempts: u32,
    /// Delay after the first failed attempt.
    pub initial_backoff: Duration,
    /// Upper bound on any single delay.
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_secs(2),
        }
    }
}

impl RetryPolicy {
    /// Returns the delay after the given failed attempt (1-based).
    #[must_use]
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(31);
        self.initial_backoff.saturating_mul(1_u32 << exponent).min(self.max_backoff)
    }

    /// Returns the worst-case wall-clock time for one delivery.
    #[must_use]
    pub fn budget(&self, request_timeout: Duration) -> Duration {
        let sleeps = (1..self.max_attempts)
            .fold(Duration::ZERO, |total, attempt| total.saturating_add(self.backoff(attempt)));
        request_timeout.saturating_mul(self.max_attempts).saturating_add(sleeps)
    }
}

// ============================================================================
// SECTION: HTTP Sink
// ============================================================================

/// Basic-auth credentials for one target.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BasicAuth {
    /// Username.
    pub username: String,
    /// Password.
    pub password: Secret,
}

/// Configuration for [`HttpSink`].
#[derive(Debug, Clone)]
pub struct HttpSinkConfig {
    /// Credentials for the legacy receipting service.
    pub legacy_auth: BasicAuth,
    /// Whether the legacy service certificate is verified.
    pub legacy_verify_tls: bool,
    /// Credentials for the gateway.
    pub gateway_auth: BasicAuth,
    /// PEM CA bundle trusted for the gateway.
    pub gateway_ca_bundle: Option<Vec<u8>>,
    /// Per-attempt request timeout.
    pub request_timeout: Duration,
    /// Transport retry policy.
    pub retry: RetryPolicy,
    /// User agent sent with each request.
    pub user_agent: String,
}

impl Default for HttpSinkConfig {
    fn default() -> Self {
        Self {
            legacy_auth: BasicAuth::default(),
            legacy_verify_tls: false,
            gateway_auth: BasicAuth::default(),
            gateway_ca_bundle: None,
            request_timeout: Duration::from_secs(10),
            retry: RetryPolicy::default(),
            user_agent: concat!("receipt-relay/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

/// HTTP sink posting receipts with basic auth.
///
/// # Invariants
/// - Redirects are not followed.
/// - Each target uses its own client so TLS policy never leaks across targets.
pub struct HttpSink {
    /// Client for the legacy service.
    legacy_client: Client,
    /// Client for the gateway.
    gateway_client: Client,
    /// Legacy credentials.
    legacy_auth: BasicAuth,
    /// Gateway credentials.
    gateway_auth: BasicAuth,
    /// Transport retry policy.
    retry: RetryPolicy,
}

impl HttpSink {
    /// Builds the sink and its HTTP clients.
    ///
    /// # Errors
    ///
    /// Returns [`SinkSetupError`] when a client cannot be built.
    pub fn new(config: HttpSinkConfig) -> Result<Self, SinkSetupError> {
        let legacy_client = base_builder(&config)
            .danger_accept_invalid_certs(!config.legacy_verify_tls)
            .build()
            .map_err(|err| SinkSetupError::Client(err.to_string()))?;
        let mut gateway_builder = base_builder(&config);
        if let Some(pem) = &config.gateway_ca_bundle {
            let certs = Certificate::from_pem_bundle(pem)
                .map_err(|err| SinkSetupError::CaBundle(err.to_string()))?;
            if certs.is_empty() {
                return Err(SinkSetupError::CaBundle("no certificates found".to_string()));
            }
            for cert in certs {
                gateway_builder = gateway_builder.add_root_certificate(cert);
            }
        }
        let gateway_client =
            gateway_builder.build().map_err(|err| SinkSetupError::Client(err.to_string()))?;
        Ok(Self {
            legacy_client,
            gateway_client,
            legacy_auth: config.legacy_auth,
            gateway_auth: config.gateway_auth,
            retry: config.retry,
        })
    }

    /// Sends the request until it reaches the server or attempts run out.
    fn send_with_retry(
        &self,
        target: &Target,
        receipt: &RenderedReceipt,
        ctx: &LogContext,
    ) -> Result<(Response, u32), DeliveryError> {
        let (client, auth) = match target {
            Target::Legacy {
                ..
            } => (&self.legacy_client, &self.legacy_auth),
            Target::Gateway {
                ..
            } => (&self.gateway_client, &self.gateway_auth),
        };
        let max_attempts = self.retry.max_attempts.max(1);
        let mut attempt = 0;
        loop {
            attempt += 1;
            let request = client
                .post(target.endpoint().clone())
                .basic_auth(&auth.username, Some(auth.password.expose()))
                .header(CONTENT_TYPE, receipt.content_type());
            let request = match receipt {
                RenderedReceipt::Xml(xml) => request.body(xml.clone()),
                RenderedReceipt::Json(body) => request.json(body),
            };
            match request.send() {
                Ok(response) => return Ok((response, attempt)),
                Err(err) if is_connection_error(&err) && attempt < max_attempts => {
                    let delay = self.retry.backoff(attempt);
                    warn!(
                        tx_id = ctx.tx_id(),
                        request_url = %target.endpoint(),
                        attempt,
                        delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        error = %err,
                        "connection failed, retrying"
                    );
                    thread::sleep(delay);
                }
                Err(err) => {
                    return Err(DeliveryError::TransportExhausted {
                        attempts: attempt,
                        message: err.to_string(),
                    });
                }
            }
        }
    }
}

impl ReceiptSink for HttpSink {
    fn deliver(
        &self,
        target: &Target,
        receipt: &RenderedReceipt,
        ctx: &LogContext,
    ) -> Result<DeliveryReceipt, DeliveryError> {
        info!(
            tx_id = ctx.tx_id(),
            case_id = ctx.case_id(),
            target = target.label(),
            request_url = %target.endpoint(),
            "calling service"
        );
        let (response, attempts) = self.send_with_retry(target, receipt, ctx)?;
        let status = response.status();
        debug!(
            tx_id = ctx.tx_id(),
            request_url = %target.endpoint(),
            status_code = status.as_u16(),
            "returned from service"
        );
        classify_status(status, response)?;
        Ok(DeliveryReceipt {
            target: target.label(),
            endpoint: target.endpoint().to_string(),
            status: Some(status.as_u16()),
            attempts,
        })
    }
}

// ============================================================================
// SECTION: Skip Sink
// ============================================================================

/// Sink that records the receipt as delivered without any outbound call.
///
/// Used when receipting is switched off for an environment.
#[derive(Debug, Clone, Copy, Default)]
pub struct SkipSink;

impl ReceiptSink for SkipSink {
    fn deliver(
        &self,
        target: &Target,
        _receipt: &RenderedReceipt,
        ctx: &LogContext,
    ) -> Result<DeliveryReceipt, DeliveryError> {
        debug!(tx_id = ctx.tx_id(), target = target.label(), "skipping receipt delivery");
        Ok(DeliveryReceipt {
            target: target.label(),
            endpoint: target.endpoint().to_string(),
            status: None,
            attempts: 0,
        })
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Shared client settings for both targets.
fn base_builder(config: &HttpSinkConfig) -> reqwest::blocking::ClientBuilder {
    Client::builder()
        .timeout(config.request_timeout)
        .user_agent(config.user_agent.clone())
        .redirect(Policy::none())
}

/// Returns true when the connection was never established.
///
/// Read timeouts are excluded: the server may already hold the POST.
fn is_connection_error(err: &reqwest::Error) -> bool {
    err.is_connect()
}

/// Maps a response status onto the delivery taxonomy.
fn classify_status(status: StatusCode, response: Response) -> Result<(), DeliveryError> {
    if status.is_success() {
        return Ok(());
    }
    match status {
        StatusCode::BAD_REQUEST => Err(DeliveryError::Rejected {
            status: status.as_u16(),
            reason: "downstream returned client error".to_string(),
        }),
        StatusCode::NOT_FOUND => {
            let body = read_body_limited(response);
            if is_no_sample_map_record(&body) {
                Err(DeliveryError::Rejected {
                    status: status.as_u16(),
                    reason: "no sample map record (1009)".to_string(),
                })
            } else {
                Err(DeliveryError::Unavailable {
                    status: status.as_u16(),
                })
            }
        }
        _ => Err(DeliveryError::Unavailable {
            status: status.as_u16(),
        }),
    }
}

/// Reads at most [`MAX_ERROR_BODY_BYTES`]; read failures yield an empty body.
fn read_body_limited(response: Response) -> String {
    let limit = u64::try_from(MAX_ERROR_BODY_BYTES).unwrap_or(u64::MAX);
    let mut bytes = Vec::new();
    if response.take(limit).read_to_end(&mut bytes).is_err() {
        return String::new();
    }
    String::from_utf8_lossy(&bytes).into_owned()
}
