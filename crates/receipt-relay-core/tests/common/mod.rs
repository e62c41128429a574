// crates/receipt-relay-core/tests/common/mod.rs
// ============================================================================
// Module: Common Test Utilities
// Description: Shared helpers for receipt-relay-core tests.
// Purpose: Provide mock downstream endpoints and pipeline builders.
// Dependencies: receipt-relay-core, tiny_http, url
// ============================================================================

//! ## Overview
//! Provides a recording `tiny_http` endpoint and builders for pipelines wired
//! against it.

#![allow(
    clippy::panic,
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only output and panic-based assertions are permitted."
)]

use std::net::TcpListener;
use std::sync::Arc;
use std::sync::Mutex;
use std::thread;
use std::time::Duration;

use receipt_relay_core::BasicAuth;
use receipt_relay_core::EncryptedEnvelope;
use receipt_relay_core::HttpSink;
use receipt_relay_core::HttpSinkConfig;
use receipt_relay_core::LegacyEndpoint;
use receipt_relay_core::ReceiptCipher;
use receipt_relay_core::ReceiptPipeline;
use receipt_relay_core::RetryPolicy;
use receipt_relay_core::Secret;
use receipt_relay_core::TargetResolver;
use tiny_http::Header;
use tiny_http::Response;
use tiny_http::Server;
use url::Url;

// ============================================================================
// SECTION: Fixtures
// ============================================================================

/// Pre-shared key used by every test.
pub const TEST_SECRET: &str = "seB388LNHgxcuvAcg1pOV20_VR7uJWNGAznE0fOqKxg=";

/// Gateway-shape payload.
pub const GATEWAY_PAYLOAD: &str = r#"{"tx_id":"t1","case_id":"c1","metadata":{"user_id":"u1"}}"#;

/// Legacy-shape payload.
pub const LEGACY_PAYLOAD: &str = r#"{"tx_id":"0f534ffc-9442-414c-b39f-a756b4adc6cb","collection":{"exercise_sid":"hfjdskf"},"metadata":{"user_id":"789473423","ru_ref":"12345678901A"}}"#;

/// XML body reporting error code 1009.
pub const NO_SAMPLE_MAP_BODY: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<error:error xmlns:error="http://ns.ons.gov.uk/namespaces/resources/error">
  <error:message>1009 - No sample map record found</error:message>
</error:error>"#;

/// Returns the shared test cipher.
pub fn cipher() -> ReceiptCipher {
    ReceiptCipher::new(&Secret::new(TEST_SECRET)).unwrap()
}

/// Encrypts a JSON payload into an envelope.
pub fn envelope(json: &str) -> EncryptedEnvelope {
    EncryptedEnvelope::new(cipher().encrypt(json.as_bytes()).into_bytes())
}

// ============================================================================
// SECTION: Mock Endpoint
// ============================================================================

/// Request captured by [`MockEndpoint`].
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    /// HTTP method.
    pub method: String,
    /// Request path.
    pub path: String,
    /// Content-Type header value.
    pub content_type: Option<String>,
    /// Authorization header value.
    pub authorization: Option<String>,
    /// Request body.
    pub body: String,
}

/// HTTP endpoint answering every request with a fixed response.
pub struct MockEndpoint {
    /// Base URL of the endpoint.
    pub base_url: String,
    /// Underlying server, shared with the worker thread.
    server: Arc<Server>,
    /// Captured requests.
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
    /// Worker thread.
    handle: Option<thread::JoinHandle<()>>,
}

impl MockEndpoint {
    /// Starts an endpoint returning `status` with `body`.
    pub fn start(status: u16, body: &str) -> Self {
        Self::start_with_delay(status, body, Duration::ZERO)
    }

    /// Starts an endpoint that waits `delay` after reading each request.
    pub fn start_with_delay(status: u16, body: &str, delay: Duration) -> Self {
        let server = Arc::new(Server::http("127.0.0.1:0").unwrap());
        let addr = server.server_addr().to_ip().unwrap();
        let requests = Arc::new(Mutex::new(Vec::new()));
        let worker_server = Arc::clone(&server);
        let worker_requests = Arc::clone(&requests);
        let body = body.to_string();
        let handle = thread::spawn(move || {
            for mut request in worker_server.incoming_requests() {
                let header = |name: &str| {
                    request
                        .headers()
                        .iter()
                        .find(|header| {
                            header.field.as_str().as_str().eq_ignore_ascii_case(name)
                        })
                        .map(|header| header.value.as_str().to_string())
                };
                let content_type = header("Content-Type");
                let authorization = header("Authorization");
                let mut request_body = String::new();
                request.as_reader().read_to_string(&mut request_body).unwrap();
                worker_requests.lock().unwrap().push(RecordedRequest {
                    method: request.method().as_str().to_string(),
                    path: request.url().to_string(),
                    content_type,
                    authorization,
                    body: request_body,
                });
                if !delay.is_zero() {
                    thread::sleep(delay);
                }
                let response = Response::from_string(body.clone())
                    .with_status_code(status)
                    .with_header(Header::from_bytes("Content-Type", "application/xml").unwrap());
                let _ = request.respond(response);
            }
        });
        Self {
            base_url: format!("http://{addr}"),
            server,
            requests,
            handle: Some(handle),
        }
    }

    /// Returns the URL for a path on this endpoint.
    pub fn url(&self, path: &str) -> Url {
        Url::parse(&format!("{}{path}", self.base_url)).unwrap()
    }

    /// Returns the captured requests.
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }
}

impl Drop for MockEndpoint {
    fn drop(&mut self) {
        self.server.unblock();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

/// Returns a URL on a local port with nothing listening.
pub fn closed_port_url() -> Url {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    Url::parse(&format!("http://{addr}/receipts")).unwrap()
}

// ============================================================================
// SECTION: Pipeline Builders
// ============================================================================

/// Sink configuration with fast retries for tests.
pub fn sink_config() -> HttpSinkConfig {
    HttpSinkConfig {
        legacy_auth: BasicAuth {
            username: "rrm".to_string(),
            password: Secret::new("rrm-pass"),
        },
        gateway_auth: BasicAuth {
            username: "gw".to_string(),
            password: Secret::new("gw-pass"),
        },
        request_timeout: Duration::from_secs(5),
        retry: RetryPolicy {
            max_attempts: 5,
            initial_backoff: Duration::from_millis(1),
            max_backoff: Duration::from_millis(5),
        },
        ..HttpSinkConfig::default()
    }
}

/// Builds a resolver for the given legacy host and gateway URL.
pub fn resolver(legacy_host: &str, gateway: Url) -> TargetResolver {
    TargetResolver::new(
        LegacyEndpoint {
            host: Url::parse(legacy_host).unwrap(),
            path: "reportingunits".to_string(),
        },
        gateway,
    )
}

/// Builds a pipeline whose both targets point at `endpoint`.
pub fn pipeline_for(endpoint: &MockEndpoint) -> ReceiptPipeline {
    ReceiptPipeline::new(
        cipher(),
        resolver(&endpoint.base_url, endpoint.url("/receipts")),
        HttpSink::new(sink_config()).unwrap(),
    )
}
