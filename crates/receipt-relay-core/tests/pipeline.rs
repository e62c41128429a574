// crates/receipt-relay-core/tests/pipeline.rs
// ============================================================================
// Module: Receipt Pipeline Integration Tests
// Description: End-to-end processing against mock downstream services.
// Purpose: Verify dispositions, outbound requests and fail-closed behavior.
// Dependencies: receipt-relay-core, tiny_http
// ============================================================================

//! ## Overview
//! Drives [`ReceiptPipeline::process`] against recording `tiny_http`
//! endpoints and a recording sink.

#![allow(dead_code, reason = "Common module may have unused helpers.")]
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

mod common;

use std::sync::Arc;
use std::sync::Mutex;
use std::time::Duration;

use common::GATEWAY_PAYLOAD;
use common::LEGACY_PAYLOAD;
use common::MockEndpoint;
use common::NO_SAMPLE_MAP_BODY;
use common::TEST_SECRET;
use common::cipher;
use common::closed_port_url;
use common::envelope;
use common::pipeline_for;
use common::resolver;
use common::sink_config;
use fernet::Fernet;
use receipt_relay_core::DeliveryError;
use receipt_relay_core::DeliveryReceipt;
use receipt_relay_core::Disposition;
use receipt_relay_core::EncryptedEnvelope;
use receipt_relay_core::HttpSink;
use receipt_relay_core::HttpSinkConfig;
use receipt_relay_core::LogContext;
use receipt_relay_core::ReceiptPipeline;
use receipt_relay_core::ReceiptSink;
use receipt_relay_core::RenderedReceipt;
use receipt_relay_core::SkipSink;
use receipt_relay_core::Target;

// ============================================================================
// SECTION: Recording Sink
// ============================================================================

/// Sink that records calls and always succeeds.
#[derive(Default, Clone)]
struct RecordingSink {
    /// Endpoints delivered to, in order.
    calls: Arc<Mutex<Vec<String>>>,
}

impl ReceiptSink for RecordingSink {
    fn deliver(
        &self,
        target: &Target,
        _receipt: &RenderedReceipt,
        _ctx: &LogContext,
    ) -> Result<DeliveryReceipt, DeliveryError> {
        self.calls.lock().unwrap().push(target.endpoint().to_string());
        Ok(DeliveryReceipt {
            target: target.label(),
            endpoint: target.endpoint().to_string(),
            status: Some(201),
            attempts: 1,
        })
    }
}

/// Builds a pipeline over a fresh [`RecordingSink`].
fn recording_pipeline() -> (ReceiptPipeline, RecordingSink) {
    let sink = RecordingSink::default();
    let pipeline = ReceiptPipeline::new(
        cipher(),
        resolver("http://sdx-mock-receipt:5000", "http://localhost:8191/receipts".parse().unwrap()),
        sink.clone(),
    );
    (pipeline, sink)
}

/// Asserts a quarantine whose reason contains `reason`.
fn assert_quarantined(disposition: &Disposition, reason: &str) {
    match disposition {
        Disposition::Quarantined(actual) => assert!(actual.contains(reason), "reason: {actual}"),
        other => panic!("expected quarantine, got {other:?}"),
    }
}

// ============================================================================
// SECTION: Gateway Delivery
// ============================================================================

#[test]
fn gateway_created_is_accepted_with_exact_body() {
    let endpoint = MockEndpoint::start(201, "");
    let pipeline = pipeline_for(&endpoint);

    let disposition = pipeline.process(&envelope(GATEWAY_PAYLOAD));

    assert_eq!(disposition, Disposition::Accepted);
    let requests = endpoint.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].method, "POST");
    assert_eq!(requests[0].path, "/receipts");
    assert_eq!(requests[0].body, r#"{"caseId":"c1","userId":"u1"}"#);
    assert_eq!(requests[0].content_type.as_deref(), Some("application/json"));
    // gw:gw-pass
    assert_eq!(requests[0].authorization.as_deref(), Some("Basic Z3c6Z3ctcGFzcw=="));
}

#[test]
fn gateway_bad_request_is_quarantined() {
    let endpoint = MockEndpoint::start(400, "");
    let disposition = pipeline_for(&endpoint).process(&envelope(GATEWAY_PAYLOAD));
    assert_quarantined(&disposition, "status 400");
    assert_eq!(endpoint.requests().len(), 1);
}

#[test]
fn gateway_server_error_is_retried_without_resending() {
    let endpoint = MockEndpoint::start(500, "");
    let disposition = pipeline_for(&endpoint).process(&envelope(GATEWAY_PAYLOAD));
    assert!(matches!(disposition, Disposition::Retry(_)), "{disposition:?}");
    assert_eq!(endpoint.requests().len(), 1);
}

#[test]
fn gateway_404_with_1009_is_quarantined() {
    let endpoint = MockEndpoint::start(404, NO_SAMPLE_MAP_BODY);
    let disposition = pipeline_for(&endpoint).process(&envelope(GATEWAY_PAYLOAD));
    assert_quarantined(&disposition, "1009");
}

// ============================================================================
// SECTION: Legacy Delivery
// ============================================================================

#[test]
fn legacy_receipt_posts_xml_to_reporting_unit_path() {
    let endpoint = MockEndpoint::start(201, "");
    let disposition = pipeline_for(&endpoint).process(&envelope(LEGACY_PAYLOAD));

    assert_eq!(disposition, Disposition::Accepted);
    let requests = endpoint.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(
        requests[0].path,
        "/reportingunits/12345678901/collectionexercises/hfjdskf/receipts"
    );
    assert_eq!(requests[0].content_type.as_deref(), Some("application/vnd.collections+xml"));
    // rrm:rrm-pass
    assert_eq!(requests[0].authorization.as_deref(), Some("Basic cnJtOnJybS1wYXNz"));
    let body = &requests[0].body;
    assert!(body.contains("<tx_id>0f534ffc-9442-414c-b39f-a756b4adc6cb</tx_id>"), "{body}");
    assert!(body.contains("<respondent_id>789473423</respondent_id>"), "{body}");
    assert!(body.contains("<statistical_unit_id>12345678901</statistical_unit_id>"), "{body}");
    assert!(body.contains("<exercise_sid>hfjdskf</exercise_sid>"), "{body}");
}

#[test]
fn legacy_404_with_1009_is_quarantined() {
    let endpoint = MockEndpoint::start(404, NO_SAMPLE_MAP_BODY);
    let disposition = pipeline_for(&endpoint).process(&envelope(LEGACY_PAYLOAD));
    assert_quarantined(&disposition, "no sample map record");
}

#[test]
fn legacy_404_without_code_is_retried() {
    let endpoint = MockEndpoint::start(404, "<html>Not Found</html>");
    let disposition = pipeline_for(&endpoint).process(&envelope(LEGACY_PAYLOAD));
    assert_eq!(disposition, Disposition::Retry("downstream unavailable (status 404)".to_string()));
}

#[test]
fn legacy_404_with_other_code_is_retried() {
    let endpoint = MockEndpoint::start(404, &NO_SAMPLE_MAP_BODY.replace("1009", "1004"));
    let disposition = pipeline_for(&endpoint).process(&envelope(LEGACY_PAYLOAD));
    assert!(matches!(disposition, Disposition::Retry(_)), "{disposition:?}");
}

// ============================================================================
// SECTION: Fail-Closed Validation
// ============================================================================

#[test]
fn missing_tx_id_is_quarantined_without_outbound_call() {
    let (pipeline, sink) = recording_pipeline();
    let disposition =
        pipeline.process(&envelope(r#"{"case_id":"c1","metadata":{"user_id":"u1"}}"#));
    assert_quarantined(&disposition, "missing tx_id");
    assert!(sink.calls.lock().unwrap().is_empty());
}

#[test]
fn missing_metadata_is_quarantined_without_outbound_call() {
    let (pipeline, sink) = recording_pipeline();
    let disposition = pipeline.process(&envelope(r#"{"tx_id":"t1"}"#));
    assert_quarantined(&disposition, "missing metadata");
    assert!(sink.calls.lock().unwrap().is_empty());
}

#[test]
fn tx_id_mismatch_is_quarantined() {
    let (pipeline, sink) = recording_pipeline();
    let envelope = envelope(GATEWAY_PAYLOAD).with_correlation_id("t2");
    let disposition = pipeline.process(&envelope);
    assert_quarantined(&disposition, "tx_id mismatch");
    assert!(sink.calls.lock().unwrap().is_empty());
}

#[test]
fn matching_correlation_id_is_accepted() {
    let (pipeline, sink) = recording_pipeline();
    let envelope = envelope(GATEWAY_PAYLOAD).with_correlation_id("t1");
    assert_eq!(pipeline.process(&envelope), Disposition::Accepted);
    assert_eq!(sink.calls.lock().unwrap().len(), 1);
}

#[test]
fn expired_token_is_quarantined_as_decrypt_failure() {
    let sink = RecordingSink::default();
    let pipeline = ReceiptPipeline::new(
        cipher().with_ttl(Some(60)),
        resolver("http://sdx-mock-receipt:5000", "http://localhost:8191/receipts".parse().unwrap()),
        sink.clone(),
    );
    let fernet = Fernet::new(TEST_SECRET).unwrap();
    // Issued at 2001-09-09, far outside the 60 second window.
    let token = fernet.encrypt_at_time(GATEWAY_PAYLOAD.as_bytes(), 1_000_000_000);

    let disposition = pipeline.process(&EncryptedEnvelope::new(token.into_bytes()));

    assert_eq!(disposition, Disposition::Quarantined("failed to decrypt".to_string()));
    assert!(sink.calls.lock().unwrap().is_empty());
}

#[test]
fn undecryptable_body_is_quarantined_with_generic_reason() {
    let (pipeline, sink) = recording_pipeline();
    let disposition = pipeline.process(&EncryptedEnvelope::new(b"not-a-token".to_vec()));
    assert_eq!(disposition, Disposition::Quarantined("failed to decrypt".to_string()));
    assert!(sink.calls.lock().unwrap().is_empty());
}

#[test]
fn non_json_plaintext_is_quarantined() {
    let (pipeline, sink) = recording_pipeline();
    let disposition = pipeline.process(&envelope("not json"));
    assert!(matches!(disposition, Disposition::Quarantined(_)), "{disposition:?}");
    assert!(sink.calls.lock().unwrap().is_empty());
}

#[test]
fn unroutable_payload_is_quarantined() {
    let (pipeline, sink) = recording_pipeline();
    let disposition = pipeline.process(&envelope(r#"{"tx_id":"t1","metadata":{"user_id":"u1"}}"#));
    assert_quarantined(&disposition, "cannot determine delivery target");
    assert!(sink.calls.lock().unwrap().is_empty());
}

#[test]
fn legacy_payload_without_user_id_fails_rendering() {
    let (pipeline, sink) = recording_pipeline();
    let disposition = pipeline.process(&envelope(
        r#"{"tx_id":"t1","collection":{"exercise_sid":"e"},"metadata":{"ru_ref":"12345678901A"}}"#,
    ));
    assert!(matches!(disposition, Disposition::Quarantined(_)), "{disposition:?}");
    assert!(sink.calls.lock().unwrap().is_empty());
}

// ============================================================================
// SECTION: Idempotence and Transport
// ============================================================================

#[test]
fn reprocessing_the_same_envelope_is_accepted_again() {
    let endpoint = MockEndpoint::start(201, "");
    let pipeline = pipeline_for(&endpoint);
    let envelope = envelope(GATEWAY_PAYLOAD);

    assert_eq!(pipeline.process(&envelope), Disposition::Accepted);
    assert_eq!(pipeline.process(&envelope), Disposition::Accepted);

    let requests = endpoint.requests();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[0].body, requests[1].body);
}

#[test]
fn refused_connection_is_retried_after_exhausting_attempts() {
    let pipeline = ReceiptPipeline::new(
        cipher(),
        resolver("http://sdx-mock-receipt:5000", closed_port_url()),
        HttpSink::new(sink_config()).unwrap(),
    );
    match pipeline.process(&envelope(GATEWAY_PAYLOAD)) {
        Disposition::Retry(reason) => {
            assert!(reason.contains("after 5 attempts"), "reason: {reason}");
        }
        other => panic!("expected retry, got {other:?}"),
    }
}

#[test]
fn slow_response_is_not_resent() {
    let endpoint = MockEndpoint::start_with_delay(201, "", Duration::from_millis(800));
    let config = HttpSinkConfig {
        request_timeout: Duration::from_millis(300),
        ..sink_config()
    };
    let pipeline = ReceiptPipeline::new(
        cipher(),
        resolver(&endpoint.base_url, endpoint.url("/receipts")),
        HttpSink::new(config).unwrap(),
    );

    let disposition = pipeline.process(&envelope(GATEWAY_PAYLOAD));

    match disposition {
        Disposition::Retry(reason) => {
            assert!(reason.contains("after 1 attempts"), "reason: {reason}");
        }
        other => panic!("expected retry, got {other:?}"),
    }
    assert_eq!(endpoint.requests().len(), 1);
}

#[test]
fn skip_sink_accepts_without_outbound_call() {
    let pipeline = ReceiptPipeline::new(
        cipher(),
        resolver("http://sdx-mock-receipt:5000", closed_port_url()),
        SkipSink,
    );
    assert_eq!(pipeline.process(&envelope(LEGACY_PAYLOAD)), Disposition::Accepted);
    assert_eq!(pipeline.process(&envelope(GATEWAY_PAYLOAD)), Disposition::Accepted);
}
