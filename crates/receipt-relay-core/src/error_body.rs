// crates/receipt-relay-core/src/error_body.rs
// ============================================================================
// Module: Receipt Relay Error Body Parser
// Description: Extracts error codes from legacy service XML error responses.
// Purpose: Distinguish permanent 404s (no sample-map record) from transient ones.
// Dependencies: quick-xml
// ============================================================================

//! ## Overview
//! The legacy receipting service reports failures as XML such as:
//!
//! ```xml
//! <error:error xmlns:error="http://ns.ons.gov.uk/namespaces/resources/error">
//!   <error:message>1009 - No sample map record found</error:message>
//! </error:error>
//! ```
//!
//! [`error_code`] reads the first `message` element bound to the error
//! namespace and returns the text before the first `-`, trimmed. Any other
//! structure, including invalid XML, yields `None`.

use quick_xml::NsReader;
use quick_xml::events::Event;
use quick_xml::name::ResolveResult;

/// Namespace of legacy error documents.
pub const ERROR_NAMESPACE: &str = "http://ns.ons.gov.uk/namespaces/resources/error";
/// Error code meaning no sample-map record exists for the reporting unit.
pub const NO_SAMPLE_MAP_RECORD: &str = "1009";

/// Returns the leading error code from a namespaced `error:message` element.
#[must_use]
pub fn error_code(body: &str) -> Option<String> {
    let mut reader = NsReader::from_str(body);
    let mut in_message = false;
    let mut message = String::new();
    loop {
        match reader.read_resolved_event() {
            Ok((ResolveResult::Bound(ns), Event::Start(start)))
                if !in_message
                    && ns.0 == ERROR_NAMESPACE.as_bytes()
                    && start.local_name().as_ref() == b"message" =>
            {
                in_message = true;
            }
            Ok((_, Event::Text(text))) if in_message => {
                message.push_str(&text.unescape().ok()?);
            }
            Ok((_, Event::CData(data))) if in_message => {
                message.push_str(std::str::from_utf8(&data).ok()?);
            }
            Ok((_, Event::End(_))) if in_message => break,
            Ok((_, Event::Eof)) | Err(_) => return None,
            Ok(_) => {}
        }
    }
    let code = message.split('-').next()?.trim();
    if code.is_empty() { None } else { Some(code.to_string()) }
}

/// Returns true when the body reports [`NO_SAMPLE_MAP_RECORD`].
#[must_use]
pub fn is_no_sample_map_record(body: &str) -> bool {
    error_code(body).as_deref() == Some(NO_SAMPLE_MAP_RECORD)
}
