// crates/receipt-relay-core/src/render.rs
// ============================================================================
// Module: Receipt Relay Renderer
// Description: Builds the request body required by each delivery target.
// Purpose: Render legacy XML receipts and gateway JSON receipts.
// Dependencies: payload, target, quick-xml, serde, thiserror
// ============================================================================

//! ## Overview
//! [`render`] produces a [`RenderedReceipt`] for a resolved [`Target`]:
//! - Legacy: an XML document in the receipt namespace. Payloads with a
//!   `tx_id` use the transaction template (which carries `<tx_id>`); payloads
//!   without one use the respondent-only template.
//! - Gateway: the JSON object `{"caseId": ..., "userId": ...}`.
//!
//! All text content is XML-escaped by the writer.

// ============================================================================
// SECTION: Imports
// ============================================================================

use quick_xml::Writer;
use quick_xml::events::BytesDecl;
use quick_xml::events::BytesEnd;
use quick_xml::events::BytesStart;
use quick_xml::events::BytesText;
use quick_xml::events::Event;
use serde::Serialize;
use thiserror::Error;

use crate::payload::DecryptedPayload;
use crate::target::Target;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Namespace of legacy receipt documents.
pub const RECEIPT_NAMESPACE: &str = "http://ns.ons.gov.uk/namespaces/resources/receipt";
/// Content type expected by the legacy receipting service.
pub const LEGACY_CONTENT_TYPE: &str = "application/vnd.collections+xml";
/// Content type of gateway receipts.
pub const GATEWAY_CONTENT_TYPE: &str = "application/json";

// ============================================================================
// SECTION: Types
// ============================================================================

/// Rendering failures.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RenderError {
    /// A field required by the template is absent.
    #[error("missing template field: {0}")]
    MissingField(&'static str),
    /// The XML writer failed.
    #[error("xml write failure: {0}")]
    Xml(String),
}

/// JSON body posted to the gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GatewayReceipt {
    /// Case being receipted.
    pub case_id: String,
    /// Respondent who submitted.
    pub user_id: String,
}

/// Request body ready for delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderedReceipt {
    /// Legacy XML document.
    Xml(String),
    /// Gateway JSON body.
    Json(GatewayReceipt),
}

impl RenderedReceipt {
    /// Returns the `Content-Type` header value for this body.
    #[must_use]
    pub const fn content_type(&self) -> &'static str {
        match self {
            Self::Xml(_) => LEGACY_CONTENT_TYPE,
            Self::Json(_) => GATEWAY_CONTENT_TYPE,
        }
    }
}

// ============================================================================
// SECTION: Rendering
// ============================================================================

/// Renders the receipt body for a target.
///
/// # Errors
///
/// Returns [`RenderError`] when a template field is missing or XML cannot be written.
pub fn render(payload: &DecryptedPayload, target: &Target) -> Result<RenderedReceipt, RenderError> {
    match target {
        Target::Legacy {
            statistical_unit_id,
            exercise_sid,
            ..
        } => render_legacy(payload, statistical_unit_id, exercise_sid).map(RenderedReceipt::Xml),
        Target::Gateway {
            case_id,
            user_id,
            ..
        } => Ok(RenderedReceipt::Json(GatewayReceipt {
            case_id: case_id.clone(),
            user_id: user_id.clone(),
        })),
    }
}

/// Renders the legacy XML document.
fn render_legacy(
    payload: &DecryptedPayload,
    statistical_unit_id: &str,
    exercise_sid: &str,
) -> Result<String, RenderError> {
    let user_id = payload.user_id().ok_or(RenderError::MissingField("metadata.user_id"))?;
    if statistical_unit_id.is_empty() {
        return Err(RenderError::MissingField("metadata.ru_ref"));
    }
    if exercise_sid.is_empty() {
        return Err(RenderError::MissingField("collection.exercise_sid"));
    }

    let mut writer = Writer::new(Vec::new());
    write(&mut writer, Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
    write(
        &mut writer,
        Event::Start(BytesStart::new("receipt").with_attributes([("xmlns", RECEIPT_NAMESPACE)])),
    )?;
    match payload.tx_id() {
        Some(tx_id) => {
            write_element(&mut writer, "tx_id", tx_id)?;
            write(&mut writer, Event::Start(BytesStart::new("respondent")))?;
            write_element(&mut writer, "respondent_id", user_id)?;
            write_element(&mut writer, "statistical_unit_id", statistical_unit_id)?;
            write(&mut writer, Event::End(BytesEnd::new("respondent")))?;
            write_element(&mut writer, "exercise_sid", exercise_sid)?;
        }
        None => {
            write_element(&mut writer, "respondent_id", user_id)?;
            write_element(&mut writer, "statistical_unit_id", statistical_unit_id)?;
            write_element(&mut writer, "exercise_sid", exercise_sid)?;
        }
    }
    write(&mut writer, Event::End(BytesEnd::new("receipt")))?;

    String::from_utf8(writer.into_inner()).map_err(|err| RenderError::Xml(err.to_string()))
}

/// Writes `<name>value</name>`.
fn write_element(writer: &mut Writer<Vec<u8>>, name: &str, value: &str) -> Result<(), RenderError> {
    write(writer, Event::Start(BytesStart::new(name)))?;
    write(writer, Event::Text(BytesText::new(value)))?;
    write(writer, Event::End(BytesEnd::new(name)))
}

/// Writes one event, normalizing the writer error.
fn write(writer: &mut Writer<Vec<u8>>, event: Event<'_>) -> Result<(), RenderError> {
    writer.write_event(event).map_err(|err| RenderError::Xml(err.to_string()))
}
