// crates/receipt-relay-core/src/target.rs
// ============================================================================
// Module: Receipt Relay Target Resolver
// Description: Chooses the downstream receipting endpoint from payload shape.
// Purpose: Route legacy receipts to the reporting-unit service and case
//          receipts to the response-management gateway.
// Dependencies: payload, validate, url
// ============================================================================

//! ## Overview
//! [`TargetResolver::resolve`] recognizes exactly two payload shapes:
//! - `case_id` with `metadata.user_id`: [`Target::Gateway`], posted to a fixed URL.
//! - `metadata.ru_ref` with `collection.exercise_sid` and no `case_id`:
//!   [`Target::Legacy`], posted to
//!   `{host}/{path}/{statistical_unit_id}/collectionexercises/{exercise_sid}/receipts`.
//!
//! Any other shape fails closed with [`ValidationError::UnknownTarget`].

// ============================================================================
// SECTION: Imports
// ============================================================================

use url::Url;

use crate::payload::DecryptedPayload;
use crate::validate::ValidationError;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Reporting unit references of this length may carry a check-letter suffix.
const SUFFIXED_RU_REF_LEN: usize = 12;

// ============================================================================
// SECTION: Target
// ============================================================================

/// Resolved downstream destination and its request shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    /// Legacy reporting-unit receipting service, XML body.
    Legacy {
        /// Fully computed receipt endpoint.
        endpoint: Url,
        /// Normalized reporting unit id.
        statistical_unit_id: String,
        /// Collection exercise id.
        exercise_sid: String,
    },
    /// Response-management gateway, JSON body.
    Gateway {
        /// Configured gateway endpoint.
        endpoint: Url,
        /// Case id to receipt.
        case_id: String,
        /// Respondent id.
        user_id: String,
    },
}

impl Target {
    /// Returns the endpoint the receipt is posted to.
    #[must_use]
    pub const fn endpoint(&self) -> &Url {
        match self {
            Self::Legacy {
                endpoint, ..
            }
            | Self::Gateway {
                endpoint, ..
            } => endpoint,
        }
    }

    /// Returns a stable label for logging.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Legacy {
                ..
            } => "legacy",
            Self::Gateway {
                ..
            } => "gateway",
        }
    }
}

// ============================================================================
// SECTION: Resolver
// ============================================================================

/// Base location of the legacy receipting service.
///
/// # Invariants
/// - `host` is an absolute URL that can carry path segments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LegacyEndpoint {
    /// Scheme, host and optional port of the service.
    pub host: Url,
    /// Path prefix placed before the reporting unit id.
    pub path: String,
}

/// Computes delivery targets from validated payloads.
#[derive(Debug, Clone)]
pub struct TargetResolver {
    /// Legacy service location.
    legacy: LegacyEndpoint,
    /// Gateway receipt URL.
    gateway: Url,
}

impl TargetResolver {
    /// Creates a resolver for the configured endpoints.
    #[must_use]
    pub const fn new(legacy: LegacyEndpoint, gateway: Url) -> Self {
        Self {
            legacy,
            gateway,
        }
    }

    /// Resolves the delivery target for a payload.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::UnknownTarget`] when the payload matches
    /// neither recognized shape.
    pub fn resolve(&self, payload: &DecryptedPayload) -> Result<Target, ValidationError> {
        if let Some(case_id) = payload.case_id() {
            let user_id = payload.user_id().ok_or(ValidationError::UnknownTarget)?;
            return Ok(Target::Gateway {
                endpoint: self.gateway.clone(),
                case_id: case_id.to_string(),
                user_id: user_id.to_string(),
            });
        }
        let (Some(ru_ref), Some(exercise_sid)) = (payload.ru_ref(), payload.exercise_sid()) else {
            return Err(ValidationError::UnknownTarget);
        };
        let statistical_unit_id = statistical_unit_id(ru_ref);
        let endpoint = self.legacy_endpoint(&statistical_unit_id, exercise_sid)?;
        Ok(Target::Legacy {
            endpoint,
            statistical_unit_id,
            exercise_sid: exercise_sid.to_string(),
        })
    }

    /// Builds the legacy receipt URL with each segment percent-encoded.
    fn legacy_endpoint(
        &self,
        statistical_unit_id: &str,
        exercise_sid: &str,
    ) -> Result<Url, ValidationError> {
        let mut endpoint = self.legacy.host.clone();
        {
            let mut segments =
                endpoint.path_segments_mut().map_err(|()| ValidationError::UnknownTarget)?;
            segments.pop_if_empty();
            segments.extend(self.legacy.path.split('/').filter(|segment| !segment.is_empty()));
            segments.extend([statistical_unit_id, "collectionexercises", exercise_sid, "receipts"]);
        }
        Ok(endpoint)
    }
}

/// Normalizes a reporting unit reference into a statistical unit id.
///
/// A 12-character reference ending in a non-numeric check letter loses that
/// letter; every other reference is returned unchanged.
#[must_use]
pub fn statistical_unit_id(ru_ref: &str) -> String {
    if ru_ref.chars().count() == SUFFIXED_RU_REF_LEN
        && let Some(last) = ru_ref.chars().last()
        && !last.is_ascii_digit()
    {
        return ru_ref[..ru_ref.len() - last.len_utf8()].to_string();
    }
    ru_ref.to_string()
}
