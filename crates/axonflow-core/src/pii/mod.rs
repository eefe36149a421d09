//! Response post-processing: PII detection and permission-aware redaction.
//!
//! Operates on either plain text or a parsed JSON tree. Anything detected
//! whose category the caller is not authorized to view is redacted with a
//! deterministic strategy, and the response carries a redaction manifest.

mod detector;
mod validate;

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use axonflow_llm::{CallerIdentity, CanonicalResponse};

pub use detector::{matches_category, PiiCategory, REDACTED};
pub use validate::{validate_content, ValidationError, MAX_CONTENT_BYTES};

use crate::error::{RouterError, RouterResult};

/// Summary of redactions applied to one response.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RedactionManifest {
    pub had_redactions: bool,
    pub redacted_categories: BTreeSet<PiiCategory>,
    pub redaction_count: usize,
}

impl RedactionManifest {
    /// Parse a manifest back out of response metadata. Malformed or
    /// missing values downgrade to the empty manifest rather than failing
    /// the response.
    pub fn from_metadata(metadata: &Value) -> Self {
        match metadata.get("redaction") {
            Some(raw) => serde_json::from_value(raw.clone()).unwrap_or_else(|err| {
                tracing::warn!(error = %err, "malformed redaction manifest, using empty default");
                RedactionManifest::default()
            }),
            None => RedactionManifest::default(),
        }
    }
}

/// Translate the caller's role and permission names into viewable PII
/// categories. The table is fixed; unknown permission names grant nothing.
pub fn allowed_categories(caller: &CallerIdentity) -> BTreeSet<PiiCategory> {
    if caller.is_admin() {
        return PiiCategory::all().into_iter().collect();
    }
    let mut allowed = BTreeSet::new();
    for permission in &caller.permissions {
        match permission.as_str() {
            "view_full_pii" => {
                allowed.extend(PiiCategory::all());
            }
            "view_financial" => {
                allowed.insert(PiiCategory::CreditCard);
                allowed.insert(PiiCategory::BankAccount);
            }
            "view_basic_pii" => {
                allowed.insert(PiiCategory::Phone);
            }
            "view_medical" => {
                allowed.insert(PiiCategory::Medical);
            }
            _ => {}
        }
    }
    allowed
}

/// A post-processed response: redacted content plus its manifest.
#[derive(Debug, Clone)]
pub struct ProcessedResponse {
    pub response: CanonicalResponse,
    pub manifest: RedactionManifest,
}

/// The response post-processor.
#[derive(Debug, Clone, Copy, Default)]
pub struct PiiPostProcessor;

impl PiiPostProcessor {
    pub fn new() -> Self {
        Self
    }

    /// Redact a plain text payload for the caller.
    pub fn process_text(
        &self,
        content: &str,
        caller: &CallerIdentity,
    ) -> (String, RedactionManifest) {
        let allowed = allowed_categories(caller);
        let mut manifest = RedactionManifest::default();
        let redacted = detector::redact_text(content, &allowed, &mut manifest);
        (redacted, manifest)
    }

    /// Redact a parsed JSON tree in place for the caller.
    pub fn process_value(&self, value: &mut Value, caller: &CallerIdentity) -> RedactionManifest {
        let allowed = allowed_categories(caller);
        let mut manifest = RedactionManifest::default();
        detector::redact_value(value, &allowed, &mut manifest);
        manifest
    }

    /// Redact a routed response and validate the result.
    ///
    /// JSON-shaped content gets the structural scan on top of the pattern
    /// scan. A validation violation withholds the content entirely and
    /// surfaces `validation_rejected`.
    pub fn process_response(
        &self,
        mut response: CanonicalResponse,
        caller: &CallerIdentity,
    ) -> RouterResult<ProcessedResponse> {
        let allowed = allowed_categories(caller);
        let mut manifest = RedactionManifest::default();

        let redacted = match serde_json::from_str::<Value>(&response.content) {
            Ok(mut tree) if tree.is_object() || tree.is_array() => {
                detector::redact_value(&mut tree, &allowed, &mut manifest);
                match serde_json::to_string(&tree) {
                    Ok(text) => text,
                    Err(err) => {
                        tracing::warn!(error = %err, "failed to re-serialize structured response");
                        detector::redact_text(&response.content, &allowed, &mut manifest)
                    }
                }
            }
            _ => detector::redact_text(&response.content, &allowed, &mut manifest),
        };

        if let Err(violation) = validate_content(&redacted) {
            let provider = response
                .metadata
                .pointer("/provider_info/provider")
                .and_then(Value::as_str)
                .unwrap_or("unknown");
            tracing::warn!(
                rule = %violation,
                provider = provider,
                "response failed content validation, withholding"
            );
            return Err(RouterError::ValidationRejected(violation.to_string()));
        }

        response.content = redacted;
        if manifest.had_redactions {
            tracing::debug!(
                count = manifest.redaction_count,
                categories = ?manifest.redacted_categories,
                "response redacted"
            );
        }

        if !response.metadata.is_object() {
            response.metadata = serde_json::json!({});
        }
        match serde_json::to_value(&manifest) {
            Ok(value) => {
                response.metadata["redaction"] = value;
            }
            Err(err) => {
                tracing::warn!(error = %err, "failed to encode redaction manifest");
            }
        }

        Ok(ProcessedResponse { response, manifest })
    }
}
