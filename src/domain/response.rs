use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::trace::{ExternalCallRecord, TraceEntry};

/// Result of running a rule configuration against a request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleResponse {
    /// Unique per execution
    pub request_id: String,

    pub type_of_request: String,

    /// True exactly when `errors` is empty
    pub valid: bool,

    pub errors: Vec<String>,

    /// Working payload after all rules ran; null on a top-level failure
    pub transformed_payload: Value,

    pub trace: Vec<TraceEntry>,

    pub external_calls: Vec<ExternalCallRecord>,
}

impl RuleResponse {
    /// Build a response; validity is derived from `errors`.
    pub fn new(
        request_id: impl Into<String>,
        type_of_request: impl Into<String>,
        errors: Vec<String>,
        transformed_payload: Value,
        trace: Vec<TraceEntry>,
        external_calls: Vec<ExternalCallRecord>,
    ) -> Self {
        RuleResponse {
            request_id: request_id.into(),
            type_of_request: type_of_request.into(),
            valid: errors.is_empty(),
            errors,
            transformed_payload,
            trace,
            external_calls,
        }
    }

    /// Response for a request that could not be processed at all.
    pub fn rejected(
        request_id: impl Into<String>,
        type_of_request: impl Into<String>,
        error: impl Into<String>,
    ) -> Self {
        RuleResponse::new(
            request_id,
            type_of_request,
            vec![error.into()],
            Value::Null,
            Vec::new(),
            Vec::new(),
        )
    }
}
