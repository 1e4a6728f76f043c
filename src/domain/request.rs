use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A request to run the rules configured for a request type.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleRequest {
    pub type_of_request: String,

    /// Arbitrary JSON payload; must be an object (or absent)
    #[serde(default)]
    pub payload: Value,
}

impl RuleRequest {
    pub fn new(type_of_request: impl Into<String>, payload: Value) -> Self {
        RuleRequest {
            type_of_request: type_of_request.into(),
            payload,
        }
    }
}
