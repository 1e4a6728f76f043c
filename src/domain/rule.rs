use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;

/// Action name that halts the rule loop.
pub const STOP_ACTION: &str = "STOP";

/// Rule configuration for one request type.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleConfig {
    /// Request type this configuration applies to
    #[serde(rename = "type", default)]
    pub type_of_request: String,

    /// Header names reserved for redaction by collaborators
    #[serde(default)]
    pub redact_headers: Vec<String>,

    /// Read-only values exposed to expressions as `defaults`
    #[serde(default)]
    pub defaults: Map<String, Value>,

    /// Rules in execution order
    #[serde(default)]
    pub rules: Vec<Rule>,
}

impl RuleConfig {
    /// Create an empty configuration for a request type.
    pub fn empty(type_of_request: impl Into<String>) -> Self {
        RuleConfig {
            type_of_request: type_of_request.into(),
            ..Default::default()
        }
    }
}

/// A single declarative rule.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Rule {
    pub id: String,

    #[serde(default)]
    pub description: Option<String>,

    /// Gate expression; the rule is skipped when it evaluates to false
    #[serde(default)]
    pub when: Option<String>,

    /// Break the whole rule loop when validation fails
    #[serde(default)]
    pub stop_on_validation_error: bool,

    #[serde(default)]
    pub validate: Vec<ValidationRule>,

    #[serde(default)]
    pub transform: Vec<TransformStep>,

    #[serde(default)]
    pub external_call: Option<ExternalCall>,

    #[serde(default)]
    pub on_success: Option<Action>,

    #[serde(default)]
    pub on_failure: Option<Action>,
}

impl Rule {
    /// Create a bare rule with an id.
    pub fn new(id: impl Into<String>) -> Self {
        Rule {
            id: id.into(),
            ..Default::default()
        }
    }

    /// Gate expression, if present and non-blank.
    pub fn gate(&self) -> Option<&str> {
        self.when.as_deref().filter(|w| !w.trim().is_empty())
    }

    /// True when `onSuccess` requests a stop.
    pub fn stops_on_success(&self) -> bool {
        self.on_success
            .as_ref()
            .is_some_and(|a| a.action == STOP_ACTION)
    }
}

/// A per-field validation check.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationRule {
    /// Single-level selector such as `$.email`
    #[serde(default)]
    pub path: Option<String>,

    #[serde(default)]
    pub required: bool,

    /// Expected kind: string, number, boolean, object or array
    #[serde(rename = "type", default)]
    pub value_type: Option<String>,

    /// Pattern the whole string value must match
    #[serde(default)]
    pub regex: Option<String>,

    /// Boolean expression that must hold
    #[serde(default, alias = "spel", alias = "mvel")]
    pub expression: Option<String>,

    /// Error emitted when any check fails
    #[serde(default)]
    pub message: String,
}

/// A transform step evaluated for its side effects.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TransformStep {
    #[serde(default)]
    pub kind: String,

    #[serde(default, alias = "spel", alias = "mvel")]
    pub expression: Option<String>,
}

impl TransformStep {
    pub fn expression(expression: impl Into<String>) -> Self {
        TransformStep {
            kind: "expression".to_string(),
            expression: Some(expression.into()),
        }
    }
}

/// Templated outbound HTTP call.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExternalCall {
    #[serde(default)]
    pub method: String,

    #[serde(default)]
    pub url: String,

    #[serde(default)]
    pub headers: HashMap<String, String>,

    #[serde(default)]
    pub body_template: Option<String>,

    /// Key under which the decoded result is stored in `ctx`
    #[serde(default)]
    pub save_as: Option<String>,
}

/// Flow-control action attached to a rule.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Action {
    pub action: String,
}

impl Action {
    pub fn stop() -> Self {
        Action {
            action: STOP_ACTION.to_string(),
        }
    }
}
