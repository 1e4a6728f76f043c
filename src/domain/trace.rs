use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::rule::{ExternalCall, Rule};

/// Outcome recorded for one rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TraceStatus {
    /// Gate condition evaluated to false
    Skipped,
    /// Validation produced errors
    Failed,
    /// Rule ran with nothing else to report
    Success,
    /// Transform steps ran
    Transformed,
    /// External call succeeded
    ExternalCall,
    /// External call failed and was contained
    ExternalCallFailed,
    /// Rule requested a stop of the rule loop
    Stopped,
    /// Rule raised an error at its boundary
    Error,
}

impl TraceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TraceStatus::Skipped => "SKIPPED",
            TraceStatus::Failed => "FAILED",
            TraceStatus::Success => "SUCCESS",
            TraceStatus::Transformed => "TRANSFORMED",
            TraceStatus::ExternalCall => "EXTERNAL_CALL",
            TraceStatus::ExternalCallFailed => "EXTERNAL_CALL_FAILED",
            TraceStatus::Stopped => "STOPPED",
            TraceStatus::Error => "ERROR",
        }
    }
}

impl fmt::Display for TraceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Audit record of one rule's outcome.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TraceEntry {
    pub rule_id: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    pub timestamp: DateTime<Utc>,

    pub status: TraceStatus,

    /// Validation messages for FAILED entries
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<Vec<String>>,

    /// Failure message for ERROR entries
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Why a rule was skipped
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub external_call: Option<ExternalCallRecord>,
}

impl TraceEntry {
    /// Start an entry for a rule. Status defaults to SUCCESS until a stage sets it.
    pub fn for_rule(rule: &Rule, timestamp: DateTime<Utc>) -> Self {
        TraceEntry {
            rule_id: rule.id.clone(),
            description: rule.description.clone(),
            timestamp,
            status: TraceStatus::Success,
            errors: None,
            error: None,
            reason: None,
            external_call: None,
        }
    }
}

/// Status of an outbound call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExternalCallStatus {
    Success,
    Failed,
}

/// Metadata about an external call. The response body is never kept here.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExternalCallRecord {
    pub rule_id: String,

    /// URL template as configured, before rendering
    pub url: String,

    pub method: String,

    pub timestamp: DateTime<Utc>,

    pub status: ExternalCallStatus,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ExternalCallRecord {
    pub fn success(rule_id: &str, call: &ExternalCall, timestamp: DateTime<Utc>) -> Self {
        ExternalCallRecord {
            rule_id: rule_id.to_string(),
            url: call.url.clone(),
            method: call.method.clone(),
            timestamp,
            status: ExternalCallStatus::Success,
            error: None,
        }
    }

    pub fn failed(
        rule_id: &str,
        call: &ExternalCall,
        timestamp: DateTime<Utc>,
        error: impl Into<String>,
    ) -> Self {
        ExternalCallRecord {
            status: ExternalCallStatus::Failed,
            error: Some(error.into()),
            ..ExternalCallRecord::success(rule_id, call, timestamp)
        }
    }
}
