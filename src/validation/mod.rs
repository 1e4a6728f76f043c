//! Per-field validation of the working payload.
//!
//! Entries run in order and each one emits at most one message. A check
//! failure short-circuits only its own entry.

use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

use crate::domain::ValidationRule;
use crate::expression::value::NULL;
use crate::expression::{ExpressionEvaluator, ExpressionResult, RegexCache, Scope};

/// Variable holding the payload inside the evaluation scope.
pub const PAYLOAD_VARIABLE: &str = "payload";

/// Result of the non-expression checks for one entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FieldCheck {
    /// Continue to the expression check
    Pass,
    /// Emit the entry's message and stop
    Fail,
    /// Stop without an error
    Done,
}

/// Value kinds accepted by the `type` check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    String,
    Number,
    Boolean,
    Object,
    Array,
}

impl ValueKind {
    /// Parse a configured kind, ignoring case. Unknown names yield `None` and always pass.
    pub fn parse(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "string" => Some(ValueKind::String),
            "number" => Some(ValueKind::Number),
            "boolean" => Some(ValueKind::Boolean),
            "object" => Some(ValueKind::Object),
            "array" => Some(ValueKind::Array),
            _ => None,
        }
    }

    pub fn matches(&self, value: &Value) -> bool {
        matches!(
            (self, value),
            (ValueKind::String, Value::String(_))
                | (ValueKind::Number, Value::Number(_))
                | (ValueKind::Boolean, Value::Bool(_))
                | (ValueKind::Object, Value::Object(_))
                | (ValueKind::Array, Value::Array(_))
        )
    }
}

/// Resolve a validation path against the payload.
///
/// Only `$.field` selects a top-level field; anything else selects the whole payload.
pub fn resolve_path<'p>(payload: &'p Value, path: Option<&str>) -> &'p Value {
    match path.and_then(top_level_field) {
        Some(field) => payload.get(field).unwrap_or(&NULL),
        None => payload,
    }
}

fn top_level_field(path: &str) -> Option<&str> {
    let field = path.trim().strip_prefix("$.")?;
    if field.is_empty() || field.contains(['.', '[']) {
        None
    } else {
        Some(field)
    }
}

fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        _ => false,
    }
}

/// Applies validation rules against the `payload` variable of a scope.
pub struct Validator {
    evaluator: Arc<dyn ExpressionEvaluator>,
    regexes: RegexCache,
}

impl Validator {
    pub fn new(evaluator: Arc<dyn ExpressionEvaluator>) -> Self {
        Validator {
            evaluator,
            regexes: RegexCache::default(),
        }
    }

    /// Run every entry and collect error messages in order.
    pub fn validate(&self, rules: &[ValidationRule], scope: &mut dyn Scope) -> Vec<String> {
        let mut errors = Vec::new();

        for rule in rules {
            match self.validate_entry(rule, scope) {
                Ok(true) => {}
                Ok(false) => errors.push(rule.message.clone()),
                Err(e) => {
                    let path = rule.path.as_deref().unwrap_or("$");
                    debug!(path = %path, error = %e, "Validation entry raised an error");
                    errors.push(format!("Validation error for {}: {}", path, e));
                }
            }
        }

        errors
    }

    /// Returns `Ok(true)` when the entry passes.
    fn validate_entry(&self, rule: &ValidationRule, scope: &mut dyn Scope) -> ExpressionResult<bool> {
        let check = {
            let payload = scope.variable(PAYLOAD_VARIABLE).unwrap_or(&NULL);
            let value = resolve_path(payload, rule.path.as_deref());
            self.check_field(rule, value)?
        };

        match check {
            FieldCheck::Fail => return Ok(false),
            FieldCheck::Done => return Ok(true),
            FieldCheck::Pass => {}
        }

        match rule.expression.as_deref() {
            Some(expression) if !expression.trim().is_empty() => {
                self.evaluator.evaluate_boolean(expression, scope)
            }
            _ => Ok(true),
        }
    }

    fn check_field(&self, rule: &ValidationRule, value: &Value) -> ExpressionResult<FieldCheck> {
        if rule.required && is_blank(value) {
            return Ok(FieldCheck::Fail);
        }

        if value.is_null() {
            return Ok(FieldCheck::Done);
        }

        if let Some(kind) = rule.value_type.as_deref().and_then(ValueKind::parse) {
            if !kind.matches(value) {
                return Ok(FieldCheck::Fail);
            }
        }

        if let Some(pattern) = rule.regex.as_deref() {
            let matched = match value {
                Value::String(s) => self.regexes.full_match(pattern, s)?,
                _ => false,
            };
            if !matched {
                return Ok(FieldCheck::Fail);
            }
        }

        Ok(FieldCheck::Pass)
    }
}
