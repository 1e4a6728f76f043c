use serde_json::Value;
use std::collections::HashMap;

use super::error::{ExpressionError, ExpressionResult};

/// Variable bindings visible to an expression.
///
/// Reads resolve top-level names; writes go through `variable_mut`, which is
/// where a scope decides which bindings are write-capable.
pub trait Scope {
    /// Look up a top-level variable.
    fn variable(&self, name: &str) -> Option<&Value>;

    /// Mutable access to a write-capable variable.
    fn variable_mut(&mut self, name: &str) -> ExpressionResult<&mut Value>;
}

/// A plain map of variables, all writable.
#[derive(Debug, Clone, Default)]
pub struct Variables {
    values: HashMap<String, Value>,
}

impl Variables {
    pub fn new() -> Self {
        Variables::default()
    }

    pub fn with(mut self, name: impl Into<String>, value: Value) -> Self {
        self.values.insert(name.into(), value);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: Value) {
        self.values.insert(name.into(), value);
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }
}

impl Scope for Variables {
    fn variable(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    fn variable_mut(&mut self, name: &str) -> ExpressionResult<&mut Value> {
        self.values.get_mut(name).ok_or_else(|| {
            ExpressionError::InvalidAssignment(format!("unknown variable '{}'", name))
        })
    }
}
