use std::sync::Arc;
use tracing::debug;

use crate::domain::TransformStep;
use crate::expression::{ExpressionEvaluator, ExpressionResult, Scope};

/// Kind name accepted for expression steps regardless of the evaluator tag.
pub const EXPRESSION_KIND: &str = "expression";

/// Runs transform steps for their side effects on `payload` and `ctx`.
pub struct TransformEngine {
    evaluator: Arc<dyn ExpressionEvaluator>,
}

impl TransformEngine {
    pub fn new(evaluator: Arc<dyn ExpressionEvaluator>) -> Self {
        Self { evaluator }
    }

    /// True when `kind` names an expression step.
    pub fn is_expression_kind(&self, kind: &str) -> bool {
        let kind = kind.trim();
        kind.eq_ignore_ascii_case(EXPRESSION_KIND) || kind.eq_ignore_ascii_case(self.evaluator.tag())
    }

    /// Apply steps in order. Returns the number of steps evaluated.
    pub fn apply(&self, steps: &[TransformStep], scope: &mut dyn Scope) -> ExpressionResult<usize> {
        let mut applied = 0;

        for step in steps {
            if !self.is_expression_kind(&step.kind) {
                debug!(kind = %step.kind, "Skipping transform step of unknown kind");
                continue;
            }

            if let Some(expression) = step.expression.as_deref() {
                self.evaluator.evaluate(expression, scope)?;
                applied += 1;
            }
        }

        Ok(applied)
    }
}
