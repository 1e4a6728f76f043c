//! Embedded expression language and `{{tag: expr}}` templating.
//!
//! Expressions read the variables of a [`Scope`] (`payload`, `ctx`,
//! `defaults`, `env`, `now` in the engine) and may assign into the bindings
//! the scope allows writes to.

pub mod ast;
pub mod cache;
pub mod error;
pub mod interpreter;
pub mod lexer;
pub mod parser;
pub mod scope;
pub mod template;
pub mod value;

pub use cache::{BoundedCache, RegexCache, DEFAULT_CAPACITY};
pub use error::{ExpressionError, ExpressionResult};
pub use scope::{Scope, Variables};
pub use template::{Template, DEFAULT_TAG};

use serde_json::Value;
use std::sync::Arc;

use ast::Program;
use interpreter::Interpreter;

/// Pluggable expression evaluation used by the rule engine.
pub trait ExpressionEvaluator: Send + Sync {
    /// Evaluate an expression. A blank expression yields null.
    fn evaluate(&self, expression: &str, scope: &mut dyn Scope) -> ExpressionResult<Value>;

    /// Evaluate and coerce to a boolean: only `true` or the text "true" is true.
    fn evaluate_boolean(&self, expression: &str, scope: &mut dyn Scope) -> ExpressionResult<bool> {
        self.evaluate(expression, scope)
            .map(|result| value::parse_boolean(&result))
    }

    /// Expand every template marker in `text`.
    fn process_template(&self, text: &str, scope: &mut dyn Scope) -> ExpressionResult<String>;

    /// Marker tag this evaluator recognises.
    fn tag(&self) -> &str;
}

/// Default evaluator with parsed-program and regex caches.
#[derive(Debug)]
pub struct Evaluator {
    template: Template,
    programs: BoundedCache<Arc<Program>>,
    regexes: RegexCache,
}

impl Evaluator {
    pub fn new(tag: &str) -> ExpressionResult<Self> {
        Ok(Evaluator {
            template: Template::new(tag)?,
            programs: BoundedCache::new(DEFAULT_CAPACITY),
            regexes: RegexCache::default(),
        })
    }

    /// Parse `expression`, reusing a cached program when available.
    pub fn compile(&self, expression: &str) -> ExpressionResult<Arc<Program>> {
        self.programs
            .get_or_try_insert(expression, || parser::parse(expression).map(Arc::new))
    }

    /// Pattern cache shared with `matches`.
    pub fn regexes(&self) -> &RegexCache {
        &self.regexes
    }
}

impl ExpressionEvaluator for Evaluator {
    fn evaluate(&self, expression: &str, scope: &mut dyn Scope) -> ExpressionResult<Value> {
        if expression.trim().is_empty() {
            return Ok(Value::Null);
        }

        let program = self.compile(expression)?;
        Interpreter::new(&self.regexes).run(&program, scope)
    }

    fn process_template(&self, text: &str, scope: &mut dyn Scope) -> ExpressionResult<String> {
        self.template
            .render(text, |expression| self.evaluate(expression, &mut *scope))
    }

    fn tag(&self) -> &str {
        self.template.tag()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn evaluator() -> Evaluator {
        Evaluator::new(DEFAULT_TAG).unwrap()
    }

    #[test]
    fn test_simple_arithmetic() {
        let mut vars = Variables::new().with("x", json!(10)).with("y", json!(5));
        let eval = evaluator();

        assert_eq!(eval.evaluate("#x + #y", &mut vars).unwrap(), json!(15));
        assert_eq!(eval.evaluate("#x * #y + 5", &mut vars).unwrap(), json!(55));
        assert_eq!(eval.evaluate("#x - #y * 5", &mut vars).unwrap(), json!(-15));
    }

    #[test]
    fn test_template_processing() {
        let mut vars = Variables::new()
            .with("name", json!("John"))
            .with("age", json!(30));

        let out = evaluator()
            .process_template(
                "Hello {{spel: #name}}, you are {{spel: #age}} years old",
                &mut vars,
            )
            .unwrap();
        assert_eq!(out, "Hello John, you are 30 years old");
    }

    #[test]
    fn test_conditional_and_elvis() {
        let mut vars = Variables::new()
            .with("score", json!(85))
            .with("missing", Value::Null);
        let eval = evaluator();

        assert_eq!(
            eval.evaluate("#score > 80 ? 'HIGH' : 'LOW'", &mut vars).unwrap(),
            json!("HIGH")
        );
        assert_eq!(eval.evaluate("#missing ?: 0", &mut vars).unwrap(), json!(0));
        assert_eq!(eval.evaluate("'' ?: 'fallback'", &mut vars).unwrap(), json!("fallback"));
    }

    #[test]
    fn test_map_access() {
        let mut vars = Variables::new().with(
            "payload",
            json!({"user": {"firstName": "John", "email": "john@example.com"}}),
        );
        let eval = evaluator();

        assert_eq!(
            eval.evaluate("#payload['user']['firstName']", &mut vars).unwrap(),
            json!("John")
        );
        assert_eq!(
            eval.evaluate("#payload['user']['middleName']", &mut vars).unwrap(),
            Value::Null
        );
        assert!(eval
            .evaluate("#payload['account']['id']", &mut vars)
            .is_err());
    }

    #[test]
    fn test_email_domain_checks() {
        let eval = evaluator();
        let mut vars = Variables::new().with("email", json!("jane@company.com"));

        assert!(eval
            .evaluate_boolean("#email.endsWith('@company.com')", &mut vars)
            .unwrap());
        assert!(!eval
            .evaluate_boolean("#email.endsWith('@other.com')", &mut vars)
            .unwrap());
        assert!(eval
            .evaluate_boolean(
                "#email.endsWith('.com') and #email.contains('@')",
                &mut vars
            )
            .unwrap());
    }

    #[test]
    fn test_string_concatenation() {
        let mut vars = Variables::new().with("payload", json!({"first": "John", "last": null}));
        assert_eq!(
            evaluator()
                .evaluate("#payload['first'] + ' ' + (#payload['last'] ?: '')", &mut vars)
                .unwrap(),
            json!("John ")
        );
    }

    #[test]
    fn test_evaluate_boolean_coercion() {
        let eval = evaluator();
        let mut vars = Variables::new().with("flag", json!("TRUE"));

        assert!(eval.evaluate_boolean("#flag", &mut vars).unwrap());
        assert!(!eval.evaluate_boolean("'yes'", &mut vars).unwrap());
        assert!(!eval.evaluate_boolean("null", &mut vars).unwrap());
        assert!(!eval.evaluate_boolean("1", &mut vars).unwrap());
    }

    #[test]
    fn test_blank_expression_is_null() {
        let mut vars = Variables::new();
        assert_eq!(evaluator().evaluate("   ", &mut vars).unwrap(), Value::Null);
    }

    #[test]
    fn test_compile_is_cached() {
        let eval = evaluator();
        let first = eval.compile("1 + 1").unwrap();
        let second = eval.compile("1 + 1").unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert!(eval.compile("1 +").is_err());
    }

    #[test]
    fn test_template_assignment_side_effects() {
        let eval = evaluator();
        let mut vars = Variables::new().with("ctx", json!({}));

        let out = eval
            .process_template("id={{spel: #ctx['id'] = 7}}", &mut vars)
            .unwrap();
        assert_eq!(out, "id=7");
        assert_eq!(vars.get("ctx").unwrap()["id"], 7);
    }

    #[test]
    fn test_deep_expressions_error_instead_of_overflowing() {
        let eval = evaluator();
        let mut vars = Variables::new().with("x", Value::Null);

        let elvis = vec!["#x"; 5_000].join(" ?: ");
        assert!(matches!(
            eval.evaluate(&elvis, &mut vars),
            Err(ExpressionError::Parse { .. })
        ));

        let sum = vec!["1"; 200_000].join(" + ");
        assert!(matches!(
            eval.evaluate(&sum, &mut vars),
            Err(ExpressionError::Parse { .. })
        ));
    }

    #[test]
    fn test_custom_tag() {
        let eval = Evaluator::new("mvel").unwrap();
        let mut vars = Variables::new().with("x", json!(1));
        assert_eq!(eval.tag(), "mvel");
        assert_eq!(
            eval.process_template("{{mvel: #x}} {{spel: #x}}", &mut vars).unwrap(),
            "1 {{spel: #x}}"
        );
    }
}
