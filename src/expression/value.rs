//! Helpers for working with `serde_json::Value` inside expressions.

use serde_json::{Number, Value};
use std::cmp::Ordering;

use super::error::{ExpressionError, ExpressionResult};

/// Shared null used when a lookup misses.
pub static NULL: Value = Value::Null;

/// Type name of a value for error messages.
pub fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Text form used by template rendering and boolean coercion.
///
/// Null renders as the empty string; objects and arrays as compact JSON.
/// `+` concatenation renders null as "null" instead.
pub fn stringify(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        other => other.to_string(),
    }
}

/// Boolean coercion for `evaluate_boolean`: only `true` (in any case) is true.
pub fn parse_boolean(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::Null => false,
        other => stringify(other).trim().eq_ignore_ascii_case("true"),
    }
}

/// Operand coercion for `and`, `or`, `not` and the ternary condition.
pub fn as_condition(value: &Value) -> ExpressionResult<bool> {
    match value {
        Value::Bool(b) => Ok(*b),
        Value::Null => Ok(false),
        other => Err(ExpressionError::type_mismatch("boolean", type_name(other))),
    }
}

#[inline]
pub fn number_as_f64(num: &Number) -> f64 {
    num.as_f64()
        .or_else(|| num.as_i64().map(|i| i as f64))
        .unwrap_or(0.0)
}

/// Float result, falling back to null for NaN and infinities which JSON cannot carry.
pub fn float_value(f: f64) -> Value {
    Number::from_f64(f).map(Value::Number).unwrap_or(Value::Null)
}

/// Equality with numeric comparison across integer and float representations.
pub fn loose_eq(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Number(l), Value::Number(r)) => match (l.as_i64(), r.as_i64()) {
            (Some(li), Some(ri)) => li == ri,
            _ => number_as_f64(l) == number_as_f64(r),
        },
        _ => left == right,
    }
}

/// Ordering for `<`, `<=`, `>`, `>=`. Only numbers and strings are ordered.
pub fn compare(left: &Value, right: &Value) -> ExpressionResult<Ordering> {
    match (left, right) {
        (Value::Number(l), Value::Number(r)) => match (l.as_i64(), r.as_i64()) {
            (Some(li), Some(ri)) => Ok(li.cmp(&ri)),
            _ => number_as_f64(l)
                .partial_cmp(&number_as_f64(r))
                .ok_or_else(|| ExpressionError::type_mismatch("comparable number", "NaN")),
        },
        (Value::String(l), Value::String(r)) => Ok(l.cmp(r)),
        _ => Err(ExpressionError::type_mismatch(
            "two numbers or two strings",
            format!("{} and {}", type_name(left), type_name(right)),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_stringify() {
        assert_eq!(stringify(&Value::Null), "");
        assert_eq!(stringify(&json!("abc")), "abc");
        assert_eq!(stringify(&json!(30)), "30");
        assert_eq!(stringify(&json!(2.5)), "2.5");
        assert_eq!(stringify(&json!(true)), "true");
        assert_eq!(stringify(&json!({"a": 1})), r#"{"a":1}"#);
    }

    #[test]
    fn test_parse_boolean() {
        assert!(parse_boolean(&json!(true)));
        assert!(parse_boolean(&json!("TRUE")));
        assert!(!parse_boolean(&json!("yes")));
        assert!(!parse_boolean(&json!(1)));
        assert!(!parse_boolean(&Value::Null));
    }

    #[test]
    fn test_loose_eq_numbers() {
        assert!(loose_eq(&json!(100), &json!(100.0)));
        assert!(!loose_eq(&json!(1), &json!("1")));
        assert!(loose_eq(&Value::Null, &Value::Null));
    }

    #[test]
    fn test_compare_mixed_types_fails() {
        assert_eq!(compare(&json!(1), &json!(2.5)).unwrap(), Ordering::Less);
        assert_eq!(compare(&json!("b"), &json!("a")).unwrap(), Ordering::Greater);
        assert!(compare(&json!(1), &json!("a")).is_err());
        assert!(compare(&Value::Null, &json!(1)).is_err());
    }
}
