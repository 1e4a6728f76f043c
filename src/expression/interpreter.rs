//! Tree-walking evaluation of parsed programs.
//!
//! Reads borrow from the scope wherever possible; only computed values are
//! owned. Assignments evaluate their right-hand side first, then resolve the
//! target path mutably.

use serde_json::Value;
use std::borrow::Cow;
use std::cmp::Ordering;

use super::ast::{Accessor, BinaryOp, Expr, Program, Statement, Target};
use super::cache::RegexCache;
use super::error::{ExpressionError, ExpressionResult};
use super::scope::Scope;
use super::value::{
    as_condition, compare, float_value, loose_eq, number_as_f64, stringify, type_name, NULL,
};

/// A resolved member key.
#[derive(Debug, Clone, Copy)]
enum Key<'k> {
    Name(&'k str),
    Index(i64),
}

impl Key<'_> {
    fn from_value(value: &Value) -> ExpressionResult<Key<'_>> {
        match value {
            Value::String(s) => Ok(Key::Name(s)),
            Value::Number(n) => n
                .as_i64()
                .map(Key::Index)
                .ok_or_else(|| ExpressionError::type_mismatch("integer index", n.to_string())),
            other => Err(ExpressionError::type_mismatch(
                "string or integer key",
                type_name(other),
            )),
        }
    }

    fn describe(&self) -> String {
        match self {
            Key::Name(name) => format!("'{}'", name),
            Key::Index(i) => i.to_string(),
        }
    }
}

pub struct Interpreter<'r> {
    regexes: &'r RegexCache,
}

impl<'r> Interpreter<'r> {
    pub fn new(regexes: &'r RegexCache) -> Self {
        Interpreter { regexes }
    }

    /// Run every statement in order; the program's value is the last statement's.
    pub fn run(&self, program: &Program, scope: &mut dyn Scope) -> ExpressionResult<Value> {
        let mut result = Value::Null;

        for statement in &program.statements {
            result = match statement {
                Statement::Expr(expr) => self.eval(expr, &*scope)?.into_owned(),
                Statement::Assign { target, value } => {
                    let value = self.eval(value, &*scope)?.into_owned();
                    self.assign(target, value.clone(), scope)?;
                    value
                }
            };
        }

        Ok(result)
    }

    fn eval<'a>(&self, expr: &'a Expr, scope: &'a dyn Scope) -> ExpressionResult<Cow<'a, Value>> {
        match expr {
            Expr::Literal(value) => Ok(Cow::Borrowed(value)),

            Expr::Variable(name) => Ok(Cow::Borrowed(scope.variable(name).unwrap_or(&NULL))),

            Expr::Property { object, name } => {
                let object = self.eval(object, scope)?;
                member(object, Key::Name(name))
            }

            Expr::Index { object, index } => {
                let object = self.eval(object, scope)?;
                let index = self.eval(index, scope)?;
                member(object, Key::from_value(&index)?)
            }

            Expr::MethodCall {
                object,
                method,
                args,
            } => {
                let receiver = self.eval(object, scope)?;
                let args = args
                    .iter()
                    .map(|arg| self.eval(arg, scope))
                    .collect::<ExpressionResult<Vec<_>>>()?;
                self.call_method(&receiver, method, &args).map(Cow::Owned)
            }

            Expr::Negate(operand) => {
                let value = self.eval(operand, scope)?;
                negate(&value).map(Cow::Owned)
            }

            Expr::Not(operand) => {
                let value = self.eval(operand, scope)?;
                Ok(Cow::Owned(Value::Bool(!as_condition(&value)?)))
            }

            Expr::And(left, right) => {
                if !as_condition(&*self.eval(left, scope)?)? {
                    return Ok(Cow::Owned(Value::Bool(false)));
                }
                let right = as_condition(&*self.eval(right, scope)?)?;
                Ok(Cow::Owned(Value::Bool(right)))
            }

            Expr::Or(left, right) => {
                if as_condition(&*self.eval(left, scope)?)? {
                    return Ok(Cow::Owned(Value::Bool(true)));
                }
                let right = as_condition(&*self.eval(right, scope)?)?;
                Ok(Cow::Owned(Value::Bool(right)))
            }

            Expr::Binary { left, op, right } => {
                let left = self.eval(left, scope)?;
                let right = self.eval(right, scope)?;
                binary(*op, &left, &right).map(Cow::Owned)
            }

            Expr::Conditional {
                condition,
                then_expr,
                else_expr,
            } => {
                if as_condition(&*self.eval(condition, scope)?)? {
                    self.eval(then_expr, scope)
                } else {
                    self.eval(else_expr, scope)
                }
            }

            Expr::Elvis { value, fallback } => {
                let value = self.eval(value, scope)?;
                let missing = match &*value {
                    Value::Null => true,
                    Value::String(s) => s.is_empty(),
                    _ => false,
                };
                if missing {
                    self.eval(fallback, scope)
                } else {
                    Ok(value)
                }
            }
        }
    }

    fn assign(&self, target: &Target, value: Value, scope: &mut dyn Scope) -> ExpressionResult<()> {
        let keys = target
            .path
            .iter()
            .map(|accessor| match accessor {
                Accessor::Property(name) => Ok(Value::String(name.clone())),
                Accessor::Index(expr) => self.eval(expr, &*scope).map(Cow::into_owned),
            })
            .collect::<ExpressionResult<Vec<_>>>()?;

        let Some((last, parents)) = keys.split_last() else {
            return Err(ExpressionError::InvalidAssignment(format!(
                "cannot replace variable '{}'",
                target.variable
            )));
        };

        let mut slot = scope.variable_mut(&target.variable)?;
        for key in parents {
            slot = child_mut(slot, Key::from_value(key)?)?;
        }

        store(slot, Key::from_value(last)?, value)
    }

    fn call_method(&self, receiver: &Value, method: &str, args: &[Cow<'_, Value>]) -> ExpressionResult<Value> {
        if receiver.is_null() {
            return Err(ExpressionError::NullReference(format!("call '{}'", method)));
        }

        let arity = |expected: usize| -> ExpressionResult<()> {
            if args.len() == expected {
                Ok(())
            } else {
                Err(ExpressionError::Arity {
                    method: method.to_string(),
                    expected,
                    actual: args.len(),
                })
            }
        };

        match method {
            "endsWith" | "startsWith" => {
                arity(1)?;
                let text = string_receiver(receiver, method)?;
                let affix = string_argument(&args[0], method)?;
                let result = if method == "endsWith" {
                    text.ends_with(affix)
                } else {
                    text.starts_with(affix)
                };
                Ok(Value::Bool(result))
            }
            "contains" => {
                arity(1)?;
                let needle: &Value = &args[0];
                let found = match receiver {
                    Value::String(s) => s.contains(string_argument(needle, method)?),
                    Value::Array(items) => items.iter().any(|item| loose_eq(item, needle)),
                    Value::Object(map) => map.contains_key(string_argument(needle, method)?),
                    other => {
                        return Err(ExpressionError::type_mismatch(
                            "string, array or object",
                            type_name(other),
                        ))
                    }
                };
                Ok(Value::Bool(found))
            }
            "matches" => {
                arity(1)?;
                let text = string_receiver(receiver, method)?;
                let pattern = string_argument(&args[0], method)?;
                Ok(Value::Bool(self.regexes.full_match(pattern, text)?))
            }
            "length" | "size" => {
                arity(0)?;
                let len = match receiver {
                    Value::String(s) => s.chars().count(),
                    Value::Array(items) => items.len(),
                    Value::Object(map) => map.len(),
                    other => {
                        return Err(ExpressionError::type_mismatch(
                            "string, array or object",
                            type_name(other),
                        ))
                    }
                };
                Ok(Value::from(len))
            }
            "isEmpty" => {
                arity(0)?;
                let empty = match receiver {
                    Value::String(s) => s.is_empty(),
                    Value::Array(items) => items.is_empty(),
                    Value::Object(map) => map.is_empty(),
                    other => {
                        return Err(ExpressionError::type_mismatch(
                            "string, array or object",
                            type_name(other),
                        ))
                    }
                };
                Ok(Value::Bool(empty))
            }
            "toUpperCase" => {
                arity(0)?;
                Ok(Value::String(string_receiver(receiver, method)?.to_uppercase()))
            }
            "toLowerCase" => {
                arity(0)?;
                Ok(Value::String(string_receiver(receiver, method)?.to_lowercase()))
            }
            "trim" => {
                arity(0)?;
                Ok(Value::String(string_receiver(receiver, method)?.trim().to_string()))
            }
            _ => Err(ExpressionError::UnknownMethod(method.to_string())),
        }
    }
}

fn string_receiver<'v>(value: &'v Value, method: &str) -> ExpressionResult<&'v str> {
    value.as_str().ok_or_else(|| {
        ExpressionError::type_mismatch("string", format!("{} receiver of '{}'", type_name(value), method))
    })
}

fn string_argument<'v>(value: &'v Value, method: &str) -> ExpressionResult<&'v str> {
    value.as_str().ok_or_else(|| {
        ExpressionError::type_mismatch("string", format!("{} argument to '{}'", type_name(value), method))
    })
}

/// Read a member, keeping the borrow when the container is borrowed.
fn member<'a>(object: Cow<'a, Value>, key: Key<'_>) -> ExpressionResult<Cow<'a, Value>> {
    match object {
        Cow::Borrowed(value) => lookup(value, key).map(Cow::Borrowed),
        Cow::Owned(value) => lookup(&value, key).map(|v| Cow::Owned(v.clone())),
    }
}

fn lookup<'v>(value: &'v Value, key: Key<'_>) -> ExpressionResult<&'v Value> {
    match (value, key) {
        (Value::Null, key) => Err(ExpressionError::NullReference(format!(
            "read {}",
            key.describe()
        ))),
        (Value::Object(map), Key::Name(name)) => Ok(map.get(name).unwrap_or(&NULL)),
        (Value::Object(map), Key::Index(i)) => Ok(map.get(&i.to_string()).unwrap_or(&NULL)),
        (Value::Array(items), Key::Index(i)) => array_position(i, items.len()).map(|pos| &items[pos]),
        (other, key) => Err(ExpressionError::type_mismatch(
            "object or array",
            format!("{} when reading {}", type_name(other), key.describe()),
        )),
    }
}

fn child_mut<'v>(value: &'v mut Value, key: Key<'_>) -> ExpressionResult<&'v mut Value> {
    match (value, key) {
        (Value::Null, key) => Err(ExpressionError::NullReference(format!(
            "assign through {}",
            key.describe()
        ))),
        (Value::Object(map), key) => {
            let name = match key {
                Key::Name(name) => name.to_string(),
                Key::Index(i) => i.to_string(),
            };
            map.get_mut(&name).ok_or_else(|| {
                ExpressionError::InvalidAssignment(format!("'{}' does not exist", name))
            })
        }
        (Value::Array(items), Key::Index(i)) => {
            let pos = array_position(i, items.len())?;
            Ok(&mut items[pos])
        }
        (other, key) => Err(ExpressionError::type_mismatch(
            "object or array",
            format!("{} when assigning through {}", type_name(other), key.describe()),
        )),
    }
}

fn store(slot: &mut Value, key: Key<'_>, value: Value) -> ExpressionResult<()> {
    match (slot, key) {
        (Value::Null, key) => Err(ExpressionError::NullReference(format!(
            "assign {}",
            key.describe()
        ))),
        (Value::Object(map), Key::Name(name)) => {
            map.insert(name.to_string(), value);
            Ok(())
        }
        (Value::Object(map), Key::Index(i)) => {
            map.insert(i.to_string(), value);
            Ok(())
        }
        (Value::Array(items), Key::Index(i)) => {
            let pos = array_position(i, items.len())?;
            items[pos] = value;
            Ok(())
        }
        (other, key) => Err(ExpressionError::type_mismatch(
            "object or array",
            format!("{} when assigning {}", type_name(other), key.describe()),
        )),
    }
}

fn array_position(index: i64, len: usize) -> ExpressionResult<usize> {
    usize::try_from(index)
        .ok()
        .filter(|pos| *pos < len)
        .ok_or(ExpressionError::IndexOutOfBounds { index, len })
}

fn negate(value: &Value) -> ExpressionResult<Value> {
    match value {
        Value::Number(n) => match n.as_i64().and_then(i64::checked_neg) {
            Some(i) => Ok(Value::from(i)),
            None => Ok(float_value(-number_as_f64(n))),
        },
        other => Err(ExpressionError::type_mismatch("number", type_name(other))),
    }
}

/// Text form used by `+` concatenation; null shows up as "null".
fn concat_form(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        other => stringify(other),
    }
}

fn binary(op: BinaryOp, left: &Value, right: &Value) -> ExpressionResult<Value> {
    match op {
        BinaryOp::Equal => Ok(Value::Bool(loose_eq(left, right))),
        BinaryOp::NotEqual => Ok(Value::Bool(!loose_eq(left, right))),
        BinaryOp::LessThan => Ok(Value::Bool(compare(left, right)? == Ordering::Less)),
        BinaryOp::LessEqual => Ok(Value::Bool(compare(left, right)? != Ordering::Greater)),
        BinaryOp::GreaterThan => Ok(Value::Bool(compare(left, right)? == Ordering::Greater)),
        BinaryOp::GreaterEqual => Ok(Value::Bool(compare(left, right)? != Ordering::Less)),
        BinaryOp::Add if left.is_string() || right.is_string() => Ok(Value::String(format!(
            "{}{}",
            concat_form(left),
            concat_form(right)
        ))),
        _ => arithmetic(op, left, right),
    }
}

fn arithmetic(op: BinaryOp, left: &Value, right: &Value) -> ExpressionResult<Value> {
    let (Value::Number(l), Value::Number(r)) = (left, right) else {
        return Err(ExpressionError::type_mismatch(
            "two numbers",
            format!("{} and {}", type_name(left), type_name(right)),
        ));
    };

    if let (Some(li), Some(ri)) = (l.as_i64(), r.as_i64()) {
        let result = match op {
            BinaryOp::Add => li.checked_add(ri),
            BinaryOp::Subtract => li.checked_sub(ri),
            BinaryOp::Multiply => li.checked_mul(ri),
            BinaryOp::Divide | BinaryOp::Modulo if ri == 0 => {
                return Err(ExpressionError::DivisionByZero)
            }
            BinaryOp::Divide => li.checked_div(ri),
            BinaryOp::Modulo => li.checked_rem(ri),
            _ => None,
        };
        if let Some(value) = result {
            return Ok(Value::from(value));
        }
    }

    let (lf, rf) = (number_as_f64(l), number_as_f64(r));
    let result = match op {
        BinaryOp::Add => lf + rf,
        BinaryOp::Subtract => lf - rf,
        BinaryOp::Multiply => lf * rf,
        BinaryOp::Divide | BinaryOp::Modulo if rf == 0.0 => {
            return Err(ExpressionError::DivisionByZero)
        }
        BinaryOp::Divide => lf / rf,
        BinaryOp::Modulo => lf % rf,
        _ => {
            return Err(ExpressionError::type_mismatch(
                "arithmetic operator",
                format!("{:?}", op),
            ))
        }
    };
    Ok(float_value(result))
}
