use thiserror::Error;

/// Errors raised while parsing or evaluating an expression.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExpressionError {
    #[error("parse error at position {position}: {message}")]
    Parse { position: usize, message: String },

    #[error("type mismatch: expected {expected}, found {actual}")]
    TypeMismatch {
        expected: &'static str,
        actual: String,
    },

    #[error("cannot {0} on null")]
    NullReference(String),

    #[error("index {index} out of bounds for array of length {len}")]
    IndexOutOfBounds { index: i64, len: usize },

    #[error("division by zero")]
    DivisionByZero,

    #[error("unknown method '{0}'")]
    UnknownMethod(String),

    #[error("method '{method}' expects {expected} argument(s), got {actual}")]
    Arity {
        method: String,
        expected: usize,
        actual: usize,
    },

    #[error("variable '{0}' is read-only")]
    ReadOnly(String),

    #[error("invalid assignment: {0}")]
    InvalidAssignment(String),

    #[error("invalid regex '{pattern}': {message}")]
    InvalidRegex { pattern: String, message: String },
}

impl ExpressionError {
    pub fn parse(position: usize, message: impl Into<String>) -> Self {
        ExpressionError::Parse {
            position,
            message: message.into(),
        }
    }

    pub fn type_mismatch(expected: &'static str, actual: impl Into<String>) -> Self {
        ExpressionError::TypeMismatch {
            expected,
            actual: actual.into(),
        }
    }
}

pub type ExpressionResult<T> = Result<T, ExpressionError>;
