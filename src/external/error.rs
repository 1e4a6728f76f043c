use thiserror::Error;

use crate::expression::ExpressionError;

/// Failures of an outbound call. The engine records these on the trace
/// instead of failing the rule.
#[derive(Error, Debug)]
pub enum ExternalCallError {
    #[error("template rendering failed: {0}")]
    Template(#[from] ExpressionError),

    #[error("request to {url} failed: {message}")]
    Transport { url: String, message: String },

    #[error("{method} {url} returned status {status}")]
    Status {
        method: String,
        url: String,
        status: u16,
    },

    #[error("failed to decode response from {url}: {message}")]
    Decode { url: String, message: String },

    #[error("failed to build HTTP client: {0}")]
    Client(String),
}

impl ExternalCallError {
    pub fn transport(url: impl Into<String>, message: impl ToString) -> Self {
        ExternalCallError::Transport {
            url: url.into(),
            message: message.to_string(),
        }
    }
}
