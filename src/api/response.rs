use chrono::{DateTime, Utc};
use serde::Serialize;

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
    pub version: String,
    pub timestamp: DateTime<Utc>,
    pub uptime_secs: u64,
    pub cached_configs: usize,
}

/// Configuration reload acknowledgement.
#[derive(Debug, Serialize)]
pub struct ReloadResponse {
    pub message: String,
}

impl ReloadResponse {
    pub fn reloaded(type_of_request: &str) -> Self {
        ReloadResponse {
            message: format!(
                "Configuration reloaded successfully for type: {}",
                type_of_request
            ),
        }
    }
}

/// Error response.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>, code: impl Into<String>) -> Self {
        ErrorResponse {
            error: error.into(),
            code: code.into(),
        }
    }

    pub fn unauthorized() -> Self {
        ErrorResponse::new("Invalid or missing API key", "UNAUTHORIZED")
    }

    pub fn internal_error(message: impl Into<String>) -> Self {
        ErrorResponse::new(message, "INTERNAL_ERROR")
    }
}
