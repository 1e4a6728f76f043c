use std::path::PathBuf;
use std::time::Duration;

use clap::{ArgAction, Parser};

use crate::external::HttpClientSettings;

/// Rule engine service configuration.
#[derive(Debug, Clone, Parser)]
#[command(name = "rulegate")]
#[command(about = "Declarative business-rule engine")]
pub struct Config {
    /// HTTP server listen address
    #[arg(long, default_value = "0.0.0.0:8080", env = "RULEGATE_LISTEN_ADDR")]
    pub listen_addr: String,

    /// Directory holding `<type>.json` / `<type>.yaml` rule configurations
    #[arg(long, default_value = "rules", env = "RULEGATE_RULES_DIR")]
    pub rules_dir: PathBuf,

    /// Key expected in the X-API-KEY header
    #[arg(long, default_value = "change-me", env = "RULEGATE_API_KEY", hide_env_values = true)]
    pub api_key: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", env = "RUST_LOG")]
    pub log_level: String,

    /// Emit logs as JSON lines
    #[arg(long, default_value = "false", env = "RULEGATE_LOG_JSON", action = ArgAction::Set)]
    pub log_json: bool,

    /// Marker tag for templates, as in `{{spel: expr}}`
    #[arg(long, default_value = "spel", env = "RULEGATE_TEMPLATE_TAG")]
    pub template_tag: String,

    /// Connect timeout for external calls in milliseconds
    #[arg(long, default_value = "10000", env = "RULEGATE_HTTP_CONNECT_TIMEOUT_MS")]
    pub http_connect_timeout_ms: u64,

    /// Overall timeout for external calls in milliseconds
    #[arg(long, default_value = "30000", env = "RULEGATE_HTTP_TIMEOUT_MS")]
    pub http_timeout_ms: u64,

    /// Accept any TLS certificate on external calls (development only)
    #[arg(long, default_value = "false", env = "RULEGATE_TRUST_ALL_CERTIFICATES", action = ArgAction::Set)]
    pub trust_all_certificates: bool,

    /// Enable graceful shutdown
    #[arg(long, default_value = "true", env = "RULEGATE_GRACEFUL_SHUTDOWN", action = ArgAction::Set)]
    pub graceful_shutdown: bool,
}

impl Config {
    /// Get external call connect timeout as Duration.
    pub fn http_connect_timeout(&self) -> Duration {
        Duration::from_millis(self.http_connect_timeout_ms)
    }

    /// Get external call timeout as Duration.
    pub fn http_timeout(&self) -> Duration {
        Duration::from_millis(self.http_timeout_ms)
    }

    /// Settings for the outbound HTTP client.
    pub fn http_client_settings(&self) -> HttpClientSettings {
        HttpClientSettings {
            connect_timeout: self.http_connect_timeout(),
            request_timeout: self.http_timeout(),
            trust_all_certificates: self.trust_all_certificates,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            listen_addr: "0.0.0.0:8080".to_string(),
            rules_dir: PathBuf::from("rules"),
            api_key: "change-me".to_string(),
            log_level: "info".to_string(),
            log_json: false,
            template_tag: "spel".to_string(),
            http_connect_timeout_ms: 10_000,
            http_timeout_ms: 30_000,
            trust_all_certificates: false,
            graceful_shutdown: true,
        }
    }
}
