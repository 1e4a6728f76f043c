use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

use crate::domain::RuleConfig;

/// File extensions tried, in order, when looking up a request type.
pub const CONFIG_EXTENSIONS: [&str; 3] = ["json", "yaml", "yml"];

/// Errors that can occur while resolving rule configurations.
#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("Rule configuration not found for type: {0}")]
    NotFound(String),

    #[error("Invalid request type: {0:?}")]
    InvalidType(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Rule configuration load task failed: {0}")]
    Task(String),
}

/// Where rule configurations come from.
pub trait RuleConfigSource: Send + Sync {
    /// Load the configuration for a request type.
    fn load(&self, type_of_request: &str) -> Result<RuleConfig, CatalogError>;
}

/// Load a rule configuration file. YAML is used for `.yaml`/`.yml`, JSON otherwise.
pub fn load_rule_config(path: impl AsRef<Path>) -> Result<RuleConfig, CatalogError> {
    let path = path.as_ref();
    let content = fs::read_to_string(path)?;

    let config: RuleConfig = match path.extension().and_then(|e| e.to_str()) {
        Some("yaml") | Some("yml") => serde_yaml::from_str(&content)?,
        _ => serde_json::from_str(&content)?,
    };

    validate_rule_config(&config)?;

    Ok(config)
}

/// Validate a rule configuration.
fn validate_rule_config(config: &RuleConfig) -> Result<(), CatalogError> {
    let mut seen_ids = HashSet::new();
    for (index, rule) in config.rules.iter().enumerate() {
        if rule.id.trim().is_empty() {
            return Err(CatalogError::Validation(format!(
                "Rule at position {} has an empty id",
                index
            )));
        }

        if !seen_ids.insert(rule.id.as_str()) {
            return Err(CatalogError::Validation(format!(
                "Duplicate rule ID: {}",
                rule.id
            )));
        }
    }

    Ok(())
}

/// Request types become file names, so only a safe character set is accepted.
pub fn check_request_type(type_of_request: &str) -> Result<(), CatalogError> {
    let valid = !type_of_request.is_empty()
        && !type_of_request.contains("..")
        && type_of_request
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'));

    if valid {
        Ok(())
    } else {
        Err(CatalogError::InvalidType(type_of_request.to_string()))
    }
}

/// Reads `<dir>/<type>.json`, then `.yaml`, then `.yml`.
#[derive(Debug, Clone)]
pub struct FileRuleConfigSource {
    dir: PathBuf,
}

impl FileRuleConfigSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        FileRuleConfigSource { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// First existing file for a request type.
    fn locate(&self, type_of_request: &str) -> Option<PathBuf> {
        CONFIG_EXTENSIONS
            .iter()
            .map(|ext| self.dir.join(format!("{}.{}", type_of_request, ext)))
            .find(|path| path.is_file())
    }
}

impl RuleConfigSource for FileRuleConfigSource {
    fn load(&self, type_of_request: &str) -> Result<RuleConfig, CatalogError> {
        check_request_type(type_of_request)?;

        let path = self
            .locate(type_of_request)
            .ok_or_else(|| CatalogError::NotFound(type_of_request.to_string()))?;

        let mut config = load_rule_config(&path)?;
        if config.type_of_request.is_empty() {
            config.type_of_request = type_of_request.to_string();
        }

        info!(
            type_of_request = %type_of_request,
            path = %path.display(),
            rules = config.rules.len(),
            "Loaded rule configuration"
        );

        Ok(config)
    }
}
