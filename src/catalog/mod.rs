//! Rule configuration loading and caching.

pub mod cache;
pub mod loader;

pub use cache::{RuleCatalog, RuleConfigCache};
pub use loader::{
    check_request_type, load_rule_config, CatalogError, FileRuleConfigSource, RuleConfigSource,
};
