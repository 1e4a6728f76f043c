pub mod api;
pub mod catalog;
pub mod config;
pub mod domain;
pub mod engine;
pub mod expression;
pub mod external;
pub mod observability;
pub mod validation;

pub use config::Config;
pub use domain::{RuleConfig, RuleRequest, RuleResponse};
pub use engine::RuleEngine;
pub use expression::{Evaluator, ExpressionEvaluator};
