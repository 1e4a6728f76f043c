pub mod request;
pub mod response;
pub mod rule;
pub mod trace;

pub use request::RuleRequest;
pub use response::RuleResponse;
pub use rule::{Action, ExternalCall, Rule, RuleConfig, TransformStep, ValidationRule, STOP_ACTION};
pub use trace::{ExternalCallRecord, ExternalCallStatus, TraceEntry, TraceStatus};
