//! Rule execution: contexts, environment access, transforms and the rule loop.

pub mod context;
pub mod environment;
pub mod executor;
pub mod transform;

pub use context::{ExecutionContext, ExecutionState};
pub use environment::{
    Clock, EnvironmentProvider, FixedClock, ProcessEnvironment, StaticEnvironment, SystemClock,
};
pub use executor::{EngineError, RuleEngine, SKIP_REASON};
pub use transform::TransformEngine;
