use chrono::SecondsFormat;
use serde_json::{Map, Value};

use crate::expression::{ExpressionError, ExpressionResult, Scope};

use super::environment::{Clock, EnvironmentProvider};

pub const PAYLOAD: &str = "payload";
pub const CTX: &str = "ctx";
pub const DEFAULTS: &str = "defaults";
pub const ENV: &str = "env";
pub const NOW: &str = "now";

/// Mutable working data shared by every stage of one execution.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionState {
    /// Working payload; returned as `transformedPayload`
    pub payload: Value,
    /// Accumulator for intermediate values and saved call results
    pub ctx: Value,
}

impl ExecutionState {
    pub fn new(payload: Map<String, Value>) -> Self {
        ExecutionState {
            payload: Value::Object(payload),
            ctx: Value::Object(Map::new()),
        }
    }

    /// Store a value under a top-level `ctx` key.
    pub fn save(&mut self, key: &str, value: Value) {
        if let Value::Object(ctx) = &mut self.ctx {
            ctx.insert(key.to_string(), value);
        }
    }
}

/// Variable environment for one stage of a rule.
///
/// `payload` and `ctx` are borrowed from the execution state and writable;
/// `defaults`, `env` and `now` are read-only.
#[derive(Debug)]
pub struct ExecutionContext<'s> {
    state: &'s mut ExecutionState,
    defaults: &'s Value,
    env: Value,
    now: Value,
}

impl<'s> ExecutionContext<'s> {
    /// Build a fresh context, taking a new environment snapshot and timestamp.
    pub fn build(
        state: &'s mut ExecutionState,
        defaults: &'s Value,
        environment: &dyn EnvironmentProvider,
        clock: &dyn Clock,
    ) -> Self {
        let env = environment
            .snapshot()
            .into_iter()
            .map(|(name, value)| (name, Value::String(value)))
            .collect::<Map<String, Value>>();

        ExecutionContext {
            state,
            defaults,
            env: Value::Object(env),
            now: Value::String(clock.now().to_rfc3339_opts(SecondsFormat::Millis, true)),
        }
    }
}

impl Scope for ExecutionContext<'_> {
    fn variable(&self, name: &str) -> Option<&Value> {
        match name {
            PAYLOAD => Some(&self.state.payload),
            CTX => Some(&self.state.ctx),
            DEFAULTS => Some(self.defaults),
            ENV => Some(&self.env),
            NOW => Some(&self.now),
            _ => None,
        }
    }

    fn variable_mut(&mut self, name: &str) -> ExpressionResult<&mut Value> {
        match name {
            PAYLOAD => Ok(&mut self.state.payload),
            CTX => Ok(&mut self.state.ctx),
            DEFAULTS | ENV | NOW => Err(ExpressionError::ReadOnly(name.to_string())),
            _ => Err(ExpressionError::InvalidAssignment(format!(
                "unknown variable '{}'",
                name
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::environment::{FixedClock, StaticEnvironment};
    use crate::expression::{Evaluator, ExpressionEvaluator, DEFAULT_TAG};
    use chrono::{TimeZone, Utc};
    use serde_json::json;

    fn payload() -> Map<String, Value> {
        match json!({"first": "Ada", "last": "Lovelace"}) {
            Value::Object(map) => map,
            _ => unreachable!(),
        }
    }

    fn clock() -> FixedClock {
        FixedClock(Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap())
    }

    #[test]
    fn test_variables_exposed() {
        let mut state = ExecutionState::new(payload());
        let defaults = json!({"country": "UK"});
        let env = StaticEnvironment::new().with("REGION", "eu");
        let ctx = ExecutionContext::build(&mut state, &defaults, &env, &clock());

        assert_eq!(ctx.variable("payload").unwrap()["first"], "Ada");
        assert_eq!(ctx.variable("ctx").unwrap(), &json!({}));
        assert_eq!(ctx.variable("defaults").unwrap()["country"], "UK");
        assert_eq!(ctx.variable("env").unwrap()["REGION"], "eu");
        assert_eq!(ctx.variable("now").unwrap(), &json!("2024-01-02T03:04:05.000Z"));
        assert!(ctx.variable("other").is_none());
    }

    #[test]
    fn test_writes_reach_state() {
        let mut state = ExecutionState::new(payload());
        let defaults = json!({});
        let evaluator = Evaluator::new(DEFAULT_TAG).unwrap();

        {
            let mut ctx =
                ExecutionContext::build(&mut state, &defaults, &StaticEnvironment::new(), &clock());
            evaluator
                .evaluate(
                    "#ctx['fullName'] = #payload['first'] + ' ' + #payload['last']; #payload['seen'] = true",
                    &mut ctx,
                )
                .unwrap();
        }

        assert_eq!(state.ctx["fullName"], "Ada Lovelace");
        assert_eq!(state.payload["seen"], true);
    }

    #[test]
    fn test_read_only_bindings() {
        let mut state = ExecutionState::new(Map::new());
        let defaults = json!({"limit": 1});
        let evaluator = Evaluator::new(DEFAULT_TAG).unwrap();
        let mut ctx =
            ExecutionContext::build(&mut state, &defaults, &StaticEnvironment::new(), &clock());

        let err = evaluator
            .evaluate("#defaults['limit'] = 2", &mut ctx)
            .unwrap_err();
        assert_eq!(err, ExpressionError::ReadOnly("defaults".to_string()));

        let err = evaluator.evaluate("#env['X'] = 'y'", &mut ctx).unwrap_err();
        assert_eq!(err, ExpressionError::ReadOnly("env".to_string()));
    }

    #[test]
    fn test_save() {
        let mut state = ExecutionState::new(Map::new());
        state.save("user", json!({"id": 1}));
        assert_eq!(state.ctx, json!({"user": {"id": 1}}));
    }
}
