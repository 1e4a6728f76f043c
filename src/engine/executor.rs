//! Per-rule state machine: gate, validate, external call, transform, action.

use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::domain::{
    ExternalCallRecord, Rule, RuleConfig, RuleRequest, RuleResponse, TraceEntry, TraceStatus,
};
use crate::expression::value::type_name;
use crate::expression::{ExpressionError, ExpressionEvaluator};
use crate::external::{ExternalCallInvoker, HttpClient};
use crate::validation::Validator;

use super::context::{ExecutionContext, ExecutionState};
use super::environment::{Clock, EnvironmentProvider, ProcessEnvironment, SystemClock};
use super::transform::TransformEngine;

/// Reason recorded on SKIPPED entries.
pub const SKIP_REASON: &str = "when condition not met";

/// Failures inside the engine. Per-rule failures become ERROR trace entries;
/// anything else degrades the whole response.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error(transparent)]
    Expression(#[from] ExpressionError),

    #[error("payload must be a JSON object, found {0}")]
    InvalidPayload(&'static str),
}

/// What the rule loop does after a rule finishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RuleFlow {
    Continue,
    Break,
}

/// Accumulated output of one execution.
#[derive(Debug, Default)]
struct ExecutionLog {
    errors: Vec<String>,
    trace: Vec<TraceEntry>,
    external_calls: Vec<ExternalCallRecord>,
}

/// Executes rule configurations against requests.
pub struct RuleEngine {
    evaluator: Arc<dyn ExpressionEvaluator>,
    validator: Validator,
    invoker: ExternalCallInvoker,
    transformer: TransformEngine,
    environment: Arc<dyn EnvironmentProvider>,
    clock: Arc<dyn Clock>,
}

impl RuleEngine {
    /// Create an engine reading the process environment and the system clock.
    pub fn new(evaluator: Arc<dyn ExpressionEvaluator>, http: Arc<dyn HttpClient>) -> Self {
        Self {
            validator: Validator::new(evaluator.clone()),
            invoker: ExternalCallInvoker::new(http, evaluator.clone()),
            transformer: TransformEngine::new(evaluator.clone()),
            evaluator,
            environment: Arc::new(ProcessEnvironment),
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_environment(mut self, environment: Arc<dyn EnvironmentProvider>) -> Self {
        self.environment = environment;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Run every rule of `config` against the request. Never fails: problems
    /// are reported through `errors` and the trace.
    pub async fn execute(&self, request: &RuleRequest, config: &RuleConfig) -> RuleResponse {
        let request_id = Uuid::new_v4().to_string();
        let start = Instant::now();

        info!(
            request_id = %request_id,
            type_of_request = %request.type_of_request,
            rules = config.rules.len(),
            "Starting rule execution"
        );

        let mut log = ExecutionLog::default();
        let transformed_payload = match self.run_rules(request, config, &mut log).await {
            Ok(payload) => payload,
            Err(e) => {
                error!(request_id = %request_id, error = %e, "Rule execution failed");
                log.errors.push(format!("Rule execution failed: {}", e));
                Value::Null
            }
        };

        let response = RuleResponse::new(
            request_id,
            request.type_of_request.clone(),
            log.errors,
            transformed_payload,
            log.trace,
            log.external_calls,
        );

        info!(
            request_id = %response.request_id,
            type_of_request = %response.type_of_request,
            valid = response.valid,
            trace_len = response.trace.len(),
            latency_us = start.elapsed().as_micros() as u64,
            "Rule execution finished"
        );

        response
    }

    async fn run_rules(
        &self,
        request: &RuleRequest,
        config: &RuleConfig,
        log: &mut ExecutionLog,
    ) -> Result<Value, EngineError> {
        let payload = match &request.payload {
            Value::Null => Map::new(),
            Value::Object(map) => map.clone(),
            other => return Err(EngineError::InvalidPayload(type_name(other))),
        };

        let mut state = ExecutionState::new(payload);
        let defaults = Value::Object(config.defaults.clone());

        for rule in &config.rules {
            let mut entry = TraceEntry::for_rule(rule, self.clock.now());

            let flow = match self.run_rule(rule, &mut state, &defaults, &mut entry, log).await {
                Ok(flow) => flow,
                Err(e) => {
                    warn!(rule_id = %rule.id, error = %e, "Rule failed");
                    entry.status = TraceStatus::Error;
                    entry.error = Some(e.to_string());
                    log.errors.push(format!("Rule {} failed: {}", rule.id, e));
                    RuleFlow::Continue
                }
            };

            log.trace.push(entry);

            if flow == RuleFlow::Break {
                break;
            }
        }

        Ok(state.payload)
    }

    async fn run_rule(
        &self,
        rule: &Rule,
        state: &mut ExecutionState,
        defaults: &Value,
        entry: &mut TraceEntry,
        log: &mut ExecutionLog,
    ) -> Result<RuleFlow, EngineError> {
        if let Some(gate) = rule.gate() {
            let passed = {
                let mut context = self.context(state, defaults);
                self.evaluator.evaluate_boolean(gate, &mut context)?
            };
            if !passed {
                debug!(rule_id = %rule.id, "Rule skipped");
                entry.status = TraceStatus::Skipped;
                entry.reason = Some(SKIP_REASON.to_string());
                return Ok(RuleFlow::Continue);
            }
        }

        if !rule.validate.is_empty() {
            let errors = {
                let mut context = self.context(state, defaults);
                self.validator.validate(&rule.validate, &mut context)
            };
            if !errors.is_empty() {
                debug!(rule_id = %rule.id, errors = errors.len(), "Validation failed");
                log.errors.extend(errors.iter().cloned());
                entry.status = TraceStatus::Failed;
                entry.errors = Some(errors);
                return Ok(if rule.stop_on_validation_error {
                    RuleFlow::Break
                } else {
                    RuleFlow::Continue
                });
            }
        }

        if let Some(call) = &rule.external_call {
            let outcome = {
                let mut context = self.context(state, defaults);
                self.invoker.invoke(call, &mut context).await
            };

            let record = match outcome {
                Ok(Some(result)) => {
                    info!(rule_id = %rule.id, method = %call.method, url = %call.url, "External call succeeded");
                    if let Some(key) = call.save_as.as_deref() {
                        state.save(key, result);
                    }
                    entry.status = TraceStatus::ExternalCall;
                    Some(ExternalCallRecord::success(&rule.id, call, self.clock.now()))
                }
                Ok(None) => None,
                Err(e) => {
                    warn!(rule_id = %rule.id, method = %call.method, url = %call.url, error = %e, "External call failed");
                    entry.status = TraceStatus::ExternalCallFailed;
                    Some(ExternalCallRecord::failed(
                        &rule.id,
                        call,
                        self.clock.now(),
                        e.to_string(),
                    ))
                }
            };

            if let Some(record) = record {
                entry.external_call = Some(record.clone());
                log.external_calls.push(record);
            }
        }

        if !rule.transform.is_empty() {
            let mut context = self.context(state, defaults);
            self.transformer.apply(&rule.transform, &mut context)?;
            entry.status = TraceStatus::Transformed;
        }

        if rule.stops_on_success() {
            debug!(rule_id = %rule.id, "Rule requested stop");
            entry.status = TraceStatus::Stopped;
            return Ok(RuleFlow::Break);
        }

        Ok(RuleFlow::Continue)
    }

    fn context<'s>(&self, state: &'s mut ExecutionState, defaults: &'s Value) -> ExecutionContext<'s> {
        ExecutionContext::build(state, defaults, self.environment.as_ref(), self.clock.as_ref())
    }
}
