use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use crate::domain::{ExternalCallStatus, RuleResponse, TraceStatus};

/// Metrics registry for the application.
#[derive(Debug, Default)]
pub struct MetricsRegistry {
    /// Total rule executions
    pub executions_total: AtomicU64,

    /// Executions by validity
    pub executions_valid: AtomicU64,
    pub executions_invalid: AtomicU64,

    /// Requests whose rule configuration could not be resolved
    pub config_lookup_failures: AtomicU64,

    /// Execution latency buckets (microseconds)
    pub latency_under_1ms: AtomicU64,
    pub latency_1_5ms: AtomicU64,
    pub latency_5_10ms: AtomicU64,
    pub latency_10_50ms: AtomicU64,
    pub latency_50_100ms: AtomicU64,
    pub latency_over_100ms: AtomicU64,

    /// Trace entries by status
    pub rules_skipped: AtomicU64,
    pub rules_failed: AtomicU64,
    pub rules_success: AtomicU64,
    pub rules_transformed: AtomicU64,
    pub rules_external_call: AtomicU64,
    pub rules_external_call_failed: AtomicU64,
    pub rules_stopped: AtomicU64,
    pub rules_error: AtomicU64,

    /// External calls by outcome
    pub external_calls_success: AtomicU64,
    pub external_calls_failed: AtomicU64,

    /// Rule configuration reloads
    pub config_reloads_total: AtomicU64,
    pub config_reload_errors: AtomicU64,
}

impl MetricsRegistry {
    /// Create a new metrics registry.
    pub fn new() -> Self {
        MetricsRegistry::default()
    }

    /// Record the outcome of one execution: validity, trace statuses and external calls.
    pub fn record_response(&self, response: &RuleResponse) {
        self.executions_total.fetch_add(1, Ordering::Relaxed);

        if response.valid {
            self.executions_valid.fetch_add(1, Ordering::Relaxed);
        } else {
            self.executions_invalid.fetch_add(1, Ordering::Relaxed);
        }

        for entry in &response.trace {
            self.status_counter(entry.status)
                .fetch_add(1, Ordering::Relaxed);
        }

        for call in &response.external_calls {
            match call.status {
                ExternalCallStatus::Success => {
                    self.external_calls_success.fetch_add(1, Ordering::Relaxed);
                }
                ExternalCallStatus::Failed => {
                    self.external_calls_failed.fetch_add(1, Ordering::Relaxed);
                }
            }
        }
    }

    fn status_counter(&self, status: TraceStatus) -> &AtomicU64 {
        match status {
            TraceStatus::Skipped => &self.rules_skipped,
            TraceStatus::Failed => &self.rules_failed,
            TraceStatus::Success => &self.rules_success,
            TraceStatus::Transformed => &self.rules_transformed,
            TraceStatus::ExternalCall => &self.rules_external_call,
            TraceStatus::ExternalCallFailed => &self.rules_external_call_failed,
            TraceStatus::Stopped => &self.rules_stopped,
            TraceStatus::Error => &self.rules_error,
        }
    }

    /// Record a request that failed before execution.
    pub fn record_config_lookup_failure(&self) {
        self.config_lookup_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Record execution latency.
    pub fn record_latency(&self, start: Instant) {
        let micros = start.elapsed().as_micros() as u64;

        if micros < 1000 {
            self.latency_under_1ms.fetch_add(1, Ordering::Relaxed);
        } else if micros < 5000 {
            self.latency_1_5ms.fetch_add(1, Ordering::Relaxed);
        } else if micros < 10000 {
            self.latency_5_10ms.fetch_add(1, Ordering::Relaxed);
        } else if micros < 50000 {
            self.latency_10_50ms.fetch_add(1, Ordering::Relaxed);
        } else if micros < 100000 {
            self.latency_50_100ms.fetch_add(1, Ordering::Relaxed);
        } else {
            self.latency_over_100ms.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Record a configuration reload.
    pub fn record_config_reload(&self, success: bool) {
        self.config_reloads_total.fetch_add(1, Ordering::Relaxed);
        if !success {
            self.config_reload_errors.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Export metrics in Prometheus format.
    pub fn to_prometheus(&self) -> String {
        let load = |counter: &AtomicU64| counter.load(Ordering::Relaxed);

        format!(
            r#"# HELP rulegate_executions_total Total number of rule executions
# TYPE rulegate_executions_total counter
rulegate_executions_total {}

# HELP rulegate_executions Rule executions by validity
# TYPE rulegate_executions counter
rulegate_executions{{valid="true"}} {}
rulegate_executions{{valid="false"}} {}

# HELP rulegate_config_lookup_failures_total Requests without a resolvable rule configuration
# TYPE rulegate_config_lookup_failures_total counter
rulegate_config_lookup_failures_total {}

# HELP rulegate_execution_latency_bucket Execution latency histogram
# TYPE rulegate_execution_latency_bucket counter
rulegate_execution_latency_bucket{{le="0.001"}} {}
rulegate_execution_latency_bucket{{le="0.005"}} {}
rulegate_execution_latency_bucket{{le="0.01"}} {}
rulegate_execution_latency_bucket{{le="0.05"}} {}
rulegate_execution_latency_bucket{{le="0.1"}} {}
rulegate_execution_latency_bucket{{le="+Inf"}} {}

# HELP rulegate_rules Rule outcomes by trace status
# TYPE rulegate_rules counter
rulegate_rules{{status="SKIPPED"}} {}
rulegate_rules{{status="FAILED"}} {}
rulegate_rules{{status="SUCCESS"}} {}
rulegate_rules{{status="TRANSFORMED"}} {}
rulegate_rules{{status="EXTERNAL_CALL"}} {}
rulegate_rules{{status="EXTERNAL_CALL_FAILED"}} {}
rulegate_rules{{status="STOPPED"}} {}
rulegate_rules{{status="ERROR"}} {}

# HELP rulegate_external_calls External calls by outcome
# TYPE rulegate_external_calls counter
rulegate_external_calls{{status="SUCCESS"}} {}
rulegate_external_calls{{status="FAILED"}} {}

# HELP rulegate_config_reloads_total Rule configuration reloads
# TYPE rulegate_config_reloads_total counter
rulegate_config_reloads_total {}

# HELP rulegate_config_reload_errors_total Rule configuration reload errors
# TYPE rulegate_config_reload_errors_total counter
rulegate_config_reload_errors_total {}
"#,
            load(&self.executions_total),
            load(&self.executions_valid),
            load(&self.executions_invalid),
            load(&self.config_lookup_failures),
            load(&self.latency_under_1ms),
            load(&self.latency_1_5ms),
            load(&self.latency_5_10ms),
            load(&self.latency_10_50ms),
            load(&self.latency_50_100ms),
            load(&self.latency_over_100ms),
            load(&self.rules_skipped),
            load(&self.rules_failed),
            load(&self.rules_success),
            load(&self.rules_transformed),
            load(&self.rules_external_call),
            load(&self.rules_external_call_failed),
            load(&self.rules_stopped),
            load(&self.rules_error),
            load(&self.external_calls_success),
            load(&self.external_calls_failed),
            load(&self.config_reloads_total),
            load(&self.config_reload_errors),
        )
    }
}

/// Guard for timing operations.
pub struct TimingGuard<'a> {
    registry: &'a MetricsRegistry,
    start: Instant,
}

impl<'a> TimingGuard<'a> {
    pub fn new(registry: &'a MetricsRegistry) -> Self {
        TimingGuard {
            registry,
            start: Instant::now(),
        }
    }
}

impl<'a> Drop for TimingGuard<'a> {
    fn drop(&mut self) {
        self.registry.record_latency(self.start);
    }
}
