use chrono::{DateTime, Utc};
use std::collections::HashMap;

/// Source of the `env` variable exposed to expressions.
pub trait EnvironmentProvider: Send + Sync {
    /// Current environment variables.
    fn snapshot(&self) -> HashMap<String, String>;
}

/// Reads the process environment on every snapshot.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessEnvironment;

impl EnvironmentProvider for ProcessEnvironment {
    fn snapshot(&self) -> HashMap<String, String> {
        std::env::vars().collect()
    }
}

/// Fixed set of variables, for tests and embedding.
#[derive(Debug, Clone, Default)]
pub struct StaticEnvironment {
    vars: HashMap<String, String>,
}

impl StaticEnvironment {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.vars.insert(name.into(), value.into());
        self
    }
}

impl EnvironmentProvider for StaticEnvironment {
    fn snapshot(&self) -> HashMap<String, String> {
        self.vars.clone()
    }
}

/// Source of the `now` variable and trace timestamps.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock frozen at one instant.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}
