use std::time::Duration;

use super::retry::RetryPolicy;
use super::stats::SuccessCounter;
use crate::audit::FailureLog;
use crate::config::ImportConfig;
use crate::payload::PayloadBuilder;
use crate::schema::FieldSchema;

/// Throttling and retry knobs shared by every worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkerSettings {
    /// Log progress every N imports. Zero disables progress lines.
    pub notify_every: usize,
    pub throttle_percent: u8,
    pub rate_limit_cooldown: Duration,
    pub retry: RetryPolicy,
}

impl WorkerSettings {
    pub fn from_config(config: &ImportConfig) -> Self {
        Self {
            notify_every: config.notify_every,
            throttle_percent: config.throttle_percent,
            rate_limit_cooldown: config.rate_limit_cooldown,
            retry: RetryPolicy::default(),
        }
    }
}

/// State handed to every worker at construction: read-only configuration,
/// the shared success counter and the failure log.
pub struct RunContext {
    pub builder: PayloadBuilder,
    pub settings: WorkerSettings,
    pub imported: SuccessCounter,
    pub failures: FailureLog,
}

impl RunContext {
    pub fn new(builder: PayloadBuilder, settings: WorkerSettings, failures: FailureLog) -> Self {
        Self {
            builder,
            settings,
            imported: SuccessCounter::default(),
            failures,
        }
    }

    pub fn schema(&self) -> &FieldSchema {
        self.builder.schema()
    }
}
