//! Stage orchestration and evidence aggregation
//!
//! A trace runs four evidence stages strictly in order (1A, 1B, 2A, 2B). Each
//! stage issues one primary agent query plus up to three enrichment queries,
//! retries the primary query while it yields nothing, and produces a
//! [`StageResult`](crate::types::StageResult). The aggregator then folds the
//! stage results into a [`TraceSummary`](crate::types::TraceSummary).

pub mod aggregate;
pub mod orchestrator;
pub mod stage;

pub use aggregate::aggregate;
pub use orchestrator::TraceOrchestrator;
pub use stage::StageExecutor;

use crate::utils::toml_config::UboConfig;
use chrono::NaiveDate;
use std::time::Duration;

/// Retry, pacing and timeout policy handed to the orchestrator at construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceSettings {
    /// Extra primary-query attempts after a zero-result attempt
    pub max_retries: u32,
    pub retry_delay: Duration,
    /// Pause between consecutive stages
    pub stage_delay: Duration,
    /// Lower bound injected into the time-scoped stages
    pub time_filter_from: NaiveDate,
    pub primary_timeout: Duration,
    pub enrichment_timeout: Duration,
}

impl Default for TraceSettings {
    fn default() -> Self {
        Self {
            max_retries: 3,
            retry_delay: Duration::from_secs(5),
            stage_delay: Duration::from_secs(5),
            time_filter_from: NaiveDate::from_ymd_opt(2023, 1, 1).unwrap_or(NaiveDate::MIN),
            primary_timeout: Duration::from_secs(60),
            enrichment_timeout: Duration::from_secs(30),
        }
    }
}

impl TraceSettings {
    pub fn from_config(config: &UboConfig) -> Self {
        let enrichment_timeout = [
            config.expert.as_ref().map(|e| e.timeout_secs),
            config.apollo.as_ref().map(|a| a.timeout_secs),
            config.searchapi.as_ref().map(|s| s.timeout_secs),
        ]
        .into_iter()
        .flatten()
        .max()
        .unwrap_or(30);

        Self {
            max_retries: config.trace.max_retries,
            retry_delay: Duration::from_millis(config.trace.retry_delay_ms),
            stage_delay: Duration::from_millis(config.trace.stage_delay_ms),
            time_filter_from: config.trace.time_filter_from,
            primary_timeout: Duration::from_secs(config.agent.timeout_secs),
            enrichment_timeout: Duration::from_secs(enrichment_timeout),
        }
    }

    /// Settings with every delay removed, for tests and local runs.
    pub fn without_delays(mut self) -> Self {
        self.retry_delay = Duration::ZERO;
        self.stage_delay = Duration::ZERO;
        self
    }

    /// Total primary-query attempts a stage may make
    pub fn max_attempts(&self) -> u32 {
        self.max_retries + 1
    }
}
