//! Sequential four-stage trace execution.

use super::stage::StageExecutor;
use super::{TraceSettings, aggregate};
use crate::db::TraceStore;
use crate::parser::ResultParser;
use crate::sources::EvidenceSources;
use crate::types::{StageId, StageResult, TraceRequest, TraceSummary};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Runs stages 1A, 1B, 2A and 2B in order and aggregates their results.
///
/// Stages never run concurrently; the configured stage delay is inserted
/// between consecutive stages to stay within third-party rate limits.
pub struct TraceOrchestrator {
    executor: StageExecutor,
    stage_delay: Duration,
    store: Option<Arc<dyn TraceStore>>,
}

impl TraceOrchestrator {
    pub fn new(
        sources: EvidenceSources,
        parser: Arc<dyn ResultParser>,
        settings: TraceSettings,
    ) -> Self {
        let stage_delay = settings.stage_delay;
        Self {
            executor: StageExecutor::new(sources, parser, settings),
            stage_delay,
            store: None,
        }
    }

    /// Persist stage results and the summary as they are produced
    pub fn with_store(mut self, store: Arc<dyn TraceStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn settings(&self) -> &TraceSettings {
        self.executor.settings()
    }

    /// Run a trace under a fresh identifier.
    pub async fn run_trace(&self, request: &TraceRequest) -> TraceSummary {
        self.run_trace_with_id(Uuid::new_v4(), request).await
    }

    /// Run a trace under an existing identifier (e.g. a stored record).
    ///
    /// A failed stage never aborts the trace; the summary reports it instead.
    pub async fn run_trace_with_id(&self, trace_id: Uuid, request: &TraceRequest) -> TraceSummary {
        info!(
            %trace_id,
            entity = %request.entity,
            ubo_name = %request.ubo_name,
            location = %request.location,
            "Starting trace"
        );

        let mut stage_results: Vec<StageResult> = Vec::with_capacity(StageId::ALL.len());

        for (index, stage) in StageId::ALL.into_iter().enumerate() {
            if index > 0 && !self.stage_delay.is_zero() {
                tokio::time::sleep(self.stage_delay).await;
            }

            let result = self.executor.execute_stage(stage, request).await;
            if result.is_failed() {
                error!(%trace_id, stage = %stage, "Stage failed; continuing with remaining stages");
            }

            self.persist_stage(trace_id, &result).await;
            stage_results.push(result);
        }

        let summary = aggregate(trace_id, stage_results);
        self.persist_summary(&summary).await;

        info!(
            %trace_id,
            verdict = %summary.connection_status,
            status = summary.overall_status.as_str(),
            total_urls = summary.total_urls,
            elapsed_ms = summary.total_processing_time_ms,
            "Trace finished"
        );

        summary
    }

    async fn persist_stage(&self, trace_id: Uuid, result: &StageResult) {
        if let Some(store) = &self.store
            && let Err(e) = store.save_stage_result(trace_id, result).await
        {
            warn!(%trace_id, stage = %result.stage_id, error = %e, "Failed to persist stage result");
        }
    }

    async fn persist_summary(&self, summary: &TraceSummary) {
        if let Some(store) = &self.store
            && let Err(e) = store.save_summary(summary).await
        {
            warn!(trace_id = %summary.trace_id, error = %e, "Failed to persist trace summary");
        }
    }
}
