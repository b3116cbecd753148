//! Trace persistence abstraction
//!
//! The orchestrator writes each stage result and the final summary through a
//! [`TraceStore`]; the HTTP layer reads them back by trace id. Writes from the
//! orchestrator are fire-and-forget: a failing store is logged, never fatal.
//!
//! # Example
//!
//! ```rust,ignore
//! use ubo_trace::db::{InMemoryTraceStore, TraceStore};
//!
//! let store = InMemoryTraceStore::new();
//! let record = store.create(request).await?;
//! let stages = store.stage_results(record.trace_id).await?;
//! ```

use crate::types::{Result, StageResult, TraceRecord, TraceRequest, TraceStats, TraceStatus, TraceSummary};
use async_trait::async_trait;
use uuid::Uuid;

/// Storage backend for trace records, stage results and summaries.
#[async_trait]
pub trait TraceStore: Send + Sync {
    /// Create a pending trace record
    async fn create(&self, request: TraceRequest) -> Result<TraceRecord>;

    async fn get(&self, trace_id: Uuid) -> Result<Option<TraceRecord>>;

    /// Records newest first
    async fn list(&self, limit: usize, offset: usize) -> Result<Vec<TraceRecord>>;

    async fn update_status(&self, trace_id: Uuid, status: TraceStatus) -> Result<()>;

    /// Move a trace to `in_progress`, clearing results from any earlier run.
    ///
    /// Fails with `Conflict` if the trace is already running.
    async fn mark_in_progress(&self, trace_id: Uuid) -> Result<TraceRecord>;

    /// Append a stage result and record the stage as completed
    async fn save_stage_result(&self, trace_id: Uuid, result: &StageResult) -> Result<()>;

    /// Stage results in execution order
    async fn stage_results(&self, trace_id: Uuid) -> Result<Vec<StageResult>>;

    /// Store the final summary and adopt its overall status
    async fn save_summary(&self, summary: &TraceSummary) -> Result<()>;

    /// Returns whether a record was removed
    async fn delete(&self, trace_id: Uuid) -> Result<bool>;

    async fn stats(&self) -> Result<TraceStats>;
}
