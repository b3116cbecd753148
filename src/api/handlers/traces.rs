//! Trace lifecycle handlers.
//!
//! Traces are created pending, executed on request, and read back from the
//! configured [`TraceStore`](crate::db::TraceStore).

use crate::{
    AppState,
    types::{
        AppError, BatchTraceRequest, BatchTraceResponse, Result, StageResult, TraceRecord,
        TraceRequest, TraceStats, TraceStatus, TraceSummary,
    },
};
use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{error, info, warn};
use uuid::Uuid;

const DEFAULT_PAGE_SIZE: usize = 50;
const MAX_PAGE_SIZE: usize = 100;
const MAX_BATCH_SIZE: usize = 50;

/// Pagination parameters for trace listing.
#[derive(Debug, Deserialize)]
pub struct ListParams {
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

/// Create a pending trace
pub async fn create_trace(
    State(state): State<AppState>,
    Json(payload): Json<TraceRequest>,
) -> Result<(StatusCode, Json<TraceRecord>)> {
    payload.validate()?;
    let record = state.store.create(payload).await?;
    info!(trace_id = %record.trace_id, entity = %record.request.entity, "Created trace");
    Ok((StatusCode::CREATED, Json(record)))
}

/// Run all four stages of a stored trace and return its summary.
///
/// The trace runs on its own task, so it still completes and releases the
/// record if the client goes away before the response is written.
pub async fn execute_trace(
    State(state): State<AppState>,
    Path(trace_id): Path<Uuid>,
) -> Result<Json<TraceSummary>> {
    let record = state.store.mark_in_progress(trace_id).await?;

    let orchestrator = match state.orchestrator() {
        Ok(orchestrator) => orchestrator,
        Err(e) => {
            mark_failed(&state, trace_id).await;
            return Err(e);
        }
    };

    let run = tokio::spawn(async move {
        orchestrator
            .run_trace_with_id(trace_id, &record.request)
            .await
    });

    match run.await {
        Ok(summary) => Ok(Json(summary)),
        Err(e) => {
            error!(%trace_id, error = %e, "Trace task aborted");
            mark_failed(&state, trace_id).await;
            Err(AppError::Internal(format!("Trace {} aborted: {}", trace_id, e)))
        }
    }
}

async fn mark_failed(state: &AppState, trace_id: Uuid) {
    if let Err(e) = state.store.update_status(trace_id, TraceStatus::Failed).await {
        warn!(%trace_id, error = %e, "Failed to mark trace as failed");
    }
}

pub async fn get_trace(
    State(state): State<AppState>,
    Path(trace_id): Path<Uuid>,
) -> Result<Json<TraceRecord>> {
    state
        .store
        .get(trace_id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("Trace {} not found", trace_id)))
}

pub async fn get_summary(
    State(state): State<AppState>,
    Path(trace_id): Path<Uuid>,
) -> Result<Json<TraceSummary>> {
    let record = state
        .store
        .get(trace_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Trace {} not found", trace_id)))?;

    record
        .summary
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("Trace {} has not been executed yet", trace_id)))
}

pub async fn get_stages(
    State(state): State<AppState>,
    Path(trace_id): Path<Uuid>,
) -> Result<Json<Vec<StageResult>>> {
    Ok(Json(state.store.stage_results(trace_id).await?))
}

/// List traces, newest first
pub async fn list_traces(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> Result<Json<Vec<TraceRecord>>> {
    let limit = params.limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE);
    let offset = params.offset.unwrap_or(0);
    Ok(Json(state.store.list(limit, offset).await?))
}

pub async fn trace_stats(State(state): State<AppState>) -> Result<Json<TraceStats>> {
    Ok(Json(state.store.stats().await?))
}

pub async fn delete_trace(
    State(state): State<AppState>,
    Path(trace_id): Path<Uuid>,
) -> Result<Json<Value>> {
    if !state.store.delete(trace_id).await? {
        return Err(AppError::NotFound(format!("Trace {} not found", trace_id)));
    }
    info!(%trace_id, "Deleted trace");
    Ok(Json(json!({ "deleted": true, "trace_id": trace_id })))
}

/// Create several pending traces at once. Invalid entries are counted as failed.
pub async fn create_batch(
    State(state): State<AppState>,
    Json(payload): Json<BatchTraceRequest>,
) -> Result<(StatusCode, Json<BatchTraceResponse>)> {
    if payload.traces.is_empty() {
        return Err(AppError::InvalidInput("Batch must contain at least one trace".to_string()));
    }
    if payload.traces.len() > MAX_BATCH_SIZE {
        return Err(AppError::InvalidInput(format!(
            "Batch exceeds {} traces",
            MAX_BATCH_SIZE
        )));
    }

    let total_traces = payload.traces.len();
    let mut trace_ids = Vec::with_capacity(total_traces);
    let mut failed_traces = 0;

    for request in payload.traces {
        match state.store.create(request).await {
            Ok(record) => trace_ids.push(record.trace_id),
            Err(e) => {
                warn!(error = %e, "Failed to create trace in batch");
                failed_traces += 1;
            }
        }
    }

    let completed_traces = trace_ids.len();
    let status = if failed_traces == 0 {
        TraceStatus::Completed
    } else if completed_traces == 0 {
        TraceStatus::Failed
    } else {
        TraceStatus::Partial
    };

    Ok((
        StatusCode::CREATED,
        Json(BatchTraceResponse {
            batch_id: Uuid::new_v4(),
            total_traces,
            completed_traces,
            failed_traces,
            trace_ids,
            status,
            created_at: Utc::now(),
        }),
    ))
}
