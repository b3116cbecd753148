use super::traits::TraceStore;
use crate::types::{
    AppError, Result, StageResult, TraceRecord, TraceRequest, TraceStats, TraceStatus,
    TraceSummary,
};
use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;
use std::collections::HashMap;
use uuid::Uuid;

struct StoredTrace {
    record: TraceRecord,
    stages: Vec<StageResult>,
}

/// Process-local trace store. Contents are lost on restart.
#[derive(Default)]
pub struct InMemoryTraceStore {
    traces: RwLock<HashMap<Uuid, StoredTrace>>,
}

impl InMemoryTraceStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn not_found(trace_id: Uuid) -> AppError {
        AppError::NotFound(format!("Trace {} not found", trace_id))
    }
}

#[async_trait]
impl TraceStore for InMemoryTraceStore {
    async fn create(&self, request: TraceRequest) -> Result<TraceRecord> {
        request.validate()?;
        let record = TraceRecord::new(request);
        self.traces.write().insert(
            record.trace_id,
            StoredTrace {
                record: record.clone(),
                stages: Vec::new(),
            },
        );
        Ok(record)
    }

    async fn get(&self, trace_id: Uuid) -> Result<Option<TraceRecord>> {
        Ok(self.traces.read().get(&trace_id).map(|t| t.record.clone()))
    }

    async fn list(&self, limit: usize, offset: usize) -> Result<Vec<TraceRecord>> {
        let traces = self.traces.read();
        let mut records: Vec<TraceRecord> = traces.values().map(|t| t.record.clone()).collect();
        records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(records.into_iter().skip(offset).take(limit).collect())
    }

    async fn update_status(&self, trace_id: Uuid, status: TraceStatus) -> Result<()> {
        let mut traces = self.traces.write();
        let stored = traces
            .get_mut(&trace_id)
            .ok_or_else(|| Self::not_found(trace_id))?;
        stored.record.status = status;
        stored.record.updated_at = Utc::now();
        Ok(())
    }

    async fn mark_in_progress(&self, trace_id: Uuid) -> Result<TraceRecord> {
        let mut traces = self.traces.write();
        let stored = traces
            .get_mut(&trace_id)
            .ok_or_else(|| Self::not_found(trace_id))?;

        if stored.record.status == TraceStatus::InProgress {
            return Err(AppError::Conflict(format!(
                "Trace {} is already running",
                trace_id
            )));
        }

        stored.stages.clear();
        stored.record.stages_completed.clear();
        stored.record.summary = None;
        stored.record.status = TraceStatus::InProgress;
        stored.record.updated_at = Utc::now();
        Ok(stored.record.clone())
    }

    async fn save_stage_result(&self, trace_id: Uuid, result: &StageResult) -> Result<()> {
        let mut traces = self.traces.write();
        let stored = traces
            .get_mut(&trace_id)
            .ok_or_else(|| Self::not_found(trace_id))?;
        stored.stages.push(result.clone());
        stored.record.stages_completed.push(result.stage_id);
        stored.record.updated_at = Utc::now();
        Ok(())
    }

    async fn stage_results(&self, trace_id: Uuid) -> Result<Vec<StageResult>> {
        self.traces
            .read()
            .get(&trace_id)
            .map(|t| t.stages.clone())
            .ok_or_else(|| Self::not_found(trace_id))
    }

    async fn save_summary(&self, summary: &TraceSummary) -> Result<()> {
        let mut traces = self.traces.write();
        let stored = traces
            .get_mut(&summary.trace_id)
            .ok_or_else(|| Self::not_found(summary.trace_id))?;
        stored.record.status = summary.overall_status;
        stored.record.summary = Some(summary.clone());
        stored.record.updated_at = Utc::now();
        Ok(())
    }

    async fn delete(&self, trace_id: Uuid) -> Result<bool> {
        Ok(self.traces.write().remove(&trace_id).is_some())
    }

    async fn stats(&self) -> Result<TraceStats> {
        let traces = self.traces.read();
        let mut stats = TraceStats {
            total_traces: traces.len(),
            ..Default::default()
        };

        for stored in traces.values() {
            *stats
                .by_status
                .entry(stored.record.status.as_str().to_string())
                .or_insert(0) += 1;

            if let Some(summary) = &stored.record.summary {
                *stats
                    .by_connection
                    .entry(summary.connection_status.as_str().to_string())
                    .or_insert(0) += 1;
            }
        }

        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trace::aggregate;
    use crate::types::StageId;

    fn request(entity: &str) -> TraceRequest {
        TraceRequest::new(entity, "Jane Doe", "UK", None)
    }

    #[tokio::test]
    async fn test_create_and_get() {
        let store = InMemoryTraceStore::new();
        let record = store.create(request("Acme Corp")).await.unwrap();

        let loaded = store.get(record.trace_id).await.unwrap().unwrap();
        assert_eq!(loaded.status, TraceStatus::Pending);
        assert_eq!(loaded.total_stages, 4);
        assert!(store.get(Uuid::new_v4()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_create_rejects_blank_fields() {
        let store = InMemoryTraceStore::new();
        let result = store.create(request(" ")).await;
        assert!(matches!(result, Err(AppError::InvalidInput(_))));
    }

    #[tokio::test]
    async fn test_mark_in_progress_conflict_and_reset() {
        let store = InMemoryTraceStore::new();
        let record = store.create(request("Acme Corp")).await.unwrap();

        store.mark_in_progress(record.trace_id).await.unwrap();
        store
            .save_stage_result(record.trace_id, &StageResult::pending(StageId::Stage1A))
            .await
            .unwrap();

        let second = store.mark_in_progress(record.trace_id).await;
        assert!(matches!(second, Err(AppError::Conflict(_))));

        store
            .update_status(record.trace_id, TraceStatus::Completed)
            .await
            .unwrap();
        let rerun = store.mark_in_progress(record.trace_id).await.unwrap();
        assert!(rerun.stages_completed.is_empty());
        assert!(store.stage_results(record.trace_id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_summary_updates_status_and_stats() {
        let store = InMemoryTraceStore::new();
        let first = store.create(request("Acme Corp")).await.unwrap();
        store.create(request("Globex")).await.unwrap();

        let mut stage = StageResult::pending(StageId::Stage1A);
        stage.status = crate::types::StageStatus::Completed;
        let summary = aggregate(first.trace_id, vec![stage]);
        store.save_summary(&summary).await.unwrap();

        let stats = store.stats().await.unwrap();
        assert_eq!(stats.total_traces, 2);
        assert_eq!(stats.by_status.get("completed"), Some(&1));
        assert_eq!(stats.by_status.get("pending"), Some(&1));
        assert_eq!(stats.by_connection.get("NO_CONNECTION"), Some(&1));
    }

    #[tokio::test]
    async fn test_list_paginates_and_delete() {
        let store = InMemoryTraceStore::new();
        for name in ["A", "B", "C"] {
            store.create(request(name)).await.unwrap();
        }

        assert_eq!(store.list(2, 0).await.unwrap().len(), 2);
        assert_eq!(store.list(10, 2).await.unwrap().len(), 1);

        let id = store.list(1, 0).await.unwrap()[0].trace_id;
        assert!(store.delete(id).await.unwrap());
        assert!(!store.delete(id).await.unwrap());
        assert!(matches!(
            store.stage_results(id).await,
            Err(AppError::NotFound(_))
        ));
    }
}
