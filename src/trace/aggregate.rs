//! Folding stage results into a trace summary. Pure, no I/O.

use crate::types::{
    ConnectionStatus, StageFailure, StageId, StageResult, StageStatus, TraceStatus, TraceSummary,
};
use std::collections::HashSet;
use uuid::Uuid;

/// Normalize a URL for cross-stage dedup: lowercase, no scheme, no trailing slash.
pub fn normalize_url(url: &str) -> String {
    let lower = url.trim().to_lowercase();
    let without_scheme = lower
        .strip_prefix("https://")
        .or_else(|| lower.strip_prefix("http://"))
        .unwrap_or(&lower);
    without_scheme.trim_end_matches('/').to_string()
}

/// Build the trace summary from stage results in execution order.
///
/// Facts are not deduplicated across stages; the same fact surfacing in
/// several stages is kept as corroboration.
pub fn aggregate(trace_id: Uuid, stage_results: Vec<StageResult>) -> TraceSummary {
    let unique_urls: HashSet<String> = stage_results
        .iter()
        .flat_map(|r| r.urls.iter())
        .map(|url| normalize_url(url))
        .filter(|url| !url.is_empty())
        .collect();

    let direct_stages = || stage_results.iter().filter(|r| r.stage_id.is_direct());
    let indirect_stages = || stage_results.iter().filter(|r| !r.stage_id.is_direct());

    let has_direct_evidence = direct_stages().any(|r| !r.direct_facts.is_empty());
    let has_indirect_evidence = indirect_stages().any(|r| !r.indirect_facts.is_empty());

    let total_direct_facts = direct_stages().map(|r| r.direct_facts.len()).sum();
    let total_indirect_facts = indirect_stages().map(|r| r.indirect_facts.len()).sum();
    let total_processing_time_ms = stage_results.iter().map(|r| r.processing_time_ms).sum();

    let stage_failures: Vec<StageFailure> = stage_results
        .iter()
        .filter(|r| r.status == StageStatus::Failed)
        .map(|r| StageFailure {
            stage_id: r.stage_id,
            reasons: failure_reasons(r),
        })
        .collect();

    let overall_status = overall_status(stage_results.len(), stage_failures.len());

    TraceSummary {
        trace_id,
        has_direct_evidence,
        has_indirect_evidence,
        total_urls: unique_urls.len(),
        total_direct_facts,
        total_indirect_facts,
        connection_status: ConnectionStatus::from_evidence(
            has_direct_evidence,
            has_indirect_evidence,
        ),
        total_processing_time_ms,
        overall_status,
        stage_failures,
        stage_results,
    }
}

fn overall_status(stages: usize, failed: usize) -> TraceStatus {
    if stages == 0 || failed == stages {
        TraceStatus::Failed
    } else if failed > 0 {
        TraceStatus::Partial
    } else {
        TraceStatus::Completed
    }
}

fn failure_reasons(result: &StageResult) -> Vec<String> {
    if result.failures.is_empty() {
        return vec![format!("stage {} failed", result.stage_id)];
    }
    result
        .failures
        .iter()
        .map(|f| format!("attempt {}: {}", f.attempt, f.message))
        .collect()
}

/// Stages that ended with at least one fact, in execution order.
pub fn stages_with_evidence(summary: &TraceSummary) -> Vec<StageId> {
    summary
        .stage_results
        .iter()
        .filter(|r| !r.facts.is_empty())
        .map(|r| r.stage_id)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{AttemptFailure, Fact, FailureKind};

    fn stage(stage_id: StageId, facts: usize, urls: &[&str]) -> StageResult {
        let mut result = StageResult::pending(stage_id);
        result.status = StageStatus::Completed;
        result.facts = (0..facts).map(|i| Fact::new(format!("fact {}", i))).collect();
        if stage_id.is_direct() {
            result.direct_facts = result.facts.clone();
        } else {
            result.indirect_facts = result.facts.clone();
        }
        result.urls = urls.iter().map(|u| u.to_string()).collect();
        result.processing_time_ms = 10;
        result
    }

    #[test]
    fn test_normalize_url() {
        assert_eq!(normalize_url("HTTP://Example.com/X/"), "example.com/x");
        assert_eq!(normalize_url("https://example.com/x"), "example.com/x");
    }

    #[test]
    fn test_url_dedup_across_stages() {
        let summary = aggregate(
            Uuid::new_v4(),
            vec![
                stage(StageId::Stage1A, 0, &["HTTP://Example.com/X/"]),
                stage(StageId::Stage2A, 0, &["http://example.com/x", "https://reg.gov/1"]),
            ],
        );
        assert_eq!(summary.total_urls, 2);
    }

    #[test]
    fn test_direct_dominates_indirect() {
        let summary = aggregate(
            Uuid::new_v4(),
            vec![
                stage(StageId::Stage1A, 1, &[]),
                stage(StageId::Stage1B, 0, &[]),
                stage(StageId::Stage2A, 5, &[]),
                stage(StageId::Stage2B, 0, &[]),
            ],
        );
        assert_eq!(summary.connection_status, ConnectionStatus::DirectConnection);
        assert_eq!(summary.total_direct_facts, 1);
        assert_eq!(summary.total_indirect_facts, 5);
        assert_eq!(summary.total_processing_time_ms, 40);
        assert_eq!(summary.overall_status, TraceStatus::Completed);
        assert_eq!(
            stages_with_evidence(&summary),
            vec![StageId::Stage1A, StageId::Stage2A]
        );
    }

    #[test]
    fn test_cross_stage_facts_are_not_deduplicated() {
        let summary = aggregate(
            Uuid::new_v4(),
            vec![stage(StageId::Stage2A, 1, &[]), stage(StageId::Stage2B, 1, &[])],
        );
        assert_eq!(summary.total_indirect_facts, 2);
        assert_eq!(summary.connection_status, ConnectionStatus::IndirectConnectionOnly);
    }

    #[test]
    fn test_partial_and_failed_outcomes() {
        let mut failed = stage(StageId::Stage2A, 0, &[]);
        failed.status = StageStatus::Failed;
        failed.failures.push(AttemptFailure {
            attempt: 1,
            kind: FailureKind::Transport,
            message: "connection refused".to_string(),
        });

        let summary = aggregate(
            Uuid::new_v4(),
            vec![stage(StageId::Stage1A, 0, &[]), failed.clone()],
        );
        assert_eq!(summary.overall_status, TraceStatus::Partial);
        assert_eq!(summary.stage_failures.len(), 1);
        assert_eq!(summary.stage_failures[0].reasons, vec!["attempt 1: connection refused"]);

        let summary = aggregate(Uuid::new_v4(), vec![failed]);
        assert_eq!(summary.overall_status, TraceStatus::Failed);
        assert_eq!(summary.connection_status, ConnectionStatus::NoConnection);
    }

    #[test]
    fn test_empty_trace() {
        let summary = aggregate(Uuid::new_v4(), Vec::new());
        assert_eq!(summary.total_urls, 0);
        assert_eq!(summary.connection_status, ConnectionStatus::NoConnection);
        assert_eq!(summary.overall_status, TraceStatus::Failed);
    }
}
