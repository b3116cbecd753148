//! Single-stage execution with the zero-result retry policy.

use super::TraceSettings;
use crate::parser::{ParsedStage, ResultParser};
use crate::sources::{ConfidenceQuery, DomainHit, EvidenceSources, PeopleQuery, PrimaryQuery};
use crate::types::{
    AppError, AttemptFailure, EnrichmentOutcome, FailureKind, Result, StageId, StageResult,
    StageStatus, TraceRequest, enrichment,
};
use serde_json::json;
use std::collections::{BTreeMap, HashSet};
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Titles passed to the people search to surface owners and officers
const OWNERSHIP_TITLES: &[&str] = &[
    "owner",
    "founder",
    "co-founder",
    "chairman",
    "director",
    "managing director",
    "ceo",
    "shareholder",
    "partner",
];

/// Everything produced by one attempt of a stage.
struct AttemptOutcome {
    primary: Result<ParsedStage>,
    enrichments: BTreeMap<String, EnrichmentOutcome>,
}

/// Runs one stage: the primary query plus its enrichments, retried while empty.
pub struct StageExecutor {
    sources: EvidenceSources,
    parser: Arc<dyn ResultParser>,
    settings: TraceSettings,
}

impl StageExecutor {
    pub fn new(
        sources: EvidenceSources,
        parser: Arc<dyn ResultParser>,
        settings: TraceSettings,
    ) -> Self {
        Self {
            sources,
            parser,
            settings,
        }
    }

    pub fn settings(&self) -> &TraceSettings {
        &self.settings
    }

    /// Stage-specific primary query; only time-scoped stages carry a date filter.
    pub fn build_query(&self, stage: StageId, request: &TraceRequest) -> PrimaryQuery {
        PrimaryQuery {
            stage,
            entity: request.entity.trim().to_string(),
            ubo_name: request.ubo_name.trim().to_string(),
            location: request.location.trim().to_string(),
            domain: request.domain().map(str::to_string),
            time_filter: stage
                .is_time_scoped()
                .then_some(self.settings.time_filter_from),
        }
    }

    /// Execute a stage to completion. Never fails: adapter errors are recorded
    /// on the returned result.
    pub async fn execute_stage(&self, stage: StageId, request: &TraceRequest) -> StageResult {
        let started = Instant::now();
        let query = self.build_query(stage, request);
        let max_attempts = self.settings.max_attempts();

        let mut result = StageResult::pending(stage);
        result.time_filter = query.time_filter;
        let mut primary_succeeded = false;

        info!(
            stage = %stage,
            description = stage.description(),
            parser = self.parser.name(),
            "Executing stage"
        );

        for attempt in 1..=max_attempts {
            result.attempt_count = attempt;
            if attempt > 1 {
                info!(stage = %stage, attempt, max_attempts, "Retrying stage");
            }

            let outcome = self.run_attempt(&query).await;
            // Enrichments from earlier attempts are discarded
            result.enrichment_results = outcome.enrichments;

            match outcome.primary {
                Ok(parsed) => {
                    primary_succeeded = true;
                    apply_parsed(&mut result, parsed);
                }
                Err(e) => {
                    warn!(stage = %stage, attempt, error = %e, "Primary query failed");
                    result.failures.push(AttemptFailure {
                        attempt,
                        kind: FailureKind::classify(&e),
                        message: e.to_string(),
                    });
                }
            }

            if !result.is_zero_results() {
                break;
            }

            if attempt < max_attempts {
                warn!(
                    stage = %stage,
                    attempt,
                    delay_ms = self.settings.retry_delay.as_millis() as u64,
                    "Stage returned zero results"
                );
                tokio::time::sleep(self.settings.retry_delay).await;
            }
        }

        result.status = if primary_succeeded {
            StageStatus::Completed
        } else {
            error!(stage = %stage, attempts = result.attempt_count, "Primary query failed on every attempt");
            StageStatus::Failed
        };
        result.processing_time_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

        info!(
            stage = %stage,
            status = ?result.status,
            direct = result.direct_facts.len(),
            indirect = result.indirect_facts.len(),
            urls = result.urls.len(),
            attempts = result.attempt_count,
            elapsed_ms = result.processing_time_ms,
            "Stage finished"
        );

        result
    }

    /// Primary query and domain search run alongside the people search;
    /// confidence scoring waits for both domain-producing calls.
    async fn run_attempt(&self, query: &PrimaryQuery) -> AttemptOutcome {
        let discovery = async {
            let (primary, search) = tokio::join!(self.query_primary(query), self.search_domains(query));

            let candidates = combine_candidates(primary.as_ref().ok(), &search);
            let confidence = self.score_domains(query, candidates).await;

            (primary, search, confidence)
        };

        let ((primary, search, confidence), people) =
            tokio::join!(discovery, self.search_people(query));

        let mut enrichments = BTreeMap::new();
        enrichments.insert(enrichment::PEOPLE_SEARCH.to_string(), people);
        enrichments.insert(enrichment::DOMAIN_SEARCH.to_string(), search_outcome(search));
        enrichments.insert(enrichment::DOMAIN_CONFIDENCE.to_string(), confidence);

        AttemptOutcome {
            primary,
            enrichments,
        }
    }

    async fn query_primary(&self, query: &PrimaryQuery) -> Result<ParsedStage> {
        let raw = with_timeout(
            self.settings.primary_timeout,
            self.sources.primary.name(),
            self.sources.primary.query(query),
        )
        .await?;

        let parsed = self.parser.parse(&raw);
        if let Some(warning) = &parsed.warning {
            warn!(stage = %query.stage, %warning, "Evidence payload parsed with warning");
        }
        debug!(
            stage = %query.stage,
            facts = parsed.facts.len(),
            urls = parsed.urls.len(),
            "Parsed primary payload"
        );

        Ok(parsed)
    }

    async fn search_domains(&self, query: &PrimaryQuery) -> Option<Result<Vec<DomainHit>>> {
        let source = self.sources.domains.as_ref()?;
        Some(
            with_timeout(
                self.settings.enrichment_timeout,
                enrichment::DOMAIN_SEARCH,
                source.search_domains(&query.entity, &query.ubo_name, &query.location),
            )
            .await,
        )
    }

    async fn score_domains(&self, query: &PrimaryQuery, candidates: Vec<String>) -> EnrichmentOutcome {
        let Some(source) = self.sources.confidence.as_ref() else {
            return not_configured();
        };
        if candidates.is_empty() {
            return EnrichmentOutcome::Skipped {
                reason: "no domain candidates".to_string(),
            };
        }

        let confidence_query = ConfidenceQuery {
            company_name: query.entity.clone(),
            ubo_name: query.ubo_name.clone(),
            location: query.location.clone(),
            domain_candidates: candidates,
        };

        let scored = with_timeout(
            self.settings.enrichment_timeout,
            enrichment::DOMAIN_CONFIDENCE,
            source.score_domains(&confidence_query),
        )
        .await;

        match scored {
            Ok(rankings) => EnrichmentOutcome::Ok {
                data: json!({
                    "candidates": confidence_query.domain_candidates,
                    "rankings": rankings,
                }),
            },
            Err(e) => enrichment_failed(query.stage, enrichment::DOMAIN_CONFIDENCE, e),
        }
    }

    async fn search_people(&self, query: &PrimaryQuery) -> EnrichmentOutcome {
        let Some(source) = self.sources.people.as_ref() else {
            return not_configured();
        };

        let people_query = PeopleQuery {
            organization_name: query.entity.clone(),
            titles: Some(OWNERSHIP_TITLES.iter().map(|t| t.to_string()).collect()),
            domains: query.domain.clone().map(|d| vec![d]),
            locations: Some(vec![query.location.clone()]),
        };

        match with_timeout(
            self.settings.enrichment_timeout,
            enrichment::PEOPLE_SEARCH,
            source.search_people(&people_query),
        )
        .await
        {
            Ok(data) => EnrichmentOutcome::Ok { data },
            Err(e) => enrichment_failed(query.stage, enrichment::PEOPLE_SEARCH, e),
        }
    }
}

fn apply_parsed(result: &mut StageResult, parsed: ParsedStage) {
    let (direct, indirect) = parsed.classify(result.stage_id);
    result.direct_facts = direct;
    result.indirect_facts = indirect;
    result.facts = parsed.facts;
    result.summary = parsed.summary;
    result.urls = parsed.urls;
    result.parse_warning = parsed.warning;
}

/// Primary-payload domain hints followed by search hits, without repeats.
fn combine_candidates(
    primary: Option<&ParsedStage>,
    search: &Option<Result<Vec<DomainHit>>>,
) -> Vec<String> {
    let hinted = primary.map(ParsedStage::domain_hints).unwrap_or_default();
    let searched = match search {
        Some(Ok(hits)) => hits.iter().map(|h| h.domain.to_lowercase()).collect(),
        _ => Vec::new(),
    };

    let mut seen = HashSet::new();
    hinted
        .into_iter()
        .chain(searched)
        .filter(|domain| seen.insert(domain.clone()))
        .collect()
}

fn search_outcome(search: Option<Result<Vec<DomainHit>>>) -> EnrichmentOutcome {
    match search {
        None => not_configured(),
        Some(Ok(hits)) => EnrichmentOutcome::Ok {
            data: json!({
                "total_results": hits.len(),
                "domains": hits,
            }),
        },
        Some(Err(e)) => EnrichmentOutcome::Failed {
            error: e.to_string(),
        },
    }
}

fn enrichment_failed(stage: StageId, name: &str, error: AppError) -> EnrichmentOutcome {
    warn!(stage = %stage, enrichment = name, error = %error, "Enrichment failed");
    EnrichmentOutcome::Failed {
        error: error.to_string(),
    }
}

fn not_configured() -> EnrichmentOutcome {
    EnrichmentOutcome::Skipped {
        reason: "not configured".to_string(),
    }
}

async fn with_timeout<T>(
    limit: Duration,
    what: &str,
    fut: impl Future<Output = Result<T>>,
) -> Result<T> {
    tokio::time::timeout(limit, fut)
        .await
        .map_err(|_| AppError::Timeout(format!("{} exceeded {:?}", what, limit)))?
}
