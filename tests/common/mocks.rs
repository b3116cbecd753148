//! Scripted evidence sources for trace tests.
//!
//! The primary source replays a per-stage script of replies, one per attempt,
//! and records every query it receives. Enrichment doubles return canned data,
//! fail on demand, or stall past the enrichment timeout.

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{Value, json};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};
use ubo_trace::sources::{
    ConfidenceQuery, DomainConfidence, DomainConfidenceSource, DomainHit, DomainSearchSource,
    PeopleEnrichmentSource, PeopleQuery, PrimaryEvidenceSource, PrimaryQuery,
};
use ubo_trace::types::{AppError, Result, StageId};
use ubo_trace::{EvidenceSources, HeuristicParser, TraceOrchestrator, TraceSettings};

/// Reply free of facts and URLs; the heuristic parser yields zero results.
pub const EMPTY_REPLY: &str = "No verified connection was found in the available sources.";

/// One scripted primary reply.
#[derive(Debug, Clone)]
pub enum Reply {
    Payload(String),
    Fail(String),
    Timeout,
}

impl Reply {
    pub fn empty() -> Self {
        Reply::Payload(EMPTY_REPLY.to_string())
    }

    /// JSON payload with one sourced fact
    pub fn fact(text: &str, url: &str) -> Self {
        Reply::Payload(
            json!({
                "summary": text,
                "facts": [{ "fact": text, "url": url }]
            })
            .to_string(),
        )
    }

    fn into_result(self) -> Result<String> {
        match self {
            Reply::Payload(payload) => Ok(payload),
            Reply::Fail(message) => Err(AppError::Source(message)),
            Reply::Timeout => Err(AppError::Timeout("research_agent timed out".to_string())),
        }
    }
}

/// Primary source that replays one reply per attempt for each stage.
///
/// Once a stage's script is exhausted the fallback reply is returned.
pub struct ScriptedPrimary {
    scripts: Mutex<HashMap<StageId, VecDeque<Reply>>>,
    fallback: Reply,
    delay: Duration,
    queries: Mutex<Vec<PrimaryQuery>>,
}

impl Default for ScriptedPrimary {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedPrimary {
    pub fn new() -> Self {
        Self {
            scripts: Mutex::new(HashMap::new()),
            fallback: Reply::empty(),
            delay: Duration::ZERO,
            queries: Mutex::new(Vec::new()),
        }
    }

    pub fn with_fallback(mut self, reply: Reply) -> Self {
        self.fallback = reply;
        self
    }

    /// Sleep this long before every reply
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn script(self, stage: StageId, replies: Vec<Reply>) -> Self {
        self.scripts.lock().insert(stage, replies.into());
        self
    }

    pub fn queries(&self) -> Vec<PrimaryQuery> {
        self.queries.lock().clone()
    }

    pub fn attempts_for(&self, stage: StageId) -> usize {
        self.queries.lock().iter().filter(|q| q.stage == stage).count()
    }
}

#[async_trait]
impl PrimaryEvidenceSource for ScriptedPrimary {
    async fn query(&self, query: &PrimaryQuery) -> Result<String> {
        self.queries.lock().push(query.clone());
        let reply = self
            .scripts
            .lock()
            .get_mut(&query.stage)
            .and_then(VecDeque::pop_front)
            .unwrap_or_else(|| self.fallback.clone());
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        reply.into_result()
    }

    fn name(&self) -> &str {
        "scripted_primary"
    }
}

/// People search returning a fixed document and counting calls.
pub struct StaticPeople {
    pub data: Value,
    pub calls: AtomicUsize,
}

impl StaticPeople {
    pub fn new(data: Value) -> Self {
        Self {
            data,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PeopleEnrichmentSource for StaticPeople {
    async fn search_people(&self, _query: &PeopleQuery) -> Result<Value> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.data.clone())
    }
}

pub struct FailingPeople;

#[async_trait]
impl PeopleEnrichmentSource for FailingPeople {
    async fn search_people(&self, _query: &PeopleQuery) -> Result<Value> {
        Err(AppError::Http {
            service: "apollo".to_string(),
            status: 503,
        })
    }
}

/// People search that never answers within the enrichment timeout.
pub struct StalledPeople;

#[async_trait]
impl PeopleEnrichmentSource for StalledPeople {
    async fn search_people(&self, _query: &PeopleQuery) -> Result<Value> {
        tokio::time::sleep(Duration::from_secs(30)).await;
        Ok(Value::Null)
    }
}

pub struct StaticDomains(pub Vec<DomainHit>);

impl StaticDomains {
    pub fn of(domains: &[&str]) -> Self {
        Self(
            domains
                .iter()
                .enumerate()
                .map(|(i, domain)| DomainHit {
                    position: Some(i as u32 + 1),
                    source: Some("Google".to_string()),
                    domain: domain.to_string(),
                    snippet: format!("Official website of {}", domain),
                })
                .collect(),
        )
    }
}

#[async_trait]
impl DomainSearchSource for StaticDomains {
    async fn search_domains(&self, _company: &str, _ubo: &str, _location: &str) -> Result<Vec<DomainHit>> {
        Ok(self.0.clone())
    }
}

pub struct FailingDomains;

#[async_trait]
impl DomainSearchSource for FailingDomains {
    async fn search_domains(&self, _company: &str, _ubo: &str, _location: &str) -> Result<Vec<DomainHit>> {
        Err(AppError::Source("searchapi connection reset".to_string()))
    }
}

/// Confidence scorer that records the candidates it was asked about.
#[derive(Default)]
pub struct RecordingConfidence {
    queries: Mutex<Vec<ConfidenceQuery>>,
}

impl RecordingConfidence {
    pub fn queries(&self) -> Vec<ConfidenceQuery> {
        self.queries.lock().clone()
    }
}

#[async_trait]
impl DomainConfidenceSource for RecordingConfidence {
    async fn score_domains(&self, query: &ConfidenceQuery) -> Result<Vec<DomainConfidence>> {
        self.queries.lock().push(query.clone());
        Ok(query
            .domain_candidates
            .iter()
            .enumerate()
            .map(|(i, domain)| DomainConfidence {
                domain: domain.clone(),
                confidence_score: 90u8.saturating_sub((i as u8).saturating_mul(10)),
                reasoning: "matches company name".to_string(),
            })
            .collect())
    }
}

/// Start and finish instants of every call made to the timed doubles.
#[derive(Default)]
pub struct Timeline {
    spans: Mutex<Vec<(&'static str, Instant, Instant)>>,
}

impl Timeline {
    async fn record<T>(&self, label: &'static str, delay: Duration, value: T) -> T {
        let started = Instant::now();
        tokio::time::sleep(delay).await;
        self.spans.lock().push((label, started, Instant::now()));
        value
    }

    /// `(start, finish)` of the first call recorded under `label`
    pub fn span(&self, label: &str) -> Option<(Instant, Instant)> {
        self.spans
            .lock()
            .iter()
            .find(|(l, _, _)| *l == label)
            .map(|(_, start, end)| (*start, *end))
    }
}

/// Primary, people and domain doubles that each take `delay` to answer,
/// plus a confidence scorer that answers at once.
pub struct TimedSources {
    pub timeline: Arc<Timeline>,
    pub delay: Duration,
}

impl TimedSources {
    pub fn new(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            timeline: Arc::new(Timeline::default()),
            delay,
        })
    }

    pub fn evidence_sources(self: &Arc<Self>) -> EvidenceSources {
        EvidenceSources::new(Arc::clone(self) as Arc<dyn PrimaryEvidenceSource>)
            .with_people(Arc::clone(self) as Arc<dyn PeopleEnrichmentSource>)
            .with_domains(Arc::clone(self) as Arc<dyn DomainSearchSource>)
            .with_confidence(Arc::clone(self) as Arc<dyn DomainConfidenceSource>)
    }
}

#[async_trait]
impl PrimaryEvidenceSource for TimedSources {
    async fn query(&self, _query: &PrimaryQuery) -> Result<String> {
        let reply = json!({
            "facts": [{ "fact": "Jane Doe is a director", "url": "https://www.acme.com/team" }]
        })
        .to_string();
        Ok(self.timeline.record("primary", self.delay, reply).await)
    }

    fn name(&self) -> &str {
        "timed_primary"
    }
}

#[async_trait]
impl PeopleEnrichmentSource for TimedSources {
    async fn search_people(&self, _query: &PeopleQuery) -> Result<Value> {
        Ok(self.timeline.record("people", self.delay, json!({ "people": [] })).await)
    }
}

#[async_trait]
impl DomainSearchSource for TimedSources {
    async fn search_domains(&self, _company: &str, _ubo: &str, _location: &str) -> Result<Vec<DomainHit>> {
        let hits = StaticDomains::of(&["acme.com"]).0;
        Ok(self.timeline.record("domains", self.delay, hits).await)
    }
}

#[async_trait]
impl DomainConfidenceSource for TimedSources {
    async fn score_domains(&self, query: &ConfidenceQuery) -> Result<Vec<DomainConfidence>> {
        let scores = query
            .domain_candidates
            .iter()
            .map(|domain| DomainConfidence {
                domain: domain.clone(),
                confidence_score: 80,
                reasoning: "timed".to_string(),
            })
            .collect();
        Ok(self.timeline.record("confidence", Duration::ZERO, scores).await)
    }
}

/// Default policy with every delay removed
pub fn test_settings() -> TraceSettings {
    TraceSettings::default().without_delays()
}

pub fn orchestrator(primary: Arc<ScriptedPrimary>) -> TraceOrchestrator {
    orchestrator_with(EvidenceSources::new(primary))
}

pub fn orchestrator_with(sources: EvidenceSources) -> TraceOrchestrator {
    TraceOrchestrator::new(sources, Arc::new(HeuristicParser::new()), test_settings())
}
