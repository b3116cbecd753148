use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use uuid::Uuid;

// ============= Evidence Types =============

/// A single piece of evidence extracted from one evidence-source response.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Fact {
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl Fact {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            date: None,
            url: None,
        }
    }

    pub fn with_date(mut self, date: impl Into<String>) -> Self {
        self.date = Some(date.into());
        self
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }
}

/// Whether a stage gathers direct or indirect evidence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvidenceKind {
    Direct,
    Indirect,
}

/// The four fixed evidence-gathering passes, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum StageId {
    #[serde(rename = "1A", alias = "stage_1a")]
    Stage1A,
    #[serde(rename = "1B", alias = "stage_1b")]
    Stage1B,
    #[serde(rename = "2A", alias = "stage_2a")]
    Stage2A,
    #[serde(rename = "2B", alias = "stage_2b")]
    Stage2B,
}

impl StageId {
    /// All stages in the order the orchestrator runs them.
    pub const ALL: [StageId; 4] = [
        StageId::Stage1A,
        StageId::Stage1B,
        StageId::Stage2A,
        StageId::Stage2B,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            StageId::Stage1A => "1A",
            StageId::Stage1B => "1B",
            StageId::Stage2A => "2A",
            StageId::Stage2B => "2B",
        }
    }

    /// Configuration key for this stage (e.g. `stage_1a`).
    pub fn key(&self) -> &'static str {
        match self {
            StageId::Stage1A => "stage_1a",
            StageId::Stage1B => "stage_1b",
            StageId::Stage2A => "stage_2a",
            StageId::Stage2B => "stage_2b",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            StageId::Stage1A => "Direct Evidence (General)",
            StageId::Stage1B => "Direct Evidence (Time-filtered)",
            StageId::Stage2A => "Indirect Evidence (General)",
            StageId::Stage2B => "Indirect Evidence (Time-filtered)",
        }
    }

    /// Evidence classification is fixed per stage and never derived from content.
    pub fn evidence_kind(&self) -> EvidenceKind {
        match self {
            StageId::Stage1A | StageId::Stage1B => EvidenceKind::Direct,
            StageId::Stage2A | StageId::Stage2B => EvidenceKind::Indirect,
        }
    }

    pub fn is_direct(&self) -> bool {
        self.evidence_kind() == EvidenceKind::Direct
    }

    /// Stages 1B and 2B are scoped to recent evidence via a lower-bound date filter.
    pub fn is_time_scoped(&self) -> bool {
        matches!(self, StageId::Stage1B | StageId::Stage2B)
    }

    pub fn from_key(key: &str) -> Option<Self> {
        let key = key.trim().to_ascii_lowercase();
        StageId::ALL
            .into_iter()
            .find(|stage| stage.key() == key || stage.label().eq_ignore_ascii_case(&key))
    }
}

impl fmt::Display for StageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StageStatus {
    Pending,
    Completed,
    Failed,
}

/// Classification of a failed adapter call, recorded in the stage failure log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Timeout,
    Transport,
    Http,
    Decode,
    Other,
}

impl FailureKind {
    pub fn classify(error: &AppError) -> Self {
        match error {
            AppError::Timeout(_) => FailureKind::Timeout,
            AppError::Source(_) => FailureKind::Transport,
            AppError::Http { .. } => FailureKind::Http,
            AppError::Parse(_) => FailureKind::Decode,
            _ => FailureKind::Other,
        }
    }
}

/// One failed primary-query attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttemptFailure {
    pub attempt: u32,
    pub kind: FailureKind,
    pub message: String,
}

/// Result of one enrichment query within a stage attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum EnrichmentOutcome {
    Ok { data: serde_json::Value },
    Failed { error: String },
    Skipped { reason: String },
}

impl EnrichmentOutcome {
    pub fn is_ok(&self) -> bool {
        matches!(self, EnrichmentOutcome::Ok { .. })
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            EnrichmentOutcome::Failed { error } => Some(error),
            _ => None,
        }
    }

    pub fn data(&self) -> Option<&serde_json::Value> {
        match self {
            EnrichmentOutcome::Ok { data } => Some(data),
            _ => None,
        }
    }
}

/// Soft warning raised when an evidence payload could not be parsed as expected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum ParseWarning {
    MalformedJson(String),
    UnrecognizedShape,
}

impl fmt::Display for ParseWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseWarning::MalformedJson(detail) => write!(f, "malformed JSON payload: {}", detail),
            ParseWarning::UnrecognizedShape => f.write_str("JSON payload has no recognizable facts"),
        }
    }
}

/// Enrichment names used as keys in [`StageResult::enrichment_results`].
pub mod enrichment {
    pub const PEOPLE_SEARCH: &str = "people_search";
    pub const DOMAIN_SEARCH: &str = "domain_search";
    pub const DOMAIN_CONFIDENCE: &str = "domain_confidence";
}

/// Outcome of one evidence-gathering stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageResult {
    pub stage_id: StageId,
    pub status: StageStatus,
    pub facts: Vec<Fact>,
    pub summary: String,
    pub direct_facts: Vec<Fact>,
    pub indirect_facts: Vec<Fact>,
    pub urls: BTreeSet<String>,
    pub enrichment_results: BTreeMap<String, EnrichmentOutcome>,
    pub processing_time_ms: u64,
    pub attempt_count: u32,
    /// Per-attempt primary query failures
    #[serde(default)]
    pub failures: Vec<AttemptFailure>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parse_warning: Option<ParseWarning>,
    /// Lower-bound date the primary query was scoped to, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_filter: Option<NaiveDate>,
}

impl StageResult {
    pub fn pending(stage_id: StageId) -> Self {
        Self {
            stage_id,
            status: StageStatus::Pending,
            facts: Vec::new(),
            summary: String::new(),
            direct_facts: Vec::new(),
            indirect_facts: Vec::new(),
            urls: BTreeSet::new(),
            enrichment_results: BTreeMap::new(),
            processing_time_ms: 0,
            attempt_count: 0,
            failures: Vec::new(),
            parse_warning: None,
            time_filter: None,
        }
    }

    /// No direct facts, no indirect facts and no URLs.
    pub fn is_zero_results(&self) -> bool {
        self.direct_facts.is_empty() && self.indirect_facts.is_empty() && self.urls.is_empty()
    }

    pub fn is_failed(&self) -> bool {
        self.status == StageStatus::Failed
    }
}

/// Tri-state connection verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConnectionStatus {
    DirectConnection,
    IndirectConnectionOnly,
    NoConnection,
}

impl ConnectionStatus {
    /// Direct evidence dominates indirect evidence regardless of volume.
    pub fn from_evidence(has_direct: bool, has_indirect: bool) -> Self {
        if has_direct {
            ConnectionStatus::DirectConnection
        } else if has_indirect {
            ConnectionStatus::IndirectConnectionOnly
        } else {
            ConnectionStatus::NoConnection
        }
    }

    /// Wire name, identical to the serialized form
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionStatus::DirectConnection => "DIRECT_CONNECTION",
            ConnectionStatus::IndirectConnectionOnly => "INDIRECT_CONNECTION_ONLY",
            ConnectionStatus::NoConnection => "NO_CONNECTION",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ConnectionStatus::DirectConnection => "DIRECT CONNECTION",
            ConnectionStatus::IndirectConnectionOnly => "INDIRECT CONNECTION ONLY",
            ConnectionStatus::NoConnection => "NO CONNECTION",
        }
    }
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TraceStatus {
    Pending,
    InProgress,
    Completed,
    Partial,
    Failed,
}

impl TraceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TraceStatus::Pending => "pending",
            TraceStatus::InProgress => "in_progress",
            TraceStatus::Completed => "completed",
            TraceStatus::Partial => "partial",
            TraceStatus::Failed => "failed",
        }
    }
}

/// Failure reasons for one stage that ended in `failed`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageFailure {
    pub stage_id: StageId,
    pub reasons: Vec<String>,
}

/// Aggregated outcome of a full four-stage trace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceSummary {
    pub trace_id: Uuid,
    pub stage_results: Vec<StageResult>,
    pub has_direct_evidence: bool,
    pub has_indirect_evidence: bool,
    pub total_urls: usize,
    pub total_direct_facts: usize,
    pub total_indirect_facts: usize,
    pub connection_status: ConnectionStatus,
    pub total_processing_time_ms: u64,
    pub overall_status: TraceStatus,
    #[serde(default)]
    pub stage_failures: Vec<StageFailure>,
}

// ============= API Request/Response Types =============

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceRequest {
    pub entity: String,
    pub ubo_name: String,
    pub location: String,
    #[serde(default, alias = "domain_name", skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
}

impl TraceRequest {
    pub fn new(
        entity: impl Into<String>,
        ubo_name: impl Into<String>,
        location: impl Into<String>,
        domain: Option<String>,
    ) -> Self {
        Self {
            entity: entity.into(),
            ubo_name: ubo_name.into(),
            location: location.into(),
            domain,
        }
    }

    pub fn validate(&self) -> Result<()> {
        for (field, value) in [
            ("entity", &self.entity),
            ("ubo_name", &self.ubo_name),
            ("location", &self.location),
        ] {
            if value.trim().is_empty() {
                return Err(AppError::InvalidInput(format!("'{}' must not be empty", field)));
            }
        }
        Ok(())
    }

    /// The supplied domain, ignoring blank values.
    pub fn domain(&self) -> Option<&str> {
        self.domain
            .as_deref()
            .map(str::trim)
            .filter(|d| !d.is_empty())
    }
}

/// Persisted lifecycle record of a trace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceRecord {
    pub trace_id: Uuid,
    #[serde(flatten)]
    pub request: TraceRequest,
    pub status: TraceStatus,
    pub stages_completed: Vec<StageId>,
    pub total_stages: usize,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<TraceSummary>,
}

impl TraceRecord {
    pub fn new(request: TraceRequest) -> Self {
        let now = Utc::now();
        Self {
            trace_id: Uuid::new_v4(),
            request,
            status: TraceStatus::Pending,
            stages_completed: Vec::new(),
            total_stages: StageId::ALL.len(),
            created_at: now,
            updated_at: now,
            summary: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchTraceRequest {
    pub traces: Vec<TraceRequest>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchTraceResponse {
    pub batch_id: Uuid,
    pub total_traces: usize,
    pub completed_traces: usize,
    pub failed_traces: usize,
    pub trace_ids: Vec<Uuid>,
    pub status: TraceStatus,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceStats {
    pub total_traces: usize,
    pub by_status: BTreeMap<String, usize>,
    pub by_connection: BTreeMap<String, usize>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
    pub version: String,
    pub timestamp: DateTime<Utc>,
}

// ============= Error Types =============

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Evidence source error: {0}")]
    Source(String),

    #[error("{service} returned HTTP {status}")]
    Http { service: String, status: u16 },

    #[error("Timed out: {0}")]
    Timeout(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl axum::response::IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        use axum::http::StatusCode;

        let status = match &self {
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Source(_) | AppError::Http { .. } | AppError::Timeout(_) => {
                StatusCode::BAD_GATEWAY
            }
            AppError::Parse(_)
            | AppError::Configuration(_)
            | AppError::Storage(_)
            | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = serde_json::json!({
            "error": self.to_string()
        });

        (status, axum::Json(body)).into_response()
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
