//! Evidence source abstractions
//!
//! Each external collaborator sits behind a narrow async trait so the stage
//! executor can be driven by real HTTP clients or by scripted test doubles:
//! - **Primary evidence**: the per-stage research agent
//! - **People enrichment**: organisation/person lookup
//! - **Domain search**: web search for candidate company domains
//! - **Domain confidence**: expert scoring of candidate domains

use crate::types::{AppError, Result, StageId};
use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Parameters for one primary evidence query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrimaryQuery {
    pub stage: StageId,
    pub entity: String,
    pub ubo_name: String,
    pub location: String,
    pub domain: Option<String>,
    /// Lower-bound date the source is asked to honour; `None` means all-time
    pub time_filter: Option<NaiveDate>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PeopleQuery {
    pub organization_name: String,
    pub titles: Option<Vec<String>>,
    pub domains: Option<Vec<String>>,
    pub locations: Option<Vec<String>>,
}

/// One organic search result reduced to the fields used for domain discovery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomainHit {
    pub position: Option<u32>,
    pub source: Option<String>,
    pub domain: String,
    pub snippet: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfidenceQuery {
    pub company_name: String,
    pub ubo_name: String,
    pub location: String,
    pub domain_candidates: Vec<String>,
}

/// Expert assessment of how likely a domain belongs to the entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomainConfidence {
    pub domain: String,
    /// 0..=100
    pub confidence_score: u8,
    pub reasoning: String,
}

/// Primary evidence source queried once per stage attempt
///
/// Returns the raw agent payload (free text or JSON); interpretation is left
/// to the configured result parser.
#[async_trait]
pub trait PrimaryEvidenceSource: Send + Sync {
    async fn query(&self, query: &PrimaryQuery) -> Result<String>;

    /// Identifier used in logs
    fn name(&self) -> &str;
}

#[async_trait]
pub trait PeopleEnrichmentSource: Send + Sync {
    async fn search_people(&self, query: &PeopleQuery) -> Result<serde_json::Value>;
}

#[async_trait]
pub trait DomainSearchSource: Send + Sync {
    async fn search_domains(
        &self,
        company_name: &str,
        ubo_name: &str,
        location: &str,
    ) -> Result<Vec<DomainHit>>;
}

#[async_trait]
pub trait DomainConfidenceSource: Send + Sync {
    /// Score candidate domains, highest confidence first
    async fn score_domains(&self, query: &ConfidenceQuery) -> Result<Vec<DomainConfidence>>;
}

/// Map a transport-level reqwest failure onto the error taxonomy.
pub(crate) fn request_error(service: &str, err: reqwest::Error) -> AppError {
    if err.is_timeout() {
        AppError::Timeout(format!("{} request timed out", service))
    } else if let Some(status) = err.status() {
        AppError::Http {
            service: service.to_string(),
            status: status.as_u16(),
        }
    } else if err.is_decode() {
        AppError::Parse(format!("{} returned an undecodable body: {}", service, err))
    } else {
        AppError::Source(format!("{} request failed: {}", service, err))
    }
}

/// Build a reqwest client with the given timeout.
pub(crate) fn http_client(timeout_secs: u64) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| AppError::Configuration(format!("Failed to build HTTP client: {}", e)))
}
