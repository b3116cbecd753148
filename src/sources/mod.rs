pub mod agent;
pub mod apollo;
pub mod client;
pub mod expert;
pub mod searchapi;

pub use agent::ResearchAgentClient;
pub use apollo::ApolloClient;
pub use client::{
    ConfidenceQuery, DomainConfidence, DomainConfidenceSource, DomainHit, DomainSearchSource,
    PeopleEnrichmentSource, PeopleQuery, PrimaryEvidenceSource, PrimaryQuery,
};
pub use expert::ExpertDomainClient;
pub use searchapi::SearchApiClient;

use crate::types::Result;
use crate::utils::toml_config::UboConfig;
use std::sync::Arc;
use tracing::info;

/// The set of collaborators a stage executor queries.
///
/// Only the primary source is mandatory; a missing enrichment is recorded as
/// skipped on every stage result.
#[derive(Clone)]
pub struct EvidenceSources {
    pub primary: Arc<dyn PrimaryEvidenceSource>,
    pub people: Option<Arc<dyn PeopleEnrichmentSource>>,
    pub domains: Option<Arc<dyn DomainSearchSource>>,
    pub confidence: Option<Arc<dyn DomainConfidenceSource>>,
}

impl EvidenceSources {
    pub fn new(primary: Arc<dyn PrimaryEvidenceSource>) -> Self {
        Self {
            primary,
            people: None,
            domains: None,
            confidence: None,
        }
    }

    pub fn with_people(mut self, people: Arc<dyn PeopleEnrichmentSource>) -> Self {
        self.people = Some(people);
        self
    }

    pub fn with_domains(mut self, domains: Arc<dyn DomainSearchSource>) -> Self {
        self.domains = Some(domains);
        self
    }

    pub fn with_confidence(mut self, confidence: Arc<dyn DomainConfidenceSource>) -> Self {
        self.confidence = Some(confidence);
        self
    }

    /// Build HTTP-backed sources from configuration
    pub fn from_config(config: &UboConfig) -> Result<Self> {
        let mut sources = Self::new(Arc::new(ResearchAgentClient::from_config(config)?));

        if let Some(apollo) = config.apollo.as_ref()
            && let Some(client) = ApolloClient::from_config(apollo)?
        {
            sources = sources.with_people(Arc::new(client));
        }

        if let Some(search) = config.searchapi.as_ref()
            && let Some(client) = SearchApiClient::from_config(search)?
        {
            sources = sources.with_domains(Arc::new(client));
        }

        if let Some(client) = ExpertDomainClient::from_config(config)? {
            sources = sources.with_confidence(Arc::new(client));
        }

        info!(
            people = sources.people.is_some(),
            domains = sources.domains.is_some(),
            confidence = sources.confidence.is_some(),
            "Evidence sources configured"
        );

        Ok(sources)
    }
}
