//! Domain confidence scoring by the expert agent.

use super::agent::{AgentEndpoint, AgentSession};
use super::client::{ConfidenceQuery, DomainConfidence, DomainConfidenceSource};
use crate::parser::json::{JsonProbe, probe};
use crate::types::{AppError, Result};
use crate::utils::toml_config::UboConfig;
use async_trait::async_trait;
use serde_json::Value;
use tracing::info;

const SERVICE: &str = "expert agent";

pub struct ExpertDomainClient {
    endpoint: AgentEndpoint,
    session: AgentSession,
}

impl ExpertDomainClient {
    pub fn new(endpoint: AgentEndpoint, session: AgentSession) -> Self {
        Self { endpoint, session }
    }

    /// Returns `Ok(None)` when no `[expert]` section is configured.
    pub fn from_config(config: &UboConfig) -> Result<Option<Self>> {
        let Some(expert) = config
            .expert
            .as_ref()
            .filter(|e| !e.agent_id.trim().is_empty())
        else {
            return Ok(None);
        };

        let endpoint = AgentEndpoint::from_config(config, expert.timeout_secs)?;
        Ok(Some(Self::new(
            endpoint,
            AgentSession {
                agent_id: expert.agent_id.clone(),
                session_id: expert.session_id.clone(),
            },
        )))
    }
}

#[async_trait]
impl DomainConfidenceSource for ExpertDomainClient {
    async fn score_domains(&self, query: &ConfidenceQuery) -> Result<Vec<DomainConfidence>> {
        let message = build_message(query);
        let content = self.endpoint.send(SERVICE, &self.session, &message).await?;

        let rankings = parse_expert_rankings(&content)?;
        info!(
            company = %query.company_name,
            candidates = query.domain_candidates.len(),
            ranked = rankings.len(),
            "Domain confidence scoring completed"
        );
        Ok(rankings)
    }
}

fn build_message(query: &ConfidenceQuery) -> String {
    let candidates = serde_json::to_string_pretty(&query.domain_candidates)
        .unwrap_or_else(|_| query.domain_candidates.join(", "));
    format!(
        "company_name: {} , UBO_name: {} , location: {}\n\n\
         candidate_domains: {}\n\n\
         Respond with JSON: {{\"domain_rankings\": [{{\"domain\": \"...\", \"confidence_score\": 0-100, \"reasoning\": \"...\"}}]}}",
        query.company_name, query.ubo_name, query.location, candidates
    )
}

/// Parse the expert reply into rankings sorted by descending confidence.
///
/// A reply that is not JSON is a decode error so the caller records it.
pub fn parse_expert_rankings(content: &str) -> Result<Vec<DomainConfidence>> {
    let value = match probe(content) {
        JsonProbe::Parsed(value) => value,
        JsonProbe::Malformed(detail) => {
            return Err(AppError::Parse(format!("expert reply is malformed JSON: {}", detail)));
        }
        JsonProbe::Absent => {
            return Err(AppError::Parse("expert reply is not JSON".to_string()));
        }
    };

    let entries = match &value {
        Value::Array(entries) => Some(entries),
        Value::Object(map) => ["domain_rankings", "results", "rankings"]
            .iter()
            .find_map(|key| map.get(*key).and_then(Value::as_array)),
        _ => None,
    };

    let mut rankings: Vec<DomainConfidence> = entries
        .into_iter()
        .flatten()
        .filter_map(|entry| {
            let domain = entry.get("domain").and_then(Value::as_str)?.trim();
            if domain.is_empty() {
                return None;
            }
            let score = entry
                .get("confidence_score")
                .or_else(|| entry.get("confidence"))
                .and_then(Value::as_f64)
                .unwrap_or(0.0)
                .clamp(0.0, 100.0)
                .round() as u8;
            let reasoning = entry
                .get("reasoning")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();

            Some(DomainConfidence {
                domain: domain.to_string(),
                confidence_score: score,
                reasoning,
            })
        })
        .collect();

    rankings.sort_by(|a, b| b.confidence_score.cmp(&a.confidence_score));
    Ok(rankings)
}
