//! Research agent client for the primary query of each stage.

use super::client::{PrimaryEvidenceSource, PrimaryQuery, http_client, request_error};
use crate::types::{AppError, Result, StageId};
use crate::utils::toml_config::UboConfig;
use async_trait::async_trait;
use chrono::NaiveDate;
use regex::Regex;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::LazyLock;
use tracing::{debug, info};

const LEGAL_SUFFIXES: &[&str] = &[
    "limited", "ltd", "company", "co", "dmcc", "llc", "inc", "plc", "mea", "pvt", "private",
    "holdings", "group", "corp",
];

static WORD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[A-Za-z]+").expect("valid word regex"));

/// Agent and session an individual stage talks to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentSession {
    pub agent_id: String,
    pub session_id: String,
}

#[derive(Debug, Serialize)]
struct AgentMessage<'a> {
    user_id: &'a str,
    agent_id: &'a str,
    session_id: &'a str,
    message: &'a str,
}

/// Connection details shared by every agent call.
#[derive(Clone)]
pub struct AgentEndpoint {
    http: reqwest::Client,
    api_url: String,
    api_key: String,
    user_id: String,
}

impl AgentEndpoint {
    pub fn new(
        api_url: impl Into<String>,
        api_key: impl Into<String>,
        user_id: impl Into<String>,
        timeout_secs: u64,
    ) -> Result<Self> {
        Ok(Self {
            http: http_client(timeout_secs)?,
            api_url: api_url.into(),
            api_key: api_key.into(),
            user_id: user_id.into(),
        })
    }

    pub fn from_config(config: &UboConfig, timeout_secs: u64) -> Result<Self> {
        let api_key = config
            .agent_api_key()
            .map_err(|e| AppError::Configuration(e.to_string()))?;
        let user_id = config
            .agent_user_id()
            .map_err(|e| AppError::Configuration(e.to_string()))?;
        Self::new(config.agent.api_url.clone(), api_key, user_id, timeout_secs)
    }

    /// Send one message to an agent session and return the reply text.
    pub async fn send(&self, service: &str, session: &AgentSession, message: &str) -> Result<String> {
        let body = AgentMessage {
            user_id: &self.user_id,
            agent_id: &session.agent_id,
            session_id: &session.session_id,
            message,
        };

        let response = self
            .http
            .post(&self.api_url)
            .header("x-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| request_error(service, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AppError::Http {
                service: service.to_string(),
                status: status.as_u16(),
            });
        }

        let payload: Value = response
            .json()
            .await
            .map_err(|e| request_error(service, e))?;

        extract_content(&payload).ok_or_else(|| {
            AppError::Parse(format!("{} response has no message content", service))
        })
    }
}

/// Research agent with one session per stage.
pub struct ResearchAgentClient {
    endpoint: AgentEndpoint,
    sessions: HashMap<StageId, AgentSession>,
}

impl ResearchAgentClient {
    pub fn new(endpoint: AgentEndpoint, sessions: HashMap<StageId, AgentSession>) -> Self {
        Self { endpoint, sessions }
    }

    pub fn from_config(config: &UboConfig) -> Result<Self> {
        let endpoint = AgentEndpoint::from_config(config, config.agent.timeout_secs)?;

        let mut sessions = HashMap::new();
        for stage in StageId::ALL {
            let stage_config = config.stage_agent(stage).ok_or_else(|| {
                AppError::Configuration(format!("No agent configured for {}", stage.key()))
            })?;
            sessions.insert(
                stage,
                AgentSession {
                    agent_id: stage_config.agent_id.clone(),
                    session_id: stage_config.session_id.clone(),
                },
            );
        }

        Ok(Self::new(endpoint, sessions))
    }
}

#[async_trait]
impl PrimaryEvidenceSource for ResearchAgentClient {
    async fn query(&self, query: &PrimaryQuery) -> Result<String> {
        let session = self.sessions.get(&query.stage).ok_or_else(|| {
            AppError::Configuration(format!("No agent session for stage {}", query.stage))
        })?;

        let prompt = build_prompt(query);
        debug!(stage = %query.stage, agent_id = %session.agent_id, "Sending stage prompt");

        let content = self.endpoint.send("research agent", session, &prompt).await?;
        info!(stage = %query.stage, chars = content.len(), "Research agent replied");
        Ok(content)
    }

    fn name(&self) -> &str {
        "research_agent"
    }
}

/// Read reply text from `response`, `choices[0].message.content`, or `content`.
pub fn extract_content(payload: &Value) -> Option<String> {
    let non_empty = |v: Option<&Value>| {
        v.and_then(Value::as_str)
            .filter(|s| !s.trim().is_empty())
            .map(str::to_string)
    };

    non_empty(payload.get("response"))
        .or_else(|| non_empty(payload.pointer("/choices/0/message/content")))
        .or_else(|| non_empty(payload.get("content")))
}

/// Guess a plausible company domain from its name.
///
/// Legal suffixes are dropped and the first two remaining words are joined,
/// so `"Acme Widgets Holdings Ltd"` becomes `acmewidgets.com`.
pub fn infer_domain(entity: &str) -> Option<String> {
    let core: Vec<String> = WORD
        .find_iter(entity)
        .map(|m| m.as_str().to_lowercase())
        .filter(|w| !LEGAL_SUFFIXES.contains(&w.as_str()))
        .take(2)
        .collect();

    if core.is_empty() {
        None
    } else {
        Some(format!("{}.com", core.concat()))
    }
}

fn resolve_domain(query: &PrimaryQuery) -> String {
    query
        .domain
        .as_deref()
        .map(str::trim)
        .filter(|d| !d.is_empty() && !d.eq_ignore_ascii_case("unknown"))
        .map(str::to_string)
        .or_else(|| infer_domain(&query.entity))
        .unwrap_or_else(|| "unknown".to_string())
}

fn since_label(date: Option<NaiveDate>) -> String {
    match date {
        Some(date) => date.format("%b %Y").to_string(),
        None => "all time".to_string(),
    }
}

/// Stage-specific instructions sent to the research agent.
pub fn build_prompt(query: &PrimaryQuery) -> String {
    let PrimaryQuery {
        entity,
        ubo_name,
        location,
        ..
    } = query;
    let domain = resolve_domain(query);
    let since = since_label(query.time_filter);
    let since_date = query
        .time_filter
        .map(|d| d.format("%Y-%m-%d").to_string())
        .unwrap_or_default();

    match query.stage {
        StageId::Stage1A => format!(
            r#"You are an independent corporate-ownership investigator preparing a verifiable
evidence report on potential control links between "{ubo_name}" and "{entity}"
operating in {location}. Domain context: {domain}.

Return only verified factual information backed by official or primary sources:
company registry entries, beneficial-ownership filings, shareholder lists,
annual returns, major business-wire releases and audited disclosures that
explicitly mention {ubo_name} and {entity}.

For each finding output one line: <fact> (<date>) - <verified URL>
If nothing is found, state "No verified connection located in official records.""#
        ),
        StageId::Stage1B => format!(
            r#"Conduct a time-scoped factual search ({since} to present, on or after {since_date})
for direct relationships between "{ubo_name}" and "{entity}" in {location}.
Domain context: {domain}.

Include new or amended ownership filings, director appointments or
resignations, regulator database updates and corporate announcements
confirming changes in control or shareholding.

Every statement must be one line: <fact> (<date>) - <source URL>
Prefer registry or regulator links over press releases and aggregators."#
        ),
        StageId::Stage2A => format!(
            r#"Investigate indirect or layered ownership structures linking "{ubo_name}" to
"{entity}" ({domain}) registered or operating in {location}.

Trace parent, subsidiary and holding relationships; funds, SPVs, nominee
shareholders or trusts connected to either party; entities sharing a
registered address, directors or auditors; partial-name variants; and
cross-border vehicles used for control.

Output one line per fact: <fact> (<date>) - <verified URL>
If none found, output "No verified indirect relationship detected.""#
        ),
        StageId::Stage2B => format!(
            r#"Perform a time-filtered indirect-connection review ({since} to present, on or
after {since_date}) between "{ubo_name}" and "{entity}" in {location}.
Domain context: {domain}.

Look for acquisitions, restructurings or control transfers involving related
entities, fund-ownership changes, trust amendments, shared executives across
filings and registry updates citing {ubo_name} or a name variant.

Output in chronological order, one line per fact: <fact> (<date>) - <source URL>
If no data exists, state "None found in official records.""#
        ),
    }
}
