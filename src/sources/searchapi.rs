//! Domain discovery through SearchAPI's Google engine.

use super::client::{DomainHit, DomainSearchSource, http_client, request_error};
use crate::types::{AppError, Result};
use crate::utils::toml_config::SearchApiConfig;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashSet;
use tracing::{debug, info};

const SERVICE: &str = "searchapi";

/// Substring of a free-form location, ISO country code, SearchAPI location name.
const LOCATIONS: &[(&str, &str, &str)] = &[
    ("united arab emirates", "ae", "United Arab Emirates"),
    ("uae", "ae", "United Arab Emirates"),
    ("isle of man", "im", "Isle of Man"),
    ("united kingdom", "gb", "United Kingdom"),
    ("uk", "gb", "United Kingdom"),
    ("united states", "us", "United States"),
    ("usa", "us", "United States"),
    ("india", "in", "India"),
    ("singapore", "sg", "Singapore"),
    ("hong kong", "hk", "Hong Kong"),
    ("switzerland", "ch", "Switzerland"),
    ("netherlands", "nl", "Netherlands"),
    ("france", "fr", "France"),
    ("germany", "de", "Germany"),
    ("china", "cn", "China"),
    ("japan", "jp", "Japan"),
    ("australia", "au", "Australia"),
    ("canada", "ca", "Canada"),
    ("brazil", "br", "Brazil"),
    ("argentina", "ar", "Argentina"),
];

/// Country code and SearchAPI location for a free-form location, defaulting to the US.
pub fn resolve_location(location: &str) -> (&'static str, &'static str) {
    let lower = location.to_lowercase();
    LOCATIONS
        .iter()
        .find(|(key, _, _)| lower.contains(key))
        .map(|(_, code, name)| (*code, *name))
        .unwrap_or(("us", "United States"))
}

pub struct SearchApiClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    num_results: u32,
}

impl SearchApiClient {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        timeout_secs: u64,
        num_results: u32,
    ) -> Result<Self> {
        Ok(Self {
            http: http_client(timeout_secs)?,
            base_url: base_url.into(),
            api_key: api_key.into(),
            num_results,
        })
    }

    /// Returns `Ok(None)` when the API key variable is unset.
    pub fn from_config(config: &SearchApiConfig) -> Result<Option<Self>> {
        match std::env::var(&config.api_key_env) {
            Ok(key) if !key.trim().is_empty() => Self::new(
                &config.base_url,
                key,
                config.timeout_secs,
                config.num_results,
            )
            .map(Some),
            _ => Ok(None),
        }
    }
}

#[async_trait]
impl DomainSearchSource for SearchApiClient {
    async fn search_domains(
        &self,
        company_name: &str,
        ubo_name: &str,
        location: &str,
    ) -> Result<Vec<DomainHit>> {
        let query = format!("{} {} official website domain", company_name, ubo_name);
        let (country_code, search_location) = resolve_location(location);
        let num = self.num_results.to_string();

        debug!(%query, country_code, "SearchAPI domain search");

        let response = self
            .http
            .get(&self.base_url)
            .bearer_auth(&self.api_key)
            .query(&[
                ("engine", "google"),
                ("q", query.as_str()),
                ("location", search_location),
                ("gl", country_code),
                ("hl", "en"),
                ("num", num.as_str()),
            ])
            .send()
            .await
            .map_err(|e| request_error(SERVICE, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AppError::Http {
                service: SERVICE.to_string(),
                status: status.as_u16(),
            });
        }

        let payload: Value = response
            .json()
            .await
            .map_err(|e| request_error(SERVICE, e))?;

        let hits = extract_domain_hits(&payload);
        info!(company = company_name, domains = hits.len(), "SearchAPI domain search completed");
        Ok(hits)
    }
}

/// Reduce `organic_results` to unique domains that carry a snippet.
pub fn extract_domain_hits(payload: &Value) -> Vec<DomainHit> {
    let mut seen = HashSet::new();

    payload
        .get("organic_results")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(|result| {
            let domain = result.get("domain").and_then(Value::as_str)?.trim();
            let snippet = result.get("snippet").and_then(Value::as_str)?.trim();
            if domain.is_empty() || snippet.is_empty() {
                return None;
            }
            if !seen.insert(domain.to_lowercase()) {
                return None;
            }

            Some(DomainHit {
                position: result
                    .get("position")
                    .and_then(Value::as_u64)
                    .and_then(|p| u32::try_from(p).ok()),
                source: result
                    .get("source")
                    .and_then(Value::as_str)
                    .map(str::to_string),
                domain: domain.to_string(),
                snippet: snippet.to_string(),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_resolve_location() {
        assert_eq!(resolve_location("Dubai, UAE"), ("ae", "United Arab Emirates"));
        assert_eq!(resolve_location("London, United Kingdom"), ("gb", "United Kingdom"));
        assert_eq!(resolve_location("Isle of Man"), ("im", "Isle of Man"));
        assert_eq!(resolve_location("Atlantis"), ("us", "United States"));
    }

    #[test]
    fn test_extract_domain_hits_dedups_case_insensitively() {
        let payload = json!({
            "organic_results": [
                {"position": 1, "source": "Acme", "domain": "acme.com", "snippet": "Acme Corp home"},
                {"position": 2, "source": "Acme", "domain": "ACME.com", "snippet": "Duplicate"},
                {"position": 3, "domain": "news.com"},
                {"position": 4, "domain": "registry.gov", "snippet": "Filing"}
            ]
        });

        let hits = extract_domain_hits(&payload);
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].domain, "acme.com");
        assert_eq!(hits[0].position, Some(1));
        assert_eq!(hits[1].domain, "registry.gov");
        assert_eq!(hits[1].source, None);
    }
}
