//! People enrichment via the Apollo people search API.

use super::client::{PeopleEnrichmentSource, PeopleQuery, http_client, request_error};
use crate::types::{AppError, Result};
use crate::utils::toml_config::ApolloConfig;
use async_trait::async_trait;
use serde_json::{Value, json};
use tracing::info;

const SERVICE: &str = "apollo";
const PAGE_SIZE: u32 = 10;

pub struct ApolloClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl ApolloClient {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>, timeout_secs: u64) -> Result<Self> {
        Ok(Self {
            http: http_client(timeout_secs)?,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        })
    }

    /// Returns `Ok(None)` when the API key variable is unset.
    pub fn from_config(config: &ApolloConfig) -> Result<Option<Self>> {
        match std::env::var(&config.api_key_env) {
            Ok(key) if !key.trim().is_empty() => {
                Self::new(&config.base_url, key, config.timeout_secs).map(Some)
            }
            _ => Ok(None),
        }
    }

    fn request_body(query: &PeopleQuery) -> Value {
        let mut body = json!({
            "organization_name": query.organization_name,
            "page": 1,
            "per_page": PAGE_SIZE,
        });

        if let Some(titles) = query.titles.as_ref().filter(|t| !t.is_empty()) {
            body["person_titles"] = json!(titles);
        }
        if let Some(domains) = query.domains.as_ref().filter(|d| !d.is_empty()) {
            body["q_organization_domains"] = json!(domains.join("\n"));
        }
        if let Some(locations) = query.locations.as_ref().filter(|l| !l.is_empty()) {
            body["person_locations"] = json!(locations);
        }

        body
    }
}

#[async_trait]
impl PeopleEnrichmentSource for ApolloClient {
    async fn search_people(&self, query: &PeopleQuery) -> Result<Value> {
        let url = format!("{}/mixed_people/search", self.base_url);

        let response = self
            .http
            .post(&url)
            .header("X-Api-Key", &self.api_key)
            .header("Cache-Control", "no-cache")
            .json(&Self::request_body(query))
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

        let people = filter_people(&payload);
        info!(
            organization = %query.organization_name,
            people = people.len(),
            "Apollo people search completed"
        );

        Ok(json!({
            "people": people,
            "total_results": people.len(),
        }))
    }
}

/// Reduce raw people records to the fields relevant for ownership tracing.
pub fn filter_people(payload: &Value) -> Vec<Value> {
    let people = payload
        .get("people")
        .or_else(|| payload.get("contacts"))
        .and_then(Value::as_array);

    people
        .into_iter()
        .flatten()
        .map(|person| {
            let org = person.get("organization");
            json!({
                "name": person.get("name"),
                "title": person.get("title"),
                "linkedin_url": person.get("linkedin_url"),
                "city": person.get("city"),
                "country": person.get("country"),
                "organization": org.and_then(|o| o.get("name")),
                "organization_website": org.and_then(|o| o.get("website_url")),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_body_skips_empty_filters() {
        let body = ApolloClient::request_body(&PeopleQuery {
            organization_name: "Acme Corp".to_string(),
            titles: Some(vec!["Director".to_string()]),
            domains: Some(vec![]),
            locations: None,
        });

        assert_eq!(body["organization_name"], "Acme Corp");
        assert_eq!(body["person_titles"], json!(["Director"]));
        assert!(body.get("q_organization_domains").is_none());
        assert!(body.get("person_locations").is_none());
    }

    #[test]
    fn test_filter_people_keeps_relevant_fields() {
        let payload = json!({
            "people": [{
                "id": "p1",
                "name": "Jane Doe",
                "title": "Director",
                "email": "hidden@acme.com",
                "linkedin_url": "https://linkedin.com/in/janedoe",
                "city": "London",
                "country": "United Kingdom",
                "organization": {"name": "Acme Corp", "website_url": "https://acme.com"}
            }]
        });

        let people = filter_people(&payload);
        assert_eq!(people.len(), 1);
        assert_eq!(people[0]["organization"], "Acme Corp");
        assert!(people[0].get("email").is_none());
    }

    #[test]
    fn test_filter_people_handles_missing_list() {
        assert!(filter_people(&json!({})).is_empty());
    }
}
