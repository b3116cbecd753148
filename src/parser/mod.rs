//! Evidence payload parsing
//!
//! Agents return free text, JSON, or JSON wrapped in prose and code fences.
//! A [`ResultParser`] turns one such payload into a [`ParsedStage`] without
//! ever failing: malformed input degrades to an empty result carrying a
//! [`ParseWarning`].

pub mod heuristic;
pub mod json;
pub mod strict;
pub mod text;

pub use heuristic::HeuristicParser;
pub use strict::StrictJsonParser;

use crate::types::{EvidenceKind, Fact, ParseWarning, StageId};
use std::collections::{BTreeSet, HashSet};

/// Facts, summary and URLs extracted from a single evidence payload.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedStage {
    pub facts: Vec<Fact>,
    pub summary: String,
    pub urls: BTreeSet<String>,
    pub warning: Option<ParseWarning>,
}

impl ParsedStage {
    /// Empty result for an unusable payload.
    pub fn degraded(raw: &str, warning: ParseWarning) -> Self {
        Self {
            facts: Vec::new(),
            summary: text::truncate_summary(raw, text::SUMMARY_MAX_CHARS),
            urls: BTreeSet::new(),
            warning: Some(warning),
        }
    }

    /// Split facts into `(direct, indirect)` by stage identity alone.
    pub fn classify(&self, stage: StageId) -> (Vec<Fact>, Vec<Fact>) {
        match stage.evidence_kind() {
            EvidenceKind::Direct => (self.facts.clone(), Vec::new()),
            EvidenceKind::Indirect => (Vec::new(), self.facts.clone()),
        }
    }

    /// Hostnames referenced by the payload, used as domain candidates.
    pub fn domain_hints(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        self.urls
            .iter()
            .filter_map(|url| text::url_host(url))
            .filter(|host| seen.insert(host.clone()))
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.facts.is_empty() && self.urls.is_empty()
    }
}

/// Strategy for turning a raw evidence payload into structured facts.
///
/// Implementations must be deterministic and must not panic on any input.
pub trait ResultParser: Send + Sync {
    fn parse(&self, raw: &str) -> ParsedStage;

    /// Short identifier used in logs
    fn name(&self) -> &'static str;
}

/// Remove repeated facts, keeping the first occurrence of each text+url pair.
pub(crate) fn dedup_facts(facts: Vec<Fact>) -> Vec<Fact> {
    let mut seen = HashSet::new();
    facts
        .into_iter()
        .filter(|fact| seen.insert((fact.text.clone(), fact.url.clone())))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parsed(facts: Vec<Fact>, urls: &[&str]) -> ParsedStage {
        ParsedStage {
            facts,
            summary: String::new(),
            urls: urls.iter().map(|u| u.to_string()).collect(),
            warning: None,
        }
    }

    #[test]
    fn test_classify_follows_stage_identity() {
        let stage = parsed(vec![Fact::new("Jane Doe is a director")], &[]);

        let (direct, indirect) = stage.classify(StageId::Stage1B);
        assert_eq!(direct.len(), 1);
        assert!(indirect.is_empty());

        let (direct, indirect) = stage.classify(StageId::Stage2A);
        assert!(direct.is_empty());
        assert_eq!(indirect.len(), 1);
    }

    #[test]
    fn test_domain_hints_are_unique_hosts() {
        let stage = parsed(
            vec![],
            &[
                "https://www.Acme.com/about",
                "http://acme.com/team",
                "https://find-and-update.company-information.service.gov.uk/company/1",
            ],
        );

        assert_eq!(
            stage.domain_hints(),
            vec![
                "acme.com".to_string(),
                "find-and-update.company-information.service.gov.uk".to_string()
            ]
        );
    }

    #[test]
    fn test_dedup_keeps_first_occurrence() {
        let facts = vec![
            Fact::new("a").with_url("https://x.com"),
            Fact::new("b"),
            Fact::new("a").with_url("https://x.com"),
            Fact::new("a"),
        ];
        let deduped = dedup_facts(facts);
        assert_eq!(deduped.len(), 3);
        assert_eq!(deduped[0].text, "a");
        assert_eq!(deduped[1].text, "b");
        assert_eq!(deduped[2].url, None);
    }
}
