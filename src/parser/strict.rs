use super::json::{self, JsonProbe};
use super::text::{self, SUMMARY_MAX_CHARS};
use super::{ParsedStage, ResultParser, dedup_facts};
use crate::types::ParseWarning;

/// Accepts only a structured JSON fact list.
///
/// Anything else yields an empty result with a parse warning. URLs are taken
/// from the parsed facts only, not scraped from the payload.
#[derive(Debug, Clone, Copy, Default)]
pub struct StrictJsonParser;

impl StrictJsonParser {
    pub fn new() -> Self {
        Self
    }
}

impl ResultParser for StrictJsonParser {
    fn parse(&self, raw: &str) -> ParsedStage {
        let value = match json::probe(raw) {
            JsonProbe::Parsed(value) => value,
            JsonProbe::Malformed(detail) => {
                return ParsedStage::degraded(raw, ParseWarning::MalformedJson(detail));
            }
            JsonProbe::Absent => {
                return ParsedStage::degraded(
                    raw,
                    ParseWarning::MalformedJson("payload is not JSON".to_string()),
                );
            }
        };

        let Some(structured) = json::extract_structured(&value) else {
            return ParsedStage::degraded(raw, ParseWarning::UnrecognizedShape);
        };

        let facts = dedup_facts(structured.facts);
        let urls = facts.iter().filter_map(|f| f.url.clone()).collect();
        let summary = structured.summary.unwrap_or_else(|| {
            facts
                .iter()
                .map(|f| f.text.as_str())
                .collect::<Vec<_>>()
                .join(" ")
        });

        ParsedStage {
            facts,
            summary: text::truncate_summary(&summary, SUMMARY_MAX_CHARS),
            urls,
            warning: None,
        }
    }

    fn name(&self) -> &'static str {
        "strict_json"
    }
}
