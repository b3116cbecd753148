//! Default parser: structured JSON first, then line patterns over free text.

use super::json::{self, JsonProbe};
use super::text::{self, SUMMARY_MAX_CHARS};
use super::{ParsedStage, ResultParser, dedup_facts};
use crate::types::{Fact, ParseWarning};
use regex::Regex;
use std::sync::LazyLock;

/// How many facts feed a synthesized summary
const SUMMARY_FACTS: usize = 3;

// `<text> (<date>) - <url>` where the date carries a four-digit year
static FACT_WITH_DATE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(?P<text>.+?)\s*\((?P<date>[^()]*\b(?:19|20)\d{2}\b[^()]*)\)\s*[-–—:|]+\s*(?P<url>https?://\S+)",
    )
    .expect("valid fact regex")
});

// `<text> - <url>`
static FACT_WITH_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?P<text>.+?)\s*[-–—|]+\s*\(?(?P<url>https?://\S+?)\)?$")
        .expect("valid fact regex")
});

static BULLET: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:[-*•]+|\(?\d{1,3}[.)])\s*").expect("valid bullet regex")
});

/// Parser tolerant of every payload shape the research agents produce.
///
/// A payload that looks like JSON but fails to parse is still scanned for
/// fact lines and URLs, with a parse warning attached. If that recovers
/// anything, the attempt is not zero-result and the stage is not retried.
/// Use [`StrictJsonParser`](super::StrictJsonParser) to treat malformed JSON
/// as an empty result instead.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeuristicParser;

impl HeuristicParser {
    pub fn new() -> Self {
        Self
    }

    fn extract_line_facts(raw: &str) -> Vec<Fact> {
        raw.lines()
            .filter_map(|line| {
                let line = BULLET.replace(line.trim(), "");
                let line = line.trim();
                if line.is_empty() {
                    return None;
                }

                if let Some(caps) = FACT_WITH_DATE.captures(line) {
                    let text = clean_text(&caps["text"])?;
                    return Some(
                        Fact::new(text)
                            .with_date(caps["date"].trim())
                            .with_url(text::clean_url(&caps["url"])),
                    );
                }

                let caps = FACT_WITH_URL.captures(line)?;
                let text = clean_text(&caps["text"])?;
                Some(Fact::new(text).with_url(text::clean_url(&caps["url"])))
            })
            .collect()
    }
}

impl ResultParser for HeuristicParser {
    fn parse(&self, raw: &str) -> ParsedStage {
        let mut warning = None;
        let mut explicit_summary = None;

        let facts = match json::probe(raw) {
            JsonProbe::Parsed(value) => match json::extract_structured(&value) {
                Some(structured) => {
                    explicit_summary = structured.summary;
                    structured.facts
                }
                None => {
                    warning = Some(ParseWarning::UnrecognizedShape);
                    Self::extract_line_facts(raw)
                }
            },
            JsonProbe::Malformed(detail) => {
                warning = Some(ParseWarning::MalformedJson(detail));
                Self::extract_line_facts(raw)
            }
            JsonProbe::Absent => Self::extract_line_facts(raw),
        };

        let facts = dedup_facts(facts);

        let mut urls = text::extract_urls(raw);
        urls.extend(facts.iter().filter_map(|f| f.url.clone()));

        let summary = match explicit_summary {
            Some(summary) => summary,
            None if !facts.is_empty() => synthesize_summary(&facts),
            None => raw.to_string(),
        };

        ParsedStage {
            facts,
            summary: text::truncate_summary(&summary, SUMMARY_MAX_CHARS),
            urls,
            warning,
        }
    }

    fn name(&self) -> &'static str {
        "heuristic"
    }
}

fn synthesize_summary(facts: &[Fact]) -> String {
    facts
        .iter()
        .take(SUMMARY_FACTS)
        .map(|fact| {
            let text = fact.text.trim_end();
            if text.ends_with(['.', '!', '?']) {
                text.to_string()
            } else {
                format!("{}.", text)
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn clean_text(text: &str) -> Option<String> {
    let text = text
        .trim()
        .trim_matches('*')
        .trim_matches('"')
        .trim_end_matches(['-', '–', '—', ':', '|'])
        .trim();
    (!text.is_empty()).then(|| text.to_string())
}
