//! Text helpers shared by the parsers: URL extraction and summary truncation.

use regex::Regex;
use std::collections::BTreeSet;
use std::sync::LazyLock;

/// Maximum length of a stage summary, in characters
pub const SUMMARY_MAX_CHARS: usize = 500;

static URL_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"https?://[^\s)\]>,"'<]+"#).expect("valid URL regex"));

static PARTIAL_ESCAPE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\\(u[0-9a-fA-F]{0,3})?$").expect("valid escape regex"));

/// Strip punctuation that commonly trails a URL in prose.
pub fn clean_url(url: &str) -> &str {
    url.trim_end_matches(['.', ';', ':', '!', '?', '*', '`'])
}

/// Every URL-shaped substring of `text`.
pub fn extract_urls(text: &str) -> BTreeSet<String> {
    URL_PATTERN
        .find_iter(text)
        .map(|m| clean_url(m.as_str()))
        .filter(|url| url_host(url).is_some())
        .map(str::to_string)
        .collect()
}

/// Lowercased host of a URL without a leading `www.`.
pub fn url_host(url: &str) -> Option<String> {
    let rest = url
        .split_once("://")
        .map(|(_, rest)| rest)
        .unwrap_or(url);
    let host = rest
        .split(['/', '?', '#'])
        .next()?
        .rsplit('@')
        .next()?
        .split(':')
        .next()?
        .to_ascii_lowercase();
    let host = host.strip_prefix("www.").unwrap_or(&host).to_string();

    if host.contains('.') && !host.starts_with('.') && !host.ends_with('.') {
        Some(host)
    } else {
        None
    }
}

/// Truncate `text` to at most `max_chars` characters.
///
/// Prefers a sentence boundary in the latter half of the window, then a word
/// boundary. Never ends inside a backslash escape sequence.
pub fn truncate_summary(text: &str, max_chars: usize) -> String {
    let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.chars().count() <= max_chars {
        return strip_partial_escape(&collapsed).to_string();
    }

    let window: String = collapsed.chars().take(max_chars).collect();
    let half = window.len() / 2;

    let sentence_end = window
        .char_indices()
        .filter(|&(i, c)| {
            matches!(c, '.' | '!' | '?')
                && i >= half
                && window[i + c.len_utf8()..].starts_with(' ')
        })
        .map(|(i, c)| i + c.len_utf8())
        .last();

    if let Some(end) = sentence_end {
        return strip_partial_escape(&window[..end]).to_string();
    }

    // Leave room for the ellipsis
    let budget: String = collapsed.chars().take(max_chars.saturating_sub(3)).collect();
    let cut = match budget.rfind(' ') {
        Some(idx) if idx > 0 => &budget[..idx],
        _ => budget.as_str(),
    };
    format!("{}...", strip_partial_escape(cut.trim_end()))
}

fn strip_partial_escape(text: &str) -> &str {
    let mut end = text.len();
    if let Some(m) = PARTIAL_ESCAPE.find(text) {
        // An even run of backslashes before the match means it is escaped itself
        let preceding = text[..m.start()].chars().rev().take_while(|&c| c == '\\').count();
        if preceding % 2 == 0 {
            end = m.start();
        }
    }
    text[..end].trim_end()
}
