use std::ops::Range;

use serde::{Deserialize, Serialize};

use crate::matching::normalize::normalize_query;
use crate::matching::{FuzzyConfig, Match, MatcherConfig, NormalizedIndex};

const CLAUSE_PUNCTUATION: &[char] = &['.', ',', ';', ':', '!', '?'];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WordMode {
    /// Whole-word matching for short single-word queries.
    #[default]
    Auto,
    Always,
    Never,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchQuery {
    pub text: String,
    #[serde(default)]
    pub context_before: Option<String>,
    #[serde(default)]
    pub context_after: Option<String>,
    #[serde(default)]
    pub whole_word: WordMode,
}

impl SearchQuery {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }

    pub fn with_context(mut self, before: Option<String>, after: Option<String>) -> Self {
        self.context_before = before;
        self.context_after = after;
        self
    }
}

/// Insertion anchor: right after or right before the first match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Anchor {
    After(SearchQuery),
    Before(SearchQuery),
}

pub fn find_anchor_position(
    index: &NormalizedIndex,
    anchor: &Anchor,
    config: &MatcherConfig,
) -> Option<usize> {
    match anchor {
        Anchor::After(query) => find_matches(index, query, config).first().map(|m| m.to),
        Anchor::Before(query) => find_matches(index, query, config).first().map(|m| m.from),
    }
}

/// All matches of `query`, in document order.
pub fn find_matches(index: &NormalizedIndex, query: &SearchQuery, config: &MatcherConfig) -> Vec<Match> {
    let needle = normalize_query(&query.text, &config.normalize);
    if needle.is_empty() {
        return Vec::new();
    }
    let context = |text: &Option<String>| {
        text.as_deref()
            .map(|t| normalize_query(t.trim(), &config.normalize))
            .filter(|t| !t.is_empty())
    };
    let constraints = Constraints {
        whole_word: match query.whole_word {
            WordMode::Always => true,
            WordMode::Never => false,
            WordMode::Auto => wants_whole_word(&query.text, config.whole_word_max_len),
        },
        before: context(&query.context_before),
        after: context(&query.context_after),
        window: config.context_window,
    };

    let haystack = index.search_chars();
    let mut hits = scan(haystack, &needle, &constraints);
    if hits.is_empty() && needle.len() >= config.fuzzy.min_len {
        hits = fuzzy_block(haystack, &needle, &constraints, &config.fuzzy);
        log::debug!("fuzzy block search for {} chars found {} spans", needle.len(), hits.len());
    }

    hits.into_iter()
        .filter_map(|hit| index.resolve(hit.start, hit.end))
        .collect()
}

/// Auto whole-word applies to short queries without internal whitespace or
/// clause punctuation.
pub fn wants_whole_word(text: &str, max_len: usize) -> bool {
    let trimmed = text.trim();
    !trimmed.is_empty()
        && trimmed.chars().count() < max_len
        && !trimmed.chars().any(char::is_whitespace)
        && !trimmed.contains(CLAUSE_PUNCTUATION)
}

struct Constraints {
    whole_word: bool,
    before: Option<Vec<char>>,
    after: Option<Vec<char>>,
    window: usize,
}

impl Constraints {
    fn accepts(&self, hay: &[char], hit: &Range<usize>) -> bool {
        if self.whole_word && !on_word_boundaries(hay, hit) {
            return false;
        }
        if let Some(before) = &self.before {
            let window = self.window.max(before.len());
            let start = hit.start.saturating_sub(window);
            if !contains(&hay[start..hit.start], before) {
                return false;
            }
        }
        if let Some(after) = &self.after {
            let window = self.window.max(after.len());
            let end = (hit.end + window).min(hay.len());
            if !contains(&hay[hit.end..end], after) {
                return false;
            }
        }
        true
    }
}

/// Literal scan advancing one character per candidate, so overlapping
/// hits are all found.
fn scan(hay: &[char], needle: &[char], constraints: &Constraints) -> Vec<Range<usize>> {
    if needle.is_empty() || needle.len() > hay.len() {
        return Vec::new();
    }
    (0..=hay.len() - needle.len())
        .filter(|&i| hay[i..i + needle.len()] == *needle)
        .map(|i| i..i + needle.len())
        .filter(|hit| constraints.accepts(hay, hit))
        .collect()
}

/// Head/tail matching for long blocks whose interior may have drifted.
fn fuzzy_block(
    hay: &[char],
    needle: &[char],
    constraints: &Constraints,
    fuzzy: &FuzzyConfig,
) -> Vec<Range<usize>> {
    let edge = fuzzy.edge_len.min(needle.len());
    if edge == 0 {
        return Vec::new();
    }
    let head = scan(
        hay,
        &needle[..edge],
        &Constraints {
            whole_word: false,
            before: constraints.before.clone(),
            after: None,
            window: constraints.window,
        },
    );
    let tail = scan(
        hay,
        &needle[needle.len() - edge..],
        &Constraints {
            whole_word: false,
            before: None,
            after: constraints.after.clone(),
            window: constraints.window,
        },
    );

    let limit = fuzzy.tolerance * needle.len() as f64;
    let mut spans: Vec<Range<usize>> = head
        .iter()
        .flat_map(|h| tail.iter().map(move |t| (h, t)))
        .filter(|(h, t)| t.start > h.start)
        .map(|(h, t)| h.start..t.end)
        .filter(|span| (span.len().abs_diff(needle.len()) as f64) < limit)
        .collect();
    spans.sort_by_key(|s| (s.start, s.end));
    spans.dedup();
    spans
}

fn is_word_char(ch: char) -> bool {
    ch.is_alphanumeric() || ch == '_'
}

fn on_word_boundaries(hay: &[char], hit: &Range<usize>) -> bool {
    let needle = &hay[hit.clone()];
    let starts_ok = match (needle.first(), hit.start.checked_sub(1).map(|i| hay[i])) {
        (Some(&first), Some(prev)) if is_word_char(first) => !is_word_char(prev),
        _ => true,
    };
    let ends_ok = match (needle.last(), hay.get(hit.end)) {
        (Some(&last), Some(&next)) if is_word_char(last) => !is_word_char(next),
        _ => true,
    };
    starts_ok && ends_ok
}

fn contains(hay: &[char], needle: &[char]) -> bool {
    needle.len() <= hay.len() && hay.windows(needle.len()).any(|w| w == needle)
}
