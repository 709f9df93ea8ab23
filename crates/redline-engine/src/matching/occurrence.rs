use serde::{Deserialize, Serialize};

use crate::matching::Match;

/// Which of several matches an operation targets. Precedence: `index`,
/// then `max`, then `all`, then the first match alone.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Occurrence {
    /// 1-based.
    pub index: Option<usize>,
    pub max: Option<usize>,
    pub all: bool,
}

impl Occurrence {
    pub fn nth(index: usize) -> Self {
        Self {
            index: Some(index),
            ..Self::default()
        }
    }

    pub fn first_n(max: usize) -> Self {
        Self {
            max: Some(max),
            ..Self::default()
        }
    }

    pub fn all() -> Self {
        Self {
            all: true,
            ..Self::default()
        }
    }

    /// Whether the caller said anything about which occurrence to use.
    pub fn is_explicit(&self) -> bool {
        self.index.is_some() || self.max.is_some() || self.all
    }
}

pub fn select_occurrences<T: Clone>(matches: &[T], occurrence: &Occurrence) -> Vec<T> {
    if let Some(index) = occurrence.index {
        return index
            .checked_sub(1)
            .and_then(|i| matches.get(i))
            .cloned()
            .into_iter()
            .collect();
    }
    if let Some(max) = occurrence.max {
        return matches.iter().take(max).cloned().collect();
    }
    if occurrence.all {
        return matches.to_vec();
    }
    matches.first().cloned().into_iter().collect()
}

/// Keeps matches in document order, dropping any that overlap an earlier
/// kept one.
pub fn drop_overlapping(mut matches: Vec<Match>) -> Vec<Match> {
    matches.sort_by_key(|m| (m.from, m.to));
    let mut kept: Vec<Match> = Vec::with_capacity(matches.len());
    for m in matches {
        match kept.last() {
            Some(last) if m.from < last.to => {}
            _ => kept.push(m),
        }
    }
    kept
}
