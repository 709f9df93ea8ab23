//! # Normalized Matcher
//!
//! Resolves text queries against a document into position-space matches.
//!
//! The document is projected to plain text, normalized in two layers (the
//! second only collapses whitespace) and scanned literally. Every hit is
//! mapped back through both layers and the projection to a `from..to`
//! position range whose `to` is exclusive.
//!
//! ## Modules
//!
//! - **`normalize`**: the normalization layers and their back-mappings
//! - **`index`**: `NormalizedIndex`, built once per document state
//! - **`search`**: exact, whole-word, context and fuzzy block search
//! - **`occurrence`**: picking which of several matches an edit targets

pub mod index;
pub mod normalize;
pub mod occurrence;
pub mod search;

use serde::{Deserialize, Serialize};

use crate::projection::ProjectionOptions;

pub use index::NormalizedIndex;
pub use normalize::{NormalizeOptions, Normalized, UnicodeForm};
pub use occurrence::{Occurrence, drop_overlapping, select_occurrences};
pub use search::{Anchor, SearchQuery, WordMode, find_anchor_position, find_matches};

/// A resolved match: indexes into the normalized text and the
/// corresponding position range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Match {
    pub norm_start: usize,
    pub norm_end: usize,
    pub from: usize,
    pub to: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FuzzyConfig {
    /// Queries shorter than this (in normalized characters) never fall back
    /// to fuzzy block matching.
    pub min_len: usize,
    /// Length of the head and tail searched independently.
    pub edge_len: usize,
    /// Accepted span length deviation, as a fraction of the query length.
    pub tolerance: f64,
}

impl Default for FuzzyConfig {
    fn default() -> Self {
        Self {
            min_len: 100,
            edge_len: 30,
            tolerance: 0.1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatcherConfig {
    pub normalize: NormalizeOptions,
    pub projection: ProjectionOptions,
    /// Characters searched on each side of a candidate for context text.
    pub context_window: usize,
    /// Auto whole-word mode only applies to queries shorter than this.
    pub whole_word_max_len: usize,
    pub fuzzy: FuzzyConfig,
}

impl Default for MatcherConfig {
    fn default() -> Self {
        Self {
            normalize: NormalizeOptions::default(),
            projection: ProjectionOptions::default(),
            context_window: 120,
            whole_word_max_len: 32,
            fuzzy: FuzzyConfig::default(),
        }
    }
}
