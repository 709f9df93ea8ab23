//! Text normalization with per-character back-mappings.
//!
//! Normalization runs per grapheme cluster so that composition, compatibility
//! folding and case folding can change the character count without losing
//! track of where each output character came from.

use std::ops::Range;

use serde::{Deserialize, Serialize};
use unicode_normalization::UnicodeNormalization;
use unicode_segmentation::UnicodeSegmentation;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnicodeForm {
    Nfc,
    Nfkc,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NormalizeOptions {
    pub case_fold: bool,
    pub unicode_form: Option<UnicodeForm>,
    /// Non-breaking and typographic spaces become U+0020.
    pub unify_spaces: bool,
    /// Soft hyphens, zero-width spaces/joiners and BOMs are dropped.
    pub strip_invisible: bool,
    /// Curly quotes become straight quotes, dash variants become `-`.
    pub unify_punctuation: bool,
    /// Whitespace runs become a single space (search layer only).
    pub collapse_whitespace: bool,
}

impl Default for NormalizeOptions {
    fn default() -> Self {
        Self {
            case_fold: false,
            unicode_form: Some(UnicodeForm::Nfc),
            unify_spaces: true,
            strip_invisible: true,
            unify_punctuation: true,
            collapse_whitespace: true,
        }
    }
}

impl NormalizeOptions {
    /// No transformation at all.
    pub fn exact() -> Self {
        Self {
            case_fold: false,
            unicode_form: None,
            unify_spaces: false,
            strip_invisible: false,
            unify_punctuation: false,
            collapse_whitespace: false,
        }
    }
}

/// Normalized characters plus, for each, the source character range it
/// was produced from.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Normalized {
    pub chars: Vec<char>,
    pub spans: Vec<Range<usize>>,
}

impl Normalized {
    pub fn identity(chars: &[char]) -> Self {
        Self {
            chars: chars.to_vec(),
            spans: (0..chars.len()).map(|i| i..i + 1).collect(),
        }
    }

    fn push(&mut self, ch: char, span: Range<usize>) {
        self.chars.push(ch);
        self.spans.push(span);
    }

    pub fn len(&self) -> usize {
        self.chars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chars.is_empty()
    }

    pub fn text(&self) -> String {
        self.chars.iter().collect()
    }

    /// Source range covered by the non-empty output range `start..end`.
    pub fn source_range(&self, start: usize, end: usize) -> Option<Range<usize>> {
        if start >= end || end > self.len() {
            return None;
        }
        Some(self.spans[start].start..self.spans[end - 1].end)
    }
}

/// First normalization layer: everything except whitespace collapsing.
pub fn normalize(text: &str, options: &NormalizeOptions) -> Normalized {
    let mut out = Normalized::default();
    let mut offset = 0;
    let mut cluster_buf = String::new();

    for cluster in text.graphemes(true) {
        let len = cluster.chars().count();
        let span = offset..offset + len;
        offset += len;

        cluster_buf.clear();
        for ch in cluster.chars() {
            if options.strip_invisible && is_invisible(ch) {
                continue;
            }
            let ch = if options.unify_spaces { unify_space(ch) } else { ch };
            let ch = if options.unify_punctuation {
                unify_punctuation(ch)
            } else {
                ch
            };
            cluster_buf.push(ch);
        }

        let composed: String = match options.unicode_form {
            Some(UnicodeForm::Nfc) => cluster_buf.nfc().collect(),
            Some(UnicodeForm::Nfkc) => cluster_buf.nfkc().collect(),
            None => cluster_buf.clone(),
        };
        for ch in composed.chars() {
            if options.case_fold {
                for lower in ch.to_lowercase() {
                    out.push(lower, span.clone());
                }
            } else {
                out.push(ch, span.clone());
            }
        }
    }
    out
}

/// Second layer: each whitespace run becomes one space. Spans index into
/// `chars`.
pub fn collapse_whitespace(chars: &[char]) -> Normalized {
    let mut out = Normalized::default();
    let mut i = 0;
    while i < chars.len() {
        if chars[i].is_whitespace() {
            let start = i;
            while i < chars.len() && chars[i].is_whitespace() {
                i += 1;
            }
            out.push(' ', start..i);
        } else {
            out.push(chars[i], i..i + 1);
            i += 1;
        }
    }
    out
}

/// Both layers applied, mappings discarded. Used for needles and context.
pub fn normalize_query(text: &str, options: &NormalizeOptions) -> Vec<char> {
    let first = normalize(text, options);
    if options.collapse_whitespace {
        collapse_whitespace(&first.chars).chars
    } else {
        first.chars
    }
}

fn is_invisible(ch: char) -> bool {
    matches!(
        ch,
        '\u{00AD}' | '\u{200B}' | '\u{200C}' | '\u{200D}' | '\u{2060}' | '\u{FEFF}'
    )
}

fn unify_space(ch: char) -> char {
    match ch {
        '\u{00A0}' | '\u{2000}'..='\u{200A}' | '\u{202F}' | '\u{205F}' | '\u{3000}' => ' ',
        other => other,
    }
}

fn unify_punctuation(ch: char) -> char {
    match ch {
        '\u{2018}' | '\u{2019}' | '\u{201A}' | '\u{201B}' | '\u{2032}' => '\'',
        '\u{201C}' | '\u{201D}' | '\u{201E}' | '\u{201F}' | '\u{2033}' | '\u{00AB}' | '\u{00BB}' => '"',
        '\u{2010}'..='\u{2015}' | '\u{2212}' => '-',
        other => other,
    }
}
