use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Inline formatting carried by a text leaf.
///
/// Declaration order is the canonical order used when a leaf's marks are
/// rendered or hashed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mark {
    Bold,
    Italic,
    Underline,
    Strike,
    Code,
    Highlight,
    Superscript,
    Subscript,
}

/// Ordered, duplicate-free mark set of a text leaf.
pub type MarkSet = BTreeSet<Mark>;

impl Mark {
    pub const ALL: [Mark; 8] = [
        Mark::Bold,
        Mark::Italic,
        Mark::Underline,
        Mark::Strike,
        Mark::Code,
        Mark::Highlight,
        Mark::Superscript,
        Mark::Subscript,
    ];

    /// Canonical name, as used on the wire.
    pub fn name(self) -> &'static str {
        match self {
            Mark::Bold => "bold",
            Mark::Italic => "italic",
            Mark::Underline => "underline",
            Mark::Strike => "strike",
            Mark::Code => "code",
            Mark::Highlight => "highlight",
            Mark::Superscript => "superscript",
            Mark::Subscript => "subscript",
        }
    }

    /// Short tag used by the inline markup syntax (`[b]...[/b]`).
    pub fn tag(self) -> &'static str {
        match self {
            Mark::Bold => "b",
            Mark::Italic => "i",
            Mark::Underline => "u",
            Mark::Strike => "s",
            Mark::Code => "code",
            Mark::Highlight => "mark",
            Mark::Superscript => "sup",
            Mark::Subscript => "sub",
        }
    }

    pub fn from_tag(tag: &str) -> Option<Mark> {
        Mark::ALL.into_iter().find(|m| m.tag() == tag)
    }
}

impl fmt::Display for Mark {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown mark type: {0:?}")]
pub struct UnknownMark(pub String);

impl FromStr for Mark {
    type Err = UnknownMark;

    /// Accepts canonical names, common editor aliases and markup tags.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lowered = s.trim().to_ascii_lowercase();
        let mark = match lowered.as_str() {
            "bold" | "strong" => Mark::Bold,
            "italic" | "em" | "emphasis" => Mark::Italic,
            "underline" => Mark::Underline,
            "strike" | "strikethrough" | "strikeout" => Mark::Strike,
            "code" | "monospace" => Mark::Code,
            "highlight" => Mark::Highlight,
            "superscript" => Mark::Superscript,
            "subscript" => Mark::Subscript,
            other => return Mark::from_tag(other).ok_or_else(|| UnknownMark(s.to_string())),
        };
        Ok(mark)
    }
}
