//! Flattening a document tree into plain text with a position back-mapping.
//!
//! Text offsets count characters (Unicode scalar values), matching the unit
//! that text leaves occupy in position space.

use serde::{Deserialize, Serialize};

use crate::tree::Node;

/// One contiguous span of projected text and the positions it came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TextRange {
    pub text_start: usize,
    pub text_end: usize,
    pub pos_start: usize,
    pub pos_end: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectionOptions {
    /// Text emitted between consecutive text blocks. `None` concatenates
    /// blocks with nothing in between.
    pub block_separator: Option<String>,
}

impl Default for ProjectionOptions {
    fn default() -> Self {
        Self {
            block_separator: Some("\n".to_string()),
        }
    }
}

impl ProjectionOptions {
    pub fn raw() -> Self {
        Self {
            block_separator: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Projection {
    pub text: String,
    pub ranges: Vec<TextRange>,
}

impl Projection {
    /// Length of `text` in characters.
    pub fn len(&self) -> usize {
        self.ranges.last().map_or(0, |r| r.text_end)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn offset_to_pos(&self, offset: usize) -> Option<usize> {
        map_offset_to_pos(offset, &self.ranges)
    }

    pub fn offset_to_pos_end(&self, offset: usize) -> Option<usize> {
        map_offset_to_pos_end(offset, &self.ranges)
    }

    pub fn pos_to_offset(&self, pos: usize) -> Option<usize> {
        map_pos_to_offset(pos, &self.ranges)
    }
}

/// Depth-first projection. Deleted change annotations contribute neither
/// text nor ranges but still consume their full size in positions.
pub fn project(nodes: &[Node], options: &ProjectionOptions) -> Projection {
    let mut projector = Projector {
        separator: options.block_separator.as_deref().filter(|s| !s.is_empty()),
        out: Projection::default(),
        chars: 0,
        pos: 0,
        previous_block_end: None,
    };
    for node in nodes {
        projector.walk(node);
    }
    projector.out
}

struct Projector<'a> {
    separator: Option<&'a str>,
    out: Projection,
    chars: usize,
    pos: usize,
    /// Position right after the content of the last text block entered.
    previous_block_end: Option<usize>,
}

impl Projector<'_> {
    fn walk(&mut self, node: &Node) {
        match node {
            Node::Text(leaf) => {
                let n = leaf.text.chars().count();
                if n > 0 {
                    self.emit(&leaf.text, n, self.pos, self.pos + n);
                    self.pos += n;
                }
            }
            Node::Break => {
                self.emit("\n", 1, self.pos, self.pos + 1);
                self.pos += 1;
            }
            Node::Embed(_) => self.pos += 1,
            Node::Container(c) if c.is_deleted_change() => self.pos += node.size(),
            Node::Container(c) => {
                let textblock = c.kind.is_textblock();
                if textblock
                    && let (Some(sep), Some(end)) = (self.separator, self.previous_block_end)
                {
                    self.emit(sep, sep.chars().count(), end, end);
                }
                self.pos += 1;
                for child in &c.content {
                    self.walk(child);
                }
                if textblock {
                    self.previous_block_end = Some(self.pos);
                }
                self.pos += 1;
            }
        }
    }

    fn emit(&mut self, text: &str, len: usize, pos_start: usize, pos_end: usize) {
        self.out.text.push_str(text);
        self.out.ranges.push(TextRange {
            text_start: self.chars,
            text_end: self.chars + len,
            pos_start,
            pos_end,
        });
        self.chars += len;
    }
}

/// Maps a text offset to a position. An offset shared by two ranges
/// resolves to the start of the later one; the end of the text resolves to
/// the last range's `pos_end`.
pub fn map_offset_to_pos(offset: usize, ranges: &[TextRange]) -> Option<usize> {
    let i = ranges.partition_point(|r| r.text_end <= offset);
    if let Some(r) = ranges.get(i)
        && r.text_start <= offset
    {
        return Some((r.pos_start + offset - r.text_start).min(r.pos_end));
    }
    match ranges.last() {
        Some(r) if r.text_end == offset => Some(r.pos_end),
        _ => None,
    }
}

/// Maps an exclusive end offset to the position right after the character
/// before it. An offset shared by two ranges resolves into the earlier one.
pub fn map_offset_to_pos_end(offset: usize, ranges: &[TextRange]) -> Option<usize> {
    if offset == 0 {
        return ranges.first().map(|r| r.pos_start);
    }
    let i = ranges.partition_point(|r| r.text_end < offset);
    let r = ranges.get(i)?;
    (r.text_start < offset).then(|| (r.pos_start + offset - r.text_start).min(r.pos_end))
}

/// Inverse of [`map_offset_to_pos`] for positions that carry text.
pub fn map_pos_to_offset(pos: usize, ranges: &[TextRange]) -> Option<usize> {
    let i = ranges.partition_point(|r| r.pos_end < pos);
    let r = ranges.get(i)?;
    (r.pos_start <= pos)
        .then(|| r.text_start + (pos - r.pos_start).min(r.text_end - r.text_start))
}
