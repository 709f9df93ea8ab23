//! # Document Tree
//!
//! Closed, typed representation of a rich-text document.
//!
//! ## Position Addressing
//!
//! Every node occupies a fixed number of position units:
//!
//! - a **container** takes one unit for its opening boundary, one for its
//!   closing boundary, plus the size of its children;
//! - a **text leaf** takes one unit per character (Unicode scalar value);
//! - a **hard break** or **embed** takes exactly one unit.
//!
//! The root's own boundaries are not counted, so positions run from `0` to
//! [`Document::content_size`] and the first character of the first paragraph
//! sits at position `1`.
//!
//! ## Modules
//!
//! - **`marks`**: `Mark` enum and `MarkSet`
//! - **`tokens`**: flat boundary-token stream mirroring the addressing scheme
//! - **`edit`**: position-addressed tree mutations built on the token stream

pub mod edit;
pub mod marks;
pub mod tokens;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::changes::ChangeGroup;

pub use marks::{Mark, MarkSet, UnknownMark};

/// Free-form container/embed attributes, ordered for stable hashing.
pub type Attrs = BTreeMap<String, String>;

/// Errors raised by position-addressed tree mutations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TreeError {
    #[error("position {pos} is outside the document (size {size})")]
    OutOfBounds { pos: usize, size: usize },
    #[error("range {from}..{to} is inverted")]
    InvertedRange { from: usize, to: usize },
    #[error("container boundaries are unbalanced")]
    Unbalanced,
    #[error("no editable text position near {0}")]
    NoInlinePosition(usize),
    #[error("position {0} is not between top-level blocks")]
    NotBlockBoundary(usize),
}

/// Whether a change annotation marks content as added or deleted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeType {
    Added,
    Deleted,
}

/// Reviewer-facing classification of a change annotation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SemanticType {
    Insertion,
    Deletion,
    Replacement,
    Formatting,
    Move,
}

impl SemanticType {
    pub fn name(self) -> &'static str {
        match self {
            SemanticType::Insertion => "insertion",
            SemanticType::Deletion => "deletion",
            SemanticType::Replacement => "replacement",
            SemanticType::Formatting => "formatting",
            SemanticType::Move => "move",
        }
    }
}

/// Attributes of a change annotation container.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeAttrs {
    pub change_type: ChangeType,
    pub change_id: String,
    pub semantic_type: SemanticType,
}

/// Kind tag of a container node.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ContainerKind {
    Paragraph,
    Heading {
        level: u8,
    },
    BlockQuote,
    BulletList,
    OrderedList,
    ListItem,
    CodeBlock {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        language: Option<String>,
    },
    /// Tracked-change annotation wrapping added or deleted content.
    Change(ChangeAttrs),
    /// Any container kind the core does not interpret.
    Custom {
        name: String,
    },
}

impl ContainerKind {
    /// Containers whose children are inline content (text, breaks, embeds).
    pub fn is_textblock(&self) -> bool {
        matches!(
            self,
            ContainerKind::Paragraph | ContainerKind::Heading { .. } | ContainerKind::CodeBlock { .. }
        )
    }

    pub fn change(&self) -> Option<&ChangeAttrs> {
        match self {
            ContainerKind::Change(attrs) => Some(attrs),
            _ => None,
        }
    }

    pub fn is_deleted_change(&self) -> bool {
        matches!(self.change(), Some(attrs) if attrs.change_type == ChangeType::Deleted)
    }

    /// Short label used in outlines and logs.
    pub fn label(&self) -> String {
        match self {
            ContainerKind::Paragraph => "paragraph".to_string(),
            ContainerKind::Heading { level } => format!("heading({level})"),
            ContainerKind::BlockQuote => "blockquote".to_string(),
            ContainerKind::BulletList => "bullet_list".to_string(),
            ContainerKind::OrderedList => "ordered_list".to_string(),
            ContainerKind::ListItem => "list_item".to_string(),
            ContainerKind::CodeBlock { language: None } => "code_block".to_string(),
            ContainerKind::CodeBlock { language: Some(lang) } => format!("code_block({lang})"),
            ContainerKind::Change(attrs) => match attrs.change_type {
                ChangeType::Added => "added".to_string(),
                ChangeType::Deleted => "deleted".to_string(),
            },
            ContainerKind::Custom { name } => name.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Container {
    #[serde(flatten)]
    pub kind: ContainerKind,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attrs: Attrs,
    #[serde(default)]
    pub content: Vec<Node>,
}

impl Container {
    pub fn new(kind: ContainerKind, content: Vec<Node>) -> Self {
        Self {
            kind,
            attrs: Attrs::new(),
            content,
        }
    }

    pub fn is_deleted_change(&self) -> bool {
        self.kind.is_deleted_change()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TextLeaf {
    pub text: String,
    #[serde(default, skip_serializing_if = "MarkSet::is_empty")]
    pub marks: MarkSet,
}

/// Atomic, text-free leaf such as an image or footnote reference.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Embed {
    pub name: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attrs: Attrs,
}

/// A node of the document tree.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Node {
    Container(Container),
    Text(TextLeaf),
    /// Hard line break; projects as `\n`.
    Break,
    Embed(Embed),
}

impl Node {
    pub fn text(text: impl Into<String>) -> Node {
        Node::Text(TextLeaf {
            text: text.into(),
            marks: MarkSet::new(),
        })
    }

    pub fn marked_text(text: impl Into<String>, marks: MarkSet) -> Node {
        Node::Text(TextLeaf {
            text: text.into(),
            marks,
        })
    }

    pub fn container(kind: ContainerKind, content: Vec<Node>) -> Node {
        Node::Container(Container::new(kind, content))
    }

    /// Paragraph holding a single unmarked text leaf (no leaf when `text` is empty).
    pub fn paragraph(text: &str) -> Node {
        Node::container(ContainerKind::Paragraph, text_content(text))
    }

    pub fn heading(level: u8, text: &str) -> Node {
        Node::container(ContainerKind::Heading { level }, text_content(text))
    }

    pub fn change(attrs: ChangeAttrs, content: Vec<Node>) -> Node {
        Node::container(ContainerKind::Change(attrs), content)
    }

    /// Number of position units this node occupies.
    pub fn size(&self) -> usize {
        match self {
            Node::Container(c) => 2 + c.content.iter().map(Node::size).sum::<usize>(),
            Node::Text(leaf) => leaf.text.chars().count(),
            Node::Break | Node::Embed(_) => 1,
        }
    }

    pub fn as_container(&self) -> Option<&Container> {
        match self {
            Node::Container(c) => Some(c),
            _ => None,
        }
    }

    pub fn change_attrs(&self) -> Option<&ChangeAttrs> {
        self.as_container().and_then(|c| c.kind.change())
    }

    pub fn is_deleted_change(&self) -> bool {
        matches!(self, Node::Container(c) if c.is_deleted_change())
    }

    /// Inline nodes may appear directly inside a text block.
    pub fn is_inline(&self) -> bool {
        match self {
            Node::Text(_) | Node::Break | Node::Embed(_) => true,
            Node::Container(c) => {
                matches!(c.kind, ContainerKind::Change(_)) && c.content.iter().all(Node::is_inline)
            }
        }
    }

    /// Concatenated text of the subtree, including deleted content.
    pub fn text_content(&self) -> String {
        let mut out = String::new();
        self.collect_text(&mut out, true);
        out
    }

    /// Concatenated text of the subtree with deleted annotations skipped.
    pub fn live_text(&self) -> String {
        let mut out = String::new();
        self.collect_text(&mut out, false);
        out
    }

    fn collect_text(&self, out: &mut String, include_deleted: bool) {
        match self {
            Node::Text(leaf) => out.push_str(&leaf.text),
            Node::Break => out.push('\n'),
            Node::Embed(_) => {}
            Node::Container(c) => {
                if c.is_deleted_change() && !include_deleted {
                    return;
                }
                for child in &c.content {
                    child.collect_text(out, include_deleted);
                }
            }
        }
    }
}

fn text_content(text: &str) -> Vec<Node> {
    if text.is_empty() {
        Vec::new()
    } else {
        vec![Node::text(text)]
    }
}

/// A document: root content plus the change groups reviewing it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    #[serde(default)]
    pub content: Vec<Node>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub change_groups: Vec<ChangeGroup>,
}

impl Document {
    pub fn new(content: Vec<Node>) -> Self {
        Self {
            content,
            change_groups: Vec::new(),
        }
    }

    /// One unmarked paragraph per entry.
    pub fn from_paragraphs(paragraphs: &[&str]) -> Self {
        Self::new(paragraphs.iter().map(|p| Node::paragraph(p)).collect())
    }

    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }

    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    /// Largest valid position.
    pub fn content_size(&self) -> usize {
        self.content.iter().map(Node::size).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }

    /// Inserts an empty paragraph into an empty document. Returns true if repaired.
    pub fn ensure_not_empty(&mut self) -> bool {
        if self.content.is_empty() {
            self.content.push(Node::paragraph(""));
            true
        } else {
            false
        }
    }

    /// Live text of each top-level block, deleted content skipped.
    pub fn block_texts(&self) -> Vec<String> {
        self.content
            .iter()
            .filter(|n| !n.is_deleted_change())
            .map(Node::live_text)
            .collect()
    }

    /// Same document with content replaced, review metadata kept.
    pub fn with_content(&self, content: Vec<Node>) -> Document {
        Document {
            content,
            change_groups: self.change_groups.clone(),
        }
    }

    pub fn group(&self, change_id: &str) -> Option<&ChangeGroup> {
        self.change_groups.iter().find(|g| g.id == change_id)
    }
}

/// Merges adjacent equally-marked text leaves and drops empty leaves and
/// empty change annotations, recursively.
pub fn canonicalize(nodes: Vec<Node>) -> Vec<Node> {
    let mut out: Vec<Node> = Vec::with_capacity(nodes.len());
    for node in nodes {
        match node {
            Node::Text(leaf) if leaf.text.is_empty() => {}
            Node::Text(leaf) => {
                if let Some(Node::Text(prev)) = out.last_mut()
                    && prev.marks == leaf.marks
                {
                    prev.text.push_str(&leaf.text);
                } else {
                    out.push(Node::Text(leaf));
                }
            }
            Node::Container(mut c) => {
                c.content = canonicalize(c.content);
                if matches!(c.kind, ContainerKind::Change(_)) && c.content.is_empty() {
                    continue;
                }
                out.push(Node::Container(c));
            }
            other => out.push(other),
        }
    }
    out
}
