use std::borrow::Cow;
use std::fmt;

use regex::Regex;

use crate::editing::EditError;
use crate::editing::markup::parse_markup;
use crate::tree::{ContainerKind, MarkSet, Node};

/// Block kinds that `add_block` can construct.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlockKind {
    Paragraph,
    Heading(u8),
    BlockQuote,
    BulletList,
    OrderedList,
    CodeBlock,
}

impl BlockKind {
    pub fn parse(name: &str, level: Option<u8>) -> Result<BlockKind, EditError> {
        let normalized = name.trim().to_ascii_lowercase().replace(['-', ' '], "_");
        let kind = match normalized.as_str() {
            "paragraph" | "p" => BlockKind::Paragraph,
            "heading" | "header" => {
                let level = level.unwrap_or(1);
                if !(1..=6).contains(&level) {
                    return Err(EditError::UnsupportedKind(format!("heading level {level}")));
                }
                BlockKind::Heading(level)
            }
            "blockquote" | "block_quote" | "quote" => BlockKind::BlockQuote,
            "bullet_list" | "bulletlist" | "unordered_list" => BlockKind::BulletList,
            "ordered_list" | "orderedlist" | "numbered_list" => BlockKind::OrderedList,
            "code_block" | "codeblock" | "code" => BlockKind::CodeBlock,
            _ => return Err(EditError::UnsupportedKind(name.to_string())),
        };
        Ok(kind)
    }

    pub fn container_kind(self) -> ContainerKind {
        match self {
            BlockKind::Paragraph => ContainerKind::Paragraph,
            BlockKind::Heading(level) => ContainerKind::Heading { level },
            BlockKind::BlockQuote => ContainerKind::BlockQuote,
            BlockKind::BulletList => ContainerKind::BulletList,
            BlockKind::OrderedList => ContainerKind::OrderedList,
            BlockKind::CodeBlock => ContainerKind::CodeBlock { language: None },
        }
    }
}

impl fmt::Display for BlockKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.container_kind().label())
    }
}

/// Builds the block inserted by `add_block`.
pub fn build_block(kind: BlockKind, text: &str) -> Node {
    let content = match kind {
        BlockKind::Paragraph | BlockKind::Heading(_) => parse_markup(text, &MarkSet::new()),
        BlockKind::BlockQuote => {
            let mut paragraphs: Vec<Node> = text
                .lines()
                .filter(|line| !line.trim().is_empty())
                .map(paragraph_with_markup)
                .collect();
            if paragraphs.is_empty() {
                paragraphs.push(Node::paragraph(""));
            }
            paragraphs
        }
        BlockKind::BulletList | BlockKind::OrderedList => {
            let mut items: Vec<Node> = text
                .lines()
                .filter(|line| !line.trim().is_empty())
                .map(|line| {
                    let item = strip_list_marker(line);
                    Node::container(ContainerKind::ListItem, vec![paragraph_with_markup(&item)])
                })
                .collect();
            if items.is_empty() {
                items.push(Node::container(ContainerKind::ListItem, vec![Node::paragraph("")]));
            }
            items
        }
        BlockKind::CodeBlock if text.is_empty() => Vec::new(),
        BlockKind::CodeBlock => vec![Node::text(text)],
    };
    Node::container(kind.container_kind(), content)
}

/// Drops a leading `- `, `* `, `• `, `1. ` or `1) ` marker.
fn strip_list_marker(line: &str) -> Cow<'_, str> {
    use std::sync::OnceLock;

    static LIST_MARKER: OnceLock<Regex> = OnceLock::new();
    let marker = LIST_MARKER
        .get_or_init(|| Regex::new(r"^\s*(?:[-*•]|\d+[.)])\s+").expect("Invalid list marker regex"));
    marker.replace(line, "")
}

fn paragraph_with_markup(line: &str) -> Node {
    Node::container(ContainerKind::Paragraph, parse_markup(line.trim(), &MarkSet::new()))
}
