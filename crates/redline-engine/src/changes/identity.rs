//! Structural node identity.
//!
//! Two nodes share an identity when they have the same kind, the same
//! attributes (ignoring transient keys such as editor-assigned ids) and the
//! same content. Text is compared after normalization, so a block whose only
//! difference is a non-breaking space or a curly quote keeps its identity.
//! Identity only aligns nodes; the diff still compares aligned nodes
//! exactly. Containers hash the identities of their children, Merkle style.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

use crate::matching::NormalizeOptions;
use crate::matching::normalize::normalize_query;
use crate::tree::{Attrs, Container, MarkSet, Node};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiffConfig {
    /// Text blocks whose old and new inline content together reach this many
    /// units are diffed character by character; shorter ones are replaced
    /// wholesale.
    pub text_diff_min_len: usize,
    /// Attribute keys left out of node identity.
    pub transient_attrs: Vec<String>,
}

impl Default for DiffConfig {
    fn default() -> Self {
        Self {
            text_diff_min_len: 60,
            transient_attrs: ["id", "data-id", "key", "selected"]
                .into_iter()
                .map(str::to_string)
                .collect(),
        }
    }
}

pub fn node_identity(node: &Node, config: &DiffConfig) -> u64 {
    let mut hasher = DefaultHasher::new();
    hash_node(node, config, &mut hasher);
    hasher.finish()
}

fn hash_node(node: &Node, config: &DiffConfig, hasher: &mut DefaultHasher) {
    match node {
        Node::Text(leaf) => {
            "text".hash(hasher);
            hash_run(&leaf.text, &leaf.marks, hasher);
        }
        Node::Break => "break".hash(hasher),
        Node::Embed(embed) => {
            "embed".hash(hasher);
            embed.name.hash(hasher);
            hash_attrs(&embed.attrs, config, hasher);
        }
        Node::Container(c) => {
            "container".hash(hasher);
            c.kind.hash(hasher);
            hash_attrs(&c.attrs, config, hasher);
            if c.kind.is_textblock() {
                hash_inline(c, config, hasher);
            } else {
                c.content.len().hash(hasher);
                for child in &c.content {
                    node_identity(child, config).hash(hasher);
                }
            }
        }
    }
}

fn hash_attrs(attrs: &Attrs, config: &DiffConfig, hasher: &mut DefaultHasher) {
    for (key, value) in attrs {
        if config.transient_attrs.iter().any(|t| t == key) {
            continue;
        }
        key.hash(hasher);
        value.hash(hasher);
    }
}

/// Hashes inline content as maximal equally-marked runs, so the way text
/// happens to be split into leaves does not matter.
fn hash_inline(block: &Container, config: &DiffConfig, hasher: &mut DefaultHasher) {
    let mut run = String::new();
    let mut run_marks: Option<&MarkSet> = None;
    for child in &block.content {
        match child {
            Node::Text(leaf) => {
                if let Some(marks) = run_marks
                    && marks != &leaf.marks
                {
                    hash_run(&run, marks, hasher);
                    run.clear();
                }
                run.push_str(&leaf.text);
                run_marks = Some(&leaf.marks);
            }
            other => {
                if let Some(marks) = run_marks.take() {
                    hash_run(&run, marks, hasher);
                    run.clear();
                }
                node_identity(other, config).hash(hasher);
            }
        }
    }
    if let Some(marks) = run_marks {
        hash_run(&run, marks, hasher);
    }
}

fn hash_run(text: &str, marks: &MarkSet, hasher: &mut DefaultHasher) {
    let summary: String = normalize_query(text, &NormalizeOptions::default()).into_iter().collect();
    summary.hash(hasher);
    marks.hash(hasher);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::{ContainerKind, Mark};

    fn id(node: &Node) -> u64 {
        node_identity(node, &DiffConfig::default())
    }

    #[test]
    fn equal_blocks_share_identity() {
        assert_eq!(id(&Node::paragraph("Hello world")), id(&Node::paragraph("Hello world")));
        assert_ne!(id(&Node::paragraph("Hello world")), id(&Node::paragraph("Hello there")));
    }

    #[test]
    fn kind_is_part_of_identity() {
        assert_ne!(id(&Node::paragraph("Facts")), id(&Node::heading(1, "Facts")));
        assert_ne!(id(&Node::heading(1, "Facts")), id(&Node::heading(2, "Facts")));
    }

    #[test]
    fn marks_are_part_of_identity() {
        let bold = Node::container(
            ContainerKind::Paragraph,
            vec![Node::marked_text("Facts", [Mark::Bold].into_iter().collect())],
        );
        assert_ne!(id(&bold), id(&Node::paragraph("Facts")));
    }

    #[test]
    fn leaf_splits_and_spacing_variants_do_not_matter() {
        let split = Node::container(
            ContainerKind::Paragraph,
            vec![Node::text("Hello "), Node::text("world")],
        );
        assert_eq!(id(&split), id(&Node::paragraph("Hello world")));
        assert_eq!(id(&Node::paragraph("Hello\u{00A0}world")), id(&Node::paragraph("Hello world")));
    }

    #[test]
    fn transient_attributes_are_ignored() {
        let mut tagged = Node::paragraph("Hello");
        if let Node::Container(c) = &mut tagged {
            c.attrs.insert("id".to_string(), "p-17".to_string());
        }
        assert_eq!(id(&tagged), id(&Node::paragraph("Hello")));

        if let Node::Container(c) = &mut tagged {
            c.attrs.insert("align".to_string(), "center".to_string());
        }
        assert_ne!(id(&tagged), id(&Node::paragraph("Hello")));
    }

    #[test]
    fn containers_hash_their_children() {
        let quote = |text: &str| Node::container(ContainerKind::BlockQuote, vec![Node::paragraph(text)]);
        assert_eq!(id(&quote("a")), id(&quote("a")));
        assert_ne!(id(&quote("a")), id(&quote("b")));
    }
}
