//! Structural checks on trees and projections, used by tests and by the
//! command line before writing a document.

use thiserror::Error;

use crate::projection::Projection;
use crate::tree::tokens::{Token, TokenStream};
use crate::tree::{ContainerKind, Node, canonicalize};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Violation {
    #[error("inline content directly inside {0}")]
    InlineOutsideTextblock(String),
    #[error("{child} inside text block {parent}")]
    BlockInsideTextblock { parent: String, child: String },
    #[error("empty text leaf")]
    EmptyText,
    #[error("change annotation {0:?} has no content")]
    EmptyAnnotation(String),
    #[error("heading level {0} outside 1..=6")]
    HeadingLevel(u8),
    #[error("token stream of {tokens} units does not rebuild a tree of size {size}")]
    TokenRoundTrip { tokens: usize, size: usize },
    #[error("projection range {index}: {reason}")]
    Projection { index: usize, reason: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Context {
    Blocks,
    Inline,
}

pub fn check_tree(nodes: &[Node]) -> Result<(), Violation> {
    for node in nodes {
        check_node(node, Context::Blocks, "document")?;
    }

    let size: usize = nodes.iter().map(Node::size).sum();
    let stream = TokenStream::from_nodes(nodes);
    let tokens = stream.len();
    let rebuilt = stream.into_nodes().ok();
    if tokens != size || rebuilt.as_deref() != Some(canonicalize(nodes.to_vec()).as_slice()) {
        return Err(Violation::TokenRoundTrip { tokens, size });
    }
    Ok(())
}

fn check_node(node: &Node, context: Context, parent: &str) -> Result<(), Violation> {
    let c = match node {
        Node::Text(leaf) if leaf.text.is_empty() => return Err(Violation::EmptyText),
        Node::Text(_) | Node::Break | Node::Embed(_) => {
            return match context {
                Context::Inline => Ok(()),
                Context::Blocks => Err(Violation::InlineOutsideTextblock(parent.to_string())),
            };
        }
        Node::Container(c) => c,
    };

    let label = c.kind.label();
    let inner = match &c.kind {
        ContainerKind::Change(attrs) => {
            if c.content.is_empty() {
                return Err(Violation::EmptyAnnotation(attrs.change_id.clone()));
            }
            context
        }
        _ if context == Context::Inline => {
            return Err(Violation::BlockInsideTextblock {
                parent: parent.to_string(),
                child: label,
            });
        }
        ContainerKind::Heading { level } if !(1..=6).contains(level) => {
            return Err(Violation::HeadingLevel(*level));
        }
        kind if kind.is_textblock() => Context::Inline,
        _ => Context::Blocks,
    };
    for child in &c.content {
        check_node(child, inner, &label)?;
    }
    Ok(())
}

/// Ranges are contiguous and cover `text`; every non-separator range maps
/// character for character onto live tokens.
pub fn check_projection(nodes: &[Node], projection: &Projection) -> Result<(), Violation> {
    let stream = TokenStream::from_nodes(nodes);
    let tokens = stream.tokens();
    let deleted = stream.deleted_mask();
    let text: Vec<char> = projection.text.chars().collect();
    let fail = |index: usize, reason: String| Err(Violation::Projection { index, reason });

    let mut expected_start = 0;
    let mut last_pos = 0;
    for (index, range) in projection.ranges.iter().enumerate() {
        if range.text_start != expected_start {
            return fail(index, format!("starts at {} instead of {expected_start}", range.text_start));
        }
        if range.text_end < range.text_start || range.pos_end < range.pos_start {
            return fail(index, "inverted".to_string());
        }
        if range.pos_start < last_pos || range.pos_end > tokens.len() {
            return fail(index, format!("positions {}..{} out of order", range.pos_start, range.pos_end));
        }
        expected_start = range.text_end;
        last_pos = range.pos_end;

        // zero-width ranges are block separators
        if range.pos_start == range.pos_end {
            continue;
        }
        if range.text_end - range.text_start != range.pos_end - range.pos_start {
            return fail(index, "text and position spans differ in length".to_string());
        }
        for (offset, pos) in (range.text_start..range.text_end).zip(range.pos_start..range.pos_end) {
            let ch = text.get(offset).copied();
            let token_ch = match &tokens[pos] {
                Token::Char(c, _) => Some(*c),
                Token::Break => Some('\n'),
                _ => None,
            };
            if deleted[pos] || ch.is_none() || ch != token_ch {
                return fail(index, format!("offset {offset} does not match position {pos}"));
            }
        }
    }
    if expected_start != text.len() {
        return fail(projection.ranges.len(), format!("ranges end at {expected_start} of {}", text.len()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::projection::{ProjectionOptions, TextRange, project};
    use crate::tree::{ChangeAttrs, ChangeType, SemanticType};

    fn deleted(content: Vec<Node>) -> Node {
        Node::change(
            ChangeAttrs {
                change_type: ChangeType::Deleted,
                change_id: "c1".to_string(),
                semantic_type: SemanticType::Deletion,
            },
            content,
        )
    }

    fn sample() -> Vec<Node> {
        vec![
            Node::paragraph("Hello world"),
            Node::container(
                ContainerKind::BlockQuote,
                vec![Node::container(
                    ContainerKind::Paragraph,
                    vec![Node::text("a"), deleted(vec![Node::text("b")]), Node::Break, Node::text("c")],
                )],
            ),
            deleted(vec![Node::paragraph("gone")]),
        ]
    }

    #[test]
    fn well_formed_trees_pass() {
        assert_eq!(check_tree(&sample()), Ok(()));
    }

    #[test]
    fn inline_outside_text_block_fails() {
        let nodes = vec![Node::container(ContainerKind::BlockQuote, vec![Node::text("x")])];
        assert_eq!(
            check_tree(&nodes),
            Err(Violation::InlineOutsideTextblock("blockquote".to_string()))
        );
    }

    #[test]
    fn blocks_inside_text_blocks_fail() {
        let nodes = vec![Node::container(ContainerKind::Paragraph, vec![Node::paragraph("x")])];
        assert!(matches!(check_tree(&nodes), Err(Violation::BlockInsideTextblock { .. })));
    }

    #[test]
    fn bad_heading_levels_fail() {
        assert_eq!(check_tree(&[Node::heading(9, "x")]), Err(Violation::HeadingLevel(9)));
    }

    #[test]
    fn empty_annotations_fail() {
        let nodes = vec![Node::container(ContainerKind::Paragraph, vec![deleted(vec![])])];
        assert_eq!(check_tree(&nodes), Err(Violation::EmptyAnnotation("c1".to_string())));
    }

    #[test]
    fn projections_of_real_trees_pass() {
        let nodes = sample();
        for options in [ProjectionOptions::default(), ProjectionOptions::raw()] {
            let projection = project(&nodes, &options);
            assert_eq!(check_projection(&nodes, &projection), Ok(()));
        }
    }

    #[test]
    fn tampered_projections_fail() {
        let nodes = vec![Node::paragraph("Hello")];
        let mut projection = project(&nodes, &ProjectionOptions::default());
        projection.ranges[0] = TextRange {
            text_start: 0,
            text_end: 5,
            pos_start: 0,
            pos_end: 5,
        };
        assert!(check_projection(&nodes, &projection).is_err());
    }
}
