//! Rewrites a [`Delta`] into change annotations.
//!
//! Removed content is kept inside a `deleted` annotation and added content is
//! wrapped in an `added` one, all stamped with the same change id. A removed
//! `deleted` annotation is kept as it is, never wrapped again. Inline content
//! rebuilt from units keeps the `added` annotations it sat in, with the new
//! annotation nested inside them.

use std::ops::Range;

use thiserror::Error;

use crate::changes::diff::{Delta, Detail, InlineStep, InlineUnit, Leaf, Step, inline_units};
use crate::tree::{ChangeAttrs, ChangeType, Container, Node, SemanticType, canonicalize};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MergeError {
    #[error("delta refers to missing {side} node {index}")]
    MissingNode { side: &'static str, index: usize },
    #[error("delta refers to missing {side} inline units {range:?}")]
    MissingUnits { side: &'static str, range: Range<usize> },
    #[error("delta does not fit the trees: {0}")]
    ShapeMismatch(String),
}

/// Builds the annotated tree. An empty delta yields `new` unchanged.
pub fn merge(old: &[Node], new: &[Node], delta: &Delta, change_id: &str) -> Result<Vec<Node>, MergeError> {
    if delta.is_empty() {
        return Ok(new.to_vec());
    }
    let stamp = Stamp { change_id };
    let merged = merge_steps(old, new, &delta.steps, &stamp)?;
    Ok(canonicalize(merged))
}

struct Stamp<'a> {
    change_id: &'a str,
}

impl Stamp<'_> {
    fn attrs(&self, change_type: ChangeType, semantic_type: SemanticType) -> ChangeAttrs {
        ChangeAttrs {
            change_type,
            change_id: self.change_id.to_string(),
            semantic_type,
        }
    }

    fn removed(&self, node: &Node, semantic_type: SemanticType) -> Node {
        if node.is_deleted_change() {
            return node.clone();
        }
        Node::change(self.attrs(ChangeType::Deleted, semantic_type), vec![node.clone()])
    }

    fn added(&self, node: &Node, semantic_type: SemanticType) -> Node {
        Node::change(self.attrs(ChangeType::Added, semantic_type), vec![node.clone()])
    }
}

fn node<'n>(nodes: &'n [Node], index: usize, side: &'static str) -> Result<&'n Node, MergeError> {
    nodes.get(index).ok_or(MergeError::MissingNode { side, index })
}

fn merge_steps(old: &[Node], new: &[Node], steps: &[Step], stamp: &Stamp) -> Result<Vec<Node>, MergeError> {
    let mut out = Vec::with_capacity(steps.len());
    for step in steps {
        match step {
            Step::Same { new: j, .. } => out.push(node(new, *j, "new")?.clone()),
            Step::Removed { old: i } => out.push(stamp.removed(node(old, *i, "old")?, SemanticType::Deletion)),
            Step::Added { new: j } => out.push(stamp.added(node(new, *j, "new")?, SemanticType::Insertion)),
            Step::MovedFrom { old: i, .. } => out.push(stamp.removed(node(old, *i, "old")?, SemanticType::Move)),
            Step::MovedTo { new: j, .. } => out.push(stamp.added(node(new, *j, "new")?, SemanticType::Move)),
            Step::Changed { old: i, new: j, detail } => {
                out.push(merge_changed(node(old, *i, "old")?, node(new, *j, "new")?, detail, stamp)?)
            }
        }
    }
    Ok(out)
}

fn merge_changed(old: &Node, new: &Node, detail: &Detail, stamp: &Stamp) -> Result<Node, MergeError> {
    let (Node::Container(old), Node::Container(new)) = (old, new) else {
        return Err(MergeError::ShapeMismatch("changed step on a leaf".to_string()));
    };
    let content = match detail {
        Detail::Children(steps) => merge_steps(&old.content, &new.content, steps, stamp)?,
        Detail::Inline(steps) if new.kind.is_textblock() => {
            merge_inline(&inline_units(&old.content), &inline_units(&new.content), steps, stamp)?
        }
        Detail::Inline(_) => {
            return Err(MergeError::ShapeMismatch(format!(
                "inline steps on a {} container",
                new.kind.label()
            )));
        }
    };
    Ok(Node::Container(Container {
        kind: new.kind.clone(),
        attrs: new.attrs.clone(),
        content,
    }))
}

/// A leaf together with the annotations it ends up inside, outermost first.
struct Placed {
    within: Vec<ChangeAttrs>,
    leaf: Leaf,
}

fn units<'u>(units: &'u [InlineUnit], range: &Range<usize>, side: &'static str) -> Result<&'u [InlineUnit], MergeError> {
    units.get(range.clone()).ok_or(MergeError::MissingUnits {
        side,
        range: range.clone(),
    })
}

fn merge_inline(
    before: &[InlineUnit],
    after: &[InlineUnit],
    steps: &[InlineStep],
    stamp: &Stamp,
) -> Result<Vec<Node>, MergeError> {
    let mut placed = Vec::new();
    let mut k = 0;
    while k < steps.len() {
        match &steps[k] {
            InlineStep::Same { new, .. } => {
                placed.extend(units(after, new, "new")?.iter().map(|u| Placed {
                    within: u.within.clone(),
                    leaf: u.leaf.clone(),
                }));
            }
            InlineStep::Removed { old } => {
                let removed = units(before, old, "old")?;
                let replacement = match steps.get(k + 1) {
                    Some(InlineStep::Added { new }) => Some(units(after, new, "new")?),
                    _ => None,
                };
                let semantic_type = match replacement {
                    Some(added) if plain_text(removed) == plain_text(added) => SemanticType::Formatting,
                    Some(_) => SemanticType::Replacement,
                    None => SemanticType::Deletion,
                };
                place_removed(&mut placed, removed, stamp.attrs(ChangeType::Deleted, semantic_type));
                if let Some(added) = replacement {
                    place_added(&mut placed, added, stamp.attrs(ChangeType::Added, semantic_type));
                    k += 1;
                }
            }
            InlineStep::Added { new } => {
                let added = units(after, new, "new")?;
                place_added(&mut placed, added, stamp.attrs(ChangeType::Added, SemanticType::Insertion));
            }
        }
        k += 1;
    }
    Ok(canonicalize(build_inline(&placed, 0)))
}

fn plain_text(units: &[InlineUnit]) -> String {
    units
        .iter()
        .filter_map(|u| match &u.leaf {
            Leaf::Char(ch, _) => Some(*ch),
            Leaf::Break => Some('\n'),
            _ => None,
        })
        .collect()
}

fn place_removed(placed: &mut Vec<Placed>, removed: &[InlineUnit], attrs: ChangeAttrs) {
    for unit in removed {
        let already_deleted = matches!(&unit.leaf, Leaf::Opaque(node) if node.is_deleted_change());
        let mut within = Vec::with_capacity(unit.within.len() + 1);
        if !already_deleted {
            within.push(attrs.clone());
        }
        within.extend(unit.within.iter().cloned());
        placed.push(Placed {
            within,
            leaf: unit.leaf.clone(),
        });
    }
}

fn place_added(placed: &mut Vec<Placed>, added: &[InlineUnit], attrs: ChangeAttrs) {
    for unit in added {
        let mut within = unit.within.clone();
        within.push(attrs.clone());
        placed.push(Placed {
            within,
            leaf: unit.leaf.clone(),
        });
    }
}

/// Groups consecutive leaves sharing an annotation at `depth` into one
/// change container, recursively.
fn build_inline(placed: &[Placed], depth: usize) -> Vec<Node> {
    let mut out = Vec::new();
    let mut i = 0;
    while i < placed.len() {
        match placed[i].within.get(depth) {
            None => {
                out.push(leaf_node(&placed[i].leaf));
                i += 1;
            }
            Some(attrs) => {
                let start = i;
                while i < placed.len() && placed[i].within.get(depth) == Some(attrs) {
                    i += 1;
                }
                out.push(Node::change(attrs.clone(), build_inline(&placed[start..i], depth + 1)));
            }
        }
    }
    out
}

fn leaf_node(leaf: &Leaf) -> Node {
    match leaf {
        Leaf::Char(ch, marks) => Node::marked_text(ch.to_string(), marks.clone()),
        Leaf::Break => Node::Break,
        Leaf::Embed(embed) => Node::Embed(embed.clone()),
        Leaf::Opaque(node) => node.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::changes::diff::diff;
    use crate::changes::identity::DiffConfig;
    use crate::tree::{ContainerKind, Mark, MarkSet};
    use pretty_assertions::assert_eq;

    const ID: &str = "c1";

    fn attrs(change_type: ChangeType, semantic_type: SemanticType) -> ChangeAttrs {
        ChangeAttrs {
            change_type,
            change_id: ID.to_string(),
            semantic_type,
        }
    }

    fn added(semantic: SemanticType, content: Vec<Node>) -> Node {
        Node::change(attrs(ChangeType::Added, semantic), content)
    }

    fn deleted(semantic: SemanticType, content: Vec<Node>) -> Node {
        Node::change(attrs(ChangeType::Deleted, semantic), content)
    }

    fn para(content: Vec<Node>) -> Node {
        Node::container(ContainerKind::Paragraph, content)
    }

    fn tracked(old: &[Node], new: &[Node]) -> Vec<Node> {
        let delta = diff(old, new, &DiffConfig::default());
        merge(old, new, &delta, ID).unwrap()
    }

    #[test]
    fn empty_delta_returns_the_tree() {
        let tree = vec![Node::paragraph("Hello world"), Node::paragraph("Hello again")];
        let delta = diff(&tree, &tree, &DiffConfig::default());
        assert_eq!(merge(&tree, &tree, &delta, ID).unwrap(), tree);
    }

    #[test]
    fn short_edit_is_a_replacement() {
        let merged = tracked(&[Node::paragraph("Hello world")], &[Node::paragraph("Hi world")]);
        assert_eq!(
            merged,
            vec![para(vec![
                deleted(SemanticType::Replacement, vec![Node::text("Hello world")]),
                added(SemanticType::Replacement, vec![Node::text("Hi world")]),
            ])]
        );
    }

    #[test]
    fn long_edit_annotates_only_the_difference() {
        let old = "The court held that the statute of limitations had run on the claim.";
        let new = "The court held that the statute of limitations had plainly run on the claim.";
        let merged = tracked(&[Node::paragraph(old)], &[Node::paragraph(new)]);
        let Node::Container(block) = &merged[0] else {
            panic!("expected a paragraph");
        };
        let annotations: Vec<&Node> = block
            .content
            .iter()
            .filter(|n| n.change_attrs().is_some())
            .collect();
        assert_eq!(annotations.len(), 1);
        assert_eq!(annotations[0].change_attrs(), Some(&attrs(ChangeType::Added, SemanticType::Insertion)));
        assert_eq!(annotations[0].text_content().trim(), "plainly");
        assert_eq!(merged[0].live_text(), new);
    }

    #[test]
    fn removed_blocks_are_kept_as_deleted() {
        let merged = tracked(
            &[Node::paragraph("one"), Node::paragraph("two")],
            &[Node::paragraph("one")],
        );
        assert_eq!(
            merged,
            vec![
                Node::paragraph("one"),
                deleted(SemanticType::Deletion, vec![Node::paragraph("two")]),
            ]
        );
    }

    #[test]
    fn existing_deletions_are_not_wrapped_again() {
        let earlier = Node::change(
            ChangeAttrs {
                change_type: ChangeType::Deleted,
                change_id: "c0".to_string(),
                semantic_type: SemanticType::Deletion,
            },
            vec![Node::paragraph("gone")],
        );
        let merged = tracked(&[Node::paragraph("keep"), earlier.clone()], &[Node::paragraph("keep")]);
        assert_eq!(merged, vec![Node::paragraph("keep"), earlier]);
    }

    #[test]
    fn moves_are_marked_as_moves() {
        let merged = tracked(
            &[Node::paragraph("one"), Node::paragraph("two"), Node::paragraph("three")],
            &[Node::paragraph("two"), Node::paragraph("three"), Node::paragraph("one")],
        );
        assert_eq!(
            merged,
            vec![
                deleted(SemanticType::Move, vec![Node::paragraph("one")]),
                Node::paragraph("two"),
                Node::paragraph("three"),
                added(SemanticType::Move, vec![Node::paragraph("one")]),
            ]
        );
    }

    #[test]
    fn mark_only_changes_are_formatting() {
        let bold: MarkSet = [Mark::Bold].into_iter().collect();
        let merged = tracked(
            &[Node::paragraph("Facts")],
            &[para(vec![Node::marked_text("Facts", bold.clone())])],
        );
        assert_eq!(
            merged,
            vec![para(vec![
                deleted(SemanticType::Formatting, vec![Node::text("Facts")]),
                added(SemanticType::Formatting, vec![Node::marked_text("Facts", bold)]),
            ])]
        );
    }

    #[test]
    fn edits_inside_pending_insertions_nest() {
        let earlier = ChangeAttrs {
            change_type: ChangeType::Added,
            change_id: "c0".to_string(),
            semantic_type: SemanticType::Insertion,
        };
        let lead = "The parties to this agreement acknowledge that ";
        let old = para(vec![Node::text(lead), Node::change(earlier.clone(), vec![Node::text("foo")])]);
        let new = para(vec![Node::text(lead), Node::change(earlier.clone(), vec![Node::text("bar")])]);
        let merged = tracked(&[old], &[new]);
        assert_eq!(
            merged,
            vec![para(vec![
                Node::text(lead),
                deleted(
                    SemanticType::Replacement,
                    vec![Node::change(earlier.clone(), vec![Node::text("foo")])],
                ),
                Node::change(
                    earlier,
                    vec![added(SemanticType::Replacement, vec![Node::text("bar")])],
                ),
            ])]
        );
    }

    #[test]
    fn inline_steps_on_a_structural_container_fail() {
        let quote = Node::container(ContainerKind::BlockQuote, vec![Node::paragraph("a")]);
        let delta = Delta {
            steps: vec![Step::Changed {
                old: 0,
                new: 0,
                detail: Box::new(Detail::Inline(vec![])),
            }],
        };
        assert!(matches!(
            merge(&[quote.clone()], &[quote], &delta, ID),
            Err(MergeError::ShapeMismatch(_))
        ));
    }

    #[test]
    fn missing_nodes_fail() {
        let delta = Delta {
            steps: vec![Step::Added { new: 3 }],
        };
        assert_eq!(
            merge(&[], &[], &delta, ID),
            Err(MergeError::MissingNode { side: "new", index: 3 })
        );
    }
}
