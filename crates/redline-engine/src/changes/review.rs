//! Accepting, rejecting and hiding change groups.
//!
//! Accepting keeps `added` content (the annotation is unwrapped) and drops
//! `deleted` content; rejecting does the opposite. Annotations nested inside
//! a resolved one are resolved with it when they belong to the same
//! selection and are left pending otherwise.

use thiserror::Error;

use crate::changes::GroupPatch;
use crate::tree::{ChangeAttrs, ChangeType, Document, Node, canonicalize};

const PREVIEW_CHARS: usize = 80;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReviewError {
    #[error("no change group {0:?}")]
    UnknownGroup(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Verdict {
    Accept,
    Reject,
}

/// Every annotation carrying `change_id`, with its position range in `nodes`.
pub fn collect_patches(nodes: &[Node], change_id: &str) -> Vec<GroupPatch> {
    let mut patches = Vec::new();
    let mut pos = 0;
    for node in nodes {
        collect(node, change_id, &mut pos, &mut patches);
    }
    patches
}

fn collect(node: &Node, change_id: &str, pos: &mut usize, out: &mut Vec<GroupPatch>) {
    let Node::Container(c) = node else {
        *pos += node.size();
        return;
    };
    if let Some(attrs) = c.kind.change()
        && attrs.change_id == change_id
    {
        out.push(GroupPatch {
            change_type: attrs.change_type,
            semantic_type: attrs.semantic_type,
            text: preview(&node.text_content()),
            from: *pos,
            to: *pos + node.size(),
        });
    }
    *pos += 1;
    for child in &c.content {
        collect(child, change_id, pos, out);
    }
    *pos += 1;
}

fn preview(text: &str) -> String {
    if text.chars().count() <= PREVIEW_CHARS {
        return text.to_string();
    }
    let mut short: String = text.chars().take(PREVIEW_CHARS).collect();
    short.push('…');
    short
}

pub fn accept_all(doc: &Document) -> Document {
    settle(doc, Verdict::Accept, &|_| true)
}

pub fn reject_all(doc: &Document) -> Document {
    settle(doc, Verdict::Reject, &|_| true)
}

pub fn accept_group(doc: &Document, change_id: &str) -> Result<Document, ReviewError> {
    ensure_known(doc, change_id)?;
    Ok(settle(doc, Verdict::Accept, &|attrs| attrs.change_id == change_id))
}

pub fn reject_group(doc: &Document, change_id: &str) -> Result<Document, ReviewError> {
    ensure_known(doc, change_id)?;
    Ok(settle(doc, Verdict::Reject, &|attrs| attrs.change_id == change_id))
}

/// Flips whether a group's annotations are shown; content is unchanged.
pub fn toggle_group_visibility(doc: &Document, change_id: &str) -> Result<Document, ReviewError> {
    let mut toggled = doc.clone();
    let group = toggled
        .change_groups
        .iter_mut()
        .find(|g| g.id == change_id)
        .ok_or_else(|| ReviewError::UnknownGroup(change_id.to_string()))?;
    group.visible = !group.visible;
    log::debug!("change group {change_id} visible: {}", group.visible);
    Ok(toggled)
}

fn ensure_known(doc: &Document, change_id: &str) -> Result<(), ReviewError> {
    if doc.group(change_id).is_some() || !collect_patches(&doc.content, change_id).is_empty() {
        Ok(())
    } else {
        Err(ReviewError::UnknownGroup(change_id.to_string()))
    }
}

fn settle(doc: &Document, verdict: Verdict, selects: &dyn Fn(&ChangeAttrs) -> bool) -> Document {
    let content = canonicalize(resolve(doc.content.clone(), verdict, selects));
    let mut settled = doc.with_content(content);
    settled.ensure_not_empty();

    // positions moved; groups with nothing left are resolved
    let mut groups = std::mem::take(&mut settled.change_groups);
    for group in &mut groups {
        group.patches = collect_patches(&settled.content, &group.id);
    }
    groups.retain(|g| !g.patches.is_empty());
    settled.change_groups = groups;
    settled
}

fn resolve(nodes: Vec<Node>, verdict: Verdict, selects: &dyn Fn(&ChangeAttrs) -> bool) -> Vec<Node> {
    let mut out = Vec::with_capacity(nodes.len());
    for node in nodes {
        let Node::Container(mut c) = node else {
            out.push(node);
            continue;
        };
        let selected = c.kind.change().filter(|attrs| selects(attrs)).map(|attrs| attrs.change_type);
        match (selected, verdict) {
            (Some(ChangeType::Added), Verdict::Accept) | (Some(ChangeType::Deleted), Verdict::Reject) => {
                out.extend(resolve(c.content, verdict, selects));
            }
            (Some(_), _) => {}
            (None, _) => {
                c.content = resolve(c.content, verdict, selects);
                out.push(Node::Container(c));
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::changes::{ChangeGroup, ChangeSource};
    use crate::tree::{ContainerKind, SemanticType};
    use chrono::Utc;
    use pretty_assertions::assert_eq;

    fn change(change_type: ChangeType, id: &str, content: Vec<Node>) -> Node {
        Node::change(
            ChangeAttrs {
                change_type,
                change_id: id.to_string(),
                semantic_type: SemanticType::Replacement,
            },
            content,
        )
    }

    fn group(doc: &Document, id: &str) -> ChangeGroup {
        ChangeGroup {
            id: id.to_string(),
            label: id.to_string(),
            source: ChangeSource::Tool,
            created_at: Utc::now(),
            patches: collect_patches(&doc.content, id),
            visible: true,
        }
    }

    /// "Hello world" edited to "Hi world" by `g1`, plus a new block from `g2`.
    fn reviewed() -> Document {
        let mut doc = Document::new(vec![
            Node::container(
                ContainerKind::Paragraph,
                vec![
                    change(ChangeType::Deleted, "g1", vec![Node::text("Hello")]),
                    change(ChangeType::Added, "g1", vec![Node::text("Hi")]),
                    Node::text(" world"),
                ],
            ),
            change(ChangeType::Added, "g2", vec![Node::paragraph("New")]),
        ]);
        doc.change_groups = vec![group(&doc, "g1"), group(&doc, "g2")];
        doc
    }

    #[test]
    fn patches_locate_annotations() {
        let doc = reviewed();
        let patches = collect_patches(&doc.content, "g1");
        assert_eq!(patches.len(), 2);
        // <p><del>Hello</del><add>Hi</add> world</p>
        assert_eq!((patches[0].from, patches[0].to), (1, 8));
        assert_eq!(patches[0].text, "Hello");
        assert_eq!((patches[1].from, patches[1].to), (8, 12));
        assert_eq!(collect_patches(&doc.content, "g2")[0].from, 19);
    }

    #[test]
    fn accept_all_keeps_additions() {
        let accepted = accept_all(&reviewed());
        assert_eq!(
            accepted.content,
            vec![Node::paragraph("Hi world"), Node::paragraph("New")]
        );
        assert!(accepted.change_groups.is_empty());
    }

    #[test]
    fn reject_all_restores_the_original() {
        let rejected = reject_all(&reviewed());
        assert_eq!(rejected.content, vec![Node::paragraph("Hello world")]);
        assert!(rejected.change_groups.is_empty());
    }

    #[test]
    fn groups_resolve_independently() {
        let doc = accept_group(&reviewed(), "g2").unwrap();
        assert_eq!(doc.content[1], Node::paragraph("New"));
        assert_eq!(doc.change_groups.len(), 1);
        assert_eq!(doc.change_groups[0].id, "g1");

        let doc = reject_group(&doc, "g1").unwrap();
        assert_eq!(doc.block_texts(), vec!["Hello world", "New"]);
        assert!(doc.change_groups.is_empty());
    }

    #[test]
    fn remaining_patches_are_relocated() {
        let doc = reject_group(&reviewed(), "g1").unwrap();
        // <p>Hello world</p> is 13 units
        assert_eq!(doc.group("g2").unwrap().patches[0].from, 13);
    }

    #[test]
    fn nested_annotations_go_with_their_container() {
        let doc = Document::new(vec![Node::container(
            ContainerKind::Paragraph,
            vec![
                Node::text("a"),
                change(ChangeType::Deleted, "g2", vec![change(ChangeType::Added, "g1", vec![Node::text("b")])]),
            ],
        )]);
        assert_eq!(accept_all(&doc).content, vec![Node::paragraph("a")]);
        assert_eq!(reject_all(&doc).content, vec![Node::paragraph("a")]);
        assert_eq!(reject_group(&doc, "g2").unwrap().block_texts(), vec!["ab"]);
    }

    #[test]
    fn rejecting_everything_leaves_an_editable_document() {
        let doc = Document::new(vec![change(ChangeType::Added, "g1", vec![Node::paragraph("x")])]);
        assert_eq!(reject_all(&doc).content, vec![Node::paragraph("")]);
    }

    #[test]
    fn visibility_toggles() {
        let doc = toggle_group_visibility(&reviewed(), "g1").unwrap();
        assert!(!doc.group("g1").unwrap().visible);
        let doc = toggle_group_visibility(&doc, "g1").unwrap();
        assert!(doc.group("g1").unwrap().visible);
        assert_eq!(doc.content, reviewed().content);
    }

    #[test]
    fn unknown_groups_are_errors() {
        assert_eq!(
            accept_group(&reviewed(), "nope"),
            Err(ReviewError::UnknownGroup("nope".to_string()))
        );
        assert!(toggle_group_visibility(&reviewed(), "nope").is_err());
    }

    #[test]
    fn long_previews_are_shortened() {
        let text = "x".repeat(100);
        let short = preview(&text);
        assert_eq!(short.chars().count(), PREVIEW_CHARS + 1);
        assert!(short.ends_with('…'));
    }
}
