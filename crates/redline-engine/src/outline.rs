//! Compact text rendering of a document for tests and the command line.
//!
//! ```text
//! heading(1): [b]Facts[/b]
//! paragraph: {-Hello-}{+Hi+} world
//! added(insertion)
//!   paragraph: New
//! ```

use std::fmt;

use serde::Serialize;

use crate::tree::{ChangeType, Container, Document, Node};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OutlineLine {
    pub depth: usize,
    pub label: String,
    /// Rendered inline content; `None` for structural containers.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupSummary {
    pub id: String,
    pub label: String,
    pub visible: bool,
    pub patches: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Outline {
    pub lines: Vec<OutlineLine>,
    pub groups: Vec<GroupSummary>,
}

impl Outline {
    pub fn of(doc: &Document) -> Self {
        let mut lines = Vec::new();
        for node in &doc.content {
            outline_node(node, 0, &mut lines);
        }
        let groups = doc
            .change_groups
            .iter()
            .map(|g| GroupSummary {
                id: g.id.clone(),
                label: g.label.clone(),
                visible: g.visible,
                patches: g.patches.len(),
            })
            .collect();
        Self { lines, groups }
    }
}

impl fmt::Display for Outline {
    /// Block lines only; group ids are random and stay out of the text.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for line in &self.lines {
            write!(f, "{:indent$}{}", "", line.label, indent = line.depth * 2)?;
            match &line.text {
                Some(text) if !text.is_empty() => writeln!(f, ": {text}")?,
                Some(_) => writeln!(f, ":")?,
                None => writeln!(f)?,
            }
        }
        Ok(())
    }
}

pub fn render(doc: &Document) -> String {
    Outline::of(doc).to_string()
}

fn outline_node(node: &Node, depth: usize, lines: &mut Vec<OutlineLine>) {
    match node {
        Node::Container(c) if c.kind.is_textblock() => lines.push(OutlineLine {
            depth,
            label: c.kind.label(),
            text: Some(render_inline(&c.content)),
        }),
        Node::Container(c) => {
            lines.push(OutlineLine {
                depth,
                label: block_label(c),
                text: None,
            });
            for child in &c.content {
                outline_node(child, depth + 1, lines);
            }
        }
        // inline content out of place; shown rather than hidden
        leaf => lines.push(OutlineLine {
            depth,
            label: "inline".to_string(),
            text: Some(render_inline(std::slice::from_ref(leaf))),
        }),
    }
}

fn block_label(c: &Container) -> String {
    match c.kind.change() {
        Some(attrs) => format!("{}({})", c.kind.label(), attrs.semantic_type.name()),
        None => c.kind.label(),
    }
}

fn render_inline(nodes: &[Node]) -> String {
    let mut out = String::new();
    for node in nodes {
        push_inline(node, &mut out);
    }
    out
}

fn push_inline(node: &Node, out: &mut String) {
    match node {
        Node::Text(leaf) => {
            for mark in &leaf.marks {
                out.push_str(&format!("[{}]", mark.tag()));
            }
            out.push_str(&leaf.text);
            for mark in leaf.marks.iter().rev() {
                out.push_str(&format!("[/{}]", mark.tag()));
            }
        }
        Node::Break => out.push_str("\\n"),
        Node::Embed(embed) => out.push_str(&format!("[{}/]", embed.name)),
        Node::Container(c) => {
            let (open, close) = match c.kind.change().map(|attrs| attrs.change_type) {
                Some(ChangeType::Added) => ("{+", "+}"),
                Some(ChangeType::Deleted) => ("{-", "-}"),
                None => ("{", "}"),
            };
            out.push_str(open);
            for child in &c.content {
                push_inline(child, out);
            }
            out.push_str(close);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::{ChangeAttrs, ContainerKind, Embed, Mark, SemanticType};

    fn change(change_type: ChangeType, semantic_type: SemanticType, content: Vec<Node>) -> Node {
        Node::change(
            ChangeAttrs {
                change_type,
                change_id: "c1".to_string(),
                semantic_type,
            },
            content,
        )
    }

    #[test]
    fn renders_blocks_marks_and_annotations() {
        let doc = Document::new(vec![
            Node::container(
                ContainerKind::Heading { level: 1 },
                vec![Node::marked_text("Facts", [Mark::Bold, Mark::Italic].into_iter().collect())],
            ),
            Node::container(
                ContainerKind::Paragraph,
                vec![
                    change(ChangeType::Deleted, SemanticType::Replacement, vec![Node::text("Hello")]),
                    change(ChangeType::Added, SemanticType::Replacement, vec![Node::text("Hi")]),
                    Node::text(" world"),
                    Node::Break,
                    Node::Embed(Embed {
                        name: "footnote".to_string(),
                        attrs: Default::default(),
                    }),
                ],
            ),
            Node::container(
                ContainerKind::BulletList,
                vec![Node::container(ContainerKind::ListItem, vec![Node::paragraph("")])],
            ),
            change(ChangeType::Added, SemanticType::Insertion, vec![Node::paragraph("New")]),
        ]);
        insta::assert_snapshot!(render(&doc), @r"
        heading(1): [b][i]Facts[/i][/b]
        paragraph: {-Hello-}{+Hi+} world\n[footnote/]
        bullet_list
          list_item
            paragraph:
        added(insertion)
          paragraph: New
        ");
    }

    #[test]
    fn outline_serializes_lines() {
        let outline = Outline::of(&Document::from_paragraphs(&["a"]));
        assert_eq!(
            serde_json::to_value(&outline).unwrap(),
            serde_json::json!({
                "lines": [{"depth": 0, "label": "paragraph", "text": "a"}],
                "groups": []
            })
        );
    }
}
