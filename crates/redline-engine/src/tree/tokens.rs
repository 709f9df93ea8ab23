//! Flat boundary-token view of a document.
//!
//! Token `i` occupies position unit `i`, so position `p` is the boundary in
//! front of token `p`. Mutations splice tokens and rebuild the tree, which
//! keeps every edit expressed in the same coordinates the matcher reports.

use super::{Attrs, Container, ContainerKind, Embed, MarkSet, Node, TextLeaf, TreeError};

/// Opening boundary of a container: everything but its children.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Head {
    pub kind: ContainerKind,
    pub attrs: Attrs,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    Open(Head),
    Close,
    Char(char, MarkSet),
    Break,
    Embed(Embed),
}

/// Innermost-first summary of the containers open at a boundary.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct Frame {
    textblock: bool,
    change: bool,
    deleted: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TokenStream {
    tokens: Vec<Token>,
}

impl TokenStream {
    pub fn from_nodes(nodes: &[Node]) -> Self {
        let mut tokens = Vec::new();
        for node in nodes {
            push_node(&mut tokens, node);
        }
        Self { tokens }
    }

    pub fn from_tokens(tokens: Vec<Token>) -> Self {
        Self { tokens }
    }

    pub fn tokens(&self) -> &[Token] {
        &self.tokens
    }

    pub fn into_tokens(self) -> Vec<Token> {
        self.tokens
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    pub fn check_pos(&self, pos: usize) -> Result<(), TreeError> {
        if pos > self.tokens.len() {
            return Err(TreeError::OutOfBounds {
                pos,
                size: self.tokens.len(),
            });
        }
        Ok(())
    }

    pub fn check_range(&self, from: usize, to: usize) -> Result<(), TreeError> {
        if from > to {
            return Err(TreeError::InvertedRange { from, to });
        }
        self.check_pos(to)
    }

    pub fn splice(&mut self, range: std::ops::Range<usize>, replacement: Vec<Token>) {
        self.tokens.splice(range, replacement);
    }

    pub fn token_mut(&mut self, index: usize) -> Option<&mut Token> {
        self.tokens.get_mut(index)
    }

    /// Heads of the containers open at boundary `pos`, outermost first.
    pub fn open_heads(&self, pos: usize) -> Vec<&Head> {
        let mut stack = Vec::new();
        for token in &self.tokens[..pos.min(self.tokens.len())] {
            match token {
                Token::Open(head) => stack.push(head),
                Token::Close => {
                    stack.pop();
                }
                _ => {}
            }
        }
        stack
    }

    /// For every boundary `0..=len`, whether live inline content may be
    /// inserted there: inside a text block and outside deleted annotations.
    pub fn inline_boundaries(&self) -> Vec<bool> {
        let mut out = Vec::with_capacity(self.tokens.len() + 1);
        let mut stack: Vec<Frame> = Vec::new();
        for token in &self.tokens {
            out.push(is_inline_context(&stack));
            match token {
                Token::Open(head) => stack.push(Frame {
                    textblock: head.kind.is_textblock(),
                    change: head.kind.change().is_some(),
                    deleted: head.kind.is_deleted_change(),
                }),
                Token::Close => {
                    stack.pop();
                }
                _ => {}
            }
        }
        out.push(is_inline_context(&stack));
        out
    }

    /// For every token, whether it lies inside a deleted annotation
    /// (the annotation's own boundary tokens included).
    pub fn deleted_mask(&self) -> Vec<bool> {
        let mut out = Vec::with_capacity(self.tokens.len());
        let mut depth = 0usize;
        let mut stack: Vec<bool> = Vec::new();
        for token in &self.tokens {
            match token {
                Token::Open(head) => {
                    let deleted = head.kind.is_deleted_change();
                    if deleted {
                        depth += 1;
                    }
                    stack.push(deleted);
                    out.push(depth > 0);
                }
                Token::Close => {
                    out.push(depth > 0);
                    if stack.pop().unwrap_or(false) {
                        depth -= 1;
                    }
                }
                _ => out.push(depth > 0),
            }
        }
        out
    }

    /// Index of the `Close` token matching the `Open` token at `open`.
    pub fn matching_close(&self, open: usize) -> Option<usize> {
        let mut depth = 0usize;
        for (i, token) in self.tokens.iter().enumerate().skip(open) {
            match token {
                Token::Open(_) => depth += 1,
                Token::Close => {
                    depth = depth.checked_sub(1)?;
                    if depth == 0 {
                        return Some(i);
                    }
                }
                _ => {}
            }
        }
        None
    }

    /// Rebuilds nodes, merging adjacent equally-marked characters into text
    /// leaves and dropping change annotations left empty.
    pub fn into_nodes(self) -> Result<Vec<Node>, TreeError> {
        let mut top: Vec<Node> = Vec::new();
        let mut stack: Vec<(Head, Vec<Node>)> = Vec::new();

        for token in self.tokens {
            match token {
                Token::Open(head) => stack.push((head, Vec::new())),
                Token::Close => {
                    let (head, content) = stack.pop().ok_or(TreeError::Unbalanced)?;
                    if matches!(head.kind, ContainerKind::Change(_)) && content.is_empty() {
                        continue;
                    }
                    current(&mut stack, &mut top).push(Node::Container(Container {
                        kind: head.kind,
                        attrs: head.attrs,
                        content,
                    }));
                }
                Token::Char(ch, marks) => {
                    let siblings = current(&mut stack, &mut top);
                    if let Some(Node::Text(leaf)) = siblings.last_mut()
                        && leaf.marks == marks
                    {
                        leaf.text.push(ch);
                    } else {
                        siblings.push(Node::Text(TextLeaf {
                            text: ch.to_string(),
                            marks,
                        }));
                    }
                }
                Token::Break => current(&mut stack, &mut top).push(Node::Break),
                Token::Embed(embed) => current(&mut stack, &mut top).push(Node::Embed(embed)),
            }
        }

        if !stack.is_empty() {
            return Err(TreeError::Unbalanced);
        }
        Ok(top)
    }
}

fn is_inline_context(stack: &[Frame]) -> bool {
    if stack.iter().any(|f| f.deleted) {
        return false;
    }
    stack
        .iter()
        .rev()
        .find(|f| !f.change)
        .is_some_and(|f| f.textblock)
}

fn current<'a>(stack: &'a mut [(Head, Vec<Node>)], top: &'a mut Vec<Node>) -> &'a mut Vec<Node> {
    match stack.last_mut() {
        Some((_, content)) => content,
        None => top,
    }
}

pub(crate) fn push_node(tokens: &mut Vec<Token>, node: &Node) {
    match node {
        Node::Container(c) => {
            tokens.push(Token::Open(Head {
                kind: c.kind.clone(),
                attrs: c.attrs.clone(),
            }));
            for child in &c.content {
                push_node(tokens, child);
            }
            tokens.push(Token::Close);
        }
        Node::Text(leaf) => {
            tokens.extend(leaf.text.chars().map(|ch| Token::Char(ch, leaf.marks.clone())));
        }
        Node::Break => tokens.push(Token::Break),
        Node::Embed(embed) => tokens.push(Token::Embed(embed.clone())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::{ChangeAttrs, ChangeType, Document, Mark, SemanticType};
    use pretty_assertions::assert_eq;

    fn deleted(content: Vec<Node>) -> Node {
        Node::change(
            ChangeAttrs {
                change_type: ChangeType::Deleted,
                change_id: "old".to_string(),
                semantic_type: SemanticType::Deletion,
            },
            content,
        )
    }

    #[test]
    fn stream_length_equals_content_size() {
        let doc = Document::new(vec![
            Node::paragraph("Hello"),
            Node::container(
                ContainerKind::BulletList,
                vec![Node::container(ContainerKind::ListItem, vec![Node::paragraph("x")])],
            ),
        ]);
        let stream = TokenStream::from_nodes(&doc.content);
        assert_eq!(stream.len(), doc.content_size());
    }

    #[test]
    fn rebuild_is_lossless() {
        let bold: MarkSet = [Mark::Bold].into_iter().collect();
        let nodes = vec![Node::container(
            ContainerKind::Paragraph,
            vec![
                Node::text("plain "),
                Node::marked_text("bold", bold),
                Node::Break,
                deleted(vec![Node::text("old")]),
            ],
        )];
        let rebuilt = TokenStream::from_nodes(&nodes).into_nodes().unwrap();
        assert_eq!(rebuilt, nodes);
    }

    #[test]
    fn unbalanced_streams_are_rejected() {
        let stream = TokenStream::from_tokens(vec![Token::Close]);
        assert_eq!(stream.into_nodes(), Err(TreeError::Unbalanced));

        let stream = TokenStream::from_tokens(vec![Token::Open(Head {
            kind: ContainerKind::Paragraph,
            attrs: Attrs::new(),
        })]);
        assert_eq!(stream.into_nodes(), Err(TreeError::Unbalanced));
    }

    #[test]
    fn inline_boundaries_exclude_structure_and_deleted_content() {
        // <p>a<del>b</del></p>
        let nodes = vec![Node::container(
            ContainerKind::Paragraph,
            vec![Node::text("a"), deleted(vec![Node::text("b")])],
        )];
        let stream = TokenStream::from_nodes(&nodes);
        // boundaries: 0 before <p>, 1 before a, 2 before <del>, 3 before b,
        // 4 before </del>, 5 before </p>, 6 end
        assert_eq!(
            stream.inline_boundaries(),
            vec![false, true, true, false, false, true, false]
        );
        assert_eq!(
            stream.deleted_mask(),
            vec![false, false, true, true, true, false]
        );
    }

    #[test]
    fn matching_close_skips_nested_containers() {
        let nodes = vec![Node::container(
            ContainerKind::BlockQuote,
            vec![Node::paragraph("a")],
        )];
        let stream = TokenStream::from_nodes(&nodes);
        assert_eq!(stream.matching_close(0), Some(4));
        assert_eq!(stream.matching_close(1), Some(3));
    }

    #[test]
    fn open_heads_lists_outermost_first() {
        let nodes = vec![Node::container(
            ContainerKind::BlockQuote,
            vec![Node::paragraph("a")],
        )];
        let stream = TokenStream::from_nodes(&nodes);
        let kinds: Vec<_> = stream.open_heads(2).iter().map(|h| h.kind.clone()).collect();
        assert_eq!(kinds, vec![ContainerKind::BlockQuote, ContainerKind::Paragraph]);
    }
}
