//! Position-addressed tree mutations.
//!
//! Every function takes the current content and returns freshly rebuilt
//! content; the input is never touched. Positions follow the addressing
//! scheme described in the parent module.

use std::ops::Range;

use super::tokens::{Head, Token, TokenStream, push_node};
use super::{ContainerKind, Mark, MarkSet, Node, TreeError};

/// How many live characters of a range carry a mark, and how many don't.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MarkCoverage {
    pub with_mark: usize,
    pub without_mark: usize,
}

impl MarkCoverage {
    pub fn any_with(&self) -> bool {
        self.with_mark > 0
    }

    pub fn any_without(&self) -> bool {
        self.without_mark > 0
    }
}

/// Removes `from..to`. Text blocks cut open on both sides are joined when
/// their structure is compatible; deleted annotations lying wholly inside
/// the range survive in place.
pub fn delete_range(nodes: &[Node], from: usize, to: usize) -> Result<Vec<Node>, TreeError> {
    replace_range(nodes, from, to, &[])
}

/// Removes `from..to` and puts `inline` at `from`.
pub fn replace_range(
    nodes: &[Node],
    from: usize,
    to: usize,
    inline: &[Node],
) -> Result<Vec<Node>, TreeError> {
    let mut stream = TokenStream::from_nodes(nodes);
    stream.check_range(from, to)?;
    if !inline.is_empty() && !stream.inline_boundaries()[from] {
        return Err(TreeError::NoInlinePosition(from));
    }
    let mut replacement = to_tokens(inline);
    replacement.extend(removal_remainder(&stream, from, to));
    stream.splice(from..to, replacement);
    stream.into_nodes()
}

/// Inserts inline nodes at a live inline position.
pub fn insert_inline(nodes: &[Node], pos: usize, inline: &[Node]) -> Result<Vec<Node>, TreeError> {
    let mut stream = TokenStream::from_nodes(nodes);
    stream.check_pos(pos)?;
    if !stream.inline_boundaries()[pos] {
        return Err(TreeError::NoInlinePosition(pos));
    }
    stream.splice(pos..pos, to_tokens(inline));
    stream.into_nodes()
}

/// Inserts block nodes between two top-level blocks.
pub fn insert_blocks(nodes: &[Node], pos: usize, blocks: &[Node]) -> Result<Vec<Node>, TreeError> {
    let mut stream = TokenStream::from_nodes(nodes);
    stream.check_pos(pos)?;
    if !stream.open_heads(pos).is_empty() {
        return Err(TreeError::NotBlockBoundary(pos));
    }
    stream.splice(pos..pos, to_tokens(blocks));
    stream.into_nodes()
}

/// Adds (`present`) or removes a mark on every live character in `from..to`.
/// Characters inside deleted annotations keep their marks.
pub fn set_mark(
    nodes: &[Node],
    from: usize,
    to: usize,
    mark: Mark,
    present: bool,
) -> Result<Vec<Node>, TreeError> {
    let stream = TokenStream::from_nodes(nodes);
    stream.check_range(from, to)?;
    let deleted = stream.deleted_mask();
    let mut tokens = stream.into_tokens();
    for (token, gone) in tokens[from..to].iter_mut().zip(&deleted[from..to]) {
        if *gone {
            continue;
        }
        if let Token::Char(_, marks) = token {
            if present {
                marks.insert(mark);
            } else {
                marks.remove(&mark);
            }
        }
    }
    TokenStream::from_tokens(tokens).into_nodes()
}

pub fn range_mark_coverage(
    nodes: &[Node],
    from: usize,
    to: usize,
    mark: Mark,
) -> Result<MarkCoverage, TreeError> {
    let stream = TokenStream::from_nodes(nodes);
    stream.check_range(from, to)?;
    let deleted = stream.deleted_mask();
    let mut coverage = MarkCoverage::default();
    for (token, gone) in stream.tokens()[from..to].iter().zip(&deleted[from..to]) {
        if let Token::Char(_, marks) = token
            && !gone
        {
            if marks.contains(&mark) {
                coverage.with_mark += 1;
            } else {
                coverage.without_mark += 1;
            }
        }
    }
    Ok(coverage)
}

/// Span of the top-level block strictly containing `pos`.
pub fn enclosing_block(nodes: &[Node], pos: usize) -> Option<Range<usize>> {
    let mut start = 0;
    for node in nodes {
        let end = start + node.size();
        if start < pos && pos < end {
            return Some(start..end);
        }
        start = end;
    }
    None
}

/// Closest position where live inline content may be inserted, preferring
/// the earlier candidate on ties.
pub fn nearest_inline_position(nodes: &[Node], pos: usize) -> Option<usize> {
    let boundaries = TokenStream::from_nodes(nodes).inline_boundaries();
    let last = boundaries.len() - 1;
    let pos = pos.min(last);
    if boundaries[pos] {
        return Some(pos);
    }
    (1..=last).find_map(|d| {
        if pos >= d && boundaries[pos - d] {
            Some(pos - d)
        } else if boundaries.get(pos + d) == Some(&true) {
            Some(pos + d)
        } else {
            None
        }
    })
}

/// Marks of the live character right before `pos` within the same text
/// block, looking through change-annotation boundaries.
pub fn marks_before(nodes: &[Node], pos: usize) -> MarkSet {
    let stream = TokenStream::from_nodes(nodes);
    let tokens = stream.tokens();
    let deleted = stream.deleted_mask();
    let edges = change_edges(tokens);
    for i in (0..pos.min(tokens.len())).rev() {
        if deleted[i] {
            continue;
        }
        match &tokens[i] {
            Token::Char(_, marks) => return marks.clone(),
            Token::Open(_) | Token::Close if edges[i] => continue,
            _ => break,
        }
    }
    MarkSet::new()
}

/// Marks of the first live character in `from..to`.
pub fn first_marks_in(nodes: &[Node], from: usize, to: usize) -> Option<MarkSet> {
    let stream = TokenStream::from_nodes(nodes);
    let deleted = stream.deleted_mask();
    let to = to.min(stream.len());
    (from.min(to)..to).find_map(|i| match &stream.tokens()[i] {
        Token::Char(_, marks) if !deleted[i] => Some(marks.clone()),
        _ => None,
    })
}

fn to_tokens(nodes: &[Node]) -> Vec<Token> {
    let mut tokens = Vec::new();
    for node in nodes {
        push_node(&mut tokens, node);
    }
    tokens
}

fn change_edges(tokens: &[Token]) -> Vec<bool> {
    let mut stack = Vec::new();
    tokens
        .iter()
        .map(|token| match token {
            Token::Open(head) => {
                let change = matches!(head.kind, ContainerKind::Change(_));
                stack.push(change);
                change
            }
            Token::Close => stack.pop().unwrap_or(false),
            _ => false,
        })
        .collect()
}

enum Kept {
    Boundary(usize),
    Preserved(Range<usize>),
}

/// Tokens of `from..to` that outlive its removal: boundaries of containers
/// only partly covered (dropped when the two cut sides are joined) and
/// deleted annotations lying wholly inside the range.
fn removal_remainder(stream: &TokenStream, from: usize, to: usize) -> Vec<Token> {
    let slice = &stream.tokens()[from..to];

    let mut partner: Vec<Option<usize>> = vec![None; slice.len()];
    let mut pending = Vec::new();
    for (i, token) in slice.iter().enumerate() {
        match token {
            Token::Open(_) => pending.push(i),
            Token::Close => {
                if let Some(open) = pending.pop() {
                    partner[open] = Some(i);
                    partner[i] = Some(open);
                }
            }
            _ => {}
        }
    }

    let mut kept = Vec::new();
    let mut closes = 0usize;
    let mut opens: Vec<&Head> = Vec::new();
    let mut matched_depth = 0usize;
    let mut i = 0;
    while i < slice.len() {
        match &slice[i] {
            Token::Open(head) => match partner[i] {
                Some(close) if matched_depth == 0 && head.kind.is_deleted_change() => {
                    kept.push(Kept::Preserved(i..close + 1));
                    i = close + 1;
                    continue;
                }
                Some(_) => matched_depth += 1,
                None => {
                    opens.push(head);
                    kept.push(Kept::Boundary(i));
                }
            },
            Token::Close => match partner[i] {
                Some(_) => matched_depth -= 1,
                None => {
                    closes += 1;
                    kept.push(Kept::Boundary(i));
                }
            },
            _ => {}
        }
        i += 1;
    }

    let preserved_is_inline = kept.iter().all(|item| match item {
        Kept::Preserved(range) => slice[range.clone()]
            .iter()
            .all(|t| !matches!(t, Token::Open(h) if h.kind.change().is_none())),
        Kept::Boundary(_) => true,
    });
    let heads = stream.open_heads(from);
    let join = closes > 0
        && closes == opens.len()
        && heads.len() >= closes
        && preserved_is_inline
        && heads
            .iter()
            .rev()
            .zip(opens.iter().rev())
            .all(|(closing, opening)| compatible(closing, opening));

    let mut out = Vec::new();
    for item in kept {
        match item {
            Kept::Boundary(i) if !join => out.push(slice[i].clone()),
            Kept::Boundary(_) => {}
            Kept::Preserved(range) => out.extend_from_slice(&slice[range]),
        }
    }
    out
}

fn compatible(a: &Head, b: &Head) -> bool {
    match (a.kind.change(), b.kind.change()) {
        (Some(x), Some(y)) => x.change_type == y.change_type,
        (None, None) => a.kind.is_textblock() == b.kind.is_textblock(),
        _ => false,
    }
}
