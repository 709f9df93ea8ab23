//! Inline tag syntax for edit payloads: `[b]bold[/b]`, `[i]`, `[u]`, `[s]`,
//! `[code]`, `[mark]`, `[sup]`, `[sub]`. Newlines become hard breaks.
//!
//! Unknown tags and closing tags with no matching opener are kept as
//! literal text. Tags left open run to the end of the input.

use crate::tree::{Mark, MarkSet, Node, canonicalize};

/// Character cursor over markup text.
#[derive(Clone)]
struct Cursor<'a> {
    s: &'a str,
    i: usize,
}

impl<'a> Cursor<'a> {
    fn new(s: &'a str) -> Self {
        Self { s, i: 0 }
    }

    fn eof(&self) -> bool {
        self.i >= self.s.len()
    }

    fn peek(&self) -> Option<char> {
        self.s[self.i..].chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let ch = self.peek()?;
        self.i += ch.len_utf8();
        Some(ch)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Tag {
    mark: Mark,
    closing: bool,
}

/// Parses markup into inline nodes. Text outside any tag carries
/// `base_marks`; tagged runs carry `base_marks` plus their tags.
pub fn parse_markup(s: &str, base_marks: &MarkSet) -> Vec<Node> {
    let mut cur = Cursor::new(s);
    let mut out = Vec::new();
    let mut open: Vec<Mark> = Vec::new();
    let mut text = String::new();

    fn flush(out: &mut Vec<Node>, text: &mut String, base: &MarkSet, open: &[Mark]) {
        if !text.is_empty() {
            let mut marks = base.clone();
            marks.extend(open.iter().copied());
            out.push(Node::marked_text(std::mem::take(text), marks));
        }
    }

    while !cur.eof() {
        let saved = cur.clone();
        if let Some(tag) = try_parse_tag(&mut cur) {
            if !tag.closing {
                flush(&mut out, &mut text, base_marks, &open);
                open.push(tag.mark);
                continue;
            }
            if let Some(at) = open.iter().rposition(|m| *m == tag.mark) {
                flush(&mut out, &mut text, base_marks, &open);
                open.remove(at);
                continue;
            }
            // stray closer: literal
            text.push_str(&cur.s[saved.i..cur.i]);
            continue;
        }
        match cur.bump() {
            Some('\r') if cur.peek() == Some('\n') => {}
            Some('\n') | Some('\r') => {
                flush(&mut out, &mut text, base_marks, &open);
                out.push(Node::Break);
            }
            Some(ch) => text.push(ch),
            None => break,
        }
    }
    flush(&mut out, &mut text, base_marks, &open);
    canonicalize(out)
}

/// Attempts to parse `[tag]` or `[/tag]` at the cursor. On failure the
/// cursor is restored.
fn try_parse_tag(cur: &mut Cursor<'_>) -> Option<Tag> {
    if cur.peek() != Some('[') {
        return None;
    }
    let saved = cur.clone();
    cur.bump();
    let closing = cur.peek() == Some('/');
    if closing {
        cur.bump();
    }
    let name_start = cur.i;
    while let Some(ch) = cur.peek() {
        if !ch.is_ascii_alphabetic() {
            break;
        }
        cur.bump();
    }
    let name = &cur.s[name_start..cur.i];
    match (cur.peek(), Mark::from_tag(name)) {
        (Some(']'), Some(mark)) => {
            cur.bump();
            Some(Tag { mark, closing })
        }
        _ => {
            *cur = saved;
            None
        }
    }
}
