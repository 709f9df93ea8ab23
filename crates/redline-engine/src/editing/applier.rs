use crate::editing::EditError;
use crate::editing::blocks::{BlockKind, build_block};
use crate::editing::markup::parse_markup;
use crate::editing::ops::{EditOperation, FindSpec, InsertTarget};
use crate::matching::{
    Anchor, Match, MatcherConfig, NormalizedIndex, drop_overlapping, find_anchor_position,
    find_matches, select_occurrences,
};
use crate::schema::Schema;
use crate::tree::{Document, Mark, Node, edit};

/// Applies edit operations under one matcher configuration and schema.
pub struct Applier<'a> {
    config: &'a MatcherConfig,
    schema: &'a dyn Schema,
}

impl<'a> Applier<'a> {
    pub fn new(config: &'a MatcherConfig, schema: &'a dyn Schema) -> Self {
        Self { config, schema }
    }

    /// Returns the edited document, or an error with `doc` left as it was.
    pub fn apply(&self, doc: &Document, op: &EditOperation) -> Result<Document, EditError> {
        let mut working = doc.clone();
        if working.ensure_not_empty() {
            log::debug!("empty document repaired before {}", op.kind());
        }
        let nodes = &working.content;
        let content = match op {
            EditOperation::Replace { find, replace_text } => self.replace(nodes, find, replace_text)?,
            EditOperation::Insert {
                insert_text,
                target,
            } => self.insert(nodes, insert_text, target)?,
            EditOperation::Delete { find } => self.delete(nodes, find)?,
            EditOperation::AddMark { find, mark_type } => {
                let mark = self.mark(mark_type)?;
                self.toggle_mark(nodes, find, mark, true)?
            }
            EditOperation::RemoveMark { find, mark_type } => {
                let mark = self.mark(mark_type)?;
                self.toggle_mark(nodes, find, mark, false)?
            }
            EditOperation::ReplaceMark {
                find,
                old_mark_type,
                new_mark_type,
            } => self.replace_mark(nodes, find, old_mark_type, new_mark_type)?,
            EditOperation::AddBlock {
                block_type,
                level,
                text,
                target,
            } => self.add_block(nodes, block_type, *level, text, target)?,
        };
        Ok(working.with_content(content))
    }

    fn replace(&self, nodes: &[Node], find: &FindSpec, replace_text: &str) -> Result<Vec<Node>, EditError> {
        let targets = self.targets(nodes, find)?;
        let mut out = nodes.to_vec();
        for m in targets.iter().rev() {
            let marks = edit::first_marks_in(&out, m.from, m.to).unwrap_or_default();
            let inline = parse_markup(replace_text, &marks);
            out = edit::replace_range(&out, m.from, m.to, &inline)?;
        }
        Ok(out)
    }

    fn delete(&self, nodes: &[Node], find: &FindSpec) -> Result<Vec<Node>, EditError> {
        let matches = self.matches(nodes, find)?;
        let occurrence = find.occurrence();
        if matches.len() > 1 && !occurrence.is_explicit() {
            return Err(EditError::AmbiguousMatch {
                text: find.find_text.clone(),
                count: matches.len(),
            });
        }
        let targets = self.select(matches, find)?;
        let mut out = nodes.to_vec();
        for m in targets.iter().rev() {
            out = edit::delete_range(&out, m.from, m.to)?;
        }
        Ok(out)
    }

    fn insert(&self, nodes: &[Node], text: &str, target: &InsertTarget) -> Result<Vec<Node>, EditError> {
        if text.is_empty() {
            return Err(EditError::EmptyText);
        }
        let requested = match target.anchor() {
            Some(anchor) => self.anchor_position(nodes, &anchor, target)?,
            None => target.position.map_or(0, |pos| clamp(nodes, pos)),
        };
        let pos = edit::nearest_inline_position(nodes, requested).ok_or(EditError::InvalidRange {
            from: requested,
            to: requested,
            size: content_size(nodes),
        })?;
        let marks = edit::marks_before(nodes, pos);
        let inline = parse_markup(text, &marks);
        log::debug!("insert at {pos} (requested {requested})");
        Ok(edit::insert_inline(nodes, pos, &inline)?)
    }

    fn toggle_mark(
        &self,
        nodes: &[Node],
        find: &FindSpec,
        mark: Mark,
        add: bool,
    ) -> Result<Vec<Node>, EditError> {
        let targets = self.eligible(nodes, find, mark, add)?;
        let mut out = nodes.to_vec();
        for m in targets.iter().rev() {
            out = edit::set_mark(&out, m.from, m.to, mark, add)?;
        }
        Ok(out)
    }

    fn replace_mark(
        &self,
        nodes: &[Node],
        find: &FindSpec,
        old_mark_type: &str,
        new_mark_type: &str,
    ) -> Result<Vec<Node>, EditError> {
        let old = self.mark(old_mark_type)?;
        let new = self.mark(new_mark_type)?;
        let targets = self.eligible(nodes, find, old, false)?;
        let mut out = nodes.to_vec();
        for m in targets.iter().rev() {
            out = edit::set_mark(&out, m.from, m.to, old, false)?;
            out = edit::set_mark(&out, m.from, m.to, new, true)?;
        }
        Ok(out)
    }

    fn add_block(
        &self,
        nodes: &[Node],
        block_type: &str,
        level: Option<u8>,
        text: &str,
        target: &InsertTarget,
    ) -> Result<Vec<Node>, EditError> {
        let kind = BlockKind::parse(block_type, level)?;
        if !self.schema.allows_block(&kind) {
            return Err(EditError::UnsupportedKind(kind.to_string()));
        }
        let pos = match target.anchor() {
            Some(anchor) => {
                let at = self.anchor_position(nodes, &anchor, target)?;
                match (&anchor, edit::enclosing_block(nodes, at)) {
                    (Anchor::After(_), Some(block)) => block.end,
                    (Anchor::Before(_), Some(block)) => block.start,
                    (_, None) => at,
                }
            }
            None => match target.position {
                Some(pos) => {
                    let pos = clamp(nodes, pos);
                    edit::enclosing_block(nodes, pos).map_or(pos, |block| block.end)
                }
                None => content_size(nodes),
            },
        };
        log::debug!("add_block {kind} at {pos}");
        Ok(edit::insert_blocks(nodes, pos, &[build_block(kind, text)])?)
    }

    fn mark(&self, name: &str) -> Result<Mark, EditError> {
        let mark: Mark = name
            .parse()
            .map_err(|_| EditError::UnsupportedKind(format!("mark {name}")))?;
        if !self.schema.allows_mark(mark) {
            return Err(EditError::UnsupportedKind(format!("mark {mark}")));
        }
        Ok(mark)
    }

    fn matches(&self, nodes: &[Node], find: &FindSpec) -> Result<Vec<Match>, EditError> {
        if find.find_text.trim().is_empty() {
            return Err(EditError::EmptyText);
        }
        let index = NormalizedIndex::build(nodes, self.config);
        let matches = find_matches(&index, &find.query(), self.config);
        if matches.is_empty() {
            return Err(EditError::AnchorNotFound {
                text: find.find_text.clone(),
            });
        }
        Ok(matches)
    }

    fn select(&self, matches: Vec<Match>, find: &FindSpec) -> Result<Vec<Match>, EditError> {
        let selected = drop_overlapping(select_occurrences(&matches, &find.occurrence()));
        if selected.is_empty() {
            return Err(EditError::AnchorNotFound {
                text: find.find_text.clone(),
            });
        }
        log::debug!(
            "{:?}: {} of {} matches selected",
            find.find_text,
            selected.len(),
            matches.len()
        );
        Ok(selected)
    }

    fn targets(&self, nodes: &[Node], find: &FindSpec) -> Result<Vec<Match>, EditError> {
        let matches = self.matches(nodes, find)?;
        self.select(matches, find)
    }

    /// Targets whose live characters are not all already in the wanted state.
    fn eligible(
        &self,
        nodes: &[Node],
        find: &FindSpec,
        mark: Mark,
        adding: bool,
    ) -> Result<Vec<Match>, EditError> {
        let mut eligible = Vec::new();
        for m in self.targets(nodes, find)? {
            let coverage = edit::range_mark_coverage(nodes, m.from, m.to, mark)?;
            if (adding && coverage.any_without()) || (!adding && coverage.any_with()) {
                eligible.push(m);
            }
        }
        if eligible.is_empty() {
            return Err(EditError::NoEligibleMatch {
                text: find.find_text.clone(),
                mark: mark.to_string(),
            });
        }
        Ok(eligible)
    }

    fn anchor_position(
        &self,
        nodes: &[Node],
        anchor: &Anchor,
        target: &InsertTarget,
    ) -> Result<usize, EditError> {
        let index = NormalizedIndex::build(nodes, self.config);
        find_anchor_position(&index, anchor, self.config).ok_or_else(|| EditError::AnchorNotFound {
            text: target.anchor_text().unwrap_or_default().to_string(),
        })
    }
}

fn content_size(nodes: &[Node]) -> usize {
    nodes.iter().map(Node::size).sum()
}

/// Positions past the end are pulled back to the end.
fn clamp(nodes: &[Node], pos: usize) -> usize {
    let size = content_size(nodes);
    if pos > size {
        log::debug!("position {pos} clamped to {size}");
        size
    } else {
        pos
    }
}
