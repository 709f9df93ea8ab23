//! Structural diff between two versions of a document's content.
//!
//! Child lists are aligned with a Myers diff over node identities. Inside a
//! hunk, a removed and an added node of the same container kind are paired
//! and diffed recursively; a node removed here and re-added elsewhere is a
//! move. Text blocks are diffed over inline units, where text inside an
//! `added` annotation is flattened (each unit remembers the annotations it
//! sits in) and any other nested container, normally a `deleted`
//! annotation, is one opaque unit.

use std::collections::{HashMap, VecDeque};
use std::hash::Hash;
use std::iter;
use std::ops::Range;

use imara_diff::{Algorithm, Diff, Hunk, InternedInput, Interner};

use crate::changes::identity::{DiffConfig, node_identity};
use crate::tree::{ChangeAttrs, ChangeType, Container, Embed, MarkSet, Node};

/// Alignment of one child list. Indexes point into the old and new lists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    Same { old: usize, new: usize },
    Removed { old: usize },
    Added { new: usize },
    /// Old location of a moved node.
    MovedFrom { old: usize, to: usize },
    /// New location of a moved node.
    MovedTo { from: usize, new: usize },
    Changed { old: usize, new: usize, detail: Box<Detail> },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Detail {
    Children(Vec<Step>),
    /// Inline steps over the units of the old and new text block.
    Inline(Vec<InlineStep>),
}

impl Detail {
    /// True when every nested step keeps its content.
    pub fn is_unchanged(&self) -> bool {
        match self {
            Detail::Children(steps) => steps.iter().all(|step| matches!(step, Step::Same { .. })),
            Detail::Inline(steps) => steps.iter().all(|step| matches!(step, InlineStep::Same { .. })),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InlineStep {
    Same { old: Range<usize>, new: Range<usize> },
    Removed { old: Range<usize> },
    Added { new: Range<usize> },
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Leaf {
    Char(char, MarkSet),
    Break,
    Embed(Embed),
    Opaque(Node),
}

/// One position of a text block's inline content.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct InlineUnit {
    pub leaf: Leaf,
    /// Enclosing `added` annotations, outermost first.
    pub within: Vec<ChangeAttrs>,
}

impl InlineUnit {
    fn is_opaque(&self) -> bool {
        matches!(self.leaf, Leaf::Opaque(_))
    }
}

/// Steps aligning the top-level content of two documents.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Delta {
    pub steps: Vec<Step>,
}

impl Delta {
    /// True when both sides are structurally identical.
    pub fn is_empty(&self) -> bool {
        self.steps.iter().all(|step| matches!(step, Step::Same { .. }))
    }

    /// Number of top-level steps that are not `Same`.
    pub fn change_count(&self) -> usize {
        self.steps
            .iter()
            .filter(|step| !matches!(step, Step::Same { .. }))
            .count()
    }
}

pub fn diff(old: &[Node], new: &[Node], config: &DiffConfig) -> Delta {
    Delta {
        steps: diff_children(old, new, config),
    }
}

pub fn inline_units(content: &[Node]) -> Vec<InlineUnit> {
    let mut out = Vec::new();
    flatten(content, &mut Vec::new(), &mut out);
    out
}

fn flatten(nodes: &[Node], within: &mut Vec<ChangeAttrs>, out: &mut Vec<InlineUnit>) {
    for node in nodes {
        let leaf = match node {
            Node::Text(leaf) => {
                for ch in leaf.text.chars() {
                    out.push(InlineUnit {
                        leaf: Leaf::Char(ch, leaf.marks.clone()),
                        within: within.clone(),
                    });
                }
                continue;
            }
            Node::Break => Leaf::Break,
            Node::Embed(embed) => Leaf::Embed(embed.clone()),
            Node::Container(c) => match c.kind.change() {
                Some(attrs) if attrs.change_type == ChangeType::Added => {
                    within.push(attrs.clone());
                    flatten(&c.content, within, out);
                    within.pop();
                    continue;
                }
                _ => Leaf::Opaque(node.clone()),
            },
        };
        out.push(InlineUnit {
            leaf,
            within: within.clone(),
        });
    }
}

/// Myers hunks as `(old range, new range)` pairs.
fn myers<T: Eq + Hash>(before: impl Iterator<Item = T>, after: impl Iterator<Item = T>) -> Vec<(Range<usize>, Range<usize>)> {
    let mut input = InternedInput { before: Vec::new(), after: Vec::new(), interner: Interner::new(0) };
    input.update_before(before);
    input.update_after(after);
    let diff = Diff::compute(Algorithm::Myers, &input);
    diff.hunks()
        .map(|Hunk { before, after }| {
            (
                before.start as usize..before.end as usize,
                after.start as usize..after.end as usize,
            )
        })
        .collect()
}

fn diff_children(old: &[Node], new: &[Node], config: &DiffConfig) -> Vec<Step> {
    let old_ids: Vec<u64> = old.iter().map(|n| node_identity(n, config)).collect();
    let new_ids: Vec<u64> = new.iter().map(|n| node_identity(n, config)).collect();
    let hunks = myers(old_ids.iter().copied(), new_ids.iter().copied());
    let moves = Moves::detect(&old_ids, &new_ids, &hunks);

    let mut steps = Vec::new();
    let (mut i, mut j) = (0, 0);
    for (before, after) in &hunks {
        while i < before.start {
            steps.push(aligned(i, j, old, new, config));
            i += 1;
            j += 1;
        }
        hunk_steps(old, new, before.clone(), after.clone(), &moves, config, &mut steps);
        i = before.end;
        j = after.end;
    }
    while i < old.len() {
        steps.push(aligned(i, j, old, new, config));
        i += 1;
        j += 1;
    }
    steps
}

/// Step for two nodes aligned by identity. Identity ignores normalization
/// variants such as curly quotes or doubled spaces, so nodes that still
/// differ are diffed further.
fn aligned(i: usize, j: usize, old: &[Node], new: &[Node], config: &DiffConfig) -> Step {
    if old[i] != new[j] && pairable(&old[i], &new[j]) {
        let step = changed(i, j, &old[i], &new[j], config);
        if let Step::Changed { detail, .. } = &step
            && !detail.is_unchanged()
        {
            return step;
        }
    }
    Step::Same { old: i, new: j }
}

/// Identities removed in one hunk and added in another.
#[derive(Default)]
struct Moves {
    by_old: HashMap<usize, usize>,
    by_new: HashMap<usize, usize>,
}

impl Moves {
    fn detect(old_ids: &[u64], new_ids: &[u64], hunks: &[(Range<usize>, Range<usize>)]) -> Moves {
        let mut added: HashMap<u64, VecDeque<usize>> = HashMap::new();
        for (_, after) in hunks {
            for j in after.clone() {
                added.entry(new_ids[j]).or_default().push_back(j);
            }
        }

        let mut moves = Moves::default();
        for (before, after) in hunks {
            for i in before.clone() {
                let Some(candidates) = added.get_mut(&old_ids[i]) else {
                    continue;
                };
                // a node re-added within its own hunk is a plain replacement
                if let Some(pos) = candidates.iter().position(|j| !after.contains(j))
                    && let Some(j) = candidates.remove(pos)
                {
                    moves.by_old.insert(i, j);
                    moves.by_new.insert(j, i);
                }
            }
        }
        moves
    }
}

fn hunk_steps(
    old: &[Node],
    new: &[Node],
    before: Range<usize>,
    after: Range<usize>,
    moves: &Moves,
    config: &DiffConfig,
    steps: &mut Vec<Step>,
) {
    let push_added = |steps: &mut Vec<Step>, j: usize| match moves.by_new.get(&j) {
        Some(&from) => steps.push(Step::MovedTo { from, new: j }),
        None => steps.push(Step::Added { new: j }),
    };

    let mut next = after.start;
    for i in before {
        if let Some(&to) = moves.by_old.get(&i) {
            steps.push(Step::MovedFrom { old: i, to });
            continue;
        }
        let partner = (next..after.end).find(|&j| !moves.by_new.contains_key(&j) && pairable(&old[i], &new[j]));
        match partner {
            Some(j) => {
                for k in next..j {
                    push_added(steps, k);
                }
                steps.push(changed(i, j, &old[i], &new[j], config));
                next = j + 1;
            }
            None => steps.push(Step::Removed { old: i }),
        }
    }
    for k in next..after.end {
        push_added(steps, k);
    }
}

fn pairable(old: &Node, new: &Node) -> bool {
    match (old, new) {
        (Node::Container(a), Node::Container(b)) => a.kind == b.kind && !a.is_deleted_change(),
        _ => false,
    }
}

fn changed(i: usize, j: usize, old: &Node, new: &Node, config: &DiffConfig) -> Step {
    let detail = match (old, new) {
        (Node::Container(a), Node::Container(b)) if a.kind.is_textblock() => inline_detail(a, b, config),
        (Node::Container(a), Node::Container(b)) => Detail::Children(diff_children(&a.content, &b.content, config)),
        _ => Detail::Children(Vec::new()),
    };
    Step::Changed {
        old: i,
        new: j,
        detail: Box::new(detail),
    }
}

fn inline_detail(old: &Container, new: &Container, config: &DiffConfig) -> Detail {
    let before = inline_units(&old.content);
    let after = inline_units(&new.content);
    let fine = diff_inline(&before, &after);
    if before.len() + after.len() >= config.text_diff_min_len {
        Detail::Inline(fine)
    } else {
        Detail::Inline(coarsen(&before, &after, &fine))
    }
}

pub fn diff_inline(before: &[InlineUnit], after: &[InlineUnit]) -> Vec<InlineStep> {
    let hunks = myers(before.iter().cloned(), after.iter().cloned());
    let mut steps = Vec::new();
    let (mut i, mut j) = (0, 0);
    for (old, new) in hunks {
        if i < old.start {
            steps.push(InlineStep::Same {
                old: i..old.start,
                new: j..new.start,
            });
        }
        if !old.is_empty() {
            steps.push(InlineStep::Removed { old: old.clone() });
        }
        if !new.is_empty() {
            steps.push(InlineStep::Added { new: new.clone() });
        }
        i = old.end;
        j = new.end;
    }
    if i < before.len() {
        steps.push(InlineStep::Same {
            old: i..before.len(),
            new: j..after.len(),
        });
    }
    steps
}

/// Wholesale replacement between the opaque units both sides share, so
/// nested annotations keep their place while short text is swapped as a
/// whole.
fn coarsen(before: &[InlineUnit], after: &[InlineUnit], fine: &[InlineStep]) -> Vec<InlineStep> {
    let mut anchors = Vec::new();
    for step in fine {
        if let InlineStep::Same { old, new } = step {
            anchors.extend(old.clone().zip(new.clone()).filter(|&(i, _)| before[i].is_opaque()));
        }
    }

    let mut steps = Vec::new();
    let (mut i, mut j) = (0, 0);
    for (ai, aj) in anchors.into_iter().chain(iter::once((before.len(), after.len()))) {
        let (old, new) = (i..ai, j..aj);
        if before[old.clone()] == after[new.clone()] {
            if !old.is_empty() {
                steps.push(InlineStep::Same { old, new });
            }
        } else {
            if !old.is_empty() {
                steps.push(InlineStep::Removed { old });
            }
            if !new.is_empty() {
                steps.push(InlineStep::Added { new });
            }
        }
        if ai < before.len() {
            steps.push(InlineStep::Same {
                old: ai..ai + 1,
                new: aj..aj + 1,
            });
        }
        i = ai + 1;
        j = aj + 1;
    }
    steps
}
