//! # Change Tracking
//!
//! Turns the difference between a pre-batch and post-batch tree into
//! reviewable change annotations, and resolves those annotations again.
//!
//! ## Flow
//!
//! 1. [`diff`] aligns the two trees by structural node identity
//!    ([`identity`]) and records a [`Delta`].
//! 2. [`merge`] rebuilds the post-batch tree with every removal kept inside a
//!    `deleted` annotation and every addition wrapped in an `added` one, all
//!    stamped with a single fresh change id.
//! 3. [`track_changes`] ties both together and records the [`ChangeGroup`]
//!    describing the new annotations on the document.
//!
//! Accepting or rejecting annotations lives in [`review`].

pub mod diff;
pub mod identity;
pub mod merge;
pub mod review;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::tree::{ChangeType, Document, Node, SemanticType};

pub use diff::{Delta, Detail, InlineStep, Step, diff};
pub use identity::{DiffConfig, node_identity};
pub use merge::{MergeError, merge};
pub use review::{ReviewError, accept_all, accept_group, collect_patches, reject_all, reject_group, toggle_group_visibility};

/// Who produced a change group.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeSource {
    #[default]
    Tool,
    User,
}

/// One annotation of a change group, located in the merged tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupPatch {
    pub change_type: ChangeType,
    pub semantic_type: SemanticType,
    /// Leading text of the annotated content.
    pub text: String,
    pub from: usize,
    pub to: usize,
}

/// Annotations sharing one change id, reviewed as a unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeGroup {
    pub id: String,
    pub label: String,
    pub source: ChangeSource,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub patches: Vec<GroupPatch>,
    #[serde(default = "visible_by_default")]
    pub visible: bool,
}

fn visible_by_default() -> bool {
    true
}

/// Result of [`track_changes`].
#[derive(Debug, Clone, PartialEq)]
pub struct Tracked {
    pub document: Document,
    /// Id of the group created for this batch, if anything changed and the
    /// merge succeeded.
    pub change_id: Option<String>,
}

/// Signature of [`merge`], swappable in tests.
pub(crate) type MergeFn = fn(&[Node], &[Node], &Delta, &str) -> Result<Vec<Node>, MergeError>;

/// Annotates everything that differs between `before` and `after`.
///
/// Review metadata is taken from `after`. A merge failure is logged and the
/// post-batch document is returned without new annotations.
pub fn track_changes(
    before: &Document,
    after: &Document,
    config: &DiffConfig,
    label: &str,
    source: ChangeSource,
) -> Tracked {
    track_changes_with(before, after, config, label, source, merge)
}

pub(crate) fn track_changes_with(
    before: &Document,
    after: &Document,
    config: &DiffConfig,
    label: &str,
    source: ChangeSource,
    merge: MergeFn,
) -> Tracked {
    let delta = diff(&before.content, &after.content, config);
    if delta.is_empty() {
        return Tracked {
            document: after.clone(),
            change_id: None,
        };
    }

    let change_id = Uuid::new_v4().to_string();
    match merge(&before.content, &after.content, &delta, &change_id) {
        Ok(content) => {
            let mut document = after.with_content(content);
            let patches = collect_patches(&document.content, &change_id);
            log::debug!("change group {change_id}: {} annotation(s)", patches.len());
            document.change_groups.push(ChangeGroup {
                id: change_id.clone(),
                label: label.to_string(),
                source,
                created_at: Utc::now(),
                patches,
                visible: true,
            });
            Tracked {
                document,
                change_id: Some(change_id),
            }
        }
        Err(e) => {
            log::warn!("change tracking skipped, keeping unannotated result: {e}");
            Tracked {
                document: after.clone(),
                change_id: None,
            }
        }
    }
}
