//! Wire format of edit operations.
//!
//! ```json
//! {"type": "replace", "findText": "Hello", "contextAfter": "world", "replaceText": "Hi"}
//! {"type": "insert", "afterText": "Hello", "insertText": " there"}
//! {"type": "add_block", "blockType": "heading", "level": 2, "text": "Facts", "beforeText": "The"}
//! ```

use serde::{Deserialize, Serialize};

use crate::matching::{Anchor, Occurrence, SearchQuery};

fn is_false(b: &bool) -> bool {
    !*b
}

/// Which text an operation targets, and which of its occurrences.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FindSpec {
    pub find_text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_before: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_after: Option<String>,
    /// 1-based.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub occurrence_index: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_occurrences: Option<usize>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub replace_all: bool,
}

impl FindSpec {
    pub fn new(find_text: impl Into<String>) -> Self {
        Self {
            find_text: find_text.into(),
            ..Self::default()
        }
    }

    pub fn context_after(mut self, text: impl Into<String>) -> Self {
        self.context_after = Some(text.into());
        self
    }

    pub fn context_before(mut self, text: impl Into<String>) -> Self {
        self.context_before = Some(text.into());
        self
    }

    pub fn occurrence_index(mut self, index: usize) -> Self {
        self.occurrence_index = Some(index);
        self
    }

    pub fn all(mut self) -> Self {
        self.replace_all = true;
        self
    }

    pub fn query(&self) -> SearchQuery {
        SearchQuery::new(self.find_text.clone())
            .with_context(self.context_before.clone(), self.context_after.clone())
    }

    pub fn occurrence(&self) -> Occurrence {
        Occurrence {
            index: self.occurrence_index,
            max: self.max_occurrences,
            all: self.replace_all,
        }
    }
}

/// Where inserted content goes: after or before anchor text, at a raw
/// position, or (nothing given) at the document start.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InsertTarget {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub after_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub before_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_before: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_after: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<usize>,
}

impl InsertTarget {
    pub fn after(text: impl Into<String>) -> Self {
        Self {
            after_text: Some(text.into()),
            ..Self::default()
        }
    }

    pub fn before(text: impl Into<String>) -> Self {
        Self {
            before_text: Some(text.into()),
            ..Self::default()
        }
    }

    pub fn at(position: usize) -> Self {
        Self {
            position: Some(position),
            ..Self::default()
        }
    }

    /// `afterText` wins when both anchors are given.
    pub fn anchor(&self) -> Option<Anchor> {
        let query = |text: &String| {
            SearchQuery::new(text.clone())
                .with_context(self.context_before.clone(), self.context_after.clone())
        };
        if let Some(text) = &self.after_text {
            return Some(Anchor::After(query(text)));
        }
        self.before_text.as_ref().map(|text| Anchor::Before(query(text)))
    }

    pub fn anchor_text(&self) -> Option<&str> {
        self.after_text.as_deref().or(self.before_text.as_deref())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum EditOperation {
    Replace {
        #[serde(flatten)]
        find: FindSpec,
        replace_text: String,
    },
    Insert {
        insert_text: String,
        #[serde(flatten)]
        target: InsertTarget,
    },
    Delete {
        #[serde(flatten)]
        find: FindSpec,
    },
    AddMark {
        #[serde(flatten)]
        find: FindSpec,
        mark_type: String,
    },
    RemoveMark {
        #[serde(flatten)]
        find: FindSpec,
        mark_type: String,
    },
    ReplaceMark {
        #[serde(flatten)]
        find: FindSpec,
        old_mark_type: String,
        new_mark_type: String,
    },
    AddBlock {
        block_type: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        level: Option<u8>,
        #[serde(default)]
        text: String,
        #[serde(flatten)]
        target: InsertTarget,
    },
}

impl EditOperation {
    /// Wire name of the variant.
    pub fn kind(&self) -> &'static str {
        match self {
            EditOperation::Replace { .. } => "replace",
            EditOperation::Insert { .. } => "insert",
            EditOperation::Delete { .. } => "delete",
            EditOperation::AddMark { .. } => "add_mark",
            EditOperation::RemoveMark { .. } => "remove_mark",
            EditOperation::ReplaceMark { .. } => "replace_mark",
            EditOperation::AddBlock { .. } => "add_block",
        }
    }

    pub fn find(&self) -> Option<&FindSpec> {
        match self {
            EditOperation::Replace { find, .. }
            | EditOperation::Delete { find }
            | EditOperation::AddMark { find, .. }
            | EditOperation::RemoveMark { find, .. }
            | EditOperation::ReplaceMark { find, .. } => Some(find),
            EditOperation::Insert { .. } | EditOperation::AddBlock { .. } => None,
        }
    }

    pub fn list_from_json(json: &str) -> serde_json::Result<Vec<EditOperation>> {
        serde_json::from_str(json)
    }
}
