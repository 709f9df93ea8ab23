//! Which block kinds and marks new content may use.
//!
//! The vocabulary itself is owned elsewhere; [`CachedSchema`] fetches it from
//! a [`VocabularySource`] and keeps it for a fixed time-to-live. The cache is
//! shared across threads and can be dropped on demand with
//! [`CachedSchema::invalidate`].

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::editing::BlockKind;
use crate::tree::Mark;

pub trait Schema: Send + Sync {
    fn allows_block(&self, kind: &BlockKind) -> bool;
    fn allows_mark(&self, mark: Mark) -> bool;
}

/// Allows every block kind and mark.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultSchema;

impl Schema for DefaultSchema {
    fn allows_block(&self, _kind: &BlockKind) -> bool {
        true
    }

    fn allows_mark(&self, _mark: Mark) -> bool {
        true
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
    #[error("vocabulary unavailable: {0}")]
    Unavailable(String),
}

/// Block kind names (as in [`block_name`]) and marks a document may contain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vocabulary {
    pub blocks: BTreeSet<String>,
    pub marks: BTreeSet<Mark>,
}

impl Default for Vocabulary {
    fn default() -> Self {
        Self {
            blocks: [
                "paragraph",
                "heading",
                "blockquote",
                "bullet_list",
                "ordered_list",
                "code_block",
            ]
            .into_iter()
            .map(str::to_string)
            .collect(),
            marks: Mark::ALL.into_iter().collect(),
        }
    }
}

impl Vocabulary {
    pub fn allows_block(&self, kind: &BlockKind) -> bool {
        self.blocks.contains(block_name(kind))
    }

    pub fn allows_mark(&self, mark: Mark) -> bool {
        self.marks.contains(&mark)
    }
}

/// Vocabulary name of a block kind; headings of every level share one name.
pub fn block_name(kind: &BlockKind) -> &'static str {
    match kind {
        BlockKind::Paragraph => "paragraph",
        BlockKind::Heading(_) => "heading",
        BlockKind::BlockQuote => "blockquote",
        BlockKind::BulletList => "bullet_list",
        BlockKind::OrderedList => "ordered_list",
        BlockKind::CodeBlock => "code_block",
    }
}

pub trait VocabularySource: Send + Sync {
    fn load(&self) -> Result<Vocabulary, SchemaError>;
}

/// A vocabulary fixed at construction.
#[derive(Debug, Clone, Default)]
pub struct StaticVocabulary(pub Vocabulary);

impl VocabularySource for StaticVocabulary {
    fn load(&self) -> Result<Vocabulary, SchemaError> {
        Ok(self.0.clone())
    }
}

struct Cached {
    loaded_at: Instant,
    vocabulary: Arc<Vocabulary>,
}

/// TTL cache over a vocabulary source. When the source cannot be reached
/// the operation is allowed and a warning is logged.
pub struct CachedSchema<S> {
    source: S,
    ttl: Duration,
    cached: RwLock<Option<Cached>>,
}

impl<S: VocabularySource> CachedSchema<S> {
    pub fn new(source: S, ttl: Duration) -> Self {
        Self {
            source,
            ttl,
            cached: RwLock::new(None),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Drops the cached vocabulary; the next lookup reloads it.
    pub fn invalidate(&self) {
        *self.cached.write() = None;
    }

    pub fn vocabulary(&self) -> Option<Arc<Vocabulary>> {
        if let Some(cached) = self.cached.read().as_ref()
            && cached.loaded_at.elapsed() < self.ttl
        {
            return Some(Arc::clone(&cached.vocabulary));
        }

        let mut slot = self.cached.write();
        // another thread may have refreshed while we waited
        if let Some(cached) = slot.as_ref()
            && cached.loaded_at.elapsed() < self.ttl
        {
            return Some(Arc::clone(&cached.vocabulary));
        }
        match self.source.load() {
            Ok(vocabulary) => {
                let vocabulary = Arc::new(vocabulary);
                *slot = Some(Cached {
                    loaded_at: Instant::now(),
                    vocabulary: Arc::clone(&vocabulary),
                });
                Some(vocabulary)
            }
            Err(e) => {
                log::warn!("schema check skipped: {e}");
                None
            }
        }
    }
}

impl<S: VocabularySource> Schema for CachedSchema<S> {
    fn allows_block(&self, kind: &BlockKind) -> bool {
        self.vocabulary().is_none_or(|v| v.allows_block(kind))
    }

    fn allows_mark(&self, mark: Mark) -> bool {
        self.vocabulary().is_none_or(|v| v.allows_mark(mark))
    }
}
