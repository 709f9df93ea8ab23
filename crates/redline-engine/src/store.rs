//! Versioned document storage.
//!
//! The engine never holds a lock while a batch runs. It reads a snapshot,
//! computes the new document and writes it back with compare-and-swap; a
//! concurrent writer makes the swap fail and the batch is recomputed against
//! the newer version.

use std::collections::HashMap;

use parking_lot::Mutex;
use thiserror::Error;

use crate::tree::Document;

pub const DEFAULT_MAX_ATTEMPTS: usize = 3;

#[derive(Debug, Clone, PartialEq)]
pub struct VersionedDocument {
    pub document: Document,
    pub version: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("document {0:?} not found")]
    NotFound(String),
    #[error("document {id:?} is at version {actual}, expected {expected}")]
    Conflict { id: String, expected: u64, actual: u64 },
    #[error("document {id:?} kept changing; gave up after {attempts} attempts")]
    RetriesExhausted { id: String, attempts: usize },
}

pub trait DocumentStore: Send + Sync {
    fn snapshot(&self, id: &str) -> Result<VersionedDocument, StoreError>;

    /// Stores `document` if the current version is still `expected_version`
    /// and returns the new version.
    fn compare_and_swap(&self, id: &str, expected_version: u64, document: Document) -> Result<u64, StoreError>;

    fn max_attempts(&self) -> usize {
        DEFAULT_MAX_ATTEMPTS
    }

    /// Read-modify-write with retry on version conflicts. `apply` may run
    /// more than once and must not have side effects beyond its result.
    fn transform<T, F>(&self, id: &str, mut apply: F) -> Result<(T, u64), StoreError>
    where
        F: FnMut(&Document) -> (Document, T),
        Self: Sized,
    {
        let attempts = self.max_attempts().max(1);
        for attempt in 1..=attempts {
            let current = self.snapshot(id)?;
            let (document, output) = apply(&current.document);
            match self.compare_and_swap(id, current.version, document) {
                Ok(version) => return Ok((output, version)),
                Err(StoreError::Conflict { expected, actual, .. }) => {
                    log::debug!("document {id}: version moved {expected} -> {actual}, attempt {attempt}/{attempts}");
                }
                Err(e) => return Err(e),
            }
        }
        log::warn!("document {id}: giving up after {attempts} conflicting attempts");
        Err(StoreError::RetriesExhausted {
            id: id.to_string(),
            attempts,
        })
    }
}

/// In-process store. Versions start at 1 and increase by one per write.
#[derive(Debug)]
pub struct MemoryStore {
    documents: Mutex<HashMap<String, VersionedDocument>>,
    max_attempts: usize,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            documents: Mutex::new(HashMap::new()),
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: usize) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// Creates or overwrites a document; returns its version.
    pub fn insert(&self, id: impl Into<String>, document: Document) -> u64 {
        let mut documents = self.documents.lock();
        let entry = documents.entry(id.into()).or_insert(VersionedDocument {
            document: Document::default(),
            version: 0,
        });
        entry.document = document;
        entry.version += 1;
        entry.version
    }

    pub fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.documents.lock().keys().cloned().collect();
        ids.sort();
        ids
    }
}

impl DocumentStore for MemoryStore {
    fn snapshot(&self, id: &str) -> Result<VersionedDocument, StoreError> {
        self.documents
            .lock()
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }

    fn compare_and_swap(&self, id: &str, expected_version: u64, document: Document) -> Result<u64, StoreError> {
        let mut documents = self.documents.lock();
        let current = documents
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        if current.version != expected_version {
            return Err(StoreError::Conflict {
                id: id.to_string(),
                expected: expected_version,
                actual: current.version,
            });
        }
        current.document = document;
        current.version += 1;
        Ok(current.version)
    }

    fn max_attempts(&self) -> usize {
        self.max_attempts
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn insert_and_snapshot() {
        let store = MemoryStore::new();
        assert_eq!(store.insert("brief", Document::from_paragraphs(&["a"])), 1);
        let snap = store.snapshot("brief").unwrap();
        assert_eq!(snap.version, 1);
        assert_eq!(snap.document.block_texts(), vec!["a"]);
        assert_eq!(store.ids(), vec!["brief"]);
    }

    #[test]
    fn missing_documents() {
        let store = MemoryStore::new();
        assert_eq!(store.snapshot("nope"), Err(StoreError::NotFound("nope".to_string())));
        assert!(matches!(
            store.transform("nope", |doc| (doc.clone(), ())),
            Err(StoreError::NotFound(_))
        ));
    }

    #[test]
    fn stale_versions_conflict() {
        let store = MemoryStore::new();
        store.insert("brief", Document::from_paragraphs(&["a"]));
        assert_eq!(store.compare_and_swap("brief", 1, Document::from_paragraphs(&["b"])), Ok(2));
        assert_eq!(
            store.compare_and_swap("brief", 1, Document::from_paragraphs(&["c"])),
            Err(StoreError::Conflict {
                id: "brief".to_string(),
                expected: 1,
                actual: 2,
            })
        );
    }

    #[test]
    fn transform_retries_after_a_concurrent_write() {
        let store = MemoryStore::new();
        store.insert("brief", Document::from_paragraphs(&["a"]));
        let runs = Cell::new(0);
        let (seen, version) = store
            .transform("brief", |doc| {
                runs.set(runs.get() + 1);
                if runs.get() == 1 {
                    // another writer sneaks in before our swap
                    store.insert("brief", Document::from_paragraphs(&["b"]));
                }
                (Document::from_paragraphs(&["c"]), doc.block_texts())
            })
            .unwrap();
        assert_eq!(runs.get(), 2);
        assert_eq!(seen, vec!["b"]);
        assert_eq!(version, 3);
    }

    #[test]
    fn transform_gives_up() {
        let store = MemoryStore::new().with_max_attempts(2);
        store.insert("brief", Document::default());
        let result = store.transform("brief", |doc| {
            store.insert("brief", Document::default());
            (doc.clone(), ())
        });
        assert_eq!(
            result,
            Err(StoreError::RetriesExhausted {
                id: "brief".to_string(),
                attempts: 2,
            })
        );
    }
}
