//! Batch orchestration.
//!
//! A batch applies its operations in order against the evolving in-memory
//! document, skipping the ones that fail, then annotates the difference
//! between the pre-batch and post-batch trees as one change group.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::changes::{ChangeSource, DiffConfig, MergeFn, merge, track_changes_with};
use crate::editing::{Applier, EditOperation};
use crate::matching::MatcherConfig;
use crate::schema::{DefaultSchema, Schema};
use crate::store::{DocumentStore, StoreError};
use crate::tree::Document;

const DEFAULT_LABEL: &str = "Edits";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub matcher: MatcherConfig,
    pub diff: DiffConfig,
}

/// What happened to one operation of a batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationResult {
    pub index: usize,
    pub kind: String,
    pub applied: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BatchOutcome {
    pub document: Document,
    pub results: Vec<OperationResult>,
    pub change_id: Option<String>,
}

impl BatchOutcome {
    pub fn applied(&self) -> usize {
        self.results.iter().filter(|r| r.applied).count()
    }

    pub fn total(&self) -> usize {
        self.results.len()
    }

    pub fn message(&self) -> String {
        batch_message(self.applied(), self.total())
    }
}

pub fn batch_message(applied: usize, total: usize) -> String {
    format!("{applied} of {total} operations applied")
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchRequest {
    pub document_id: String,
    pub operations: Vec<EditOperation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default)]
    pub source: ChangeSource,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchReport {
    /// At least one operation applied (or there were none to apply).
    pub success: bool,
    pub applied: usize,
    pub total: usize,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub change_id: Option<String>,
    pub version: u64,
    pub results: Vec<OperationResult>,
}

pub struct Engine {
    config: EngineConfig,
    schema: Arc<dyn Schema>,
    merge: MergeFn,
}

impl Default for Engine {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

impl Engine {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            schema: Arc::new(DefaultSchema),
            merge,
        }
    }

    pub fn with_schema(mut self, schema: Arc<dyn Schema>) -> Self {
        self.schema = schema;
        self
    }

    #[cfg(test)]
    pub(crate) fn with_merge(mut self, merge: MergeFn) -> Self {
        self.merge = merge;
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Applies `operations` in order, each against the result of the
    /// previous ones. Failed operations are recorded and skipped.
    pub fn apply_operations(&self, doc: &Document, operations: &[EditOperation]) -> (Document, Vec<OperationResult>) {
        let applier = Applier::new(&self.config.matcher, self.schema.as_ref());
        let mut current = doc.clone();
        let mut results = Vec::with_capacity(operations.len());
        for (index, op) in operations.iter().enumerate() {
            let result = match applier.apply(&current, op) {
                Ok(next) => {
                    log::debug!("operation {index} ({}) applied", op.kind());
                    current = next;
                    OperationResult {
                        index,
                        kind: op.kind().to_string(),
                        applied: true,
                        error: None,
                    }
                }
                Err(e) => {
                    log::warn!("operation {index} ({}) skipped: {e}", op.kind());
                    OperationResult {
                        index,
                        kind: op.kind().to_string(),
                        applied: false,
                        error: Some(e.to_string()),
                    }
                }
            };
            results.push(result);
        }
        (current, results)
    }

    /// Applies a batch and annotates its changes as one group.
    pub fn apply_batch(
        &self,
        doc: &Document,
        operations: &[EditOperation],
        label: Option<&str>,
        source: ChangeSource,
    ) -> BatchOutcome {
        let (edited, results) = self.apply_operations(doc, operations);
        let tracked = track_changes_with(
            doc,
            &edited,
            &self.config.diff,
            label.unwrap_or(DEFAULT_LABEL),
            source,
            self.merge,
        );
        BatchOutcome {
            document: tracked.document,
            results,
            change_id: tracked.change_id,
        }
    }

    /// Runs a batch against a stored document. Only store failures are
    /// errors; skipped operations are reported in the result.
    pub fn run<S: DocumentStore>(&self, store: &S, request: &BatchRequest) -> Result<BatchReport, StoreError> {
        let (outcome, version) = store.transform(&request.document_id, |doc| {
            let outcome = self.apply_batch(doc, &request.operations, request.label.as_deref(), request.source);
            (outcome.document.clone(), outcome)
        })?;

        let (applied, total) = (outcome.applied(), outcome.total());
        let message = outcome.message();
        log::debug!("document {}: {message}, version {version}", request.document_id);
        Ok(BatchReport {
            success: applied > 0 || total == 0,
            applied,
            total,
            message,
            change_id: outcome.change_id,
            version,
            results: outcome.results,
        })
    }
}
