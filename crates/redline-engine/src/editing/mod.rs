//! # Edit Applier
//!
//! Applies one [`EditOperation`] to the current document state. Targets are
//! resolved by rebuilding the projection and normalized index against the
//! tree as it stands, so earlier operations in a batch never leave later
//! ones pointing at stale positions.
//!
//! A failed operation returns an [`EditError`] and leaves the document
//! untouched; callers record it as skipped and carry on.
//!
//! ## Modules
//!
//! - **`ops`**: `EditOperation` and its JSON wire format
//! - **`markup`**: `[b]..[/b]` style inline tags in edit payloads
//! - **`blocks`**: block kinds and construction for `add_block`
//! - **`applier`**: resolution and mutation per operation kind

pub mod applier;
pub mod blocks;
pub mod markup;
pub mod ops;

use thiserror::Error;

use crate::tree::TreeError;

pub use applier::Applier;
pub use blocks::{BlockKind, build_block};
pub use ops::{EditOperation, FindSpec, InsertTarget};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EditError {
    #[error("text not found: {text:?}")]
    AnchorNotFound { text: String },
    #[error("{count} matches for {text:?}; give an occurrence to pick one")]
    AmbiguousMatch { text: String, count: usize },
    #[error("range {from}..{to} is invalid for a document of size {size}")]
    InvalidRange { from: usize, to: usize, size: usize },
    #[error("unsupported kind: {0}")]
    UnsupportedKind(String),
    #[error("no match for {text:?} needs its {mark} mark changed")]
    NoEligibleMatch { text: String, mark: String },
    #[error("operation has no text to insert or find")]
    EmptyText,
    #[error(transparent)]
    Tree(#[from] TreeError),
}
