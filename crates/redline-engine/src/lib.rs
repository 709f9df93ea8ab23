pub mod changes;
pub mod editing;
pub mod invariants;
pub mod matching;
pub mod outline;
pub mod projection;
pub mod schema;
pub mod session;
pub mod store;
pub mod tree;

// Re-export key types for easier usage
pub use changes::{ChangeGroup, ChangeSource, DiffConfig, GroupPatch, track_changes};
pub use editing::{EditError, EditOperation, FindSpec, InsertTarget};
pub use matching::{Match, MatcherConfig};
pub use projection::{Projection, ProjectionOptions, TextRange, project};
pub use schema::{CachedSchema, DefaultSchema, Schema, StaticVocabulary, Vocabulary};
pub use session::{BatchOutcome, BatchReport, BatchRequest, Engine, EngineConfig, OperationResult};
pub use store::{DocumentStore, MemoryStore, StoreError, VersionedDocument};
pub use tree::{ChangeType, Document, Mark, Node, SemanticType};
