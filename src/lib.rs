pub mod config;
pub mod data;
pub mod engine;
pub mod error;
pub mod models;
pub mod services;
pub mod vault;

pub use config::{EngineConfig, ScoreWeights};
pub use engine::SearchEngine;
pub use error::EngineError;
pub use models::recognition::{
    IndexStats, RecognitionResult, ReferenceContext, ReferencingDocument,
};
pub use models::search::{Block, SearchResult, SearchTerm};
pub use services::indexing_service::{IndexOutcome, ProgressFn};
pub use vault::{FsVault, ItemKind, Recognizer, Vault, VaultItem};
