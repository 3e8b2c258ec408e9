use std::collections::HashMap;
use std::path::PathBuf;

use tracing::warn;

use crate::error::EngineError;
use crate::models::recognition::RecognitionResult;

/// Persists the whole recognition index as one JSON document mapping item
/// identifier to result. There is no schema version field; fields added
/// later deserialize as absent.
pub struct IndexStore {
    path: PathBuf,
}

impl IndexStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Loads the persisted index. A missing or unreadable file degrades to
    /// an empty index; the engine simply starts with nothing indexed.
    pub fn load(&self) -> HashMap<String, RecognitionResult> {
        let bytes = match std::fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return HashMap::new(),
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "failed to read index, starting empty");
                return HashMap::new();
            }
        };
        match serde_json::from_slice(&bytes) {
            Ok(entries) => entries,
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "corrupt index file, starting empty");
                HashMap::new()
            }
        }
    }

    pub fn save(&self, entries: &HashMap<String, RecognitionResult>) -> Result<(), EngineError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let bytes = serde_json::to_vec(entries)?;
        std::fs::write(&self.path, bytes)?;
        Ok(())
    }

    pub fn serialized_size(entries: &HashMap<String, RecognitionResult>) -> u64 {
        serde_json::to_vec(entries).map(|b| b.len() as u64).unwrap_or(0)
    }
}
