use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::error::EngineError;

const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "tiff", "bmp", "gif", "webp"];
const NOTE_EXTENSIONS: &[&str] = &["md", "markdown", "txt"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemKind {
    Image,
    Note,
}

/// One addressable item in the collection. `path` is the stable identifier
/// used as the index key; `modified_ms` is the last-modified time in epoch
/// milliseconds.
#[derive(Debug, Clone)]
pub struct VaultItem {
    pub path: String,
    pub name: String,
    pub kind: ItemKind,
    pub modified_ms: i64,
}

impl VaultItem {
    /// File name without its extension.
    pub fn base_name(&self) -> &str {
        match self.name.rsplit_once('.') {
            Some((base, _)) if !base.is_empty() => base,
            _ => &self.name,
        }
    }
}

/// Host document-collection boundary: enumeration, reads and timestamps are
/// provided by the surrounding runtime, not by the engine.
#[async_trait]
pub trait Vault: Send + Sync {
    async fn list_items(&self) -> Result<Vec<VaultItem>, EngineError>;
    async fn read_document(&self, path: &str) -> Result<String, EngineError>;
    async fn modified_ms(&self, path: &str) -> Result<i64, EngineError>;
    /// Absolute path handed to the recognizer for an item identifier.
    fn resolve_display_path(&self, path: &str) -> String;
}

/// Opaque external recognition call. May fail; the engine degrades to an
/// empty result.
#[async_trait]
pub trait Recognizer: Send + Sync {
    async fn recognize(&self, absolute_path: &str) -> Result<String, EngineError>;
}

pub fn is_image_candidate(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| IMAGE_EXTENSIONS.contains(&e.to_lowercase().as_str()))
        .unwrap_or(false)
}

pub fn is_note_candidate(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| NOTE_EXTENSIONS.contains(&e.to_lowercase().as_str()))
        .unwrap_or(false)
}

/// Filesystem-backed vault rooted at a directory. Item identifiers are paths
/// relative to the root, with `/` separators.
pub struct FsVault {
    root: PathBuf,
}

impl FsVault {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn absolute(&self, path: &str) -> PathBuf {
        self.root.join(path)
    }
}

fn modified_ms_of(metadata: &std::fs::Metadata) -> i64 {
    metadata
        .modified()
        .ok()
        .map(|t| chrono::DateTime::<chrono::Utc>::from(t).timestamp_millis())
        .unwrap_or(0)
}

fn is_hidden(entry: &walkdir::DirEntry) -> bool {
    entry.file_name().to_string_lossy().starts_with('.')
}

#[async_trait]
impl Vault for FsVault {
    async fn list_items(&self) -> Result<Vec<VaultItem>, EngineError> {
        let mut items = Vec::new();
        for entry in walkdir::WalkDir::new(&self.root)
            .min_depth(1)
            .into_iter()
            .filter_entry(|e| !is_hidden(e))
            .filter_map(|e| e.ok())
        {
            if !entry.file_type().is_file() {
                continue;
            }
            let path = entry.path();
            let kind = if is_image_candidate(path) {
                ItemKind::Image
            } else if is_note_candidate(path) {
                ItemKind::Note
            } else {
                continue;
            };
            let relative = path
                .strip_prefix(&self.root)
                .map_err(|e| EngineError::Vault(e.to_string()))?;
            let name = match path.file_name() {
                Some(n) => n.to_string_lossy().to_string(),
                None => continue,
            };
            let modified_ms = entry.metadata().map(|m| modified_ms_of(&m)).unwrap_or(0);
            items.push(VaultItem {
                path: relative.to_string_lossy().replace('\\', "/"),
                name,
                kind,
                modified_ms,
            });
        }
        Ok(items)
    }

    async fn read_document(&self, path: &str) -> Result<String, EngineError> {
        Ok(tokio::fs::read_to_string(self.absolute(path)).await?)
    }

    async fn modified_ms(&self, path: &str) -> Result<i64, EngineError> {
        let metadata = tokio::fs::metadata(self.absolute(path)).await?;
        Ok(modified_ms_of(&metadata))
    }

    fn resolve_display_path(&self, path: &str) -> String {
        self.absolute(path).to_string_lossy().to_string()
    }
}
