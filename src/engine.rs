use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tracing::warn;

use crate::config::EngineConfig;
use crate::data::index_store::IndexStore;
use crate::error::EngineError;
use crate::models::recognition::{IndexStats, RecognitionResult};
use crate::models::search::SearchResult;
use crate::services::cache_service::RecognitionCache;
use crate::services::context_service::ContextExtractor;
use crate::services::indexing_service::{self, IndexOutcome, ProgressFn};
use crate::services::search_service;
use crate::vault::{ItemKind, Recognizer, Vault, VaultItem};

/// One index session over a vault: owns the recognition cache, the
/// per-document content cache, the compiled-pattern cache and the
/// current-query token, so independent engines never share state.
pub struct SearchEngine {
    vault: Arc<dyn Vault>,
    recognizer: Arc<dyn Recognizer>,
    config: EngineConfig,
    cache: Mutex<RecognitionCache>,
    store: IndexStore,
    extractor: ContextExtractor,
    query_generation: AtomicU64,
}

impl SearchEngine {
    /// Opens an engine over `vault`, loading any previously persisted index
    /// from `index_path`. A missing or corrupt index file starts the session
    /// with nothing indexed.
    pub fn open(
        vault: Arc<dyn Vault>,
        recognizer: Arc<dyn Recognizer>,
        index_path: impl Into<PathBuf>,
        config: EngineConfig,
    ) -> Self {
        let store = IndexStore::new(index_path);
        let cache = RecognitionCache::with_entries(store.load(), config.stale_after_days);
        let extractor = ContextExtractor::new(config.context_lines, config.context_batch_size);
        Self {
            vault,
            recognizer,
            cache: Mutex::new(cache),
            store,
            extractor,
            query_generation: AtomicU64::new(0),
            config,
        }
    }

    fn lock_cache(&self) -> MutexGuard<'_, RecognitionCache> {
        self.cache.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn recognition_timeout(&self) -> Duration {
        Duration::from_secs(self.config.recognition_timeout_secs)
    }

    async fn partition_items(&self) -> Result<(Vec<VaultItem>, Vec<VaultItem>), EngineError> {
        let items = self.vault.list_items().await?;
        Ok(items.into_iter().partition(|i| i.kind == ItemKind::Image))
    }

    /// Runs a query. A later call supersedes any search still in flight;
    /// the superseded one resolves to an empty list.
    pub async fn search(&self, query: &str) -> Result<Vec<SearchResult>, EngineError> {
        let generation = self.query_generation.fetch_add(1, Ordering::SeqCst) + 1;
        let is_current = || self.query_generation.load(Ordering::SeqCst) == generation;
        search_service::search(
            self.vault.as_ref(),
            &self.cache,
            &self.config,
            query,
            &is_current,
        )
        .await
    }

    /// Recognizes every image in the vault, fresh or not.
    pub async fn index_all(
        &self,
        on_progress: Option<&ProgressFn<'_>>,
    ) -> Result<usize, EngineError> {
        let (images, notes) = self.partition_items().await?;
        Ok(indexing_service::index_all(
            self.vault.as_ref(),
            self.recognizer.as_ref(),
            &self.cache,
            &self.store,
            &self.extractor,
            &images,
            &notes,
            self.config.concurrency_limit,
            self.recognition_timeout(),
            on_progress,
        )
        .await)
    }

    /// Recognizes only the images whose cache entries are stale.
    pub async fn incremental_update(
        &self,
        on_progress: Option<&ProgressFn<'_>>,
    ) -> Result<IndexOutcome, EngineError> {
        let (images, notes) = self.partition_items().await?;
        Ok(indexing_service::incremental_update(
            self.vault.as_ref(),
            self.recognizer.as_ref(),
            &self.cache,
            &self.store,
            &self.extractor,
            &images,
            &notes,
            self.config.concurrency_limit,
            self.recognition_timeout(),
            on_progress,
        )
        .await)
    }

    /// Drops every cached recognition result and all derived caches, and
    /// persists the empty index. A persistence failure is logged; the
    /// in-memory state is cleared either way.
    pub fn clear_index(&self) {
        let mut cache = self.lock_cache();
        cache.clear();
        self.extractor.clear();
        if let Err(e) = self.store.save(cache.entries()) {
            warn!(error = %e, "failed to persist cleared index");
        }
    }

    pub fn index_stats(&self) -> IndexStats {
        let cache = self.lock_cache();
        IndexStats {
            total: cache.len(),
            size_bytes: IndexStore::serialized_size(cache.entries()),
        }
    }

    pub fn cached_result(&self, id: &str) -> Option<RecognitionResult> {
        self.lock_cache().get(id).cloned()
    }

    /// Final persist. The in-memory index is dropped with the engine.
    pub fn close(self) -> Result<(), EngineError> {
        self.store.save(self.lock_cache().entries())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vault::testing::{MemoryVault, StubRecognizer};

    fn engine_with(
        vault: MemoryVault,
        recognizer: StubRecognizer,
        dir: &tempfile::TempDir,
    ) -> SearchEngine {
        SearchEngine::open(
            Arc::new(vault),
            Arc::new(recognizer),
            dir.path().join("index.json"),
            EngineConfig::default(),
        )
    }

    fn fixture_vault() -> (MemoryVault, StubRecognizer) {
        let mut vault = MemoryVault::default();
        vault.add_image("pics/receipt.png", 100);
        vault.add_note(
            "notes/budget.md",
            "# Budget Review\n\nreceipt from the market\n![[receipt.png]]\nremember to log these groceries\n",
            100,
        );
        let recognizer = StubRecognizer::default()
            .with_text("/vault/pics/receipt.png", "grocery total 42.17");
        (vault, recognizer)
    }

    #[tokio::test]
    async fn test_index_then_search_end_to_end() {
        let dir = tempfile::tempdir().unwrap();
        let (vault, recognizer) = fixture_vault();
        let engine = engine_with(vault, recognizer, &dir);

        let processed = engine.index_all(None).await.unwrap();
        assert_eq!(processed, 1);

        let results = engine.search("42.17").await.unwrap();
        assert_eq!(results.len(), 1);
        assert!(results[0].is_image_result);
        assert_eq!(results[0].path, "pics/receipt.png");

        // The heading matches through the note pass.
        let results = engine.search("budget review").await.unwrap();
        assert!(results.iter().any(|r| r.is_title && r.path == "notes/budget.md"));
    }

    #[tokio::test]
    async fn test_reference_context_is_attached_and_searchable() {
        let dir = tempfile::tempdir().unwrap();
        let (vault, recognizer) = fixture_vault();
        let engine = engine_with(vault, recognizer, &dir);
        engine.index_all(None).await.unwrap();

        let cached = engine.cached_result("pics/receipt.png").unwrap();
        let context = cached.context.unwrap();
        assert_eq!(context.referencing_documents[0].path, "notes/budget.md");
        assert!(context.nearby_content.contains("groceries"));

        // "groceries" appears only in the nearby prose, not in the
        // recognized text, and still finds the image.
        let results = engine.search("groceries").await.unwrap();
        assert!(results.iter().any(|r| r.is_image_result));
    }

    #[tokio::test]
    async fn test_index_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let (vault, recognizer) = fixture_vault();
        let engine = engine_with(vault, recognizer, &dir);
        engine.index_all(None).await.unwrap();
        engine.close().unwrap();

        let (vault, recognizer) = fixture_vault();
        let reopened = engine_with(vault, recognizer, &dir);
        assert_eq!(reopened.index_stats().total, 1);
        assert_eq!(
            reopened.cached_result("pics/receipt.png").unwrap().text,
            "grocery total 42.17"
        );

        // Nothing is stale, so reopening performs zero recognitions.
        let outcome = reopened.incremental_update(None).await.unwrap();
        assert_eq!(outcome, IndexOutcome { indexed: 0, skipped: 1 });
    }

    #[tokio::test]
    async fn test_clear_index_empties_and_persists() {
        let dir = tempfile::tempdir().unwrap();
        let (vault, recognizer) = fixture_vault();
        let engine = engine_with(vault, recognizer, &dir);
        engine.index_all(None).await.unwrap();
        assert_eq!(engine.index_stats().total, 1);

        engine.clear_index();
        assert_eq!(engine.index_stats().total, 0);
        assert!(engine.cached_result("pics/receipt.png").is_none());

        let (vault, recognizer) = fixture_vault();
        let reopened = engine_with(vault, recognizer, &dir);
        assert_eq!(reopened.index_stats().total, 0);
    }

    #[tokio::test]
    async fn test_index_stats_track_size() {
        let dir = tempfile::tempdir().unwrap();
        let (vault, recognizer) = fixture_vault();
        let engine = engine_with(vault, recognizer, &dir);

        let before = engine.index_stats();
        assert_eq!(before.total, 0);

        engine.index_all(None).await.unwrap();
        let after = engine.index_stats();
        assert_eq!(after.total, 1);
        assert!(after.size_bytes > before.size_bytes);
    }

    #[tokio::test]
    async fn test_search_through_fs_vault() {
        let dir = tempfile::tempdir().unwrap();
        let vault_dir = tempfile::tempdir().unwrap();
        std::fs::write(
            vault_dir.path().join("notes.md"),
            "# Migration Plan\n\nsteps to follow\n",
        )
        .unwrap();

        let engine = SearchEngine::open(
            Arc::new(crate::vault::FsVault::new(vault_dir.path())),
            Arc::new(StubRecognizer::default()),
            dir.path().join("index.json"),
            EngineConfig::default(),
        );

        let results = engine.search("migration").await.unwrap();
        assert_eq!(results.len(), 1);
        assert!(results[0].is_title);
        assert_eq!(results[0].path, "notes.md");
    }
}
