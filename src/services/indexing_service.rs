use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use futures::future::join_all;
use tracing::{debug, warn};

use crate::data::index_store::IndexStore;
use crate::services::cache_service::RecognitionCache;
use crate::services::context_service::ContextExtractor;
use crate::vault::{Recognizer, Vault, VaultItem};

pub type ProgressFn<'a> = dyn Fn(usize, usize) + Send + Sync + 'a;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexOutcome {
    pub indexed: usize,
    pub skipped: usize,
}

fn lock_cache(cache: &Mutex<RecognitionCache>) -> std::sync::MutexGuard<'_, RecognitionCache> {
    cache.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Recognizes one item and stores the result. Recognition failure or
/// timeout stores an empty text entry; nothing here aborts the batch.
async fn process_item(
    vault: &dyn Vault,
    recognizer: &dyn Recognizer,
    cache: &Mutex<RecognitionCache>,
    extractor: &ContextExtractor,
    item: &VaultItem,
    corpus: &[VaultItem],
    recognition_timeout: Duration,
) {
    let absolute = vault.resolve_display_path(&item.path);
    let text = match tokio::time::timeout(recognition_timeout, recognizer.recognize(&absolute))
        .await
    {
        Ok(Ok(text)) => text,
        Ok(Err(e)) => {
            warn!(path = %item.path, error = %e, "recognition failed, storing empty result");
            String::new()
        }
        Err(_) => {
            warn!(path = %item.path, "recognition timed out, storing empty result");
            String::new()
        }
    };

    let context = extractor.extract(vault, item, corpus).await;
    lock_cache(cache).put(&item.path, text, None, Some(context));
}

/// Drives recognition over `items` in chunks of `concurrency_limit`: every
/// recognition in a chunk runs concurrently, the whole chunk finishes before
/// the next one starts, and the index is persisted after each chunk, so a
/// crash loses at most one chunk of work. Progress fires after every item.
#[allow(clippy::too_many_arguments)]
pub async fn index_all(
    vault: &dyn Vault,
    recognizer: &dyn Recognizer,
    cache: &Mutex<RecognitionCache>,
    store: &IndexStore,
    extractor: &ContextExtractor,
    items: &[VaultItem],
    corpus: &[VaultItem],
    concurrency_limit: usize,
    recognition_timeout: Duration,
    on_progress: Option<&ProgressFn<'_>>,
) -> usize {
    let total = items.len();
    if total == 0 {
        return 0;
    }

    let processed = AtomicUsize::new(0);
    for chunk in items.chunks(concurrency_limit.max(1)) {
        join_all(chunk.iter().map(|item| async {
            process_item(
                vault,
                recognizer,
                cache,
                extractor,
                item,
                corpus,
                recognition_timeout,
            )
            .await;
            let done = processed.fetch_add(1, Ordering::SeqCst) + 1;
            if let Some(progress) = on_progress {
                progress(done, total);
            }
        }))
        .await;

        let saved = store.save(lock_cache(cache).entries());
        if let Err(e) = saved {
            warn!(error = %e, "failed to persist index, in-memory state remains authoritative");
        }
    }

    processed.into_inner()
}

/// Partitions `items` into stale and fresh under the cache's staleness rule,
/// indexes only the stale set, and reports both counts.
#[allow(clippy::too_many_arguments)]
pub async fn incremental_update(
    vault: &dyn Vault,
    recognizer: &dyn Recognizer,
    cache: &Mutex<RecognitionCache>,
    store: &IndexStore,
    extractor: &ContextExtractor,
    items: &[VaultItem],
    corpus: &[VaultItem],
    concurrency_limit: usize,
    recognition_timeout: Duration,
    on_progress: Option<&ProgressFn<'_>>,
) -> IndexOutcome {
    let (stale, fresh): (Vec<VaultItem>, Vec<VaultItem>) = items
        .iter()
        .cloned()
        .partition(|item| lock_cache(cache).is_stale(&item.path, item.modified_ms));

    debug!(stale = stale.len(), fresh = fresh.len(), "incremental update partition");

    index_all(
        vault,
        recognizer,
        cache,
        store,
        extractor,
        &stale,
        corpus,
        concurrency_limit,
        recognition_timeout,
        on_progress,
    )
    .await;

    IndexOutcome {
        indexed: stale.len(),
        skipped: fresh.len(),
    }
}
