use std::sync::Mutex;

use tracing::{debug, warn};

use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::models::search::{SearchResult, SearchTerm};
use crate::services::cache_service::RecognitionCache;
use crate::services::{query_service, scoring_service, segment_service};
use crate::vault::{ItemKind, Vault, VaultItem};

const IMAGE_SNIPPET_CHARS: usize = 200;

fn truncate_chars(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        text.to_string()
    } else {
        text.chars().take(max).collect()
    }
}

fn lock_cache(cache: &Mutex<RecognitionCache>) -> std::sync::MutexGuard<'_, RecognitionCache> {
    cache.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn image_result(
    item: &VaultItem,
    cache: &Mutex<RecognitionCache>,
    terms: &[SearchTerm],
    config: &EngineConfig,
) -> Option<SearchResult> {
    let (searchable, entry) = {
        let mut cache = lock_cache(cache);
        let searchable = cache.searchable_content(&item.path)?.to_string();
        let entry = cache.get(&item.path)?.clone();
        (searchable, entry)
    };

    if !query_service::evaluate(terms, &searchable) {
        return None;
    }

    let weights = &config.weights;
    let mut score =
        scoring_service::score_recognition(&entry.text, terms, weights) + weights.image_result_bonus;

    // Cross-category bonuses: a raw filename hit dominates body matches,
    // and a display name matching every positive term dominates everything.
    let positive_terms = terms.iter().filter(|t| !t.is_negated).count();
    let name_matches = query_service::matched_terms(terms, &item.name);
    if !name_matches.is_empty() {
        score += weights.filename_match_bonus;
    }
    if positive_terms > 0 && name_matches.len() == positive_terms {
        score += weights.display_name_match_bonus;
    }

    Some(SearchResult {
        path: item.path.clone(),
        matched_content: truncate_chars(entry.text.trim(), IMAGE_SNIPPET_CHARS),
        start_line: 0,
        end_line: 0,
        matched_terms: query_service::matched_terms(terms, &searchable),
        score,
        context: entry
            .context
            .map(|c| c.nearby_content)
            .unwrap_or_default(),
        is_title: false,
        is_image_result: true,
    })
}

/// Evaluates a parsed-and-gated query against cached recognition results and
/// segmented note blocks. Results sort by the owning item's modification
/// time, newest first, with score as the tiebreak, capped at
/// `config.max_results`. `is_current` is polled between documents; a search
/// superseded by a newer query returns an empty list.
pub async fn search(
    vault: &dyn Vault,
    cache: &Mutex<RecognitionCache>,
    config: &EngineConfig,
    query: &str,
    is_current: &(dyn Fn() -> bool + Sync),
) -> Result<Vec<SearchResult>, EngineError> {
    let mut terms = query_service::parse(query);
    terms.retain(|t| t.text.chars().count() >= config.min_term_chars);
    if terms.is_empty() {
        return Ok(Vec::new());
    }

    let items = vault.list_items().await?;
    let mut ranked: Vec<(i64, SearchResult)> = Vec::new();

    for item in items.iter().filter(|i| i.kind == ItemKind::Image) {
        if let Some(result) = image_result(item, cache, &terms, config) {
            ranked.push((item.modified_ms, result));
        }
    }

    for item in items.iter().filter(|i| i.kind == ItemKind::Note) {
        if !is_current() {
            debug!(%query, "query superseded, dropping partial results");
            return Ok(Vec::new());
        }
        let content = match vault.read_document(&item.path).await {
            Ok(content) => content,
            Err(e) => {
                warn!(path = %item.path, error = %e, "skipping unreadable document");
                continue;
            }
        };
        for block in segment_service::segment(&content) {
            if !query_service::evaluate(&terms, &block.content) {
                continue;
            }
            let score = scoring_service::score_block(
                &block.content,
                &terms,
                block.is_title,
                &config.weights,
            );
            ranked.push((
                item.modified_ms,
                SearchResult {
                    path: item.path.clone(),
                    matched_content: block.content.clone(),
                    start_line: block.start_line,
                    end_line: block.end_line,
                    matched_terms: query_service::matched_terms(&terms, &block.content),
                    score,
                    context: String::new(),
                    is_title: block.is_title,
                    is_image_result: false,
                },
            ));
        }
    }

    if !is_current() {
        debug!(%query, "query superseded, dropping results");
        return Ok(Vec::new());
    }

    ranked.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| b.1.score.total_cmp(&a.1.score)));
    ranked.truncate(config.max_results);
    Ok(ranked.into_iter().map(|(_, result)| result).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vault::testing::MemoryVault;

    fn always_current() -> impl Fn() -> bool + Sync {
        || true
    }

    fn config() -> EngineConfig {
        EngineConfig::default()
    }

    async fn run(
        vault: &MemoryVault,
        cache: &Mutex<RecognitionCache>,
        query: &str,
    ) -> Vec<SearchResult> {
        search(vault, cache, &config(), query, &always_current())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_empty_query_returns_nothing() {
        let vault = MemoryVault::default();
        let cache = Mutex::new(RecognitionCache::new(30));
        assert!(run(&vault, &cache, "").await.is_empty());
        assert!(run(&vault, &cache, "   ").await.is_empty());
    }

    #[tokio::test]
    async fn test_short_terms_are_gated_out() {
        let mut vault = MemoryVault::default();
        vault.add_note("a.md", "x marks the spot", 1);
        let cache = Mutex::new(RecognitionCache::new(30));
        assert!(run(&vault, &cache, "x").await.is_empty());
    }

    #[tokio::test]
    async fn test_heading_match_outranks_body_match() {
        let mut vault = MemoryVault::default();
        vault.add_note("plan.md", "# Project Plan\n\ndetails here\n", 100);
        vault.add_note("other.md", "we should plan the trip\n", 100);
        let cache = Mutex::new(RecognitionCache::new(30));

        let results = run(&vault, &cache, "plan").await;
        assert!(results.len() >= 2);
        assert_eq!(results[0].path, "plan.md");
        assert!(results[0].is_title);
        assert_eq!(results[0].start_line, 1);
    }

    #[tokio::test]
    async fn test_recency_is_the_primary_sort_key() {
        let mut vault = MemoryVault::default();
        vault.add_note("old.md", "# Budget\n", 100);
        vault.add_note("new.md", "budget numbers in passing\n", 200);
        let cache = Mutex::new(RecognitionCache::new(30));

        let results = run(&vault, &cache, "budget").await;
        // The newer document wins even though the older one has a title hit.
        assert_eq!(results[0].path, "new.md");
        assert_eq!(results[1].path, "old.md");
    }

    #[tokio::test]
    async fn test_image_results_come_from_cached_recognition() {
        let mut vault = MemoryVault::default();
        vault.add_image("pics/receipt.png", 100);
        let cache = Mutex::new(RecognitionCache::new(30));
        lock_cache(&cache).put(
            "pics/receipt.png",
            "Grocery total 42.17".to_string(),
            Some(88.0),
            None,
        );

        let results = run(&vault, &cache, "grocery").await;
        assert_eq!(results.len(), 1);
        let hit = &results[0];
        assert!(hit.is_image_result);
        assert_eq!(hit.path, "pics/receipt.png");
        assert_eq!(hit.matched_content, "Grocery total 42.17");
        assert_eq!(hit.matched_terms, vec!["grocery"]);
        // Recognition score (one hit, short text) plus the image bonus.
        assert_eq!(hit.score, 20.0 + 30.0 + 500.0);
    }

    #[tokio::test]
    async fn test_filename_and_display_name_bonuses() {
        let mut vault = MemoryVault::default();
        vault.add_image("pics/invoice-march.png", 100);
        vault.add_image("pics/scan001.png", 100);
        let cache = Mutex::new(RecognitionCache::new(30));
        lock_cache(&cache).put(
            "pics/invoice-march.png",
            "invoice for march".to_string(),
            None,
            None,
        );
        lock_cache(&cache).put("pics/scan001.png", "another invoice".to_string(), None, None);

        let results = run(&vault, &cache, "invoice").await;
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].path, "pics/invoice-march.png");
        // Filename hit plus every-term name match stack on top of the image
        // bonus.
        assert!(results[0].score - results[1].score >= 3000.0);
    }

    #[tokio::test]
    async fn test_image_match_through_reference_context() {
        let mut vault = MemoryVault::default();
        vault.add_image("pics/whiteboard.png", 100);
        let cache = Mutex::new(RecognitionCache::new(30));
        lock_cache(&cache).put(
            "pics/whiteboard.png",
            "illegible scrawl".to_string(),
            None,
            Some(crate::models::recognition::ReferenceContext {
                referencing_documents: vec![crate::models::recognition::ReferencingDocument {
                    title: "Sprint Retro".to_string(),
                    path: "retro.md".to_string(),
                }],
                nearby_content: "action items from tuesday".to_string(),
            }),
        );

        // Matches the referencing title, not the recognized text.
        let results = run(&vault, &cache, "sprint retro").await;
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].context, "action items from tuesday");
    }

    #[tokio::test]
    async fn test_negation_filters_blocks() {
        let mut vault = MemoryVault::default();
        vault.add_note("a.md", "report draft\n\nreport final\n", 1);
        let cache = Mutex::new(RecognitionCache::new(30));

        let results = run(&vault, &cache, "report -draft").await;
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].matched_content, "report final");
    }

    #[tokio::test]
    async fn test_unreadable_note_is_skipped() {
        let mut vault = MemoryVault::default();
        vault.add_note("good.md", "findings here\n", 1);
        vault.add_note("bad.md", "findings too\n", 1);
        vault.unreadable.push("bad.md".to_string());
        let cache = Mutex::new(RecognitionCache::new(30));

        let results = run(&vault, &cache, "findings").await;
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].path, "good.md");
    }

    #[tokio::test]
    async fn test_result_cap_applies() {
        let mut vault = MemoryVault::default();
        for i in 0..60 {
            vault.add_note(&format!("n{i}.md"), "common word\n", i);
        }
        let cache = Mutex::new(RecognitionCache::new(30));

        let results = run(&vault, &cache, "common").await;
        assert_eq!(results.len(), 50);
        // Newest first.
        assert_eq!(results[0].path, "n59.md");
    }

    #[tokio::test]
    async fn test_superseded_query_returns_empty() {
        let mut vault = MemoryVault::default();
        vault.add_note("a.md", "anything at all\n", 1);
        let cache = Mutex::new(RecognitionCache::new(30));

        let superseded = || false;
        let results = search(&vault, &cache, &config(), "anything", &superseded)
            .await
            .unwrap();
        assert!(results.is_empty());
    }
}
