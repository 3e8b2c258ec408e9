use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use futures::future::join_all;
use regex::Regex;
use tracing::warn;

use crate::models::recognition::{ReferenceContext, ReferencingDocument};
use crate::services::segment_service::is_heading;
use crate::vault::{Vault, VaultItem};

/// Joins the sites within a document and the snippets across documents.
const SITE_SEPARATOR: &str = " ... ";

struct CachedDocument {
    modified_ms: i64,
    content: String,
}

struct DocumentReference {
    title: String,
    path: String,
    snippet: Option<String>,
}

/// Scans the note corpus for references to an item (wiki embeds, markdown
/// images, HTML image tags) and collects the prose around each reference
/// site. Owns a per-document content cache keyed by modification time and a
/// per-item compiled-pattern cache; both live for the extractor's lifetime,
/// not as module globals.
pub struct ContextExtractor {
    content_cache: Mutex<HashMap<String, CachedDocument>>,
    pattern_cache: Mutex<HashMap<String, Arc<Vec<Regex>>>>,
    context_lines: usize,
    batch_size: usize,
}

fn is_horizontal_rule(line: &str) -> bool {
    line.len() >= 3
        && (line.chars().all(|c| c == '-')
            || line.chars().all(|c| c == '*')
            || line.chars().all(|c| c == '_'))
}

/// Lines that carry no prose worth quoting next to a reference.
fn is_skippable_line(line: &str) -> bool {
    let trimmed = line.trim();
    trimmed.is_empty()
        || is_heading(trimmed)
        || trimmed.starts_with("![[")
        || trimmed.starts_with("```")
        || is_horizontal_rule(trimmed)
}

impl ContextExtractor {
    pub fn new(context_lines: usize, batch_size: usize) -> Self {
        Self {
            content_cache: Mutex::new(HashMap::new()),
            pattern_cache: Mutex::new(HashMap::new()),
            context_lines,
            batch_size: batch_size.max(1),
        }
    }

    pub fn clear(&self) {
        if let Ok(mut cache) = self.content_cache.lock() {
            cache.clear();
        }
        if let Ok(mut cache) = self.pattern_cache.lock() {
            cache.clear();
        }
    }

    /// Compiled reference patterns for an item, cached across calls. The
    /// file name keys the cache; the extension-less base name is covered by
    /// the same entry.
    fn patterns_for(&self, name: &str, base_name: &str) -> Arc<Vec<Regex>> {
        if let Ok(cache) = self.pattern_cache.lock() {
            if let Some(patterns) = cache.get(name) {
                return patterns.clone();
            }
        }

        let mut patterns = Vec::new();
        let mut targets = vec![name];
        if base_name != name {
            targets.push(base_name);
        }
        for target in targets {
            let escaped = regex::escape(target);
            for pattern in [
                format!(r"!\[\[[^\]]*{escaped}[^\]]*\]\]"),
                format!(r"!\[[^\]]*\]\([^)]*{escaped}[^)]*\)"),
                format!(r"<img[^>]*{escaped}[^>]*>"),
            ] {
                match Regex::new(&pattern) {
                    Ok(re) => patterns.push(re),
                    Err(e) => warn!(%pattern, error = %e, "skipping bad reference pattern"),
                }
            }
        }

        let patterns = Arc::new(patterns);
        if let Ok(mut cache) = self.pattern_cache.lock() {
            cache.insert(name.to_string(), patterns.clone());
        }
        patterns
    }

    /// Reads a document through the mtime-keyed cache; only re-reads when
    /// the cached copy is older than the document's current mtime.
    async fn document_content(&self, vault: &dyn Vault, doc: &VaultItem) -> Option<String> {
        let current_ms = vault.modified_ms(&doc.path).await.unwrap_or(doc.modified_ms);
        if let Ok(cache) = self.content_cache.lock() {
            if let Some(cached) = cache.get(&doc.path) {
                if cached.modified_ms >= current_ms {
                    return Some(cached.content.clone());
                }
            }
        }

        match vault.read_document(&doc.path).await {
            Ok(content) => {
                if let Ok(mut cache) = self.content_cache.lock() {
                    cache.insert(
                        doc.path.clone(),
                        CachedDocument {
                            modified_ms: current_ms,
                            content: content.clone(),
                        },
                    );
                }
                Some(content)
            }
            Err(e) => {
                warn!(path = %doc.path, error = %e, "skipping unreadable document");
                None
            }
        }
    }

    fn site_snippet(&self, lines: &[&str], at: usize) -> String {
        let start = at.saturating_sub(self.context_lines);
        let end = (at + self.context_lines).min(lines.len().saturating_sub(1));
        let mut collected = Vec::new();
        for (i, line) in lines.iter().enumerate().take(end + 1).skip(start) {
            if i == at || is_skippable_line(line) {
                continue;
            }
            collected.push(line.trim());
        }
        collected.join(" ")
    }

    async fn scan_document(
        &self,
        vault: &dyn Vault,
        doc: &VaultItem,
        item: &VaultItem,
        patterns: &[Regex],
    ) -> Option<DocumentReference> {
        let content = self.document_content(vault, doc).await?;

        // Cheap substring pre-check before any regex work.
        if !content.contains(&item.name)
            && !content.contains(&item.path)
            && !content.contains(item.base_name())
        {
            return None;
        }

        let lines: Vec<&str> = content.lines().collect();
        let mut sites = Vec::new();
        for (i, line) in lines.iter().enumerate() {
            if patterns.iter().any(|re| re.is_match(line)) {
                let snippet = self.site_snippet(&lines, i);
                if !snippet.is_empty() {
                    sites.push(snippet);
                }
            }
        }

        Some(DocumentReference {
            title: doc.base_name().to_string(),
            path: doc.path.clone(),
            snippet: if sites.is_empty() {
                None
            } else {
                Some(sites.join(SITE_SEPARATOR))
            },
        })
    }

    /// Builds a fresh `ReferenceContext` for one item against the corpus.
    /// Documents run in fixed-size batches, concurrent within a batch,
    /// batches in sequence.
    pub async fn extract(
        &self,
        vault: &dyn Vault,
        item: &VaultItem,
        corpus: &[VaultItem],
    ) -> ReferenceContext {
        let patterns = self.patterns_for(&item.name, item.base_name());

        let mut referencing_documents = Vec::new();
        let mut snippets = Vec::new();
        for batch in corpus.chunks(self.batch_size) {
            let scans = join_all(
                batch
                    .iter()
                    .map(|doc| self.scan_document(vault, doc, item, &patterns)),
            )
            .await;
            for reference in scans.into_iter().flatten() {
                referencing_documents.push(ReferencingDocument {
                    title: reference.title,
                    path: reference.path,
                });
                if let Some(snippet) = reference.snippet {
                    snippets.push(snippet);
                }
            }
        }

        ReferenceContext {
            referencing_documents,
            nearby_content: snippets.join(SITE_SEPARATOR),
        }
    }
}
