use std::collections::HashMap;

use crate::models::recognition::{RecognitionResult, ReferenceContext};

const MS_PER_DAY: i64 = 86_400_000;

fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// In-memory recognition index. Staleness is the sole trigger for
/// re-recognition; there is no content-hash comparison. The lowercased
/// searchable text is derived lazily and memoized per entry until that entry
/// is overwritten.
pub struct RecognitionCache {
    entries: HashMap<String, RecognitionResult>,
    searchable: HashMap<String, String>,
    stale_after_ms: i64,
}

impl RecognitionCache {
    pub fn new(stale_after_days: i64) -> Self {
        Self::with_entries(HashMap::new(), stale_after_days)
    }

    pub fn with_entries(
        entries: HashMap<String, RecognitionResult>,
        stale_after_days: i64,
    ) -> Self {
        Self {
            entries,
            searchable: HashMap::new(),
            stale_after_ms: stale_after_days * MS_PER_DAY,
        }
    }

    pub fn get(&self, id: &str) -> Option<&RecognitionResult> {
        self.entries.get(id)
    }

    /// Stores a new entry stamped with the current time, replacing any prior
    /// entry and dropping its derived searchable text.
    pub fn put(
        &mut self,
        id: &str,
        text: String,
        confidence: Option<f64>,
        context: Option<ReferenceContext>,
    ) {
        self.searchable.remove(id);
        self.entries.insert(
            id.to_string(),
            RecognitionResult {
                text,
                confidence,
                timestamp: now_ms(),
                context,
            },
        );
    }

    /// An entry is stale if absent, older than the staleness window, or
    /// older than the item's last modification.
    pub fn is_stale(&self, id: &str, item_modified_ms: i64) -> bool {
        match self.entries.get(id) {
            None => true,
            Some(entry) => {
                now_ms() - entry.timestamp > self.stale_after_ms
                    || item_modified_ms > entry.timestamp
            }
        }
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.searchable.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &HashMap<String, RecognitionResult> {
        &self.entries
    }

    /// Lowercased concatenation of the recognized text, referencing document
    /// titles and nearby content. Memoized until the entry is overwritten.
    pub fn searchable_content(&mut self, id: &str) -> Option<&str> {
        if !self.searchable.contains_key(id) {
            let entry = self.entries.get(id)?;
            let mut parts = vec![entry.text.clone()];
            if let Some(context) = &entry.context {
                for doc in &context.referencing_documents {
                    parts.push(doc.title.clone());
                }
                if !context.nearby_content.is_empty() {
                    parts.push(context.nearby_content.clone());
                }
            }
            self.searchable
                .insert(id.to_string(), parts.join("\n").to_lowercase());
        }
        self.searchable.get(id).map(|s| s.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::recognition::ReferencingDocument;

    fn cache() -> RecognitionCache {
        RecognitionCache::new(30)
    }

    #[test]
    fn test_put_then_get() {
        let mut cache = cache();
        cache.put("a.png", "hello world".to_string(), Some(91.0), None);

        let entry = cache.get("a.png").unwrap();
        assert_eq!(entry.text, "hello world");
        assert_eq!(entry.confidence, Some(91.0));
        assert!(entry.timestamp > 0);
    }

    #[test]
    fn test_absent_entry_is_stale() {
        let cache = cache();
        assert!(cache.is_stale("missing.png", 0));
    }

    #[test]
    fn test_fresh_entry_is_not_stale() {
        let mut cache = cache();
        cache.put("a.png", "text".to_string(), None, None);
        assert!(!cache.is_stale("a.png", 0));
    }

    #[test]
    fn test_modified_item_is_stale() {
        let mut cache = cache();
        cache.put("a.png", "text".to_string(), None, None);
        let future = cache.get("a.png").unwrap().timestamp + 1;
        assert!(cache.is_stale("a.png", future));
    }

    #[test]
    fn test_old_entry_is_stale() {
        let mut cache = RecognitionCache::new(0);
        cache.entries.insert(
            "a.png".to_string(),
            RecognitionResult {
                text: "text".to_string(),
                confidence: None,
                timestamp: now_ms() - 1000,
                context: None,
            },
        );
        assert!(cache.is_stale("a.png", 0));
    }

    #[test]
    fn test_searchable_content_joins_and_lowercases() {
        let mut cache = cache();
        cache.put(
            "a.png",
            "Invoice TOTAL".to_string(),
            None,
            Some(ReferenceContext {
                referencing_documents: vec![ReferencingDocument {
                    title: "Budget Notes".to_string(),
                    path: "budget.md".to_string(),
                }],
                nearby_content: "paid in June".to_string(),
            }),
        );

        let searchable = cache.searchable_content("a.png").unwrap();
        assert_eq!(searchable, "invoice total\nbudget notes\npaid in june");
    }

    #[test]
    fn test_searchable_content_invalidated_on_put() {
        let mut cache = cache();
        cache.put("a.png", "first".to_string(), None, None);
        assert_eq!(cache.searchable_content("a.png").unwrap(), "first");

        cache.put("a.png", "second".to_string(), None, None);
        assert_eq!(cache.searchable_content("a.png").unwrap(), "second");
    }

    #[test]
    fn test_clear_empties_everything() {
        let mut cache = cache();
        cache.put("a.png", "text".to_string(), None, None);
        let _ = cache.searchable_content("a.png");

        cache.clear();
        assert!(cache.is_empty());
        assert!(cache.searchable_content("a.png").is_none());
    }
}
