use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferencingDocument {
    pub title: String,
    pub path: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferenceContext {
    #[serde(default)]
    pub referencing_documents: Vec<ReferencingDocument>,
    #[serde(default)]
    pub nearby_content: String,
}

/// One cached recognition outcome for an item. The derived searchable text
/// is intentionally not a field here; it lives in a side memo owned by the
/// cache and is dropped whenever the entry is overwritten.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecognitionResult {
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    /// Epoch milliseconds at the moment the entry was written.
    pub timestamp: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<ReferenceContext>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct IndexStats {
    pub total: usize,
    pub size_bytes: u64,
}
