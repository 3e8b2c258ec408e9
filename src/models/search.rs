use serde::{Deserialize, Serialize};

/// One unit of a parsed query. Immutable once parsed; OR-chains hang off the
/// term that preceded the `OR` keyword.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchTerm {
    pub text: String,
    pub is_negated: bool,
    pub is_phrase: bool,
    pub alternatives: Vec<SearchTerm>,
}

impl SearchTerm {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            is_negated: false,
            is_phrase: false,
            alternatives: Vec::new(),
        }
    }
}

/// A contiguous unit of a document: heading, list line, or paragraph.
/// Produced transiently per search pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    pub content: String,
    /// 1-based, inclusive.
    pub start_line: usize,
    pub end_line: usize,
    pub is_title: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
    pub path: String,
    pub matched_content: String,
    pub start_line: usize,
    pub end_line: usize,
    pub matched_terms: Vec<String>,
    pub score: f64,
    pub context: String,
    pub is_title: bool,
    pub is_image_result: bool,
}
