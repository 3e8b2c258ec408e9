use serde::{Deserialize, Serialize};

/// Scoring constants. The defaults are tuned empirically; treat them as
/// knobs, not invariants.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoreWeights {
    /// Baseline added to every title block, large enough that a title with a
    /// single hit outranks any non-title block.
    pub title_base: f64,
    pub term_hit: f64,
    pub title_term_hit: f64,
    /// Added to non-title blocks shorter than 200 chars.
    pub short_block_bonus: f64,
    /// Added to non-title blocks shorter than 500 chars.
    pub medium_block_bonus: f64,
    /// Proximity bonuses for term pairs whose first occurrences are within
    /// 50 / 100 / 200 chars of each other.
    pub proximity_close: f64,
    pub proximity_near: f64,
    pub proximity_far: f64,
    pub title_proximity_close: f64,
    pub title_proximity_near: f64,
    pub title_proximity_far: f64,
    /// Recognition-result scoring (no title concept).
    pub image_term_hit: f64,
    pub image_short_bonus: f64,
    pub image_medium_bonus: f64,
    /// Cross-category bonuses applied by the search layer.
    pub image_result_bonus: f64,
    pub filename_match_bonus: f64,
    pub display_name_match_bonus: f64,
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            title_base: 1000.0,
            term_hit: 10.0,
            title_term_hit: 100.0,
            short_block_bonus: 20.0,
            medium_block_bonus: 10.0,
            proximity_close: 30.0,
            proximity_near: 15.0,
            proximity_far: 5.0,
            title_proximity_close: 100.0,
            title_proximity_near: 50.0,
            title_proximity_far: 25.0,
            image_term_hit: 20.0,
            image_short_bonus: 30.0,
            image_medium_bonus: 15.0,
            image_result_bonus: 500.0,
            filename_match_bonus: 1000.0,
            display_name_match_bonus: 2000.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Result cap per search.
    pub max_results: usize,
    /// Terms shorter than this are dropped before evaluation.
    pub min_term_chars: usize,
    /// Cached recognition results older than this are stale regardless of
    /// the item's modification time.
    pub stale_after_days: i64,
    /// Default number of recognitions in flight per chunk.
    pub concurrency_limit: usize,
    /// Lines collected before and after each reference site.
    pub context_lines: usize,
    /// Documents scanned concurrently per batch during context extraction.
    pub context_batch_size: usize,
    /// A recognition call exceeding this falls back to an empty result.
    pub recognition_timeout_secs: u64,
    pub weights: ScoreWeights,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_results: 50,
            min_term_chars: 2,
            stale_after_days: 30,
            concurrency_limit: 4,
            context_lines: 2,
            context_batch_size: 10,
            recognition_timeout_secs: 30,
            weights: ScoreWeights::default(),
        }
    }
}
