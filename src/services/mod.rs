pub mod cache_service;
pub mod context_service;
pub mod indexing_service;
pub mod query_service;
pub mod scoring_service;
pub mod search_service;
pub mod segment_service;
