pub mod recognition;
pub mod search;
