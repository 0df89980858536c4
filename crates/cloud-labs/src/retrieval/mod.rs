//! Retrieval post-processing

pub mod filter;

pub use filter::filter_by_score;
