//! Retrieved chunk type

use serde::{Deserialize, Serialize};

/// A unit of retrieved text with its relevance score and source pointer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievedChunk {
    /// Raw chunk text
    pub text: String,
    /// Relevance score reported by the retriever (0.0 to 1.0)
    pub score: f32,
    /// Source location (e.g. an `s3://` URI); empty when the service gave none
    pub source: String,
    /// 1-based position in the retriever's response
    pub rank: usize,
}

impl RetrievedChunk {
    /// Create a chunk
    pub fn new(
        text: impl Into<String>,
        score: f32,
        source: impl Into<String>,
        rank: usize,
    ) -> Self {
        Self {
            text: text.into(),
            score,
            source: source.into(),
            rank,
        }
    }
}
