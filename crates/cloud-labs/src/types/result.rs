//! Query result type

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::time::Duration;

use super::chunk::RetrievedChunk;

/// Answer returned when no chunk clears the confidence threshold
pub const FALLBACK_RESPONSE: &str = "I'm sorry, but I couldn't find relevant information in the knowledge base to answer your question. Please try rephrasing your question or contact support for assistance.";

/// Result of one pipeline run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryResult {
    /// The original query text
    pub query: String,
    /// Generated answer, or the fallback message
    pub response: String,
    /// Distinct source identifiers in first-seen order
    pub sources: Vec<String>,
    /// Highest score among the chunks used (0.0 on fallback)
    pub confidence_score: f32,
    /// Number of chunks that cleared the threshold
    pub retrieval_count: usize,
    /// Wall time for the whole run, serialized as seconds
    #[serde(serialize_with = "as_secs", deserialize_with = "from_secs")]
    pub processing_time: Duration,
}

impl QueryResult {
    /// Build a result from the chunks that fed the answer
    pub fn answered(
        query: impl Into<String>,
        response: String,
        used: &[RetrievedChunk],
        processing_time: Duration,
    ) -> Self {
        let confidence_score = used
            .iter()
            .map(|c| c.score)
            .fold(0.0_f32, f32::max);

        Self {
            query: query.into(),
            response,
            sources: collect_sources(used),
            confidence_score,
            retrieval_count: used.len(),
            processing_time,
        }
    }

    /// Build the fixed "nothing relevant found" result
    pub fn fallback(query: impl Into<String>, processing_time: Duration) -> Self {
        Self {
            query: query.into(),
            response: FALLBACK_RESPONSE.to_string(),
            sources: Vec::new(),
            confidence_score: 0.0,
            retrieval_count: 0,
            processing_time,
        }
    }

    /// Whether this is the soft-failure result
    pub fn is_fallback(&self) -> bool {
        self.retrieval_count == 0
    }
}

/// Distinct, non-empty source identifiers in first-seen order
pub fn collect_sources(chunks: &[RetrievedChunk]) -> Vec<String> {
    let mut sources: Vec<String> = Vec::new();
    for chunk in chunks {
        if !chunk.source.is_empty() && !sources.iter().any(|s| s == &chunk.source) {
            sources.push(chunk.source.clone());
        }
    }
    sources
}

fn as_secs<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_f64(duration.as_secs_f64())
}

fn from_secs<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
    let secs = f64::deserialize(deserializer)?;
    Duration::try_from_secs_f64(secs).map_err(serde::de::Error::custom)
}
