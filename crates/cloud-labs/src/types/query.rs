//! Query types

use serde::{Deserialize, Serialize};

use crate::config::RagConfig;
use crate::error::{Error, Result};

/// A natural-language query with its retrieval settings
///
/// Immutable once issued; build a new one to change settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Query {
    text: String,
    max_results: usize,
    confidence_threshold: f32,
}

impl Query {
    /// Create a query with the default settings (5 results, threshold 0.7)
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            max_results: 5,
            confidence_threshold: 0.7,
        }
    }

    /// Create a query with the configured defaults
    pub fn with_defaults(text: impl Into<String>, config: &RagConfig) -> Self {
        Self {
            text: text.into(),
            max_results: config.max_results,
            confidence_threshold: config.confidence_threshold,
        }
    }

    /// Set the number of chunks to request
    pub fn with_max_results(mut self, max_results: usize) -> Self {
        self.max_results = max_results;
        self
    }

    /// Set the minimum chunk score
    pub fn with_threshold(mut self, threshold: f32) -> Self {
        self.confidence_threshold = threshold;
        self
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn max_results(&self) -> usize {
        self.max_results
    }

    pub fn confidence_threshold(&self) -> f32 {
        self.confidence_threshold
    }

    /// Reject queries the pipeline cannot run
    pub fn validate(&self) -> Result<()> {
        if self.text.trim().is_empty() {
            return Err(Error::invalid_request("query text must not be empty"));
        }
        if self.max_results == 0 {
            return Err(Error::invalid_request("max_results must be at least 1"));
        }
        if !(0.0..=1.0).contains(&self.confidence_threshold) {
            return Err(Error::invalid_request(format!(
                "confidence_threshold must be within [0.0, 1.0], got {}",
                self.confidence_threshold
            )));
        }
        Ok(())
    }
}

/// Query request body for `POST /api/query`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryRequest {
    /// The question to answer
    pub question: String,
    /// Chunks to retrieve (config default when absent)
    #[serde(default)]
    pub max_results: Option<usize>,
    /// Minimum chunk score (config default when absent)
    #[serde(default)]
    pub confidence_threshold: Option<f32>,
}

impl QueryRequest {
    /// Resolve into a query, filling unset fields from configuration
    pub fn into_query(self, config: &RagConfig) -> Query {
        let mut query = Query::with_defaults(self.question, config);
        if let Some(max_results) = self.max_results {
            query = query.with_max_results(max_results);
        }
        if let Some(threshold) = self.confidence_threshold {
            query = query.with_threshold(threshold);
        }
        query
    }
}
