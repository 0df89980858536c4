//! Retriever trait for vector search over a knowledge base

use async_trait::async_trait;

use crate::error::Result;
use crate::types::RetrievedChunk;

/// Trait for ranked chunk retrieval
///
/// Implementations:
/// - `KnowledgeBaseRetriever`: Bedrock knowledge base `Retrieve`
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Retriever: Send + Sync {
    /// Retrieve up to `max_results` chunks for `query`, in the service's
    /// relevance order. Failures surface as `Error::Retrieval`.
    async fn retrieve(&self, query: &str, max_results: usize) -> Result<Vec<RetrievedChunk>>;
}
