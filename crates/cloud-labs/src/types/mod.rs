//! Core types for the RAG pipeline

pub mod chunk;
pub mod query;
pub mod result;

pub use chunk::RetrievedChunk;
pub use query::{Query, QueryRequest};
pub use result::{QueryResult, FALLBACK_RESPONSE};
