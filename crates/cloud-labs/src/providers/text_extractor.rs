//! Text extractor trait for document OCR

use async_trait::async_trait;

use crate::error::Result;

/// Trait for extracting printed text from a stored document image
///
/// Implementations:
/// - `TextractClient`: Textract `DetectDocumentText`
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TextExtractor: Send + Sync {
    /// Extract the document's text lines, joined by single spaces
    async fn extract_text(&self, bucket: &str, key: &str) -> Result<String>;
}
