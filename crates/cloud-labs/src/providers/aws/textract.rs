//! Textract client for document OCR

use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;

use super::auth::{AwsAuth, ServiceRequest};
use crate::error::{Error, Result};
use crate::providers::text_extractor::TextExtractor;

const CONTENT_TYPE: &str = "application/x-amz-json-1.1";

/// Textract `DetectDocumentText` client (synchronous, single page)
pub struct TextractClient {
    auth: Arc<AwsAuth>,
}

impl TextractClient {
    pub fn new(auth: Arc<AwsAuth>) -> Self {
        Self { auth }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct DetectResponse {
    #[serde(default)]
    blocks: Vec<Block>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct Block {
    block_type: String,
    #[serde(default)]
    text: Option<String>,
}

/// Join the LINE blocks' text with single spaces, skipping blank lines
fn join_lines(blocks: Vec<Block>) -> String {
    blocks
        .into_iter()
        .filter(|b| b.block_type == "LINE")
        .filter_map(|b| b.text)
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

#[async_trait]
impl TextExtractor for TextractClient {
    #[tracing::instrument(skip(self))]
    async fn extract_text(&self, bucket: &str, key: &str) -> Result<String> {
        let body = serde_json::json!({
            "Document": {
                "S3Object": { "Bucket": bucket, "Name": key }
            }
        });
        let request = ServiceRequest::target(
            "textract",
            "DetectDocumentText",
            self.auth.endpoint("textract"),
            "Textract.DetectDocumentText",
            CONTENT_TYPE,
            &body,
        )?;

        let response: DetectResponse = self.auth.call(request, Error::Extraction).await?;
        let text = join_lines(response.blocks);

        tracing::info!("Extracted {} characters from s3://{}/{}", text.len(), bucket, key);
        Ok(text)
    }
}
