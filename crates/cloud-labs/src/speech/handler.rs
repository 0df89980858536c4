//! Document speech handler

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::config::SpeechConfig;
use crate::error::{Error, Result};
use crate::providers::{
    ObjectStore, SpeechSynthesizer, SynthesisRequest, SynthesisTask, TextExtractor,
};

/// Raw invocation event: an S3 notification (`Records[]`) or `{"document_key": ..}`
pub type SpeechEvent = serde_json::Value;

const PREVIEW_CHARS: usize = 100;

/// Handler outcome, mirrored onto the HTTP status by the server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HandlerResponse {
    pub status_code: u16,
    pub message: String,
    pub request_id: String,
    #[serde(default)]
    pub data: serde_json::Value,
}

impl HandlerResponse {
    fn new(status_code: u16, message: impl Into<String>, request_id: &str) -> Self {
        Self {
            status_code,
            message: message.into(),
            request_id: request_id.to_string(),
            data: serde_json::json!({}),
        }
    }

    fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = data;
        self
    }
}

/// Key of the document named by the event, if any
///
/// The first S3 record wins over a top-level `document_key`.
pub fn document_key(event: &SpeechEvent) -> Option<String> {
    if let Some(records) = event.get("Records").and_then(|r| r.as_array()) {
        if let Some(record) = records
            .iter()
            .find(|r| r.get("eventSource").and_then(|s| s.as_str()) == Some("aws:s3"))
        {
            return record
                .pointer("/s3/object/key")
                .and_then(|k| k.as_str())
                .map(String::from);
        }
    }

    event
        .get("document_key")
        .and_then(|k| k.as_str())
        .map(String::from)
}

/// Audio key prefix: `{prefix}/{key up to its first '.'}`
pub fn output_prefix(prefix: &str, key: &str) -> String {
    let stem = key.split('.').next().unwrap_or(key);
    format!("{}/{}", prefix, stem)
}

/// At most `max_chars` characters of `text`, cut on a char boundary
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((end, _)) => &text[..end],
        None => text,
    }
}

/// First 100 characters, with `...` appended when the text is longer
pub fn preview(text: &str) -> String {
    let head = truncate_chars(text, PREVIEW_CHARS);
    if head.len() < text.len() {
        format!("{}...", head)
    } else {
        head.to_string()
    }
}

/// Text extraction plus speech synthesis for one document
pub struct DocumentSpeechHandler {
    extractor: Arc<dyn TextExtractor>,
    synthesizer: Arc<dyn SpeechSynthesizer>,
    store: Arc<dyn ObjectStore>,
    config: SpeechConfig,
}

impl DocumentSpeechHandler {
    pub fn new(
        extractor: Arc<dyn TextExtractor>,
        synthesizer: Arc<dyn SpeechSynthesizer>,
        store: Arc<dyn ObjectStore>,
        config: SpeechConfig,
    ) -> Self {
        Self {
            extractor,
            synthesizer,
            store,
            config,
        }
    }

    fn bucket(&self) -> Result<&str> {
        self.config
            .bucket
            .as_deref()
            .filter(|b| !b.is_empty())
            .ok_or_else(|| Error::Config("BUCKET_NAME is not configured".to_string()))
    }

    /// Process one event; every failure becomes a 500 response
    #[tracing::instrument(skip(self, event))]
    pub async fn handle(&self, event: &SpeechEvent, request_id: &str) -> HandlerResponse {
        tracing::info!("Starting document processing workflow");
        match self.process(event, request_id).await {
            Ok(response) => response,
            Err(e) => {
                tracing::error!("Error in document processing: {}", e);
                HandlerResponse::new(500, format!("Processing error: {}", e), request_id)
            }
        }
    }

    async fn process(&self, event: &SpeechEvent, request_id: &str) -> Result<HandlerResponse> {
        let bucket = self.bucket()?;
        let key = document_key(event).unwrap_or_else(|| self.config.sample_file.clone());
        tracing::info!("Processing document: {}", key);

        let text = self.extractor.extract_text(bucket, &key).await?;
        if text.trim().is_empty() {
            tracing::warn!("No text extracted from document");
            return Ok(HandlerResponse::new(400, "No text found in document", request_id));
        }
        let text_length = text.chars().count();
        tracing::info!("Extracted text length: {} characters", text_length);

        let speech_text = truncate_chars(&text, self.config.max_chars);
        if speech_text.len() < text.len() {
            tracing::warn!(
                "Text truncated to {} characters for speech synthesis",
                self.config.max_chars
            );
        }

        let request = SynthesisRequest {
            text: speech_text.to_string(),
            voice_id: self.config.voice_id.clone(),
            output_format: self.config.output_format.clone(),
            engine: self.config.engine.clone(),
            language_code: self.config.language_code.clone(),
            output_bucket: bucket.to_string(),
            output_key_prefix: output_prefix(&self.config.output_prefix, &key),
        };
        tracing::info!(
            "Output location: s3://{}/{}",
            request.output_bucket,
            request.output_key_prefix
        );

        let task = self.synthesizer.start_synthesis(&request).await?;
        if task.task_id.is_empty() {
            return Ok(HandlerResponse::new(500, "Failed to start speech synthesis", request_id));
        }
        tracing::info!("Speech synthesis task started: {}", task.task_id);

        Ok(
            HandlerResponse::new(200, "Document processing completed successfully", request_id)
                .with_data(serde_json::json!({
                    "document": key,
                    "text_length": text_length,
                    "synthesis_task_id": task.task_id,
                    "extracted_text_preview": preview(&text),
                })),
        )
    }

    /// Look up a synthesis task started earlier
    pub async fn task_status(&self, task_id: &str) -> Result<SynthesisTask> {
        self.synthesizer.get_task(task_id).await
    }

    /// Check the bucket and the speech service are reachable
    pub async fn validate_environment(&self) -> bool {
        let bucket = match self.bucket() {
            Ok(bucket) => bucket,
            Err(e) => {
                tracing::error!("{}", e);
                return false;
            }
        };

        if let Err(e) = self.store.head_bucket(bucket).await {
            tracing::error!("Environment validation failed: {}", e);
            return false;
        }
        if let Err(e) = self.synthesizer.probe().await {
            tracing::error!("Environment validation failed: {}", e);
            return false;
        }

        tracing::info!("Environment validation successful");
        true
    }
}
