//! Speech synthesizer trait for text-to-speech tasks

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Asynchronous synthesis task request; audio lands in object storage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SynthesisRequest {
    pub text: String,
    pub voice_id: String,
    pub output_format: String,
    pub engine: String,
    pub language_code: String,
    pub output_bucket: String,
    pub output_key_prefix: String,
}

/// State of a synthesis task as reported by the service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SynthesisTask {
    pub task_id: String,
    /// `scheduled`, `inProgress`, `completed` or `failed`
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_uri: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_reason: Option<String>,
}

/// Trait for neural text-to-speech
///
/// Implementations:
/// - `PollyClient`: Polly speech synthesis tasks
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    /// Start a synthesis task
    async fn start_synthesis(&self, request: &SynthesisRequest) -> Result<SynthesisTask>;

    /// Look up a previously started task
    async fn get_task(&self, task_id: &str) -> Result<SynthesisTask>;

    /// Cheapest call that proves the service is reachable
    async fn probe(&self) -> Result<()>;
}
