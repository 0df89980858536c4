//! Polly client for asynchronous speech synthesis tasks

use async_trait::async_trait;
use reqwest::Method;
use serde::de::IgnoredAny;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::auth::{uri_encode, AwsAuth, ServiceRequest};
use crate::error::{Error, Result};
use crate::providers::speech::{SpeechSynthesizer, SynthesisRequest, SynthesisTask};

/// Polly `StartSpeechSynthesisTask` / `GetSpeechSynthesisTask` client
pub struct PollyClient {
    auth: Arc<AwsAuth>,
}

impl PollyClient {
    pub fn new(auth: Arc<AwsAuth>) -> Self {
        Self { auth }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.auth.endpoint("polly"), path)
    }
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct StartTaskBody<'a> {
    engine: &'a str,
    language_code: &'a str,
    output_format: &'a str,
    output_s3_bucket_name: &'a str,
    output_s3_key_prefix: &'a str,
    text: &'a str,
    text_type: &'static str,
    voice_id: &'a str,
}

impl<'a> From<&'a SynthesisRequest> for StartTaskBody<'a> {
    fn from(request: &'a SynthesisRequest) -> Self {
        Self {
            engine: &request.engine,
            language_code: &request.language_code,
            output_format: &request.output_format,
            output_s3_bucket_name: &request.output_bucket,
            output_s3_key_prefix: &request.output_key_prefix,
            text: &request.text,
            text_type: "text",
            voice_id: &request.voice_id,
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct TaskEnvelope {
    synthesis_task: TaskBody,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct TaskBody {
    task_id: String,
    task_status: String,
    #[serde(default)]
    output_uri: Option<String>,
    #[serde(default)]
    task_status_reason: Option<String>,
}

impl From<TaskEnvelope> for SynthesisTask {
    fn from(envelope: TaskEnvelope) -> Self {
        let task = envelope.synthesis_task;
        Self {
            task_id: task.task_id,
            status: task.task_status,
            output_uri: task.output_uri,
            status_reason: task.task_status_reason,
        }
    }
}

#[async_trait]
impl SpeechSynthesizer for PollyClient {
    #[tracing::instrument(
        skip(self, request),
        fields(voice = %request.voice_id, chars = request.text.len())
    )]
    async fn start_synthesis(&self, request: &SynthesisRequest) -> Result<SynthesisTask> {
        let service_request = ServiceRequest::json(
            "polly",
            "StartSpeechSynthesisTask",
            Method::POST,
            self.url("/v1/synthesisTasks"),
            &StartTaskBody::from(request),
        )?;

        let envelope: TaskEnvelope = self.auth.call(service_request, Error::Speech).await?;
        let task = SynthesisTask::from(envelope);
        tracing::info!("Started synthesis task {} ({})", task.task_id, task.status);
        Ok(task)
    }

    async fn get_task(&self, task_id: &str) -> Result<SynthesisTask> {
        let request = ServiceRequest::new(
            "polly",
            "GetSpeechSynthesisTask",
            Method::GET,
            self.url(&format!("/v1/synthesisTasks/{}", uri_encode(task_id, true))),
        );

        let envelope: TaskEnvelope = self.auth.call(request, Error::Speech).await?;
        Ok(envelope.into())
    }

    async fn probe(&self) -> Result<()> {
        let request = ServiceRequest::new(
            "polly",
            "DescribeVoices",
            Method::GET,
            self.url("/v1/voices"),
        );
        let _: IgnoredAny = self.auth.call(request, Error::Speech).await?;
        Ok(())
    }
}
