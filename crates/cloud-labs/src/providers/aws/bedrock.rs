//! Bedrock runtime client for answer generation
//!
//! Invokes Anthropic models through `InvokeModel` with the messages API body.

use async_trait::async_trait;
use reqwest::Method;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::auth::{uri_encode, AwsAuth, ServiceRequest};
use crate::config::RagConfig;
use crate::error::{Error, Result};
use crate::providers::generator::Generator;

const ANTHROPIC_VERSION: &str = "bedrock-2023-05-31";

/// Bedrock model client
pub struct BedrockGenerator {
    auth: Arc<AwsAuth>,
    model_id: String,
    max_tokens: u32,
    temperature: f32,
    top_p: f32,
}

impl BedrockGenerator {
    /// Create a generator with the sampling settings from `config`
    pub fn new(auth: Arc<AwsAuth>, config: &RagConfig) -> Self {
        Self {
            auth,
            model_id: config.model_id.clone(),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
            top_p: config.top_p,
        }
    }

    /// Model identifier this client invokes
    pub fn model_id(&self) -> &str {
        &self.model_id
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/model/{}/invoke",
            self.auth.endpoint("bedrock-runtime"),
            uri_encode(&self.model_id, true)
        )
    }

    fn build_request<'a>(&self, prompt: &'a str) -> InvokeRequest<'a> {
        InvokeRequest {
            anthropic_version: ANTHROPIC_VERSION,
            max_tokens: self.max_tokens,
            messages: vec![Message {
                role: "user",
                content: prompt,
            }],
            temperature: self.temperature,
            top_p: self.top_p,
        }
    }
}

#[derive(Serialize)]
struct InvokeRequest<'a> {
    anthropic_version: &'static str,
    max_tokens: u32,
    messages: Vec<Message<'a>>,
    temperature: f32,
    top_p: f32,
}

#[derive(Serialize)]
struct Message<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct InvokeResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
}

#[derive(Deserialize)]
struct ContentBlock {
    #[serde(default)]
    text: Option<String>,
}

/// First text segment of the answer; a missing or blank one is a failure
fn answer_text(response: InvokeResponse) -> Result<String> {
    let text = response
        .content
        .into_iter()
        .next()
        .and_then(|block| block.text)
        .ok_or_else(|| Error::generation("Model response contained no text content"))?;

    if text.trim().is_empty() {
        return Err(Error::generation("Model returned an empty answer"));
    }
    Ok(text)
}

#[async_trait]
impl Generator for BedrockGenerator {
    #[tracing::instrument(
        skip(self, prompt),
        fields(model = %self.model_id, prompt_len = prompt.len())
    )]
    async fn generate(&self, prompt: &str) -> Result<String> {
        let request = ServiceRequest::json(
            "bedrock",
            "InvokeModel",
            Method::POST,
            self.endpoint(),
            &self.build_request(prompt),
        )
        .map_err(|e| Error::generation(format!("Failed to encode InvokeModel request: {}", e)))?
        .with_header("accept", "application/json");

        let response: InvokeResponse = self.auth.call(request, Error::Generation).await?;
        let text = answer_text(response)?;

        tracing::debug!("Generated {} characters", text.len());
        Ok(text)
    }
}
