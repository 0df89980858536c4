//! Generator trait for answer generation

use async_trait::async_trait;

use crate::error::Result;

/// Trait for generative-model invocation
///
/// Implementations:
/// - `BedrockGenerator`: Bedrock runtime `InvokeModel` (Anthropic messages)
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Generator: Send + Sync {
    /// Send a fully composed prompt and return the first text segment of the
    /// model's answer. Failures and blank answers surface as `Error::Generation`.
    async fn generate(&self, prompt: &str) -> Result<String>;
}
