//! Configuration for the lab handlers

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Main configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct LabConfig {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,
    /// Shared AWS client configuration
    #[serde(default)]
    pub aws: AwsConfig,
    /// Knowledge base RAG configuration
    #[serde(default)]
    pub rag: RagConfig,
    /// Document OCR to speech configuration
    #[serde(default)]
    pub speech: SpeechConfig,
    /// Trace lab configuration
    #[serde(default)]
    pub trace: TraceConfig,
}

impl LabConfig {
    /// Load configuration from a TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("Failed to read config {}: {}", path.display(), e))
        })?;
        Self::from_toml(&raw)
    }

    /// Parse configuration from TOML text
    pub fn from_toml(raw: &str) -> Result<Self> {
        toml::from_str(raw).map_err(|e| Error::Config(format!("Invalid config: {}", e)))
    }

    /// Default config location (`<config dir>/cloud-labs/config.toml`)
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("cloud-labs").join("config.toml"))
    }

    /// Load from an explicit path, the default path if it exists, or defaults,
    /// then apply environment overrides and validate
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => match Self::default_path().filter(|p| p.exists()) {
                Some(path) => Self::from_file(path)?,
                None => Self::default(),
            },
        };
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Apply the environment variables the lab functions were configured with
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(region) = get("AWS_REGION") {
            self.aws.region = region;
        }
        if let Some(endpoint) = get("AWS_ENDPOINT_URL") {
            self.aws.endpoint_url = Some(endpoint);
        }
        if let Some(kb) = get("KNOWLEDGE_BASE_ID") {
            self.rag.knowledge_base_id = Some(kb);
        }
        if let Some(model) = get("MODEL_ID") {
            self.rag.model_id = model;
        }
        if let Some(bucket) = get("BUCKET_NAME") {
            self.speech.bucket = Some(bucket);
        }
        if let Some(sample) = get("SAMPLE_FILE") {
            self.speech.sample_file = sample;
        }
        if let Some(voice) = get("VOICE_ID") {
            self.speech.voice_id = voice;
        }
        if let Some(format) = get("OUTPUT_FORMAT") {
            self.speech.output_format = format;
        }
        if let Some(engine) = get("ENGINE") {
            self.speech.engine = engine;
        }
        if let Some(address) = get("AWS_XRAY_DAEMON_ADDRESS") {
            self.trace.daemon_address = address;
        }
        if let Some(name) = get("AWS_LAMBDA_FUNCTION_NAME") {
            self.trace.function_name = name;
        }
    }

    /// Validate value ranges
    pub fn validate(&self) -> Result<()> {
        let threshold = self.rag.confidence_threshold;
        if !(0.0..=1.0).contains(&threshold) {
            return Err(Error::Config(format!(
                "rag.confidence_threshold must be within [0.0, 1.0], got {}",
                threshold
            )));
        }
        if self.rag.max_results == 0 {
            return Err(Error::Config("rag.max_results must be at least 1".to_string()));
        }
        if self.rag.max_tokens == 0 {
            return Err(Error::Config("rag.max_tokens must be at least 1".to_string()));
        }
        if self.speech.max_chars == 0 {
            return Err(Error::Config("speech.max_chars must be at least 1".to_string()));
        }
        if self.aws.region.trim().is_empty() {
            return Err(Error::Config("aws.region must not be empty".to_string()));
        }
        Ok(())
    }
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host address
    pub host: String,
    /// Port number
    pub port: u16,
    /// Enable CORS
    pub enable_cors: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            enable_cors: true,
        }
    }
}

/// Shared AWS client configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AwsConfig {
    /// Region for every service call
    #[serde(default = "default_region")]
    pub region: String,
    /// Single base URL for every service (local emulators)
    #[serde(default)]
    pub endpoint_url: Option<String>,
    /// Per-request timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

fn default_region() -> String {
    "us-east-1".to_string()
}

fn default_request_timeout() -> u64 {
    30
}

impl Default for AwsConfig {
    fn default() -> Self {
        Self {
            region: default_region(),
            endpoint_url: None,
            request_timeout_secs: default_request_timeout(),
        }
    }
}

/// Knowledge base search mode
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SearchType {
    /// Vector plus keyword search
    #[default]
    Hybrid,
    /// Vector search only
    Semantic,
}

/// Knowledge base RAG configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RagConfig {
    /// Knowledge base to query (required for /api/query)
    #[serde(default)]
    pub knowledge_base_id: Option<String>,
    /// Foundation model used for answers
    #[serde(default = "default_model_id")]
    pub model_id: String,
    /// Chunks requested per query when the caller does not say
    #[serde(default = "default_max_results")]
    pub max_results: usize,
    /// Minimum chunk score when the caller does not say
    #[serde(default = "default_confidence_threshold")]
    pub confidence_threshold: f32,
    /// Search mode override sent to the knowledge base
    #[serde(default)]
    pub search_type: SearchType,
    /// Output length ceiling
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    /// Sampling temperature
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    /// Nucleus sampling
    #[serde(default = "default_top_p")]
    pub top_p: f32,
}

fn default_model_id() -> String {
    "anthropic.claude-3-sonnet-20240229-v1:0".to_string()
}

fn default_max_results() -> usize {
    5
}

fn default_confidence_threshold() -> f32 {
    0.7
}

fn default_max_tokens() -> u32 {
    1000
}

fn default_temperature() -> f32 {
    0.1
}

fn default_top_p() -> f32 {
    0.9
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            knowledge_base_id: None,
            model_id: default_model_id(),
            max_results: default_max_results(),
            confidence_threshold: default_confidence_threshold(),
            search_type: SearchType::Hybrid,
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            top_p: default_top_p(),
        }
    }
}

/// Document OCR to speech configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpeechConfig {
    /// Bucket holding input documents and receiving audio output
    #[serde(default)]
    pub bucket: Option<String>,
    /// Document processed when the event names none
    #[serde(default = "default_sample_file")]
    pub sample_file: String,
    /// Polly voice
    #[serde(default = "default_voice_id")]
    pub voice_id: String,
    /// Audio format
    #[serde(default = "default_output_format")]
    pub output_format: String,
    /// Polly engine
    #[serde(default = "default_engine")]
    pub engine: String,
    /// Language code sent with every task
    #[serde(default = "default_language_code")]
    pub language_code: String,
    /// Output key prefix for audio files
    #[serde(default = "default_output_prefix")]
    pub output_prefix: String,
    /// Character ceiling for a single synthesis task (neural voices)
    #[serde(default = "default_max_chars")]
    pub max_chars: usize,
}

fn default_sample_file() -> String {
    "textract_sample.jpeg".to_string()
}

fn default_voice_id() -> String {
    "Amy".to_string()
}

fn default_output_format() -> String {
    "mp3".to_string()
}

fn default_engine() -> String {
    "neural".to_string()
}

fn default_language_code() -> String {
    "en-US".to_string()
}

fn default_output_prefix() -> String {
    "audio".to_string()
}

fn default_max_chars() -> usize {
    100_000
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            bucket: None,
            sample_file: default_sample_file(),
            voice_id: default_voice_id(),
            output_format: default_output_format(),
            engine: default_engine(),
            language_code: default_language_code(),
            output_prefix: default_output_prefix(),
            max_chars: default_max_chars(),
        }
    }
}

/// Trace lab configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraceConfig {
    /// Send segments to the daemon
    #[serde(default = "default_trace_enabled")]
    pub enabled: bool,
    /// Trace daemon UDP address
    #[serde(default = "default_daemon_address")]
    pub daemon_address: String,
    /// Name recorded on segments and annotations
    #[serde(default = "default_function_name")]
    pub function_name: String,
    /// User table for database requests
    #[serde(default = "default_users_table")]
    pub users_table: String,
    /// Bucket for file processing requests that name none
    #[serde(default = "default_files_bucket")]
    pub default_bucket: String,
    /// Key for file processing requests that name none
    #[serde(default = "default_file_key")]
    pub default_file_key: String,
    /// Endpoint for external API requests that name none
    #[serde(default = "default_api_endpoint")]
    pub default_api_endpoint: String,
}

fn default_trace_enabled() -> bool {
    true
}

fn default_daemon_address() -> String {
    "127.0.0.1:2000".to_string()
}

fn default_function_name() -> String {
    "cloud-labs".to_string()
}

fn default_users_table() -> String {
    "bike-users".to_string()
}

fn default_files_bucket() -> String {
    "bike-app-files".to_string()
}

fn default_file_key() -> String {
    "sample.txt".to_string()
}

fn default_api_endpoint() -> String {
    "https://api.example.com/data".to_string()
}

impl Default for TraceConfig {
    fn default() -> Self {
        Self {
            enabled: default_trace_enabled(),
            daemon_address: default_daemon_address(),
            function_name: default_function_name(),
            users_table: default_users_table(),
            default_bucket: default_files_bucket(),
            default_file_key: default_file_key(),
            default_api_endpoint: default_api_endpoint(),
        }
    }
}
