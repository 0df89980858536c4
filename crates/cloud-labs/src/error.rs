//! Error types for the lab handlers

use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Result type alias for lab operations
pub type Result<T> = std::result::Result<T, Error>;

/// Lab handler errors
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Caller supplied an unusable request
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Knowledge base retrieval failed or returned malformed data
    #[error("Retrieval failed: {0}")]
    Retrieval(String),

    /// Model invocation failed, returned malformed data, or produced no text
    #[error("Generation failed: {0}")]
    Generation(String),

    /// Document text extraction (OCR) error
    #[error("Text extraction failed: {0}")]
    Extraction(String),

    /// Speech synthesis error
    #[error("Speech synthesis failed: {0}")]
    Speech(String),

    /// Object storage error
    #[error("Storage error: {0}")]
    Storage(String),

    /// Wide-column table error
    #[error("Database error: {0}")]
    Database(String),

    /// Knowledge base administration error
    #[error("Knowledge base error: {0}")]
    KnowledgeBase(String),

    /// Trace recording or delivery error
    #[error("Trace error: {0}")]
    Trace(String),

    /// Third-party HTTP API answered with an error or not at all
    #[error("External API error: {0}")]
    ExternalApi(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP request error
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a retrieval error
    pub fn retrieval(message: impl Into<String>) -> Self {
        Self::Retrieval(message.into())
    }

    /// Create a generation error
    pub fn generation(message: impl Into<String>) -> Self {
        Self::Generation(message.into())
    }

    /// Create an invalid request error
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::InvalidRequest(message.into())
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Short machine-readable kind, used in JSON error bodies
    pub fn kind(&self) -> &'static str {
        match self {
            Error::Config(_) => "config_error",
            Error::InvalidRequest(_) => "invalid_request",
            Error::Retrieval(_) => "retrieval_error",
            Error::Generation(_) => "generation_error",
            Error::Extraction(_) => "extraction_error",
            Error::Speech(_) => "speech_error",
            Error::Storage(_) => "storage_error",
            Error::Database(_) => "database_error",
            Error::KnowledgeBase(_) => "knowledge_base_error",
            Error::Trace(_) => "trace_error",
            Error::ExternalApi(_) => "external_api_error",
            Error::Io(_) => "io_error",
            Error::Json(_) => "json_error",
            Error::Http(_) => "http_error",
            Error::Internal(_) => "internal_error",
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            Error::InvalidRequest(_) | Error::Json(_) => StatusCode::BAD_REQUEST,
            Error::Retrieval(_)
            | Error::Generation(_)
            | Error::Extraction(_)
            | Error::Speech(_)
            | Error::Storage(_)
            | Error::Database(_)
            | Error::KnowledgeBase(_)
            | Error::ExternalApi(_)
            | Error::Http(_) => StatusCode::BAD_GATEWAY,
            Error::Config(_) | Error::Trace(_) | Error::Io(_) | Error::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl From<JsonRejection> for Error {
    fn from(rejection: JsonRejection) -> Self {
        Error::InvalidRequest(rejection.body_text())
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = Json(json!({
            "error": {
                "type": self.kind(),
                "message": self.to_string(),
            }
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pipeline_errors_map_to_bad_gateway() {
        assert_eq!(Error::retrieval("timeout").status(), StatusCode::BAD_GATEWAY);
        assert_eq!(Error::generation("empty").status(), StatusCode::BAD_GATEWAY);
        assert_eq!(
            Error::invalid_request("no question").status(),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn test_display_keeps_message() {
        let err = Error::generation("No text in model response");
        assert_eq!(err.to_string(), "Generation failed: No text in model response");
        assert_eq!(err.kind(), "generation_error");
    }
}
