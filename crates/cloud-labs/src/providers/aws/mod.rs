//! AWS provider implementations
//!
//! Plain REST clients over `reqwest`, signed with Signature Version 4:
//! - Bedrock knowledge bases for retrieval and administration
//! - Bedrock runtime (Anthropic models) for answer generation
//! - Textract for document OCR
//! - Polly for speech synthesis tasks
//! - S3 for object reads
//! - DynamoDB for item storage

mod auth;
mod bedrock;
mod dynamodb;
mod knowledge_base;
mod polly;
mod s3;
mod textract;

pub use auth::{
    service_error_message, uri_encode, AwsAuth, Credentials, ServiceRequest, SigningRequest,
};
pub use bedrock::BedrockGenerator;
pub use dynamodb::DynamoDbClient;
pub use knowledge_base::{
    KnowledgeBaseManager, KnowledgeBaseRetriever, NewDataSource, NewKnowledgeBase,
};
pub use polly::PollyClient;
pub use s3::S3Client;
pub use textract::TextractClient;

/// In-process stand-ins for service endpoints
#[cfg(test)]
pub(crate) mod testing {
    use std::sync::Arc;

    use super::{AwsAuth, Credentials};
    use crate::config::AwsConfig;

    /// Base URL nothing listens on
    pub const REFUSED: &str = "http://127.0.0.1:1";

    /// Serve `app` on a loopback port and return its base URL
    pub async fn serve(app: axum::Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}", address)
    }

    /// Auth that sends every service call to `base`
    pub fn auth_for(base: &str, timeout_secs: u64) -> Arc<AwsAuth> {
        let config = AwsConfig {
            endpoint_url: Some(base.to_string()),
            request_timeout_secs: timeout_secs,
            ..Default::default()
        };
        Arc::new(AwsAuth::new(Credentials::new("AKIDTEST", "secret", None), &config).unwrap())
    }
}
