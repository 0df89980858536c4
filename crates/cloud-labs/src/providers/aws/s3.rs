//! S3 client for object reads

use async_trait::async_trait;
use reqwest::Method;
use std::sync::Arc;

use super::auth::{service_error_message, uri_encode, AwsAuth, ServiceRequest};
use crate::error::{Error, Result};
use crate::providers::object_store::ObjectStore;

/// S3 `GetObject` / `HeadBucket` client
pub struct S3Client {
    auth: Arc<AwsAuth>,
}

impl S3Client {
    pub fn new(auth: Arc<AwsAuth>) -> Self {
        Self { auth }
    }

    /// Virtual-hosted URL, or path-style under an endpoint override
    fn object_url(&self, bucket: &str, key: &str) -> String {
        let key = uri_encode(key, false);
        if self.auth.has_endpoint_override() {
            format!("{}/{}/{}", self.auth.endpoint("s3"), bucket, key)
        } else {
            format!("https://{}.s3.{}.amazonaws.com/{}", bucket, self.auth.region(), key)
        }
    }

    async fn send(&self, request: ServiceRequest<'_>) -> Result<reqwest::Response> {
        let operation = request.operation;
        let response = self
            .auth
            .send(request)
            .await
            .map_err(|e| Error::Storage(format!("{} request failed: {}", operation, e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let detail = if body.trim().is_empty() {
                status.canonical_reason().unwrap_or("no detail").to_string()
            } else {
                service_error_message(&body)
            };
            return Err(Error::Storage(format!("{} failed ({}): {}", operation, status, detail)));
        }
        Ok(response)
    }
}

#[async_trait]
impl ObjectStore for S3Client {
    #[tracing::instrument(skip(self))]
    async fn get_object(&self, bucket: &str, key: &str) -> Result<Vec<u8>> {
        let request = ServiceRequest::new(
            "s3",
            "GetObject",
            Method::GET,
            self.object_url(bucket, key),
        );
        let response = self.send(request).await?;
        let bytes = response
            .bytes()
            .await
            .map_err(|e| Error::Storage(format!("Failed to read s3://{}/{}: {}", bucket, key, e)))?;

        tracing::debug!("Read {} bytes from s3://{}/{}", bytes.len(), bucket, key);
        Ok(bytes.to_vec())
    }

    async fn head_bucket(&self, bucket: &str) -> Result<()> {
        let request = ServiceRequest::new(
            "s3",
            "HeadBucket",
            Method::HEAD,
            self.object_url(bucket, ""),
        );
        self.send(request).await?;
        Ok(())
    }
}
