//! Object store trait for blob storage

use async_trait::async_trait;

use crate::error::Result;

/// Trait for reading objects from blob storage
///
/// Implementations:
/// - `S3Client`: S3 `GetObject` / `HeadBucket`
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Fetch an object's bytes
    async fn get_object(&self, bucket: &str, key: &str) -> Result<Vec<u8>>;

    /// Check the bucket exists and is reachable with the current credentials
    async fn head_bucket(&self, bucket: &str) -> Result<()>;
}
