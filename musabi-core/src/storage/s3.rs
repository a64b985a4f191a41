//! S3-backed media store.

use std::time::Duration;

use async_trait::async_trait;
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use tracing::{debug, info};

use super::MediaStore;
use crate::error::PipelineError;
use crate::retry::{retry_transient, RetryPolicy};

pub struct S3MediaStore {
    client: Client,
    bucket: String,
    retry: RetryPolicy,
}

impl S3MediaStore {
    pub fn new(client: Client, bucket: impl Into<String>) -> Self {
        Self {
            client,
            bucket: bucket.into(),
            retry: RetryPolicy::default(),
        }
    }

    /// Create a store using the default AWS configuration chain.
    pub async fn from_env(bucket: impl Into<String>) -> Self {
        let aws_config = aws_config::load_from_env().await;
        Self::new(Client::new(&aws_config), bucket)
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }
}

#[async_trait]
impl MediaStore for S3MediaStore {
    async fn get_object(&self, key: &str) -> Result<Vec<u8>, PipelineError> {
        debug!(bucket = %self.bucket, key, "Getting object");

        retry_transient(&self.retry, "s3_get_object", || async move {
            let result = self
                .client
                .get_object()
                .bucket(&self.bucket)
                .key(key)
                .send()
                .await
                .map_err(|e| {
                    PipelineError::from_sdk_error("s3", &format!("Failed to get {}", key), &e)
                })?;

            let bytes = result
                .body
                .collect()
                .await
                .map_err(|e| {
                    PipelineError::transient("s3", format!("Failed to read {}: {}", key, e))
                })?
                .into_bytes();

            Ok(bytes.to_vec())
        })
        .await
    }

    async fn put_object(
        &self,
        key: &str,
        data: Vec<u8>,
        content_type: &str,
    ) -> Result<(), PipelineError> {
        debug!(bucket = %self.bucket, key, bytes = data.len(), "Putting object");

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_type(content_type)
            .body(ByteStream::from(data))
            .send()
            .await
            .map_err(|e| {
                PipelineError::from_sdk_error("s3", &format!("Failed to put {}", key), &e)
            })?;

        info!(bucket = %self.bucket, key, "Stored object");
        Ok(())
    }

    async fn presigned_get_url(&self, key: &str, ttl: Duration) -> Result<String, PipelineError> {
        let presigning = PresigningConfig::expires_in(ttl)
            .map_err(|e| PipelineError::validation(format!("Invalid presign TTL: {}", e)))?;

        let request = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .presigned(presigning)
            .await
            .map_err(|e| {
                PipelineError::external("s3", format!("Failed to presign {}: {}", key, e))
            })?;

        debug!(key, ttl_secs = ttl.as_secs(), "Generated presigned URL");
        Ok(request.uri().to_string())
    }

    fn bucket(&self) -> &str {
        &self.bucket
    }
}
