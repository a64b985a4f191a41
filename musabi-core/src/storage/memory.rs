//! In-process media store for tests and offline runs.

use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;

use super::MediaStore;
use crate::error::PipelineError;

#[derive(Debug, Clone)]
struct StoredObject {
    data: Vec<u8>,
    content_type: String,
}

/// Media store holding objects in memory.
#[derive(Debug)]
pub struct InMemoryMediaStore {
    bucket: String,
    objects: DashMap<String, StoredObject>,
}

impl InMemoryMediaStore {
    pub fn new(bucket: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            objects: DashMap::new(),
        }
    }

    /// All stored keys, sorted.
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.objects.iter().map(|e| e.key().clone()).collect();
        keys.sort();
        keys
    }

    pub fn contains(&self, key: &str) -> bool {
        self.objects.contains_key(key)
    }

    pub fn content_type(&self, key: &str) -> Option<String> {
        self.objects.get(key).map(|o| o.content_type.clone())
    }
}

#[async_trait]
impl MediaStore for InMemoryMediaStore {
    async fn get_object(&self, key: &str) -> Result<Vec<u8>, PipelineError> {
        self.objects
            .get(key)
            .map(|o| o.data.clone())
            .ok_or_else(|| PipelineError::external("memory", format!("No such key: {}", key)))
    }

    async fn put_object(
        &self,
        key: &str,
        data: Vec<u8>,
        content_type: &str,
    ) -> Result<(), PipelineError> {
        self.objects.insert(
            key.to_string(),
            StoredObject {
                data,
                content_type: content_type.to_string(),
            },
        );
        Ok(())
    }

    async fn presigned_get_url(&self, key: &str, ttl: Duration) -> Result<String, PipelineError> {
        if !self.objects.contains_key(key) {
            return Err(PipelineError::external(
                "memory",
                format!("No such key: {}", key),
            ));
        }
        Ok(format!(
            "memory://{}/{}?expires_in={}",
            self.bucket,
            key,
            ttl.as_secs()
        ))
    }

    fn bucket(&self) -> &str {
        &self.bucket
    }
}
