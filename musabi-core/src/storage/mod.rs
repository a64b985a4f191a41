//! Media store: image blobs addressed by key inside one bucket.
//!
//! Every key is derived from the execution name and a fixed ordinal, so stages
//! running in separate processes agree on where artifacts live without
//! passing anything but the execution name around.

mod fs;
mod memory;
mod s3;

pub use fs::FsMediaStore;
pub use memory::InMemoryMediaStore;
pub use s3::S3MediaStore;

use std::time::Duration;

use async_trait::async_trait;

use crate::error::PipelineError;
use crate::types::ExecutionContext;

pub const PNG_CONTENT_TYPE: &str = "image/png";

/// Blob storage used by every stage.
#[async_trait]
pub trait MediaStore: Send + Sync {
    /// Read the object stored under `key`.
    async fn get_object(&self, key: &str) -> Result<Vec<u8>, PipelineError>;

    /// Write `data` under `key`, replacing any existing object.
    async fn put_object(
        &self,
        key: &str,
        data: Vec<u8>,
        content_type: &str,
    ) -> Result<(), PipelineError>;

    /// A URL that allows anyone holding it to read `key` until `ttl` elapses.
    async fn presigned_get_url(&self, key: &str, ttl: Duration) -> Result<String, PipelineError>;

    /// Name of the bucket (or root) backing this store.
    fn bucket(&self) -> &str;
}

/// Key of candidate image `index` produced by the gen_img fan-out.
pub fn candidate_image_key(exec: &ExecutionContext, index: usize) -> String {
    format!("{}/candidates/{}.png", exec.name(), index)
}

/// Key of the composited title image.
pub fn title_image_key(exec: &ExecutionContext) -> String {
    format!("{}/0.png", exec.name())
}

/// Key of the unaltered origin image.
pub fn origin_image_key(exec: &ExecutionContext) -> String {
    format!("{}/1.png", exec.name())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keys_are_deterministic() {
        let exec = ExecutionContext::new("run-42").unwrap();
        assert_eq!(title_image_key(&exec), "run-42/0.png");
        assert_eq!(origin_image_key(&exec), "run-42/1.png");
        assert_eq!(title_image_key(&exec), title_image_key(&exec));

        let again = ExecutionContext::new("run-42").unwrap();
        assert_eq!(origin_image_key(&exec), origin_image_key(&again));
    }

    #[test]
    fn test_candidate_keys_are_disjoint() {
        let exec = ExecutionContext::new("run-42").unwrap();
        let keys: Vec<String> = (0..4).map(|i| candidate_image_key(&exec, i)).collect();
        assert_eq!(keys[2], "run-42/candidates/2.png");
        assert!(!keys.contains(&title_image_key(&exec)));
        assert!(!keys.contains(&origin_image_key(&exec)));
    }

    #[test]
    fn test_bucket_names_through_trait_object() {
        let dir = tempfile::tempdir().unwrap();
        let stores: Vec<(Box<dyn MediaStore>, String)> = vec![
            (
                Box::new(InMemoryMediaStore::new("musabi-images")),
                "musabi-images".to_string(),
            ),
            (
                Box::new(FsMediaStore::new(dir.path())),
                dir.path().display().to_string(),
            ),
        ];
        for (store, expected) in &stores {
            assert_eq!(store.bucket(), expected.as_str());
        }
    }
}
