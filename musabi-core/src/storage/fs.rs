//! Filesystem media store for local runs.
//!
//! Objects live at `{root}/{key}`; presigned URLs are plain `file://` URLs.

use std::path::{Component, Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use tokio::fs;

use super::MediaStore;
use crate::error::PipelineError;

pub struct FsMediaStore {
    root: PathBuf,
    name: String,
}

impl FsMediaStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let name = root.display().to_string();
        Self { root, name }
    }

    /// Resolve `key` under the root, rejecting keys that would escape it.
    fn path_for(&self, key: &str) -> Result<PathBuf, PipelineError> {
        let relative = Path::new(key);
        let escapes = relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_)));
        if key.is_empty() || escapes {
            return Err(PipelineError::validation(format!("Invalid object key: {}", key)));
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl MediaStore for FsMediaStore {
    async fn get_object(&self, key: &str) -> Result<Vec<u8>, PipelineError> {
        let path = self.path_for(key)?;
        fs::read(&path)
            .await
            .map_err(|e| PipelineError::external("fs", format!("{}: {}", path.display(), e)))
    }

    async fn put_object(
        &self,
        key: &str,
        data: Vec<u8>,
        _content_type: &str,
    ) -> Result<(), PipelineError> {
        let path = self.path_for(key)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| PipelineError::external("fs", format!("{}: {}", parent.display(), e)))?;
        }
        fs::write(&path, data)
            .await
            .map_err(|e| PipelineError::external("fs", format!("{}: {}", path.display(), e)))?;
        tracing::info!(path = %path.display(), "Stored object");
        Ok(())
    }

    async fn presigned_get_url(&self, key: &str, _ttl: Duration) -> Result<String, PipelineError> {
        let path = self.path_for(key)?;
        let absolute = fs::canonicalize(&path)
            .await
            .map_err(|e| PipelineError::external("fs", format!("{}: {}", path.display(), e)))?;
        Ok(format!("file://{}", absolute.display()))
    }

    fn bucket(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_round_trip_under_root() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsMediaStore::new(dir.path());

        store
            .put_object("run-7/candidates/0.png", b"png".to_vec(), "image/png")
            .await
            .unwrap();

        assert!(dir.path().join("run-7/candidates/0.png").exists());
        assert_eq!(
            store.get_object("run-7/candidates/0.png").await.unwrap(),
            b"png".to_vec()
        );

        let url = store
            .presigned_get_url("run-7/candidates/0.png", Duration::from_secs(60))
            .await
            .unwrap();
        assert!(url.starts_with("file://"));
        assert!(url.ends_with("run-7/candidates/0.png"));
    }

    #[tokio::test]
    async fn test_rejects_escaping_keys() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsMediaStore::new(dir.path());
        let result = store.put_object("../outside.png", vec![], "image/png").await;
        assert!(matches!(result, Err(PipelineError::Validation(_))));
        assert!(store.get_object("/etc/passwd").await.is_err());
    }
}
