//! Posting stored images to the social account.
//!
//! A single image becomes one container. Several images become one carousel
//! item container each, then a parent carousel container listing the children
//! in order. Every container is polled until FINISHED before it is used.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::{sleep, timeout};
use tracing::{debug, info, warn};

use super::client::{ContainerStatus, GraphApi};
use crate::config::PollPolicy;
use crate::error::PipelineError;
use crate::storage::MediaStore;
use crate::types::{require_items, require_text};

/// What to post.
#[derive(Debug, Clone)]
pub struct PublishRequest {
    /// Stored images, in the order they appear in the post.
    pub image_keys: Vec<String>,
    pub caption: String,
    /// Skip every external side effect.
    pub dry_run: bool,
}

/// The post created by a publish.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedMedia {
    pub media_id: String,
    pub permalink: Option<String>,
}

pub struct SocialPublisher {
    api: Arc<dyn GraphApi>,
    store: Arc<dyn MediaStore>,
    poll: PollPolicy,
    url_ttl: Duration,
}

impl SocialPublisher {
    pub fn new(
        api: Arc<dyn GraphApi>,
        store: Arc<dyn MediaStore>,
        poll: PollPolicy,
        url_ttl: Duration,
    ) -> Self {
        Self {
            api,
            store,
            poll,
            url_ttl,
        }
    }

    /// Publish `request`. Returns `None` for dry runs.
    pub async fn publish(
        &self,
        request: &PublishRequest,
    ) -> Result<Option<PublishedMedia>, PipelineError> {
        require_items("ImageKeys", &request.image_keys)?;
        require_text("Caption", &request.caption)?;

        if request.dry_run {
            info!(images = request.image_keys.len(), "Dry run, skipping publish");
            return Ok(None);
        }

        match self.api.get_content_publishing_limit().await {
            Ok(limit) => info!(
                quota_usage = limit.quota_usage,
                quota_total = ?limit.quota_total,
                "Content publishing limit"
            ),
            Err(e) => warn!(error = %e, "Could not read content publishing limit"),
        }

        let mut urls = Vec::with_capacity(request.image_keys.len());
        for key in &request.image_keys {
            urls.push(self.store.presigned_get_url(key, self.url_ttl).await?);
        }

        let creation_id = if let [url] = urls.as_slice() {
            self.create_and_wait(url, &request.caption, false).await?
        } else {
            let mut children = Vec::with_capacity(urls.len());
            for url in &urls {
                children.push(self.create_and_wait(url, &request.caption, true).await?);
            }
            let carousel_id = self
                .api
                .create_carousel_media(&request.caption, &children)
                .await?;
            info!(carousel_id = %carousel_id, children = children.len(), "Created carousel container");
            self.wait_container_finish(&carousel_id).await?;
            carousel_id
        };

        let media_id = self.api.publish_media(&creation_id).await?;
        info!(media_id = %media_id, "Published media");

        // The post is live at this point; a failed lookup must not fail the stage.
        let permalink = match self.api.get_media(&media_id).await {
            Ok(media) => media.permalink,
            Err(e) => {
                warn!(media_id = %media_id, error = %e, "Could not read published media");
                None
            }
        };

        Ok(Some(PublishedMedia {
            media_id,
            permalink,
        }))
    }

    async fn create_and_wait(
        &self,
        image_url: &str,
        caption: &str,
        is_carousel_item: bool,
    ) -> Result<String, PipelineError> {
        let container_id = self
            .api
            .create_image_media(image_url, caption, is_carousel_item)
            .await?;
        debug!(container_id = %container_id, is_carousel_item, "Created image container");
        self.wait_container_finish(&container_id).await?;
        Ok(container_id)
    }

    /// Poll `container_id` until FINISHED.
    ///
    /// Any status other than IN_PROGRESS or FINISHED is fatal. When the poll
    /// policy has a max wait, exceeding it yields [`PipelineError::PublishTimeout`].
    pub async fn wait_container_finish(&self, container_id: &str) -> Result<(), PipelineError> {
        match self.poll.max_wait {
            Some(max_wait) => timeout(max_wait, self.poll_until_finished(container_id))
                .await
                .map_err(|_| PipelineError::PublishTimeout {
                    container_id: container_id.to_string(),
                    waited: max_wait,
                })?,
            None => self.poll_until_finished(container_id).await,
        }
    }

    async fn poll_until_finished(&self, container_id: &str) -> Result<(), PipelineError> {
        let mut attempts = 0u32;
        loop {
            attempts += 1;
            let status = self.api.get_container_status(container_id).await?;
            debug!(container_id, attempts, status = %status, "Container status");
            match status {
                ContainerStatus::InProgress => sleep(self.poll.interval).await,
                ContainerStatus::Finished => return Ok(()),
                other => {
                    return Err(PipelineError::external(
                        "graph",
                        format!("Container {} ended in status {}", container_id, other),
                    ))
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::publish::{FakeGraphApi, GraphCall};
    use crate::storage::InMemoryMediaStore;

    fn fast_poll() -> PollPolicy {
        PollPolicy {
            interval: Duration::from_millis(1),
            max_wait: Some(Duration::from_secs(5)),
        }
    }

    async fn store_with(keys: &[&str]) -> Arc<InMemoryMediaStore> {
        let store = Arc::new(InMemoryMediaStore::new("bucket"));
        for key in keys {
            store
                .put_object(key, vec![1], "image/png")
                .await
                .unwrap();
        }
        store
    }

    fn publisher(api: Arc<FakeGraphApi>, store: Arc<InMemoryMediaStore>, poll: PollPolicy) -> SocialPublisher {
        SocialPublisher::new(api, store, poll, Duration::from_secs(300))
    }

    fn request(keys: &[&str], dry_run: bool) -> PublishRequest {
        PublishRequest {
            image_keys: keys.iter().map(|k| k.to_string()).collect(),
            caption: "Tomato Basil Pasta".to_string(),
            dry_run,
        }
    }

    #[tokio::test]
    async fn test_carousel_children_keep_order() {
        let api = Arc::new(FakeGraphApi::new().with_in_progress_polls(2));
        let store = store_with(&["run-42/0.png", "run-42/1.png"]).await;
        let publisher = publisher(api.clone(), store, fast_poll());

        let published = publisher
            .publish(&request(&["run-42/0.png", "run-42/1.png"], false))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(published.media_id, "media-1");
        assert!(published.permalink.is_some());

        let calls = api.calls();
        let created: Vec<(String, bool)> = calls
            .iter()
            .filter_map(|c| match c {
                GraphCall::CreateImageMedia {
                    image_url,
                    is_carousel_item,
                    ..
                } => Some((image_url.clone(), *is_carousel_item)),
                _ => None,
            })
            .collect();
        assert_eq!(
            created,
            vec![
                ("memory://bucket/run-42/0.png?expires_in=300".to_string(), true),
                ("memory://bucket/run-42/1.png?expires_in=300".to_string(), true),
            ]
        );

        assert!(calls.contains(&GraphCall::CreateCarouselMedia {
            caption: "Tomato Basil Pasta".to_string(),
            children: vec!["container-1".to_string(), "container-2".to_string()],
        }));
        assert!(calls.contains(&GraphCall::PublishMedia {
            creation_id: "container-3".to_string(),
        }));
        // 3 containers, each polled twice IN_PROGRESS then once FINISHED
        assert_eq!(
            api.count(|c| matches!(c, GraphCall::GetContainerStatus { .. })),
            9
        );
    }

    #[tokio::test]
    async fn test_single_image_is_published_directly() {
        let api = Arc::new(FakeGraphApi::new());
        let store = store_with(&["run-1/0.png"]).await;
        let publisher = publisher(api.clone(), store, fast_poll());

        publisher
            .publish(&request(&["run-1/0.png"], false))
            .await
            .unwrap();

        assert_eq!(
            api.count(|c| matches!(c, GraphCall::CreateCarouselMedia { .. })),
            0
        );
        assert!(api.calls().contains(&GraphCall::CreateImageMedia {
            image_url: "memory://bucket/run-1/0.png?expires_in=300".to_string(),
            caption: "Tomato Basil Pasta".to_string(),
            is_carousel_item: false,
        }));
        assert!(api.calls().contains(&GraphCall::PublishMedia {
            creation_id: "container-1".to_string(),
        }));
    }

    #[tokio::test]
    async fn test_dry_run_makes_no_calls() {
        let api = Arc::new(FakeGraphApi::new());
        // keys do not even exist: nothing may be presigned either
        let store = store_with(&[]).await;
        let publisher = publisher(api.clone(), store, fast_poll());

        let result = publisher
            .publish(&request(&["run-1/0.png", "run-1/1.png"], true))
            .await
            .unwrap();

        assert_eq!(result, None);
        assert!(api.calls().is_empty());
    }

    #[tokio::test]
    async fn test_error_status_is_fatal() {
        let api = Arc::new(FakeGraphApi::new().with_status_sequence(
            "container-2",
            vec![ContainerStatus::InProgress, ContainerStatus::Error],
        ));
        let store = store_with(&["a.png", "b.png"]).await;
        let publisher = publisher(api.clone(), store, fast_poll());

        let err = publisher
            .publish(&request(&["a.png", "b.png"], false))
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::ExternalService { .. }));
        assert!(err.to_string().contains("ERROR"));
        assert_eq!(
            api.count(|c| matches!(c, GraphCall::PublishMedia { .. })),
            0
        );
    }

    #[tokio::test]
    async fn test_stuck_container_times_out() {
        let api = Arc::new(FakeGraphApi::new().with_in_progress_polls(usize::MAX));
        let store = store_with(&["a.png"]).await;
        let poll = PollPolicy {
            interval: Duration::from_millis(5),
            max_wait: Some(Duration::from_millis(50)),
        };
        let publisher = publisher(api.clone(), store, poll);

        let err = publisher
            .publish(&request(&["a.png"], false))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            PipelineError::PublishTimeout { ref container_id, .. } if container_id == "container-1"
        ));
        assert_eq!(
            api.count(|c| matches!(c, GraphCall::PublishMedia { .. })),
            0
        );
    }

    #[tokio::test]
    async fn test_empty_request_rejected_before_calls() {
        let api = Arc::new(FakeGraphApi::new());
        let store = store_with(&[]).await;
        let publisher = publisher(api.clone(), store, fast_poll());

        let err = publisher.publish(&request(&[], false)).await.unwrap_err();
        assert!(matches!(err, PipelineError::Validation(_)));
        assert!(api.calls().is_empty());
    }
}
