//! Fake Graph API for testing.
//!
//! Every call is recorded. Containers are numbered in creation order
//! ("container-1", "container-2", ...) and report IN_PROGRESS a configurable
//! number of times before FINISHED, unless a status sequence is scripted.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;

use super::client::{ContainerStatus, GraphApi, MediaInfo, PublishingLimit};
use crate::error::PipelineError;

/// A recorded Graph API call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GraphCall {
    CreateImageMedia {
        image_url: String,
        caption: String,
        is_carousel_item: bool,
    },
    CreateCarouselMedia {
        caption: String,
        children: Vec<String>,
    },
    GetContainerStatus {
        container_id: String,
    },
    PublishMedia {
        creation_id: String,
    },
    GetMedia {
        media_id: String,
    },
    GetContentPublishingLimit,
}

impl GraphCall {
    /// Calls that create, poll or publish containers.
    pub fn is_side_effect(&self) -> bool {
        matches!(
            self,
            Self::CreateImageMedia { .. }
                | Self::CreateCarouselMedia { .. }
                | Self::GetContainerStatus { .. }
                | Self::PublishMedia { .. }
        )
    }
}

#[derive(Debug, Default)]
pub struct FakeGraphApi {
    calls: Mutex<Vec<GraphCall>>,
    scripted: Mutex<HashMap<String, VecDeque<ContainerStatus>>>,
    polls: Mutex<HashMap<String, usize>>,
    in_progress_polls: usize,
    containers: AtomicUsize,
    media: AtomicUsize,
}

impl FakeGraphApi {
    pub fn new() -> Self {
        Self::default()
    }

    /// Report IN_PROGRESS `polls` times for each container before FINISHED.
    pub fn with_in_progress_polls(mut self, polls: usize) -> Self {
        self.in_progress_polls = polls;
        self
    }

    /// Return `statuses` in order for `container_id`, then FINISHED.
    pub fn with_status_sequence(self, container_id: &str, statuses: Vec<ContainerStatus>) -> Self {
        lock(&self.scripted).insert(container_id.to_string(), statuses.into());
        self
    }

    pub fn calls(&self) -> Vec<GraphCall> {
        lock(&self.calls).clone()
    }

    /// Number of recorded calls matching `pred`.
    pub fn count(&self, pred: impl Fn(&GraphCall) -> bool) -> usize {
        lock(&self.calls).iter().filter(|c| pred(c)).count()
    }

    fn record(&self, call: GraphCall) {
        lock(&self.calls).push(call);
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

#[async_trait]
impl GraphApi for FakeGraphApi {
    async fn create_image_media(
        &self,
        image_url: &str,
        caption: &str,
        is_carousel_item: bool,
    ) -> Result<String, PipelineError> {
        self.record(GraphCall::CreateImageMedia {
            image_url: image_url.to_string(),
            caption: caption.to_string(),
            is_carousel_item,
        });
        let n = self.containers.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(format!("container-{}", n))
    }

    async fn create_carousel_media(
        &self,
        caption: &str,
        children: &[String],
    ) -> Result<String, PipelineError> {
        self.record(GraphCall::CreateCarouselMedia {
            caption: caption.to_string(),
            children: children.to_vec(),
        });
        let n = self.containers.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(format!("container-{}", n))
    }

    async fn get_container_status(
        &self,
        container_id: &str,
    ) -> Result<ContainerStatus, PipelineError> {
        self.record(GraphCall::GetContainerStatus {
            container_id: container_id.to_string(),
        });

        if let Some(queue) = lock(&self.scripted).get_mut(container_id) {
            return Ok(queue.pop_front().unwrap_or(ContainerStatus::Finished));
        }

        let mut polls = lock(&self.polls);
        let seen = polls.entry(container_id.to_string()).or_insert(0);
        *seen += 1;
        if *seen > self.in_progress_polls {
            Ok(ContainerStatus::Finished)
        } else {
            Ok(ContainerStatus::InProgress)
        }
    }

    async fn publish_media(&self, creation_id: &str) -> Result<String, PipelineError> {
        self.record(GraphCall::PublishMedia {
            creation_id: creation_id.to_string(),
        });
        let n = self.media.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(format!("media-{}", n))
    }

    async fn get_media(&self, media_id: &str) -> Result<MediaInfo, PipelineError> {
        self.record(GraphCall::GetMedia {
            media_id: media_id.to_string(),
        });
        Ok(MediaInfo {
            id: media_id.to_string(),
            permalink: Some(format!("https://www.instagram.com/p/{}/", media_id)),
            ..Default::default()
        })
    }

    async fn get_content_publishing_limit(&self) -> Result<PublishingLimit, PipelineError> {
        self.record(GraphCall::GetContentPublishingLimit);
        Ok(PublishingLimit {
            quota_usage: 0,
            quota_total: Some(25),
        })
    }
}
