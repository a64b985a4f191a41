//! Content publishing Graph API client.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value as JsonValue};
use tracing::debug;

use super::config::MetaConfig;
use crate::error::PipelineError;
use crate::retry::{retry_transient, RetryPolicy};

const SERVICE: &str = "graph";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

pub const MEDIA_FIELDS: &[&str] = &[
    "id",
    "caption",
    "media_type",
    "media_url",
    "permalink",
    "thumbnail_url",
    "timestamp",
    "username",
];
pub const CONTAINER_FIELDS: &[&str] = &["id", "status", "status_code"];
pub const PUBLISHING_LIMIT_FIELDS: &[&str] = &["config", "quota_usage"];

/// Processing state of a media container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContainerStatus {
    InProgress,
    Finished,
    Error,
    Expired,
    Published,
    Other(String),
}

impl ContainerStatus {
    pub fn parse(code: &str) -> Self {
        match code {
            "IN_PROGRESS" => Self::InProgress,
            "FINISHED" => Self::Finished,
            "ERROR" => Self::Error,
            "EXPIRED" => Self::Expired,
            "PUBLISHED" => Self::Published,
            other => Self::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::InProgress => "IN_PROGRESS",
            Self::Finished => "FINISHED",
            Self::Error => "ERROR",
            Self::Expired => "EXPIRED",
            Self::Published => "PUBLISHED",
            Self::Other(code) => code,
        }
    }
}

impl fmt::Display for ContainerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A published media object.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct MediaInfo {
    pub id: String,
    #[serde(default)]
    pub caption: Option<String>,
    #[serde(default)]
    pub media_type: Option<String>,
    #[serde(default)]
    pub media_url: Option<String>,
    #[serde(default)]
    pub permalink: Option<String>,
    #[serde(default)]
    pub thumbnail_url: Option<String>,
    #[serde(default)]
    pub timestamp: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
}

/// How many posts the account has used of its rolling quota.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PublishingLimit {
    pub quota_usage: u64,
    pub quota_total: Option<u64>,
}

/// The subset of the Graph API used to publish posts.
#[async_trait]
pub trait GraphApi: Send + Sync {
    /// Create an image container; returns its id.
    async fn create_image_media(
        &self,
        image_url: &str,
        caption: &str,
        is_carousel_item: bool,
    ) -> Result<String, PipelineError>;

    /// Create a carousel container over `children`, kept in the given order.
    async fn create_carousel_media(
        &self,
        caption: &str,
        children: &[String],
    ) -> Result<String, PipelineError>;

    async fn get_container_status(&self, container_id: &str)
        -> Result<ContainerStatus, PipelineError>;

    /// Publish a finished container; returns the media id.
    async fn publish_media(&self, creation_id: &str) -> Result<String, PipelineError>;

    async fn get_media(&self, media_id: &str) -> Result<MediaInfo, PipelineError>;

    async fn get_content_publishing_limit(&self) -> Result<PublishingLimit, PipelineError>;
}

#[derive(Debug, Deserialize)]
struct IdResponse {
    id: String,
}

#[derive(Debug, Deserialize)]
struct ContainerResponse {
    #[serde(default)]
    status_code: Option<String>,
    #[serde(default)]
    status: Option<String>,
}

/// Graph API client over HTTPS.
pub struct GraphClient {
    http: reqwest::Client,
    config: MetaConfig,
    retry: RetryPolicy,
}

impl GraphClient {
    pub fn new(config: MetaConfig) -> Result<Self, PipelineError> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| PipelineError::internal(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self {
            http,
            config,
            retry: RetryPolicy::default(),
        })
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.endpoint_base(), path)
    }

    fn account_url(&self, edge: &str) -> String {
        self.url(&format!("{}/{}", self.config.account_id, edge))
    }

    /// GET with the access token and a field list. Retried on transient failures.
    async fn get(&self, url: &str, fields: &[&str]) -> Result<JsonValue, PipelineError> {
        let fields = fields.join(",");
        let fields = fields.as_str();
        retry_transient(&self.retry, "graph_get", || async move {
            debug!(url, "Graph GET");
            let response = self
                .http
                .get(url)
                .query(&[
                    ("access_token", self.config.access_token.as_str()),
                    ("fields", fields),
                ])
                .send()
                .await
                .map_err(|e| PipelineError::from_reqwest(SERVICE, e))?;
            read_response(response).await
        })
        .await
    }

    /// POST a JSON body with the access token. Never retried.
    async fn post(&self, url: &str, mut body: JsonValue) -> Result<JsonValue, PipelineError> {
        body["access_token"] = json!(self.config.access_token);
        debug!(url, "Graph POST");
        let response = self
            .http
            .post(url)
            .json(&body)
            .send()
            .await
            .map_err(|e| PipelineError::from_reqwest(SERVICE, e))?;
        read_response(response).await
    }
}

async fn read_response(response: reqwest::Response) -> Result<JsonValue, PipelineError> {
    let status = response.status();
    let text = response
        .text()
        .await
        .map_err(|e| PipelineError::from_reqwest(SERVICE, e))?;
    parse_graph_body(status.as_u16(), &text)
}

/// Decode a Graph response body, turning `{"error": {...}}` into an error.
pub fn parse_graph_body(status: u16, text: &str) -> Result<JsonValue, PipelineError> {
    let value: JsonValue = serde_json::from_str(text).map_err(|_| {
        PipelineError::from_status(SERVICE, status, &text.chars().take(200).collect::<String>())
    })?;

    if let Some(error) = value.get("error") {
        let message = error
            .get("message")
            .and_then(JsonValue::as_str)
            .unwrap_or("unknown error");
        let code = error.get("code").and_then(JsonValue::as_i64).unwrap_or(0);
        let transient = error
            .get("is_transient")
            .and_then(JsonValue::as_bool)
            .unwrap_or(false);
        let mut err = PipelineError::from_status(SERVICE, status, &format!("{} (code {})", message, code));
        if transient {
            err = PipelineError::transient(SERVICE, err.to_string());
        }
        return Err(err);
    }

    if !(200..300).contains(&status) {
        return Err(PipelineError::from_status(SERVICE, status, text));
    }

    Ok(value)
}

fn decode<T: serde::de::DeserializeOwned>(value: JsonValue) -> Result<T, PipelineError> {
    serde_json::from_value(value)
        .map_err(|e| PipelineError::external(SERVICE, format!("Unexpected response: {}", e)))
}

#[async_trait]
impl GraphApi for GraphClient {
    async fn create_image_media(
        &self,
        image_url: &str,
        caption: &str,
        is_carousel_item: bool,
    ) -> Result<String, PipelineError> {
        let body = json!({
            "image_url": image_url,
            "caption": caption,
            "is_carousel_item": is_carousel_item,
        });
        let response: IdResponse = decode(self.post(&self.account_url("media"), body).await?)?;
        Ok(response.id)
    }

    async fn create_carousel_media(
        &self,
        caption: &str,
        children: &[String],
    ) -> Result<String, PipelineError> {
        let body = json!({
            "caption": caption,
            "media_type": "CAROUSEL",
            "children": children,
        });
        let response: IdResponse = decode(self.post(&self.account_url("media"), body).await?)?;
        Ok(response.id)
    }

    async fn get_container_status(
        &self,
        container_id: &str,
    ) -> Result<ContainerStatus, PipelineError> {
        let response: ContainerResponse =
            decode(self.get(&self.url(container_id), CONTAINER_FIELDS).await?)?;
        let code = response.status_code.ok_or_else(|| {
            PipelineError::external(
                SERVICE,
                format!(
                    "Container {} has no status_code (status: {})",
                    container_id,
                    response.status.unwrap_or_default()
                ),
            )
        })?;
        Ok(ContainerStatus::parse(&code))
    }

    async fn publish_media(&self, creation_id: &str) -> Result<String, PipelineError> {
        let body = json!({ "creation_id": creation_id });
        let response: IdResponse =
            decode(self.post(&self.account_url("media_publish"), body).await?)?;
        Ok(response.id)
    }

    async fn get_media(&self, media_id: &str) -> Result<MediaInfo, PipelineError> {
        decode(self.get(&self.url(media_id), MEDIA_FIELDS).await?)
    }

    async fn get_content_publishing_limit(&self) -> Result<PublishingLimit, PipelineError> {
        let value = self
            .get(
                &self.account_url("content_publishing_limit"),
                PUBLISHING_LIMIT_FIELDS,
            )
            .await?;
        Ok(parse_publishing_limit(&value))
    }
}

/// Read `data[0]` of a content_publishing_limit response.
pub fn parse_publishing_limit(value: &JsonValue) -> PublishingLimit {
    let entry = &value["data"][0];
    PublishingLimit {
        quota_usage: entry["quota_usage"].as_u64().unwrap_or(0),
        quota_total: entry["config"]["quota_total"].as_u64(),
    }
}
