//! Stage configuration and secret resolution.
//!
//! Configuration is built once at stage entry and passed down explicitly.
//! Plain settings come from environment variables; credentials come from a
//! [`SecretStore`] looked up by parameter name.
//!
//! # Environment
//!
//! - `IMAGE_BUCKET` (required): bucket holding every image artifact
//! - `MUSABI_FONT_PATH` (optional): font used for title images (default: "fonts/Bold.ttf")
//! - `MUSABI_PARALLEL_COUNT` (optional): candidate images per run (default: 4)
//! - `MUSABI_POLL_INTERVAL_SECS` (optional): container status poll interval (default: 3)
//! - `MUSABI_POLL_MAX_WAIT_SECS` (optional): give up on a container after this long (default: 150)
//! - `MUSABI_PRESIGN_TTL_SECS` (optional): lifetime of presigned image URLs (default: 300)

use std::collections::HashMap;
use std::env;
use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::error::PipelineError;
use crate::retry::{retry_transient, RetryPolicy};

pub const DEFAULT_FONT_PATH: &str = "fonts/Bold.ttf";
pub const DEFAULT_PARALLEL_COUNT: usize = 4;
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 3;
pub const DEFAULT_POLL_MAX_WAIT_SECS: u64 = 150;
pub const DEFAULT_PRESIGN_TTL_SECS: u64 = 300;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid value for {name}: {value}")]
    InvalidValue { name: String, value: String },

    #[error("Secret not found: {0}")]
    MissingSecret(String),
}

/// How the publish stage waits for containers to finish.
#[derive(Debug, Clone, Copy)]
pub struct PollPolicy {
    pub interval: Duration,
    /// None waits forever.
    pub max_wait: Option<Duration>,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(DEFAULT_POLL_INTERVAL_SECS),
            max_wait: Some(Duration::from_secs(DEFAULT_POLL_MAX_WAIT_SECS)),
        }
    }
}

/// Settings shared by every stage.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub image_bucket: String,
    pub font_path: PathBuf,
    pub parallel_count: usize,
    pub poll: PollPolicy,
    pub presign_ttl: Duration,
    pub retry: RetryPolicy,
}

impl PipelineConfig {
    /// Load configuration from process environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Load configuration from an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let image_bucket = lookup("IMAGE_BUCKET")
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .ok_or_else(|| ConfigError::MissingEnvVar("IMAGE_BUCKET".to_string()))?;

        let font_path = lookup("MUSABI_FONT_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_FONT_PATH));

        let parallel_count =
            parse_or(&lookup, "MUSABI_PARALLEL_COUNT", DEFAULT_PARALLEL_COUNT as u64)? as usize;
        if parallel_count == 0 {
            return Err(ConfigError::InvalidValue {
                name: "MUSABI_PARALLEL_COUNT".to_string(),
                value: "0".to_string(),
            });
        }

        let interval = parse_or(&lookup, "MUSABI_POLL_INTERVAL_SECS", DEFAULT_POLL_INTERVAL_SECS)?;
        let max_wait = parse_or(&lookup, "MUSABI_POLL_MAX_WAIT_SECS", DEFAULT_POLL_MAX_WAIT_SECS)?;
        let presign_ttl = parse_or(&lookup, "MUSABI_PRESIGN_TTL_SECS", DEFAULT_PRESIGN_TTL_SECS)?;

        Ok(Self {
            image_bucket,
            font_path,
            parallel_count,
            poll: PollPolicy {
                interval: Duration::from_secs(interval),
                // 0 disables the bound
                max_wait: (max_wait > 0).then(|| Duration::from_secs(max_wait)),
            },
            presign_ttl: Duration::from_secs(presign_ttl),
            retry: RetryPolicy::default(),
        })
    }
}

fn parse_or(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &str,
    default: u64,
) -> Result<u64, ConfigError> {
    match lookup(name) {
        None => Ok(default),
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidValue {
                name: name.to_string(),
                value,
            }),
    }
}

/// Source of credentials, resolved by parameter name (e.g. "/openai/musabi/api-key").
#[async_trait]
pub trait SecretStore: Send + Sync {
    async fn get(&self, name: &str) -> Result<String, PipelineError>;
}

/// Secrets held in AWS Systems Manager Parameter Store.
pub struct SsmSecretStore {
    client: aws_sdk_ssm::Client,
    retry: RetryPolicy,
}

impl SsmSecretStore {
    pub fn new(client: aws_sdk_ssm::Client) -> Self {
        Self {
            client,
            retry: RetryPolicy::default(),
        }
    }

    /// Create a store using the default AWS configuration chain.
    pub async fn from_env() -> Self {
        let aws_config = aws_config::load_from_env().await;
        Self::new(aws_sdk_ssm::Client::new(&aws_config))
    }
}

#[async_trait]
impl SecretStore for SsmSecretStore {
    async fn get(&self, name: &str) -> Result<String, PipelineError> {
        tracing::debug!(parameter = name, "Reading SSM parameter");
        let output = retry_transient(&self.retry, "ssm_get_parameter", || async move {
            self.client
                .get_parameter()
                .name(name)
                .with_decryption(true)
                .send()
                .await
                .map_err(|e| PipelineError::from_sdk_error("ssm", name, &e))
        })
        .await?;

        output
            .parameter()
            .and_then(|p| p.value())
            .filter(|v| !v.is_empty())
            .map(|v| v.to_string())
            .ok_or_else(|| ConfigError::MissingSecret(name.to_string()).into())
    }
}

/// Secrets read from environment variables, for local runs.
///
/// A parameter name maps to an upper-cased variable with separators replaced:
/// "/openai/musabi/api-key" -> "OPENAI_MUSABI_API_KEY".
#[derive(Debug, Default)]
pub struct EnvSecretStore {
    overrides: HashMap<String, String>,
}

impl EnvSecretStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a value directly, taking precedence over the environment.
    pub fn with_secret(mut self, name: &str, value: &str) -> Self {
        self.overrides.insert(name.to_string(), value.to_string());
        self
    }

    pub fn env_var_name(parameter: &str) -> String {
        parameter
            .trim_matches('/')
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() {
                    c.to_ascii_uppercase()
                } else {
                    '_'
                }
            })
            .collect()
    }
}

#[async_trait]
impl SecretStore for EnvSecretStore {
    async fn get(&self, name: &str) -> Result<String, PipelineError> {
        if let Some(value) = self.overrides.get(name) {
            return Ok(value.clone());
        }
        let var = Self::env_var_name(name);
        env::var(&var)
            .ok()
            .filter(|v| !v.is_empty())
            .ok_or_else(|| ConfigError::MissingSecret(format!("{} (env {})", name, var)).into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = PipelineConfig::from_lookup(lookup_from(&[("IMAGE_BUCKET", "musabi-bucket")]))
            .unwrap();
        assert_eq!(config.image_bucket, "musabi-bucket");
        assert_eq!(config.parallel_count, 4);
        assert_eq!(config.poll.interval, Duration::from_secs(3));
        assert_eq!(config.poll.max_wait, Some(Duration::from_secs(150)));
        assert_eq!(config.presign_ttl, Duration::from_secs(300));
        assert_eq!(config.font_path, PathBuf::from("fonts/Bold.ttf"));
    }

    #[test]
    fn test_empty_bucket_rejected() {
        let result = PipelineConfig::from_lookup(lookup_from(&[("IMAGE_BUCKET", "  ")]));
        assert!(matches!(result, Err(ConfigError::MissingEnvVar(_))));

        let result = PipelineConfig::from_lookup(lookup_from(&[]));
        assert!(matches!(result, Err(ConfigError::MissingEnvVar(_))));
    }

    #[test]
    fn test_invalid_number() {
        let result = PipelineConfig::from_lookup(lookup_from(&[
            ("IMAGE_BUCKET", "b"),
            ("MUSABI_PARALLEL_COUNT", "many"),
        ]));
        assert!(matches!(result, Err(ConfigError::InvalidValue { .. })));
    }

    #[test]
    fn test_zero_max_wait_disables_bound() {
        let config = PipelineConfig::from_lookup(lookup_from(&[
            ("IMAGE_BUCKET", "b"),
            ("MUSABI_POLL_MAX_WAIT_SECS", "0"),
        ]))
        .unwrap();
        assert_eq!(config.poll.max_wait, None);
    }

    #[test]
    fn test_env_var_name() {
        assert_eq!(
            EnvSecretStore::env_var_name("/openai/musabi/api-key"),
            "OPENAI_MUSABI_API_KEY"
        );
        assert_eq!(
            EnvSecretStore::env_var_name("/meta/musabi/graph-url"),
            "META_MUSABI_GRAPH_URL"
        );
    }

    #[tokio::test]
    async fn test_env_store_override() {
        let store = EnvSecretStore::new().with_secret("/meta/musabi/version", "v21.0");
        assert_eq!(store.get("/meta/musabi/version").await.unwrap(), "v21.0");

        let missing = store.get("/musabi/test/definitely-unset-parameter").await;
        assert!(matches!(
            missing,
            Err(PipelineError::Config(ConfigError::MissingSecret(_)))
        ));
    }
}
