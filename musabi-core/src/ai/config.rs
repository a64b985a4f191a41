//! Generative client configuration.

use std::env;

use crate::config::SecretStore;
use crate::error::PipelineError;

/// Parameter holding the OpenAI API key.
pub const API_KEY_PARAM: &str = "/openai/musabi/api-key";

/// Default OpenAI base URL.
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

pub const DEFAULT_CHAT_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_IMAGE_MODEL: &str = "dall-e-3";
pub const DEFAULT_JUDGE_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_IMAGE_SIZE: &str = "1024x1024";

/// Generative client configuration.
#[derive(Debug, Clone)]
pub struct AiConfig {
    pub api_key: String,
    /// Model for dish name and recipe text.
    pub chat_model: String,
    /// Model for dish images.
    pub image_model: String,
    /// Vision model that picks the best candidate image.
    pub judge_model: String,
    pub base_url: String,
    pub image_size: String,
}

impl AiConfig {
    /// Resolve the API key from `secrets`.
    ///
    /// Optional overrides:
    /// - `MUSABI_CHAT_MODEL` (default: "gpt-4o-mini")
    /// - `MUSABI_IMAGE_MODEL` (default: "dall-e-3")
    /// - `MUSABI_JUDGE_MODEL` (default: "gpt-4o-mini")
    /// - `MUSABI_AI_BASE_URL` (default: "https://api.openai.com/v1")
    pub async fn load(secrets: &dyn SecretStore) -> Result<Self, PipelineError> {
        let api_key = secrets.get(API_KEY_PARAM).await?;

        Ok(Self {
            api_key,
            chat_model: env_or("MUSABI_CHAT_MODEL", DEFAULT_CHAT_MODEL),
            image_model: env_or("MUSABI_IMAGE_MODEL", DEFAULT_IMAGE_MODEL),
            judge_model: env_or("MUSABI_JUDGE_MODEL", DEFAULT_JUDGE_MODEL),
            base_url: env_or("MUSABI_AI_BASE_URL", DEFAULT_BASE_URL),
            image_size: DEFAULT_IMAGE_SIZE.to_string(),
        })
    }

    /// Configuration with defaults for everything but the key.
    pub fn with_api_key(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            chat_model: DEFAULT_CHAT_MODEL.to_string(),
            image_model: DEFAULT_IMAGE_MODEL.to_string(),
            judge_model: DEFAULT_JUDGE_MODEL.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            image_size: DEFAULT_IMAGE_SIZE.to_string(),
        }
    }
}

fn env_or(name: &str, default: &str) -> String {
    env::var(name)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| default.to_string())
}
