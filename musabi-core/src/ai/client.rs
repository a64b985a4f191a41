//! Generative client backed by the OpenAI API.
//!
//! Chat completions go through async-openai. Image generation and image
//! judging use plain JSON requests so images can travel as base64.

use async_openai::{
    config::OpenAIConfig,
    error::OpenAIError,
    types::chat::{
        ChatCompletionRequestAssistantMessageArgs, ChatCompletionRequestMessage,
        ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
        CreateChatCompletionRequestArgs, ResponseFormat,
    },
    Client,
};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use serde::Deserialize;
use serde_json::json;

use super::config::AiConfig;
use super::prompts::select_image::SELECT_IMAGE_PROMPT_NAME;
use super::types::{ChatMessage, ChatRequest, ChatResponse, Role, Usage};
use crate::error::PipelineError;
use crate::image::validate_image;
use crate::retry::{retry_transient, RetryPolicy};

const SERVICE: &str = "openai";

/// Trait for generative AI backends.
#[async_trait]
pub trait GenerativeClient: Send + Sync {
    /// Complete a chat request. `prompt_name` labels the call in logs.
    async fn complete(
        &self,
        prompt_name: &str,
        request: ChatRequest,
    ) -> Result<ChatResponse, PipelineError>;

    /// Generate one image and return its encoded bytes.
    async fn generate_image(&self, prompt: &str) -> Result<Vec<u8>, PipelineError>;

    /// Ask a judge model which of `images` best fits `prompt`.
    ///
    /// The index is returned as answered; callers must bounds-check it.
    async fn select_best(&self, prompt: &str, images: &[Vec<u8>]) -> Result<usize, PipelineError>;
}

/// Parse a judge answer of the form `{"index": n}` (a bare number is accepted too).
pub fn parse_judge_index(content: &str) -> Result<usize, PipelineError> {
    #[derive(Deserialize)]
    struct JudgeAnswer {
        index: i64,
    }

    let trimmed = content.trim();
    let index = match serde_json::from_str::<JudgeAnswer>(trimmed) {
        Ok(answer) => answer.index,
        Err(_) => trimmed.parse::<i64>().map_err(|_| {
            PipelineError::validation(format!("Unreadable judge answer: {}", trimmed))
        })?,
    };

    usize::try_from(index)
        .map_err(|_| PipelineError::validation(format!("Judge returned negative index {}", index)))
}

/// Generative client using the OpenAI API.
pub struct OpenAiGenerativeClient {
    client: Client<OpenAIConfig>,
    http: reqwest::Client,
    config: AiConfig,
    retry: RetryPolicy,
}

impl OpenAiGenerativeClient {
    pub fn new(config: AiConfig) -> Self {
        let openai_config = OpenAIConfig::new()
            .with_api_key(&config.api_key)
            .with_api_base(&config.base_url);

        Self {
            client: Client::with_config(openai_config),
            http: reqwest::Client::new(),
            config,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Convert our ChatMessage to async-openai's format.
    fn to_openai_message(msg: &ChatMessage) -> Result<ChatCompletionRequestMessage, PipelineError> {
        let built = match msg.role {
            Role::System => ChatCompletionRequestSystemMessageArgs::default()
                .content(msg.content.clone())
                .build()
                .map(Into::into),
            Role::User => ChatCompletionRequestUserMessageArgs::default()
                .content(msg.content.clone())
                .build()
                .map(Into::into),
            Role::Assistant => ChatCompletionRequestAssistantMessageArgs::default()
                .content(msg.content.clone())
                .build()
                .map(Into::into),
        };
        built.map_err(|e| PipelineError::internal(format!("Failed to build message: {}", e)))
    }

    fn map_openai_error(err: OpenAIError) -> PipelineError {
        let retryable = match &err {
            OpenAIError::Reqwest(_) => true,
            OpenAIError::ApiError(api) => {
                api.r#type.as_deref() == Some("server_error")
                    || api.code.as_deref() == Some("rate_limit_exceeded")
            }
            _ => false,
        };
        PipelineError::ExternalService {
            service: SERVICE.to_string(),
            message: err.to_string(),
            retryable,
        }
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.config.base_url.trim_end_matches('/'), path)
    }

    /// POST a JSON body and decode the JSON response.
    async fn post_json<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        body: &serde_json::Value,
    ) -> Result<T, PipelineError> {
        let response = self
            .http
            .post(self.endpoint(path))
            .bearer_auth(&self.config.api_key)
            .json(body)
            .send()
            .await
            .map_err(|e| PipelineError::from_reqwest(SERVICE, e))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(PipelineError::from_status(SERVICE, status.as_u16(), &text));
        }

        response
            .json::<T>()
            .await
            .map_err(|e| PipelineError::external(SERVICE, format!("Invalid response body: {}", e)))
    }
}

#[derive(Debug, Deserialize)]
struct ImagesResponse {
    data: Vec<ImageData>,
}

#[derive(Debug, Deserialize)]
struct ImageData {
    b64_json: Option<String>,
}

impl ImagesResponse {
    /// Decode the first image. A response without one is a service fault.
    fn into_image(self) -> Result<Vec<u8>, PipelineError> {
        let encoded = self
            .data
            .into_iter()
            .next()
            .and_then(|d| d.b64_json)
            .ok_or_else(|| {
                PipelineError::external(SERVICE, "Image generation returned no image data")
            })?;

        BASE64
            .decode(encoded.as_bytes())
            .map_err(|e| PipelineError::external(SERVICE, format!("Invalid base64 image: {}", e)))
    }
}

#[derive(Debug, Deserialize)]
struct JudgeResponse {
    choices: Vec<JudgeChoice>,
}

#[derive(Debug, Deserialize)]
struct JudgeChoice {
    message: JudgeMessage,
}

#[derive(Debug, Deserialize)]
struct JudgeMessage {
    content: Option<String>,
}

impl JudgeResponse {
    fn into_index(self) -> Result<usize, PipelineError> {
        let answer = self
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|c| !c.trim().is_empty())
            .ok_or_else(|| PipelineError::external(SERVICE, "Judge returned empty content"))?;

        parse_judge_index(&answer)
    }
}

#[async_trait]
impl GenerativeClient for OpenAiGenerativeClient {
    async fn complete(
        &self,
        prompt_name: &str,
        request: ChatRequest,
    ) -> Result<ChatResponse, PipelineError> {
        let messages: Vec<ChatCompletionRequestMessage> = request
            .messages
            .iter()
            .map(Self::to_openai_message)
            .collect::<Result<Vec<_>, _>>()?;

        let mut req_builder = CreateChatCompletionRequestArgs::default();
        req_builder.model(&self.config.chat_model).messages(messages);

        if let Some(max_tokens) = request.max_tokens {
            req_builder.max_completion_tokens(max_tokens);
        }

        if let Some(temperature) = request.temperature {
            req_builder.temperature(temperature);
        }

        if request.json_response {
            req_builder.response_format(ResponseFormat::JsonObject);
        }

        let openai_request = req_builder
            .build()
            .map_err(|e| PipelineError::internal(e.to_string()))?;

        tracing::debug!(
            prompt_name = prompt_name,
            model = %self.config.chat_model,
            "Calling chat completion"
        );

        let response = retry_transient(&self.retry, prompt_name, || {
            let openai_request = openai_request.clone();
            async move {
                self.client
                    .chat()
                    .create(openai_request)
                    .await
                    .map_err(Self::map_openai_error)
            }
        })
        .await?;

        let content = response
            .choices
            .first()
            .and_then(|c| c.message.content.clone())
            .filter(|c| !c.trim().is_empty())
            .ok_or_else(|| PipelineError::validation("Chat completion returned empty content"))?;

        let usage = response
            .usage
            .map(|u| Usage {
                prompt_tokens: u.prompt_tokens,
                completion_tokens: u.completion_tokens,
                total_tokens: u.total_tokens,
            })
            .unwrap_or_default();

        tracing::debug!(prompt_name, total_tokens = usage.total_tokens, "Chat completion done");
        Ok(ChatResponse { content, usage })
    }

    async fn generate_image(&self, prompt: &str) -> Result<Vec<u8>, PipelineError> {
        let body = json!({
            "model": self.config.image_model,
            "prompt": prompt,
            "size": self.config.image_size,
            "quality": "standard",
            "n": 1,
            "response_format": "b64_json",
        });

        tracing::debug!(model = %self.config.image_model, "Generating image");

        let body = &body;
        let response: ImagesResponse =
            retry_transient(&self.retry, "generate_image", || async move {
                self.post_json("images/generations", body).await
            })
            .await?;

        let bytes = response.into_image()?;
        validate_image(&bytes)?;
        Ok(bytes)
    }

    async fn select_best(&self, prompt: &str, images: &[Vec<u8>]) -> Result<usize, PipelineError> {
        let mut content = vec![json!({ "type": "text", "text": prompt })];
        for image in images {
            let mime = validate_image(image)?;
            content.push(json!({
                "type": "image_url",
                "image_url": { "url": format!("data:{};base64,{}", mime, BASE64.encode(image)) },
            }));
        }

        let body = json!({
            "model": self.config.judge_model,
            "temperature": 0,
            "response_format": { "type": "json_object" },
            "messages": [{ "role": "user", "content": content }],
        });

        tracing::debug!(
            model = %self.config.judge_model,
            candidates = images.len(),
            "Judging candidate images"
        );

        let body = &body;
        let response: JudgeResponse =
            retry_transient(&self.retry, SELECT_IMAGE_PROMPT_NAME, || async move {
                self.post_json("chat/completions", body).await
            })
            .await?;

        response.into_index()
    }
}
