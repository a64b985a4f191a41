//! Fake generative client for testing.
//!
//! Text responses are matched by checking if the prompt contains a registered
//! substring. Images are small generated PNGs, distinct per call, so tests and
//! offline runs need no network access or API costs.

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use image::{Rgba, RgbaImage};

use super::client::GenerativeClient;
use super::types::{ChatRequest, ChatResponse, Usage};
use crate::error::PipelineError;
use crate::image::encode_png;

/// A fake generative client for testing.
#[derive(Debug)]
pub struct FakeGenerativeClient {
    /// (prompt substring, response), checked in insertion order
    responses: Vec<(String, String)>,
    default_response: Option<String>,
    judge_index: usize,
    image_size: (u32, u32),
    /// 1-based image call that fails, if any
    failing_image_call: Option<usize>,
    complete_calls: AtomicUsize,
    image_calls: AtomicUsize,
    judge_calls: AtomicUsize,
}

impl Default for FakeGenerativeClient {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeGenerativeClient {
    /// Create a client with no registered responses.
    pub fn new() -> Self {
        Self {
            responses: Vec::new(),
            default_response: None,
            judge_index: 0,
            image_size: (64, 64),
            failing_image_call: None,
            complete_calls: AtomicUsize::new(0),
            image_calls: AtomicUsize::new(0),
            judge_calls: AtomicUsize::new(0),
        }
    }

    /// Respond with `response` to prompts containing `prompt_contains` (case-insensitive).
    pub fn with_response(mut self, prompt_contains: &str, response: &str) -> Self {
        self.responses
            .push((prompt_contains.to_lowercase(), response.to_string()));
        self
    }

    /// Set the response used when no pattern matches.
    pub fn with_default_response(mut self, response: &str) -> Self {
        self.default_response = Some(response.to_string());
        self
    }

    /// Index the judge answers with, even when out of range.
    pub fn with_judge_index(mut self, index: usize) -> Self {
        self.judge_index = index;
        self
    }

    pub fn with_image_size(mut self, width: u32, height: u32) -> Self {
        self.image_size = (width, height);
        self
    }

    /// Make the `call`-th image generation (1-based) fail.
    pub fn failing_image_call(mut self, call: usize) -> Self {
        self.failing_image_call = Some(call);
        self
    }

    /// Create a client answering the dish name and recipe prompts.
    pub fn with_dish_responses(name: &str) -> Self {
        Self::new()
            .with_response("dish name", &format!("Here is my idea: 「{}」", name))
            .with_response(
                "write the recipe",
                r#"{
                    "genre": "Italian",
                    "main_food": "Tomato",
                    "theme": "Summer",
                    "ingredients": ["Pasta 200g", "Tomato 2", "Basil 5 leaves"],
                    "steps": ["Boil pasta", "Chop tomato", "Toss with basil"]
                }"#,
            )
    }

    pub fn complete_calls(&self) -> usize {
        self.complete_calls.load(Ordering::SeqCst)
    }

    pub fn image_calls(&self) -> usize {
        self.image_calls.load(Ordering::SeqCst)
    }

    pub fn judge_calls(&self) -> usize {
        self.judge_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl GenerativeClient for FakeGenerativeClient {
    async fn complete(
        &self,
        _prompt_name: &str,
        request: ChatRequest,
    ) -> Result<ChatResponse, PipelineError> {
        self.complete_calls.fetch_add(1, Ordering::SeqCst);
        let prompt = request.prompt_text();
        let prompt_lower = prompt.to_lowercase();

        let content = self
            .responses
            .iter()
            .find(|(pattern, _)| prompt_lower.contains(pattern))
            .map(|(_, response)| response.clone())
            .or_else(|| self.default_response.clone())
            .ok_or_else(|| {
                PipelineError::external(
                    "fake",
                    format!(
                        "No response configured for prompt (first 100 chars): {}",
                        prompt.chars().take(100).collect::<String>()
                    ),
                )
            })?;

        Ok(ChatResponse {
            content,
            usage: Usage::default(),
        })
    }

    async fn generate_image(&self, _prompt: &str) -> Result<Vec<u8>, PipelineError> {
        let call = self.image_calls.fetch_add(1, Ordering::SeqCst) + 1;
        if self.failing_image_call == Some(call) {
            return Err(PipelineError::external(
                "fake",
                format!("Image generation {} failed", call),
            ));
        }

        let shade = (call * 40 % 256) as u8;
        let (w, h) = self.image_size;
        encode_png(&RgbaImage::from_pixel(w, h, Rgba([shade, 120, 255 - shade, 255])))
    }

    async fn select_best(&self, _prompt: &str, _images: &[Vec<u8>]) -> Result<usize, PipelineError> {
        self.judge_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.judge_index)
    }
}
