//! Generative AI integration.
//!
//! This module provides:
//! - `GenerativeClient` trait for text, image and image-judging calls
//! - `OpenAiGenerativeClient` backed by the OpenAI API
//! - `FakeGenerativeClient` for tests and offline runs
//! - Dish invention (name, then recipe) on top of any client
//! - Prompt templates
//!
//! # Configuration
//!
//! The API key is read from the secret store parameter `/openai/musabi/api-key`.
//! Model names and the base URL can be overridden with `MUSABI_CHAT_MODEL`,
//! `MUSABI_IMAGE_MODEL`, `MUSABI_JUDGE_MODEL` and `MUSABI_AI_BASE_URL`.
//!
//! # Example
//!
//! ```ignore
//! use musabi_core::ai::{generate_dish, AiConfig, OpenAiGenerativeClient};
//!
//! let config = AiConfig::load(&secrets).await?;
//! let client = OpenAiGenerativeClient::new(config);
//! let dish = generate_dish(&client).await?;
//! println!("{}", dish.dish_name);
//! ```

mod client;
mod config;
mod dish;
mod fake;
pub mod prompts;
mod types;

pub use client::{parse_judge_index, GenerativeClient, OpenAiGenerativeClient};
pub use config::{AiConfig, API_KEY_PARAM};
pub use dish::{extract_quoted_text, generate_dish, generate_dish_name, generate_recipe};
pub use fake::FakeGenerativeClient;
pub use types::{ChatMessage, ChatRequest, ChatResponse, Role, Usage};
