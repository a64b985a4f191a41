//! gen_text step - invent a dish name and its recipe.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value as JsonValue;

use crate::ai::{generate_dish, GenerativeClient};
use crate::error::PipelineError;
use crate::pipeline::{PipelineStep, StepContext, StepMetadata};
use crate::types::{to_output, GenTextOutput, Stage};

pub struct GenTextStep {
    client: Arc<dyn GenerativeClient>,
}

impl GenTextStep {
    /// Step name constant.
    pub const NAME: &'static str = "gen_text";

    pub fn new(client: Arc<dyn GenerativeClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl PipelineStep for GenTextStep {
    fn metadata(&self) -> StepMetadata {
        StepMetadata {
            name: Self::NAME,
            description: "Generate a dish name and recipe",
            next_step: Stage::GenText.next().map(|s| s.as_str()),
        }
    }

    async fn execute(&self, _ctx: &StepContext<'_>) -> Result<JsonValue, PipelineError> {
        let dish: GenTextOutput = generate_dish(self.client.as_ref()).await?;
        to_output(&dish)
    }
}
