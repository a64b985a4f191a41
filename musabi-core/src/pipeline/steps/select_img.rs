//! select_img step - let a judge model pick the best candidate image.

use std::sync::Arc;

use async_trait::async_trait;
use futures::future::try_join_all;
use serde_json::Value as JsonValue;
use tracing::info;

use crate::ai::prompts::SELECT_IMAGE_PROMPT;
use crate::ai::GenerativeClient;
use crate::error::PipelineError;
use crate::pipeline::{PipelineStep, StepContext, StepMetadata};
use crate::storage::MediaStore;
use crate::types::{parse_input, to_output, SelectImgInput, SelectImgOutput, Stage};

pub struct SelectImgStep {
    client: Arc<dyn GenerativeClient>,
    store: Arc<dyn MediaStore>,
}

impl SelectImgStep {
    /// Step name constant.
    pub const NAME: &'static str = "select_img";

    pub fn new(client: Arc<dyn GenerativeClient>, store: Arc<dyn MediaStore>) -> Self {
        Self { client, store }
    }
}

/// Check a judge answer against the number of candidates.
pub fn validate_selection(index: usize, image_count: usize) -> Result<usize, PipelineError> {
    if index >= image_count {
        return Err(PipelineError::validation(format!(
            "Index {} is out of range. Image count is {}.",
            index, image_count
        )));
    }
    Ok(index)
}

#[async_trait]
impl PipelineStep for SelectImgStep {
    fn metadata(&self) -> StepMetadata {
        StepMetadata {
            name: Self::NAME,
            description: "Select the best candidate image",
            next_step: Stage::SelectImg.next().map(|s| s.as_str()),
        }
    }

    async fn execute(&self, ctx: &StepContext<'_>) -> Result<JsonValue, PipelineError> {
        let input: SelectImgInput = parse_input(ctx.payload)?;

        if let [only] = input.image_keys.as_slice() {
            info!(img_key = %only, "Single candidate, skipping judge");
            return to_output(&SelectImgOutput {
                img_key: only.clone(),
            });
        }

        let images = try_join_all(input.image_keys.iter().map(|k| self.store.get_object(k))).await?;

        let answer = self.client.select_best(SELECT_IMAGE_PROMPT, &images).await?;
        let index = validate_selection(answer, input.image_keys.len())?;

        let img_key = input.image_keys[index].clone();
        info!(index, img_key = %img_key, candidates = images.len(), "Selected image");
        to_output(&SelectImgOutput { img_key })
    }
}
