//! pub_img step - post the title and origin images as one carousel.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value as JsonValue;

use crate::caption::build_caption;
use crate::error::PipelineError;
use crate::pipeline::{PipelineStep, StepContext, StepMetadata};
use crate::publish::{PublishRequest, SocialPublisher};
use crate::types::{parse_input, to_output, PubImgInput, PubImgOutput, Stage};

pub struct PubImgStep {
    publisher: Arc<SocialPublisher>,
}

impl PubImgStep {
    /// Step name constant.
    pub const NAME: &'static str = "pub_img";

    pub fn new(publisher: Arc<SocialPublisher>) -> Self {
        Self { publisher }
    }
}

#[async_trait]
impl PipelineStep for PubImgStep {
    fn metadata(&self) -> StepMetadata {
        StepMetadata {
            name: Self::NAME,
            description: "Publish the dish to the social account",
            next_step: Stage::PubImg.next().map(|s| s.as_str()),
        }
    }

    async fn execute(&self, ctx: &StepContext<'_>) -> Result<JsonValue, PipelineError> {
        let input: PubImgInput = parse_input(ctx.payload)?;

        let request = PublishRequest {
            image_keys: vec![input.title_img_key, input.origin_img_key],
            caption: build_caption(&input.dish),
            dry_run: input.dry_run,
        };

        let output = match self.publisher.publish(&request).await? {
            Some(media) => PubImgOutput {
                media_id: Some(media.media_id),
                permalink: media.permalink,
            },
            None => PubImgOutput::default(),
        };
        to_output(&output)
    }
}
