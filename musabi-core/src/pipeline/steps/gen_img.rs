//! gen_img step - generate candidate dish images.
//!
//! Runs either a single branch (`ParallelIndex` set, as when the workflow engine
//! fans out) or every branch concurrently in-process. Each branch writes its own
//! key, and any failing branch fails the whole step.

use std::sync::Arc;

use async_trait::async_trait;
use futures::future::try_join_all;
use serde_json::Value as JsonValue;
use tracing::info;

use crate::ai::prompts::render_dish_image_prompt;
use crate::ai::GenerativeClient;
use crate::error::PipelineError;
use crate::image::to_png;
use crate::pipeline::{PipelineStep, StepContext, StepMetadata};
use crate::storage::{candidate_image_key, MediaStore, PNG_CONTENT_TYPE};
use crate::types::{
    parse_input, to_output, ExecutionContext, GenImgBranchOutput, GenImgFanOutOutput, GenImgInput,
    Stage,
};

pub struct GenImgStep {
    client: Arc<dyn GenerativeClient>,
    store: Arc<dyn MediaStore>,
    default_parallel_count: usize,
}

impl GenImgStep {
    /// Step name constant.
    pub const NAME: &'static str = "gen_img";

    pub fn new(
        client: Arc<dyn GenerativeClient>,
        store: Arc<dyn MediaStore>,
        default_parallel_count: usize,
    ) -> Self {
        Self {
            client,
            store,
            default_parallel_count,
        }
    }

    /// Generate, validate and store candidate `index`; returns its key.
    async fn generate_candidate(
        &self,
        exec: &ExecutionContext,
        prompt: &str,
        index: usize,
    ) -> Result<String, PipelineError> {
        let image = self.client.generate_image(prompt).await?;
        let png = to_png(&image)?;
        let key = candidate_image_key(exec, index);
        self.store.put_object(&key, png, PNG_CONTENT_TYPE).await?;
        info!(index, bucket = self.store.bucket(), key = %key, "Stored candidate image");
        Ok(key)
    }
}

#[async_trait]
impl PipelineStep for GenImgStep {
    fn metadata(&self) -> StepMetadata {
        StepMetadata {
            name: Self::NAME,
            description: "Generate candidate dish images",
            next_step: Stage::GenImg.next().map(|s| s.as_str()),
        }
    }

    async fn execute(&self, ctx: &StepContext<'_>) -> Result<JsonValue, PipelineError> {
        let input: GenImgInput = parse_input(ctx.payload)?;
        let exec = ExecutionContext::new(input.exec_name.as_str())?;
        let prompt = render_dish_image_prompt(&input.dish_name, &input.ingredients);

        if let Some(index) = input.parallel_index {
            let img_key = self.generate_candidate(&exec, &prompt, index).await?;
            return to_output(&GenImgBranchOutput { img_key });
        }

        let count = input.parallel_count.unwrap_or(self.default_parallel_count);
        if count == 0 {
            return Err(PipelineError::validation("ParallelCount must be at least 1"));
        }
        info!(count, bucket = self.store.bucket(), "Generating candidate images");

        let image_keys = try_join_all(
            (0..count).map(|index| self.generate_candidate(&exec, &prompt, index)),
        )
        .await?;

        to_output(&GenImgFanOutOutput { image_keys })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::FakeGenerativeClient;
    use crate::storage::InMemoryMediaStore;
    use serde_json::json;

    fn payload() -> JsonValue {
        json!({
            "DishName": "Tomato Basil Pasta",
            "Ingredients": ["Pasta 200g", "Tomato 2"],
            "Steps": ["Boil pasta", "Add tomato"],
            "ExecName": "run-42"
        })
    }

    #[tokio::test]
    async fn test_fan_out_writes_disjoint_keys() {
        let client = Arc::new(FakeGenerativeClient::new());
        let store = Arc::new(InMemoryMediaStore::new("bucket"));
        let step = GenImgStep::new(client.clone(), store.clone(), 3);

        let payload = payload();
        let output = step.execute(&StepContext { payload: &payload }).await.unwrap();

        assert_eq!(
            output["ImageKeys"],
            json!([
                "run-42/candidates/0.png",
                "run-42/candidates/1.png",
                "run-42/candidates/2.png"
            ])
        );
        assert_eq!(store.keys().len(), 3);
        assert_eq!(client.image_calls(), 3);
        assert_eq!(
            store.content_type("run-42/candidates/1.png").as_deref(),
            Some("image/png")
        );
    }

    #[tokio::test]
    async fn test_single_branch() {
        let store = Arc::new(InMemoryMediaStore::new("bucket"));
        let step = GenImgStep::new(Arc::new(FakeGenerativeClient::new()), store.clone(), 4);

        let mut payload = payload();
        payload["ParallelIndex"] = json!(2);
        let output = step.execute(&StepContext { payload: &payload }).await.unwrap();

        assert_eq!(output, json!({ "ImgKey": "run-42/candidates/2.png" }));
        assert_eq!(store.keys(), vec!["run-42/candidates/2.png"]);
    }

    #[tokio::test]
    async fn test_one_failing_branch_fails_step() {
        let client = Arc::new(FakeGenerativeClient::new().failing_image_call(2));
        let store = Arc::new(InMemoryMediaStore::new("bucket"));
        let step = GenImgStep::new(client, store, 4);

        let payload = payload();
        let err = step
            .execute(&StepContext { payload: &payload })
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::ExternalService { .. }));
    }

    #[tokio::test]
    async fn test_missing_exec_name_rejected_before_generation() {
        let client = Arc::new(FakeGenerativeClient::new());
        let step = GenImgStep::new(
            client.clone(),
            Arc::new(InMemoryMediaStore::new("bucket")),
            2,
        );

        let payload = json!({ "DishName": "Soup", "Ingredients": ["Water"] });
        let err = step
            .execute(&StepContext { payload: &payload })
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::Validation(_)));
        assert_eq!(client.image_calls(), 0);
    }
}
