//! edit_img step - compose the title image and persist it beside the origin.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value as JsonValue;
use tracing::info;

use crate::compositor::TitleCompositor;
use crate::error::PipelineError;
use crate::image::{decode_image, encode_png, to_png};
use crate::pipeline::{PipelineStep, StepContext, StepMetadata};
use crate::storage::{origin_image_key, title_image_key, MediaStore, PNG_CONTENT_TYPE};
use crate::types::{parse_input, to_output, EditImgInput, EditImgOutput, ExecutionContext, Stage};

pub struct EditImgStep {
    store: Arc<dyn MediaStore>,
    compositor: Arc<TitleCompositor>,
}

impl EditImgStep {
    /// Step name constant.
    pub const NAME: &'static str = "edit_img";

    pub fn new(store: Arc<dyn MediaStore>, compositor: Arc<TitleCompositor>) -> Self {
        Self { store, compositor }
    }
}

#[async_trait]
impl PipelineStep for EditImgStep {
    fn metadata(&self) -> StepMetadata {
        StepMetadata {
            name: Self::NAME,
            description: "Compose the title image",
            next_step: Stage::EditImg.next().map(|s| s.as_str()),
        }
    }

    async fn execute(&self, ctx: &StepContext<'_>) -> Result<JsonValue, PipelineError> {
        let input: EditImgInput = parse_input(ctx.payload)?;
        let exec = ExecutionContext::new(input.exec_name.as_str())?;

        let source = self.store.get_object(&input.img_key).await?;
        info!(
            bucket = self.store.bucket(),
            key = %input.img_key,
            bytes = source.len(),
            "Loaded selected image"
        );

        let compositor = Arc::clone(&self.compositor);
        let title = input.dish_name.trim().to_string();
        let (origin_png, title_png) = tokio::task::spawn_blocking(move || {
            let image = decode_image(&source)?;
            info!(
                width = image.width(),
                height = image.height(),
                title = %title,
                "Composing title image"
            );
            let composed = compositor.compose(&image, &title);
            Ok::<_, PipelineError>((to_png(&source)?, encode_png(&composed)?))
        })
        .await
        .map_err(|e| PipelineError::internal(format!("Compositing task failed: {}", e)))??;

        let origin_img_key = origin_image_key(&exec);
        let title_img_key = title_image_key(&exec);
        self.store
            .put_object(&origin_img_key, origin_png, PNG_CONTENT_TYPE)
            .await?;
        self.store
            .put_object(&title_img_key, title_png, PNG_CONTENT_TYPE)
            .await?;

        to_output(&EditImgOutput {
            title_img_key,
            origin_img_key,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::InMemoryMediaStore;
    use image::{Rgba, RgbaImage};
    use serde_json::json;

    async fn store_with_source() -> (Arc<InMemoryMediaStore>, Vec<u8>) {
        let store = Arc::new(InMemoryMediaStore::new("bucket"));
        let source = encode_png(&RgbaImage::from_pixel(40, 30, Rgba([90, 60, 30, 255]))).unwrap();
        store
            .put_object("run-42/candidates/1.png", source.clone(), "image/png")
            .await
            .unwrap();
        (store, source)
    }

    #[tokio::test]
    async fn test_persists_title_and_origin() {
        let (store, source) = store_with_source().await;
        let step = EditImgStep::new(store.clone(), Arc::new(TitleCompositor::without_font()));

        let payload = json!({
            "ImgKey": "run-42/candidates/1.png",
            "DishName": "Tomato Basil Pasta",
            "ExecName": "run-42"
        });
        let output = step.execute(&StepContext { payload: &payload }).await.unwrap();

        assert_eq!(
            output,
            json!({ "TitleImgKey": "run-42/0.png", "OriginImgKey": "run-42/1.png" })
        );
        // origin is stored unaltered
        assert_eq!(store.get_object("run-42/1.png").await.unwrap(), source);

        let title = decode_image(&store.get_object("run-42/0.png").await.unwrap()).unwrap();
        assert_eq!((title.width(), title.height()), (40, 30));
    }

    #[tokio::test]
    async fn test_same_exec_same_keys() {
        let (store, _) = store_with_source().await;
        let step = EditImgStep::new(store.clone(), Arc::new(TitleCompositor::without_font()));
        let payload = json!({
            "ImgKey": "run-42/candidates/1.png",
            "DishName": "Tomato Basil Pasta",
            "ExecName": "run-42"
        });

        let first = step.execute(&StepContext { payload: &payload }).await.unwrap();
        let second = step.execute(&StepContext { payload: &payload }).await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_missing_source_fails() {
        let store = Arc::new(InMemoryMediaStore::new("bucket"));
        let step = EditImgStep::new(store, Arc::new(TitleCompositor::without_font()));
        let payload = json!({
            "ImgKey": "run-1/candidates/0.png",
            "DishName": "Soup",
            "ExecName": "run-1"
        });
        assert!(step.execute(&StepContext { payload: &payload }).await.is_err());
    }
}
