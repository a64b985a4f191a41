//! Stage pipeline for dish generation and publishing.
//!
//! This module provides a trait-based pipeline system where:
//! - Steps are defined via the `PipelineStep` trait, one per stage
//! - Each step names the step that runs after it
//! - Steps exchange data only through the running JSON payload, so each one
//!   can also run alone as a separately deployed stage

mod executor;
mod step;
pub mod steps;

use std::sync::Arc;

pub use executor::{execute_step, merge_payload, run_pipeline, PipelineRun, StepRegistry};
pub use step::{PipelineStep, StepContext, StepMetadata, StepResult};

use crate::ai::GenerativeClient;
use crate::compositor::TitleCompositor;
use crate::config::PipelineConfig;
use crate::publish::{GraphApi, SocialPublisher};
use crate::storage::MediaStore;
use steps::{EditImgStep, GenImgStep, GenTextStep, PubImgStep, SelectImgStep};

/// External collaborators shared by the stages.
pub struct StageDeps {
    pub client: Arc<dyn GenerativeClient>,
    pub store: Arc<dyn MediaStore>,
    pub graph: Arc<dyn GraphApi>,
    pub compositor: Arc<TitleCompositor>,
    pub config: PipelineConfig,
}

/// Build a registry holding every stage.
pub fn build_registry(deps: &StageDeps) -> StepRegistry {
    let publisher = SocialPublisher::new(
        deps.graph.clone(),
        deps.store.clone(),
        deps.config.poll,
        deps.config.presign_ttl,
    );

    let mut registry = StepRegistry::new();
    registry.register(Box::new(GenTextStep::new(deps.client.clone())));
    registry.register(Box::new(GenImgStep::new(
        deps.client.clone(),
        deps.store.clone(),
        deps.config.parallel_count,
    )));
    registry.register(Box::new(SelectImgStep::new(
        deps.client.clone(),
        deps.store.clone(),
    )));
    registry.register(Box::new(EditImgStep::new(
        deps.store.clone(),
        deps.compositor.clone(),
    )));
    registry.register(Box::new(PubImgStep::new(Arc::new(publisher))));
    registry
}
