//! Pipeline step trait and supporting types.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::error::PipelineError;

/// Metadata about a pipeline step.
#[derive(Debug, Clone)]
pub struct StepMetadata {
    /// Unique identifier for this step (e.g., "gen_text", "edit_img")
    pub name: &'static str,
    /// Human-readable description
    pub description: &'static str,
    /// Name of the step that runs after this one succeeds
    pub next_step: Option<&'static str>,
}

/// Result of executing a step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepResult {
    /// Name of the step that produced this result
    pub step_name: String,
    /// Whether the step succeeded
    pub success: bool,
    /// The output data (JSON), merged into the running payload on success
    pub output: JsonValue,
    /// Error message if failed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// How long the step took in milliseconds
    pub duration_ms: u64,
    /// Name of the next step to run
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_step: Option<String>,
}

/// Context provided to steps during execution.
pub struct StepContext<'a> {
    /// The running payload: the trigger input plus every earlier step's output
    pub payload: &'a JsonValue,
}

/// The main trait for pipeline steps.
///
/// A step reads everything it needs from the payload through its typed input
/// schema and returns only its own output fields.
#[async_trait]
pub trait PipelineStep: Send + Sync {
    /// Return metadata about this step.
    fn metadata(&self) -> StepMetadata;

    /// Execute the step.
    async fn execute(&self, ctx: &StepContext<'_>) -> Result<JsonValue, PipelineError>;
}
