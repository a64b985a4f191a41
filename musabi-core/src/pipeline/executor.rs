//! Pipeline executor and step registry.

use std::collections::HashMap;
use std::time::Instant;

use serde_json::{json, Value as JsonValue};
use tracing::{error, info, info_span, Instrument};

use crate::error::PipelineError;
use crate::pipeline::step::{PipelineStep, StepContext, StepResult};
use crate::BUILD_ID;

/// Registry that maps step names to their implementations.
pub struct StepRegistry {
    steps: HashMap<String, Box<dyn PipelineStep>>,
}

impl StepRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self {
            steps: HashMap::new(),
        }
    }

    /// Register a step implementation.
    pub fn register(&mut self, step: Box<dyn PipelineStep>) {
        self.steps.insert(step.metadata().name.to_string(), step);
    }

    /// Get a step by name.
    pub fn get(&self, name: &str) -> Option<&dyn PipelineStep> {
        self.steps.get(name).map(|s| s.as_ref())
    }

    /// Registered step names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.steps.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl Default for StepRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Outcome of a pipeline run.
#[derive(Debug)]
pub struct PipelineRun {
    /// One result per executed step, in order
    pub results: Vec<StepResult>,
    /// Trigger payload with every successful step's output merged in
    pub payload: JsonValue,
    /// The error that stopped the run, if any
    pub failure: Option<PipelineError>,
}

impl PipelineRun {
    pub fn succeeded(&self) -> bool {
        self.failure.is_none()
    }

    /// The final payload, or the error that stopped the run.
    pub fn into_result(self) -> Result<JsonValue, PipelineError> {
        match self.failure {
            Some(e) => Err(e),
            None => Ok(self.payload),
        }
    }
}

/// Shallow-merge `output`'s fields into `payload`, replacing existing keys.
pub fn merge_payload(payload: &mut JsonValue, output: &JsonValue) {
    if !payload.is_object() {
        *payload = json!({});
    }
    if let (Some(target), Some(fields)) = (payload.as_object_mut(), output.as_object()) {
        for (key, value) in fields {
            target.insert(key.clone(), value.clone());
        }
    }
}

/// Execute one step against `payload`, inside a `pipeline_step` span.
pub async fn execute_step(
    step: &dyn PipelineStep,
    payload: &JsonValue,
) -> (StepResult, Result<JsonValue, PipelineError>) {
    let meta = step.metadata();
    let exec = payload
        .get("ExecName")
        .and_then(JsonValue::as_str)
        .unwrap_or("-")
        .to_string();
    let span = info_span!("pipeline_step", step = meta.name, exec = %exec);

    async move {
        info!(build_id = BUILD_ID, "Starting step");
        let start = Instant::now();
        let ctx = StepContext { payload };
        let outcome = step.execute(&ctx).await;
        let duration_ms = start.elapsed().as_millis() as u64;

        let result = match &outcome {
            Ok(output) => {
                info!(duration_ms, "Completed step");
                StepResult {
                    step_name: meta.name.to_string(),
                    success: true,
                    output: output.clone(),
                    error: None,
                    duration_ms,
                    next_step: meta.next_step.map(str::to_string),
                }
            }
            Err(e) => {
                error!(
                    duration_ms,
                    error_kind = ?e.kind(),
                    error = %e,
                    "Step failed"
                );
                StepResult {
                    step_name: meta.name.to_string(),
                    success: false,
                    output: json!({ "error": e.to_string() }),
                    error: Some(e.to_string()),
                    duration_ms,
                    next_step: None,
                }
            }
        };
        (result, outcome)
    }
    .instrument(span)
    .await
}

/// Run a pipeline starting from the given step.
///
/// Each step's output is merged into the running payload, and the next step
/// named by its metadata runs on the result. The run stops after a step with
/// no successor, or at the first failure.
pub async fn run_pipeline(
    first_step_name: &str,
    trigger: JsonValue,
    registry: &StepRegistry,
) -> PipelineRun {
    let mut results = Vec::new();
    let mut payload = trigger;
    let mut current_step_name = Some(first_step_name.to_string());

    while let Some(step_name) = current_step_name {
        let step = match registry.get(&step_name) {
            Some(s) => s,
            None => {
                return PipelineRun {
                    results,
                    payload,
                    failure: Some(PipelineError::internal(format!(
                        "Unknown step: {}",
                        step_name
                    ))),
                };
            }
        };

        let (result, outcome) = execute_step(step, &payload).await;
        let next = result.next_step.clone();
        results.push(result);

        match outcome {
            Ok(output) => merge_payload(&mut payload, &output),
            Err(e) => {
                return PipelineRun {
                    results,
                    payload,
                    failure: Some(e),
                };
            }
        }

        current_step_name = next;
    }

    PipelineRun {
        results,
        payload,
        failure: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::StepMetadata;
    use async_trait::async_trait;

    struct EchoStep {
        name: &'static str,
        next: Option<&'static str>,
        fail: bool,
    }

    #[async_trait]
    impl PipelineStep for EchoStep {
        fn metadata(&self) -> StepMetadata {
            StepMetadata {
                name: self.name,
                description: "test step",
                next_step: self.next,
            }
        }

        async fn execute(&self, ctx: &StepContext<'_>) -> Result<JsonValue, PipelineError> {
            if self.fail {
                return Err(PipelineError::validation("boom"));
            }
            let seen = ctx.payload.as_object().map(|o| o.len()).unwrap_or(0);
            let mut output = serde_json::Map::new();
            output.insert(self.name.to_string(), json!(seen));
            Ok(JsonValue::Object(output))
        }
    }

    fn registry(steps: Vec<EchoStep>) -> StepRegistry {
        let mut registry = StepRegistry::new();
        for step in steps {
            registry.register(Box::new(step));
        }
        registry
    }

    #[tokio::test]
    async fn test_follows_chain_and_merges_outputs() {
        let registry = registry(vec![
            EchoStep { name: "a", next: Some("b"), fail: false },
            EchoStep { name: "b", next: None, fail: false },
        ]);

        let run = run_pipeline("a", json!({ "ExecName": "run-1" }), &registry).await;

        assert!(run.succeeded());
        assert_eq!(run.results.len(), 2);
        assert_eq!(run.results[0].next_step.as_deref(), Some("b"));
        // b saw ExecName and a's output
        assert_eq!(run.payload, json!({ "ExecName": "run-1", "a": 1, "b": 2 }));
    }

    #[tokio::test]
    async fn test_stops_at_first_failure() {
        let registry = registry(vec![
            EchoStep { name: "a", next: Some("b"), fail: true },
            EchoStep { name: "b", next: None, fail: false },
        ]);

        let run = run_pipeline("a", json!({}), &registry).await;

        assert_eq!(run.results.len(), 1);
        assert!(!run.results[0].success);
        assert!(matches!(run.failure, Some(PipelineError::Validation(_))));
    }

    #[tokio::test]
    async fn test_unknown_step_is_failure() {
        let run = run_pipeline("missing", json!({}), &StepRegistry::new()).await;
        assert!(run.results.is_empty());
        assert!(matches!(run.into_result(), Err(PipelineError::Internal(_))));
    }

    #[test]
    fn test_merge_replaces_keys() {
        let mut payload = json!({ "ImgKey": "old", "DishName": "Soup" });
        merge_payload(&mut payload, &json!({ "ImgKey": "new" }));
        assert_eq!(payload, json!({ "ImgKey": "new", "DishName": "Soup" }));

        let mut payload = JsonValue::Null;
        merge_payload(&mut payload, &json!({ "a": 1 }));
        assert_eq!(payload, json!({ "a": 1 }));
    }
}
