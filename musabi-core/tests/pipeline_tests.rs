//! End-to-end runs of the stage chain against in-memory collaborators.

use std::sync::Arc;

use musabi_core::ai::FakeGenerativeClient;
use musabi_core::pipeline::{build_registry, run_pipeline, StageDeps};
use musabi_core::publish::{FakeGraphApi, GraphCall};
use musabi_core::{InMemoryMediaStore, PipelineConfig, Stage, TitleCompositor};
use serde_json::{json, Value as JsonValue};

fn test_config() -> PipelineConfig {
    PipelineConfig::from_lookup(|name| match name {
        "IMAGE_BUCKET" => Some("musabi-test".to_string()),
        "MUSABI_PARALLEL_COUNT" => Some("3".to_string()),
        "MUSABI_POLL_INTERVAL_SECS" => Some("0".to_string()),
        "MUSABI_POLL_MAX_WAIT_SECS" => Some("5".to_string()),
        _ => None,
    })
    .unwrap()
}

struct Harness {
    client: Arc<FakeGenerativeClient>,
    store: Arc<InMemoryMediaStore>,
    graph: Arc<FakeGraphApi>,
    deps: StageDeps,
}

fn harness(client: FakeGenerativeClient) -> Harness {
    let client = Arc::new(client.with_judge_index(1));
    let store = Arc::new(InMemoryMediaStore::new("musabi-test"));
    let graph = Arc::new(FakeGraphApi::new().with_in_progress_polls(2));
    let deps = StageDeps {
        client: client.clone(),
        store: store.clone(),
        graph: graph.clone(),
        compositor: Arc::new(TitleCompositor::without_font()),
        config: test_config(),
    };
    Harness {
        client,
        store,
        graph,
        deps,
    }
}

fn dish_payload() -> JsonValue {
    json!({
        "DishName": "Tomato Basil Pasta",
        "Ingredients": ["Pasta 200g", "Tomato 2"],
        "Steps": ["Boil pasta", "Add tomato"],
        "ExecName": "run-42"
    })
}

fn created_image_captions(graph: &FakeGraphApi) -> Vec<(String, String)> {
    graph
        .calls()
        .into_iter()
        .filter_map(|call| match call {
            GraphCall::CreateImageMedia {
                image_url, caption, ..
            } => Some((image_url, caption)),
            _ => None,
        })
        .collect()
}

#[tokio::test]
async fn test_run_from_gen_img_publishes_carousel() {
    let h = harness(FakeGenerativeClient::new());
    let registry = build_registry(&h.deps);

    let run = run_pipeline(Stage::GenImg.as_str(), dish_payload(), &registry).await;
    assert!(run.succeeded(), "run failed: {:?}", run.failure);

    let steps: Vec<&str> = run.results.iter().map(|r| r.step_name.as_str()).collect();
    assert_eq!(steps, vec!["gen_img", "select_img", "edit_img", "pub_img"]);

    assert_eq!(h.client.image_calls(), 3);
    assert_eq!(h.client.judge_calls(), 1);
    assert_eq!(run.payload["ImgKey"], "run-42/candidates/1.png");

    assert!(h.store.contains("run-42/0.png"));
    assert!(h.store.contains("run-42/1.png"));
    assert_eq!(
        h.store.content_type("run-42/0.png").as_deref(),
        Some("image/png")
    );

    let images = created_image_captions(&h.graph);
    assert_eq!(images.len(), 2);
    assert!(images[0].0.contains("run-42/0.png"));
    assert!(images[1].0.contains("run-42/1.png"));

    let caption = &images[0].1;
    assert!(caption.starts_with("Tomato Basil Pasta"));
    assert!(caption.contains("- Pasta 200g"));
    assert!(caption.contains("- Tomato 2"));
    assert!(caption.contains("1. Boil pasta"));
    assert!(caption.contains("2. Add tomato"));

    assert_eq!(h.graph.count(|c| matches!(c, GraphCall::PublishMedia { .. })), 1);
    assert!(run.payload["MediaId"].is_string());
    assert!(run.payload["Permalink"].is_string());
}

#[tokio::test]
async fn test_full_chain_from_gen_text() {
    let h = harness(FakeGenerativeClient::with_dish_responses(
        "Tomato Basil Pasta",
    ));
    let registry = build_registry(&h.deps);

    let run = run_pipeline(
        Stage::GenText.as_str(),
        json!({ "ExecName": "run-7" }),
        &registry,
    )
    .await;
    assert!(run.succeeded(), "run failed: {:?}", run.failure);
    assert_eq!(run.results.len(), Stage::ALL.len());

    assert_eq!(run.payload["DishName"], "Tomato Basil Pasta");
    assert_eq!(run.payload["TitleImgKey"], "run-7/0.png");
    assert_eq!(run.payload["OriginImgKey"], "run-7/1.png");

    let images = created_image_captions(&h.graph);
    assert_eq!(images.len(), 2);
    assert!(images[0].1.contains("3. Toss with basil"));
    assert!(images[0].1.contains("- Basil 5 leaves"));
}

#[tokio::test]
async fn test_dry_run_makes_no_side_effects() {
    let h = harness(FakeGenerativeClient::new());
    let registry = build_registry(&h.deps);

    let mut payload = dish_payload();
    payload["DryRun"] = json!(true);

    let run = run_pipeline(Stage::GenImg.as_str(), payload, &registry).await;
    assert!(run.succeeded(), "run failed: {:?}", run.failure);

    // images are still produced and stored
    assert!(h.store.contains("run-42/0.png"));
    assert!(h.store.contains("run-42/1.png"));

    assert_eq!(h.graph.count(GraphCall::is_side_effect), 0);
    assert!(run.payload.get("MediaId").is_none());
}

#[tokio::test]
async fn test_failure_stops_the_chain() {
    let h = harness(FakeGenerativeClient::new().failing_image_call(2));
    let registry = build_registry(&h.deps);

    let run = run_pipeline(Stage::GenImg.as_str(), dish_payload(), &registry).await;

    assert!(!run.succeeded());
    assert_eq!(run.results.len(), 1);
    assert!(!run.results[0].success);
    assert!(h.graph.calls().is_empty());
    assert!(!h.store.contains("run-42/0.png"));
}

#[tokio::test]
async fn test_invalid_exec_name_rejected() {
    let h = harness(FakeGenerativeClient::new());
    let registry = build_registry(&h.deps);

    let mut payload = dish_payload();
    payload["ExecName"] = json!("");

    let err = run_pipeline(Stage::GenImg.as_str(), payload, &registry)
        .await
        .into_result()
        .unwrap_err();
    assert!(matches!(err, musabi_core::PipelineError::Validation(_)));
    assert_eq!(h.client.image_calls(), 0);
}
