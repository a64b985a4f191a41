mod compose;
mod runtime;

use std::env;
use std::io::Read;
use std::path::PathBuf;

use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand};
use musabi_core::pipeline::{build_registry, execute_step, run_pipeline};
use musabi_core::Stage;
use serde_json::{json, Value as JsonValue};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use runtime::{Runtime, RuntimeOptions};

#[derive(Parser)]
#[command(name = "musabi")]
#[command(about = "Generate a dish, render its title image and publish it", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run every stage in process, from dish generation to publishing
    Run {
        /// Execution name used to key stored images (default: random)
        #[arg(long)]
        exec_name: Option<String>,
        /// Skip all publishing side effects
        #[arg(long)]
        dry_run: bool,
        /// Number of candidate images (default: MUSABI_PARALLEL_COUNT)
        #[arg(long)]
        parallel: Option<usize>,
        /// Store images under this directory instead of the bucket
        #[arg(long)]
        local_dir: Option<PathBuf>,
        /// Use offline fakes for the generative service, storage and publishing
        #[arg(long)]
        fake: bool,
    },
    /// Run a single stage on a JSON event and print its output
    Stage {
        /// Stage name: gen_text, gen_img, select_img, edit_img or pub_img
        name: String,
        /// Event file (default: read from stdin)
        #[arg(long)]
        event: Option<PathBuf>,
        /// Store images under this directory instead of the bucket
        #[arg(long)]
        local_dir: Option<PathBuf>,
    },
    /// Render a title image from a local file
    Compose {
        /// Source image
        #[arg(long)]
        image: PathBuf,
        /// Title text
        #[arg(long)]
        title: String,
        /// Output path for the title image; the origin is saved beside it
        #[arg(long)]
        out: PathBuf,
        /// Font file (default: MUSABI_FONT_PATH or fonts/Bold.ttf)
        #[arg(long)]
        font: Option<PathBuf>,
    },
}

/// Install the tracing subscriber. Logs go to stderr so stage output on
/// stdout stays machine-readable. `LOG_FORMAT=json` switches to JSON lines.
fn init_telemetry() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    let json = env::var("LOG_FORMAT").map(|v| v == "json").unwrap_or(false);

    if json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            )
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    init_telemetry();
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            exec_name,
            dry_run,
            parallel,
            local_dir,
            fake,
        } => {
            let exec_name = exec_name.unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
            run(exec_name, dry_run, parallel, local_dir, fake).await?;
        }
        Commands::Stage {
            name,
            event,
            local_dir,
        } => {
            stage(&name, event, local_dir).await?;
        }
        Commands::Compose {
            image,
            title,
            out,
            font,
        } => {
            compose::compose_file(&image, &title, &out, font.as_deref())?;
        }
    }

    Ok(())
}

async fn run(
    exec_name: String,
    dry_run: bool,
    parallel: Option<usize>,
    local_dir: Option<PathBuf>,
    fake: bool,
) -> Result<()> {
    let mut runtime = Runtime::new(RuntimeOptions {
        local_dir,
        fake,
        dry_run,
    })
    .await?;
    if let Some(count) = parallel {
        if count == 0 {
            bail!("--parallel must be at least 1");
        }
        runtime.config.parallel_count = count;
    }

    let deps = runtime.stage_deps().await?;
    let registry = build_registry(&deps);

    tracing::info!(
        exec = %exec_name,
        dry_run,
        bucket = deps.store.bucket(),
        steps = ?registry.names(),
        "Starting run"
    );

    let trigger = json!({ "ExecName": exec_name, "DryRun": dry_run });
    let run = run_pipeline(Stage::GenText.as_str(), trigger, &registry).await;

    for result in &run.results {
        let status = if result.success { "ok" } else { "FAILED" };
        eprintln!(
            "{:<12} {:<6} {:>7}ms",
            result.step_name, status, result.duration_ms
        );
    }

    let payload = run.into_result()?;
    println!("{}", serde_json::to_string_pretty(&payload)?);
    Ok(())
}

async fn stage(name: &str, event: Option<PathBuf>, local_dir: Option<PathBuf>) -> Result<()> {
    let stage = Stage::parse(name).ok_or_else(|| {
        let valid: Vec<&str> = Stage::ALL.iter().map(|s| s.as_str()).collect();
        anyhow!("Unknown stage: {}. Valid stages: {}", name, valid.join(", "))
    })?;

    let raw = match event {
        Some(path) => std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read event {}", path.display()))?,
        None => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("Failed to read event from stdin")?;
            buf
        }
    };
    let payload: JsonValue = serde_json::from_str(&raw).context("Event is not valid JSON")?;

    let dry_run = payload
        .get("DryRun")
        .and_then(JsonValue::as_bool)
        .unwrap_or(false);
    let runtime = Runtime::new(RuntimeOptions {
        local_dir,
        fake: false,
        dry_run,
    })
    .await?;

    let step = runtime.step_for(stage).await?;
    let (_, outcome) = execute_step(step.as_ref(), &payload).await;
    let output = outcome?;

    println!("{}", serde_json::to_string(&output)?);
    Ok(())
}
