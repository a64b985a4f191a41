//! Collaborator wiring for the CLI commands.
//!
//! `MUSABI_SECRETS=env` reads secrets from environment variables
//! (see `EnvSecretStore`); anything else uses SSM Parameter Store.

use std::env;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use musabi_core::ai::{AiConfig, FakeGenerativeClient, GenerativeClient, OpenAiGenerativeClient};
use musabi_core::pipeline::steps::{
    EditImgStep, GenImgStep, GenTextStep, PubImgStep, SelectImgStep,
};
use musabi_core::pipeline::{PipelineStep, StageDeps};
use musabi_core::publish::{FakeGraphApi, GraphApi, GraphClient, MetaConfig, SocialPublisher};
use musabi_core::{
    EnvSecretStore, FsMediaStore, InMemoryMediaStore, MediaStore, PipelineConfig, S3MediaStore,
    SecretStore, SsmSecretStore, Stage, TitleCompositor,
};

/// Bucket name used when running offline without `IMAGE_BUCKET`.
const LOCAL_BUCKET: &str = "musabi-local";

/// Dish returned by the offline generative client.
const FAKE_DISH_NAME: &str = "Tomato Basil Pasta";

pub struct RuntimeOptions {
    pub local_dir: Option<PathBuf>,
    pub fake: bool,
    pub dry_run: bool,
}

pub struct Runtime {
    pub config: PipelineConfig,
    options: RuntimeOptions,
    secrets: Box<dyn SecretStore>,
}

impl Runtime {
    pub async fn new(options: RuntimeOptions) -> Result<Self> {
        let offline = options.fake || options.local_dir.is_some();
        let config = PipelineConfig::from_lookup(|name| {
            env::var(name)
                .ok()
                .or_else(|| (offline && name == "IMAGE_BUCKET").then(|| LOCAL_BUCKET.to_string()))
        })
        .context("Invalid pipeline configuration")?;

        let secrets: Box<dyn SecretStore> = match env::var("MUSABI_SECRETS").as_deref() {
            Ok("env") => Box::new(EnvSecretStore::new()),
            _ => Box::new(SsmSecretStore::from_env().await),
        };

        Ok(Self {
            config,
            options,
            secrets,
        })
    }

    async fn client(&self) -> Result<Arc<dyn GenerativeClient>> {
        if self.options.fake {
            return Ok(Arc::new(
                FakeGenerativeClient::with_dish_responses(FAKE_DISH_NAME)
                    .with_judge_index(0),
            ));
        }
        let ai_config = AiConfig::load(self.secrets.as_ref())
            .await
            .context("Failed to load generative service settings")?;
        Ok(Arc::new(
            OpenAiGenerativeClient::new(ai_config).with_retry(self.config.retry),
        ))
    }

    async fn store(&self) -> Arc<dyn MediaStore> {
        if let Some(dir) = &self.options.local_dir {
            return Arc::new(FsMediaStore::new(dir.clone()));
        }
        if self.options.fake {
            return Arc::new(InMemoryMediaStore::new(self.config.image_bucket.clone()));
        }
        Arc::new(
            S3MediaStore::from_env(self.config.image_bucket.clone())
                .await
                .with_retry(self.config.retry),
        )
    }

    /// Dry runs and offline runs never reach the Graph API, so they skip
    /// loading its credentials.
    async fn graph(&self) -> Result<Arc<dyn GraphApi>> {
        if self.options.dry_run || self.options.fake {
            return Ok(Arc::new(FakeGraphApi::new()));
        }
        let meta = MetaConfig::load(self.secrets.as_ref())
            .await
            .context("Failed to load publishing settings")?;
        let client = GraphClient::new(meta)?.with_retry(self.config.retry);
        Ok(Arc::new(client))
    }

    fn compositor(&self) -> Arc<TitleCompositor> {
        Arc::new(TitleCompositor::from_path(&self.config.font_path))
    }

    pub async fn stage_deps(&self) -> Result<StageDeps> {
        Ok(StageDeps {
            client: self.client().await?,
            store: self.store().await,
            graph: self.graph().await?,
            compositor: self.compositor(),
            config: self.config.clone(),
        })
    }

    /// Build only the collaborators `stage` needs.
    pub async fn step_for(&self, stage: Stage) -> Result<Box<dyn PipelineStep>> {
        let step: Box<dyn PipelineStep> = match stage {
            Stage::GenText => Box::new(GenTextStep::new(self.client().await?)),
            Stage::GenImg => Box::new(GenImgStep::new(
                self.client().await?,
                self.store().await,
                self.config.parallel_count,
            )),
            Stage::SelectImg => Box::new(SelectImgStep::new(
                self.client().await?,
                self.store().await,
            )),
            Stage::EditImg => Box::new(EditImgStep::new(self.store().await, self.compositor())),
            Stage::PubImg => {
                let publisher = SocialPublisher::new(
                    self.graph().await?,
                    self.store().await,
                    self.config.poll,
                    self.config.presign_ttl,
                );
                Box::new(PubImgStep::new(Arc::new(publisher)))
            }
        };
        Ok(step)
    }
}
