pub mod ai;
pub mod caption;
pub mod compositor;
pub mod config;
pub mod error;
pub mod image;
pub mod pipeline;
pub mod publish;
pub mod retry;
pub mod storage;
pub mod types;

pub use caption::build_caption;
pub use compositor::{fit_font_size, FontFit, TitleCompositor};
pub use config::{ConfigError, EnvSecretStore, PipelineConfig, PollPolicy, SecretStore, SsmSecretStore};
pub use error::{ErrorKind, PipelineError};
pub use crate::image::{validate_image, MAX_FILE_SIZE};
pub use retry::RetryPolicy;
pub use storage::{FsMediaStore, InMemoryMediaStore, MediaStore, S3MediaStore};
pub use types::{
    DishRecord, EditImgInput, EditImgOutput, ExecutionContext, GenImgBranchOutput,
    GenImgFanOutOutput, GenImgInput, GenTextOutput, PubImgInput, PubImgOutput, SelectImgInput,
    SelectImgOutput, Stage,
};

/// Unique identifier for this build, generated at compile time.
/// Logged when a stage starts so failures can be matched to a deploy.
pub const BUILD_ID: &str = env!("BUILD_ID");
