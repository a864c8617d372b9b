//! Kinema Core - polling job clients for third-party generative-media APIs.
//!
//! Kinema stitches vendor APIs (captioning, text-to-image, image-to-video,
//! speech-to-text) into one small pipeline:
//!
//! ```text
//! Image → (optional) Caption → Submit job → Poll → Download artifact
//! ```
//!
//! Every vendor runs through the same [`JobClient`]; what differs per vendor
//! is described by a [`vendor::Vendor`] profile.
//!
//! # Usage
//!
//! ```rust,ignore
//! use kinema_core::{Config, ConversionService, Kinema};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let kinema = Kinema::new(Config::load()?);
//!     let report = kinema
//!         .converter()
//!         .convert("./still.png", "", "out/video.mp4".as_ref(), Some("Replicate"))
//!         .await?;
//!     println!("Saved {} bytes", report.bytes);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod convert;
pub mod error;
pub mod job;
pub mod media;
pub mod tasks;
pub mod vendor;

pub use config::Config;
pub use convert::{ConversionReport, ConversionService, Converter, ModelType};
pub use error::{ConfigError, ConvertError, JobError, JobResult};
pub use job::{ArtifactRef, Job, JobClient, JobInput, JobOutcome, JobStatus, PollPolicy, TaskKind};
pub use media::{MediaAsset, MediaInput};
pub use tasks::MediaTasks;

use std::sync::Arc;

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Entry point bundling the converter and the single-shot media tasks built
/// from one configuration.
pub struct Kinema {
    config: Config,
    converter: Arc<Converter>,
    tasks: MediaTasks,
}

impl Kinema {
    pub fn new(config: Config) -> Self {
        tracing::debug!("Initializing Kinema v{}", VERSION);
        let converter = Arc::new(Converter::from_config(&config));
        let tasks = MediaTasks::from_config(&config);
        Self {
            config,
            converter,
            tasks,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Shared handle to the converter, cheap to clone into server state.
    pub fn converter(&self) -> Arc<Converter> {
        Arc::clone(&self.converter)
    }

    pub fn tasks(&self) -> &MediaTasks {
        &self.tasks
    }

    /// Job client for a model type, used to re-fetch earlier jobs.
    pub fn client(&self, model: ModelType) -> Option<Arc<JobClient>> {
        self.converter.client(model)
    }
}
