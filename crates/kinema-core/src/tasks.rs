//! Single-shot media tasks served by Replicate: captioning, text-to-image
//! and speech-to-text.

use crate::config::Config;
use crate::error::JobResult;
use crate::job::{JobClient, JobInput};
use crate::media::{MediaAsset, MediaInput};
use crate::vendor::ReplicateVendor;
use std::path::Path;
use std::sync::Arc;

/// Caption, image and transcript generation over a shared job client.
#[derive(Clone)]
pub struct MediaTasks {
    client: Arc<JobClient>,
}

impl MediaTasks {
    pub fn new(client: Arc<JobClient>) -> Self {
        Self { client }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(Arc::new(
            JobClient::new(Box::new(ReplicateVendor::new(&config.replicate)))
                .with_download_timeout(config.general.download_timeout()),
        ))
    }

    /// Describe an image in one line of text.
    pub async fn caption(&self, image: &MediaInput) -> JobResult<String> {
        tracing::debug!("Captioning {}", image.describe());
        let (_, bytes) = self
            .client
            .complete(&JobInput::image_to_text(image.clone()))
            .await?;

        let caption = clean_caption(&String::from_utf8_lossy(&bytes));
        tracing::info!("Caption: {caption}");
        Ok(caption)
    }

    /// Render `prompt` to a PNG at `output`.
    pub async fn text_to_image(&self, prompt: &str, output: &Path) -> JobResult<MediaAsset> {
        let (_, asset) = self
            .client
            .run(&JobInput::text_to_image(prompt), output)
            .await?;
        Ok(asset)
    }

    /// Transcribe an audio clip, writing the transcript JSON to `output`.
    pub async fn speech_to_text(&self, audio: MediaInput, output: &Path) -> JobResult<MediaAsset> {
        let (_, asset) = self
            .client
            .run(&JobInput::speech_to_text(audio), output)
            .await?;
        Ok(asset)
    }
}

/// BLIP answers "Caption: a dog on a beach"; keep only the description.
fn clean_caption(raw: &str) -> String {
    let raw = raw.trim();
    raw.strip_prefix("Caption:").unwrap_or(raw).trim().to_string()
}
