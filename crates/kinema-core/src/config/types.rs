//! Sub-configuration structs with defaults matching the vendors' published APIs.

use crate::job::PollPolicy;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Negative prompt sent with every Kling-based image-to-video request.
pub const DEFAULT_NEGATIVE_PROMPT: &str =
    "distort the image, show anything that is not in the image, like human hand or fingers.";

/// General settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Directory where generated artifacts are written
    pub output_dir: PathBuf,

    /// Directory where images uploaded through the web form are stored
    pub upload_dir: PathBuf,

    /// Cutoff for downloading one finished artifact, in seconds
    pub download_timeout_secs: u64,
}

impl GeneralConfig {
    pub fn download_timeout(&self) -> Duration {
        Duration::from_secs(self.download_timeout_secs)
    }
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("output"),
            upload_dir: PathBuf::from("~/.kinema/uploads"),
            download_timeout_secs: 300,
        }
    }
}

/// Replicate settings (captioning, text-to-image, image-to-video, speech-to-text).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReplicateConfig {
    /// API token (supports ${ENV_VAR} syntax)
    pub api_token: String,

    /// API base URL
    pub base_url: String,

    /// Seconds between status checks
    pub poll_interval_secs: u64,

    /// Total wait budget per job in seconds
    pub timeout_secs: u64,

    /// Image-to-video model (`owner/name`)
    pub video_model: String,

    /// Image captioning model version (`owner/name:version`)
    pub caption_version: String,

    /// Text-to-image model (`owner/name`)
    pub image_model: String,

    /// Speech transcription model version (`owner/name:version`)
    pub transcribe_version: String,

    /// Negative prompt for image-to-video
    pub negative_prompt: String,
}

impl Default for ReplicateConfig {
    fn default() -> Self {
        Self {
            api_token: "${REPLICATE_API_TOKEN}".to_string(),
            base_url: "https://api.replicate.com".to_string(),
            poll_interval_secs: 10,
            timeout_secs: 600,
            video_model: "kwaivgi/kling-v1.6-standard".to_string(),
            caption_version:
                "salesforce/blip:2e1dddc8621f72155f24cf2e0adbde548458d3cab9f00c0139eea840d0ac4746"
                    .to_string(),
            image_model: "black-forest-labs/flux-schnell".to_string(),
            transcribe_version: "vaibhavs10/incredibly-fast-whisper:3ab86df6c8f54c11309d4d1f930ac292bad43ace52d10c80d87eb258b3c9f79c".to_string(),
            negative_prompt: DEFAULT_NEGATIVE_PROMPT.to_string(),
        }
    }
}

impl ReplicateConfig {
    pub fn poll_policy(&self) -> PollPolicy {
        PollPolicy::from_secs(self.poll_interval_secs, self.timeout_secs)
    }
}

/// Stability AI image-to-video settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StabilityConfig {
    /// API key (supports ${ENV_VAR} syntax), sent verbatim in `authorization`
    pub api_key: String,

    /// API base URL
    pub base_url: String,

    /// Seconds between status checks
    pub poll_interval_secs: u64,

    /// Total wait budget per job in seconds
    pub timeout_secs: u64,

    /// Generation seed (0 = random)
    pub seed: u64,

    /// How strongly the video sticks to the original image
    pub cfg_scale: f32,

    /// Amount of motion in the output video
    pub motion_bucket_id: u32,
}

impl Default for StabilityConfig {
    fn default() -> Self {
        Self {
            api_key: "${STABILITY_AI_API_KEY}".to_string(),
            base_url: "https://api.stability.ai".to_string(),
            poll_interval_secs: 15,
            timeout_secs: 600,
            seed: 0,
            cfg_scale: 1.8,
            motion_bucket_id: 127,
        }
    }
}

impl StabilityConfig {
    pub fn poll_policy(&self) -> PollPolicy {
        PollPolicy::from_secs(self.poll_interval_secs, self.timeout_secs)
    }
}

/// PiAPI (Kling) image-to-video settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PiApiConfig {
    /// API key (supports ${ENV_VAR} syntax), sent in `x-api-key`
    pub api_key: String,

    /// API base URL
    pub base_url: String,

    /// Seconds between status checks
    pub poll_interval_secs: u64,

    /// Total wait budget per job in seconds
    pub timeout_secs: u64,

    /// Negative prompt for image-to-video
    pub negative_prompt: String,

    /// Output aspect ratio
    pub aspect_ratio: String,

    /// Video length in seconds
    pub duration: u32,

    /// Prompt adherence
    pub cfg_scale: f32,

    /// Generation mode ("std" or "pro")
    pub mode: String,
}

impl Default for PiApiConfig {
    fn default() -> Self {
        Self {
            api_key: "${PI_API_KEY}".to_string(),
            base_url: "https://api.piapi.ai".to_string(),
            poll_interval_secs: 15,
            timeout_secs: 600,
            negative_prompt: DEFAULT_NEGATIVE_PROMPT.to_string(),
            aspect_ratio: "9:16".to_string(),
            duration: 5,
            cfg_scale: 0.5,
            mode: "std".to_string(),
        }
    }
}

impl PiApiConfig {
    pub fn poll_policy(&self) -> PollPolicy {
        PollPolicy::from_secs(self.poll_interval_secs, self.timeout_secs)
    }
}

/// Web form server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address the form server binds to
    pub bind: String,

    /// Model preselected in the form's dropdown
    pub default_model: String,

    /// Seconds between keep-alive comments on an open status stream
    pub keep_alive_secs: u64,
}

impl ServerConfig {
    pub fn keep_alive(&self) -> Duration {
        Duration::from_secs(self.keep_alive_secs)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:7860".to_string(),
            default_model: "Replicate".to_string(),
            keep_alive_secs: 15,
        }
    }
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: error, warn, info, debug, trace
    pub level: String,

    /// Log format: "pretty" or "json"
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}
