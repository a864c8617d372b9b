//! Job data types shared by every vendor.

use crate::media::MediaInput;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// The kind of generation a job performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    ImageToVideo,
    ImageToText,
    TextToImage,
    SpeechToText,
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskKind::ImageToVideo => write!(f, "image-to-video"),
            TaskKind::ImageToText => write!(f, "image-to-text"),
            TaskKind::TextToImage => write!(f, "text-to-image"),
            TaskKind::SpeechToText => write!(f, "speech-to-text"),
        }
    }
}

/// Normalized job status. Each vendor maps its own vocabulary onto this set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Processing,
    Succeeded,
    Failed,
    Canceled,
}

impl JobStatus {
    /// Whether polling can stop: success, failure, or cancellation.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            JobStatus::Succeeded | JobStatus::Failed | JobStatus::Canceled
        )
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            JobStatus::Pending => "pending",
            JobStatus::Processing => "processing",
            JobStatus::Succeeded => "succeeded",
            JobStatus::Failed => "failed",
            JobStatus::Canceled => "canceled",
        };
        f.write_str(s)
    }
}

/// Where a finished job's output lives.
#[derive(Debug, Clone, PartialEq)]
pub enum ArtifactRef {
    /// Must be downloaded from this URL.
    Url(String),
    /// The status response already carried the artifact bytes.
    Inline(Bytes),
    /// Structured output (caption text, transcript) returned in the status body.
    Text(serde_json::Value),
}

/// A single status read, as parsed by a vendor.
#[derive(Debug, Clone, PartialEq)]
pub struct JobSnapshot {
    pub status: JobStatus,
    pub result: Option<ArtifactRef>,
    /// Vendor-supplied error message, if any.
    pub detail: Option<String>,
}

impl JobSnapshot {
    pub fn new(status: JobStatus) -> Self {
        Self {
            status,
            result: None,
            detail: None,
        }
    }

    pub fn with_result(mut self, result: Option<ArtifactRef>) -> Self {
        self.result = result;
        self
    }

    pub fn with_detail(mut self, detail: Option<String>) -> Self {
        self.detail = detail;
        self
    }
}

/// A remote generation request tracked by its vendor-assigned identifier.
///
/// Lives only for the duration of one invocation; mutated only by polling.
#[derive(Debug, Clone)]
pub struct Job {
    pub id: String,
    pub vendor: String,
    pub task: TaskKind,
    pub status: JobStatus,
    pub result: Option<ArtifactRef>,
    pub detail: Option<String>,
}

impl Job {
    pub fn new(id: impl Into<String>, vendor: impl Into<String>, task: TaskKind) -> Self {
        Self {
            id: id.into(),
            vendor: vendor.into(),
            task,
            status: JobStatus::Pending,
            result: None,
            detail: None,
        }
    }

    /// Fold a status read into the job.
    pub fn apply(&mut self, snapshot: JobSnapshot) {
        self.status = snapshot.status;
        if snapshot.result.is_some() {
            self.result = snapshot.result;
        }
        if snapshot.detail.is_some() {
            self.detail = snapshot.detail;
        }
    }
}

/// How waiting on a job ended.
#[derive(Debug)]
pub enum JobOutcome {
    Succeeded(Job),
    Failed(Job),
    Canceled(Job),
    TimedOut { job: Job, waited: Duration },
}

impl JobOutcome {
    /// Classify a job that has reached a terminal status.
    pub(crate) fn settled(job: Job) -> Self {
        match job.status {
            JobStatus::Succeeded => JobOutcome::Succeeded(job),
            JobStatus::Canceled => JobOutcome::Canceled(job),
            _ => JobOutcome::Failed(job),
        }
    }

    pub fn job(&self) -> &Job {
        match self {
            JobOutcome::Succeeded(job) | JobOutcome::Failed(job) | JobOutcome::Canceled(job) => {
                job
            }
            JobOutcome::TimedOut { job, .. } => job,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, JobOutcome::Succeeded(_))
    }
}

/// Normalized input for a job submission.
#[derive(Debug, Clone)]
pub struct JobInput {
    pub task: TaskKind,
    /// Image or audio, depending on the task
    pub media: Option<MediaInput>,
    /// Text prompt, if the task takes one
    pub prompt: Option<String>,
}

impl JobInput {
    pub fn image_to_video(image: MediaInput, prompt: impl Into<String>) -> Self {
        Self {
            task: TaskKind::ImageToVideo,
            media: Some(image),
            prompt: Some(prompt.into()),
        }
    }

    pub fn image_to_text(image: MediaInput) -> Self {
        Self {
            task: TaskKind::ImageToText,
            media: Some(image),
            prompt: None,
        }
    }

    pub fn text_to_image(prompt: impl Into<String>) -> Self {
        Self {
            task: TaskKind::TextToImage,
            media: None,
            prompt: Some(prompt.into()),
        }
    }

    pub fn speech_to_text(audio: MediaInput) -> Self {
        Self {
            task: TaskKind::SpeechToText,
            media: Some(audio),
            prompt: None,
        }
    }

    /// The prompt, or an empty string.
    pub fn prompt_or_empty(&self) -> &str {
        self.prompt.as_deref().unwrap_or("")
    }
}
