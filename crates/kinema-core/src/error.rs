//! Error types for Kinema.
//!
//! Errors are organized by layer: configuration, remote job handling and
//! conversion routing. The binary folds them into `anyhow` at its edge. Each variant carries enough context (vendor, job id,
//! path) to produce an actionable log line at the boundary where it is
//! reported.

use crate::job::{JobStatus, TaskKind};
use std::path::PathBuf;
use thiserror::Error;

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to read the config file from disk
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    /// Failed to parse TOML configuration
    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Configuration values are invalid
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

/// Errors raised while submitting, polling or downloading a remote job.
#[derive(Error, Debug)]
pub enum JobError {
    /// The request never reached the vendor, was rejected, or the response
    /// carried no job identifier.
    #[error("{vendor} submission failed: {message}")]
    Submission {
        vendor: String,
        message: String,
        status_code: Option<u16>,
    },

    /// A single status query failed. Does not abort the wait budget.
    #[error("{vendor} status query for job {job_id} failed: {message}")]
    TransientQuery {
        vendor: String,
        job_id: String,
        message: String,
    },

    /// The finished artifact could not be downloaded.
    #[error("Download of artifact for job {job_id} failed: {message}")]
    Download {
        job_id: String,
        message: String,
        status_code: Option<u16>,
    },

    /// The wait budget ran out before the job reached a terminal state.
    #[error("Job {job_id} did not reach a terminal state within {timeout_secs}s (last status: {status})")]
    TimeoutExceeded {
        job_id: String,
        status: JobStatus,
        timeout_secs: u64,
    },

    /// The vendor reported the job as failed.
    #[error("Job {job_id} failed: {detail}")]
    JobFailed { job_id: String, detail: String },

    /// The job was canceled on the vendor side.
    #[error("Job {job_id} was canceled")]
    Canceled { job_id: String },

    /// The job exists but has not produced an artifact yet.
    #[error("Job {job_id} is not ready (status: {status})")]
    NotReady { job_id: String, status: JobStatus },

    /// The vendor does not offer this kind of task.
    #[error("{vendor} does not support {task} jobs")]
    UnsupportedTask { vendor: String, task: TaskKind },

    /// The vendor accepts this task but not with the supplied input.
    #[error("{vendor} cannot accept this input: {message}")]
    InvalidInput { vendor: String, message: String },

    /// Writing the artifact to disk failed.
    #[error("Failed to write artifact to {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Errors raised while routing a conversion to a vendor.
#[derive(Error, Debug)]
pub enum ConvertError {
    /// No model type was given.
    #[error("Image-to-video model is not specified")]
    ModelNotSpecified,

    /// The model type is unknown or has no configured client.
    #[error("Unsupported model: {0}")]
    UnsupportedModel(String),

    /// The input image could not be read.
    #[error("Failed to read input {path}: {source}")]
    Input {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// The remote job failed.
    #[error(transparent)]
    Job(#[from] JobError),
}

/// Convenience type alias for job-level results.
pub type JobResult<T> = std::result::Result<T, JobError>;
