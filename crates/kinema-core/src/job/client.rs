//! Generic polling job client.
//!
//! One implementation of the submit → poll → fetch state machine, driven by
//! a [`Vendor`] profile:
//!
//! ```text
//! submitted → polling → { succeeded, failed, canceled, timed_out }
//! ```
//!
//! Polling continues while the status is not terminal, i.e. until the job is
//! succeeded OR failed OR canceled, or the wait budget is spent.

use super::poll::{PollPolicy, MIN_POLL_INTERVAL};
use super::types::{ArtifactRef, Job, JobInput, JobOutcome, JobSnapshot, JobStatus, TaskKind};
use crate::error::{JobError, JobResult};
use crate::media::MediaAsset;
use crate::vendor::{FormPart, StatusResponse, SubmitBody, Vendor};
use bytes::{Bytes, BytesMut};
use futures_util::StreamExt;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use serde_json::Value;
use std::path::Path;
use std::time::Duration;

/// Upper bound on the buffer pre-allocated from a `Content-Length` header.
const MAX_PREALLOC_BYTES: u64 = 64 * 1024 * 1024;

/// Default cutoff for an artifact download, body included.
pub const DEFAULT_DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(300);

/// Polling client for one vendor.
///
/// Holds no per-job state, so a single client can serve concurrent jobs.
pub struct JobClient {
    vendor: Box<dyn Vendor>,
    http: reqwest::Client,
    download_timeout: Duration,
}

impl JobClient {
    pub fn new(vendor: Box<dyn Vendor>) -> Self {
        Self::with_http(vendor, reqwest::Client::new())
    }

    /// Create with a caller-supplied HTTP client (shared pools, custom TLS).
    pub fn with_http(vendor: Box<dyn Vendor>, http: reqwest::Client) -> Self {
        Self {
            vendor,
            http,
            download_timeout: DEFAULT_DOWNLOAD_TIMEOUT,
        }
    }

    /// Cut off artifact downloads that take longer than `timeout`.
    pub fn with_download_timeout(mut self, timeout: Duration) -> Self {
        self.download_timeout = timeout;
        self
    }

    pub fn vendor_name(&self) -> &'static str {
        self.vendor.name()
    }

    pub fn poll_policy(&self) -> PollPolicy {
        self.vendor.profile().poll
    }

    /// Submit one generation request and return the vendor-assigned job.
    pub async fn submit(&self, input: &JobInput) -> JobResult<Job> {
        let vendor = self.vendor.name();
        if !self.vendor.supports(input.task) {
            return Err(JobError::UnsupportedTask {
                vendor: vendor.to_string(),
                task: input.task,
            });
        }

        let submission = self.vendor.submission(input)?;
        let profile = self.vendor.profile();
        let url = profile.url(&submission.path);
        let submission_error = |message: String, status_code: Option<u16>| JobError::Submission {
            vendor: vendor.to_string(),
            message,
            status_code,
        };

        tracing::debug!("Submitting {} job to {url}", input.task);

        let request = self
            .http
            .post(&url)
            .header(profile.auth_header, &profile.auth_value);
        let request = match submission.body {
            SubmitBody::Json(body) => request.json(&body),
            SubmitBody::Multipart(parts) => request.multipart(build_form(vendor, parts)?),
        };

        let resp = request
            .send()
            .await
            .map_err(|e| submission_error(format!("request failed: {e}"), None))?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(submission_error(
                format!("HTTP {status}: {text}"),
                Some(status.as_u16()),
            ));
        }

        let body: Value = resp
            .json()
            .await
            .map_err(|e| submission_error(format!("failed to parse response: {e}"), None))?;

        let id = self
            .vendor
            .job_id(&body)
            .ok_or_else(|| submission_error(format!("response has no job identifier: {body}"), None))?;

        tracing::info!(vendor, job_id = %id, task = %input.task, "Job submitted");
        Ok(Job::new(id, vendor, input.task))
    }

    /// Read a job's current status once.
    ///
    /// A vendor-reported failure is a normal snapshot; only a failed read is
    /// an error, and that error is transient. A read that outlasts the
    /// policy's `read_timeout` is abandoned and reported the same way.
    pub async fn poll(&self, job_id: &str, task: TaskKind) -> JobResult<JobSnapshot> {
        let cutoff = self.poll_policy().read_timeout;
        match tokio::time::timeout(cutoff, self.read_status(job_id, task)).await {
            Ok(result) => result,
            Err(_) => Err(JobError::TransientQuery {
                vendor: self.vendor.name().to_string(),
                job_id: job_id.to_string(),
                message: format!("no response within {cutoff:?}"),
            }),
        }
    }

    async fn read_status(&self, job_id: &str, task: TaskKind) -> JobResult<JobSnapshot> {
        let profile = self.vendor.profile();
        let url = profile.url(&self.vendor.status_path(job_id));
        let transient = |message: String| JobError::TransientQuery {
            vendor: self.vendor.name().to_string(),
            job_id: job_id.to_string(),
            message,
        };

        let resp = self
            .http
            .get(&url)
            .header(profile.auth_header, &profile.auth_value)
            .header(ACCEPT, self.vendor.status_accept())
            .send()
            .await
            .map_err(|e| transient(format!("request failed: {e}")))?;

        let status = resp.status().as_u16();
        let content_type = resp
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(String::from);
        let body = resp
            .bytes()
            .await
            .map_err(|e| transient(format!("body read failed: {e}")))?;

        self.vendor
            .snapshot(
                task,
                StatusResponse {
                    status,
                    content_type,
                    body,
                },
            )
            .map_err(transient)
    }

    /// Poll at the fixed interval until the job is terminal or the budget runs out.
    #[tracing::instrument(skip_all, fields(vendor = self.vendor.name(), job_id = %job.id))]
    pub async fn wait(&self, mut job: Job) -> JobOutcome {
        let policy = self.poll_policy();
        let interval = policy.interval.max(MIN_POLL_INTERVAL);
        let mut waited = Duration::ZERO;
        let mut polls = 0u32;

        while !job.status.is_terminal() {
            if waited >= policy.timeout {
                tracing::warn!(
                    polls,
                    "Gave up after {waited:?} without a terminal status (last: {})",
                    job.status
                );
                return JobOutcome::TimedOut { job, waited };
            }

            tokio::time::sleep(interval).await;
            waited += interval;
            polls += 1;

            match self.poll(&job.id, job.task).await {
                Ok(snapshot) => {
                    tracing::debug!(poll = polls, status = %snapshot.status, "Status read");
                    job.apply(snapshot);
                }
                // A failed read spends its interval but does not end the wait
                Err(e) => tracing::warn!(poll = polls, "{e}"),
            }
        }

        let outcome = JobOutcome::settled(job);
        tracing::info!(polls, status = %outcome.job().status, "Job settled after {waited:?}");
        outcome
    }

    /// Retrieve the artifact of a succeeded job.
    ///
    /// Inline and text results are returned without a network call; URLs are
    /// downloaded in full before anything is returned.
    pub async fn fetch(&self, job: &Job) -> JobResult<Bytes> {
        if job.status != JobStatus::Succeeded {
            return Err(JobError::NotReady {
                job_id: job.id.clone(),
                status: job.status,
            });
        }

        match &job.result {
            Some(ArtifactRef::Inline(bytes)) => Ok(bytes.clone()),
            Some(ArtifactRef::Text(value)) => Ok(text_bytes(value)),
            Some(ArtifactRef::Url(url)) => self.download(&job.id, url).await,
            None => Err(JobError::Download {
                job_id: job.id.clone(),
                message: "job succeeded but reported no result".to_string(),
                status_code: None,
            }),
        }
    }

    /// Submit, wait, and fetch, returning the artifact bytes.
    pub async fn complete(&self, input: &JobInput) -> JobResult<(Job, Bytes)> {
        self.execute(input)
            .await
            .inspect_err(|e| self.report(input.task, e))
    }

    /// Submit, wait, fetch, and write the artifact to `output`.
    ///
    /// Nothing is written unless the whole artifact was received.
    pub async fn run(&self, input: &JobInput, output: &Path) -> JobResult<(Job, MediaAsset)> {
        let result = match self.execute(input).await {
            Ok((job, bytes)) => write_asset(output, bytes).await.map(|asset| (job, asset)),
            Err(e) => Err(e),
        };
        result.inspect_err(|e| self.report(input.task, e))
    }

    /// Re-download the artifact of a previously submitted job without
    /// resubmitting it.
    pub async fn retrieve(
        &self,
        job_id: &str,
        task: TaskKind,
        output: &Path,
    ) -> JobResult<(Job, MediaAsset)> {
        self.retrieve_inner(job_id, task, output)
            .await
            .inspect_err(|e| self.report(task, e))
    }

    async fn execute(&self, input: &JobInput) -> JobResult<(Job, Bytes)> {
        let job = self.submit(input).await?;
        let job = self.settle(self.wait(job).await)?;
        let bytes = self.fetch(&job).await?;
        Ok((job, bytes))
    }

    async fn retrieve_inner(
        &self,
        job_id: &str,
        task: TaskKind,
        output: &Path,
    ) -> JobResult<(Job, MediaAsset)> {
        let mut job = Job::new(job_id, self.vendor.name(), task);
        job.apply(self.poll(job_id, task).await?);

        if !job.status.is_terminal() {
            return Err(JobError::NotReady {
                job_id: job.id,
                status: job.status,
            });
        }

        let job = self.settle(JobOutcome::settled(job))?;
        let bytes = self.fetch(&job).await?;
        let asset = write_asset(output, bytes).await?;
        Ok((job, asset))
    }

    /// Turn a non-success outcome into its error.
    fn settle(&self, outcome: JobOutcome) -> JobResult<Job> {
        match outcome {
            JobOutcome::Succeeded(job) => Ok(job),
            JobOutcome::Failed(job) => Err(JobError::JobFailed {
                job_id: job.id,
                detail: job
                    .detail
                    .unwrap_or_else(|| "vendor reported failure".to_string()),
            }),
            JobOutcome::Canceled(job) => Err(JobError::Canceled { job_id: job.id }),
            JobOutcome::TimedOut { job, .. } => Err(JobError::TimeoutExceeded {
                job_id: job.id,
                status: job.status,
                timeout_secs: self.poll_policy().timeout.as_secs(),
            }),
        }
    }

    fn report(&self, task: TaskKind, error: &JobError) {
        tracing::error!(vendor = self.vendor.name(), %task, "{error}");
    }

    async fn download(&self, job_id: &str, url: &str) -> JobResult<Bytes> {
        let download_error = |message: String, status_code: Option<u16>| JobError::Download {
            job_id: job_id.to_string(),
            message,
            status_code,
        };

        tracing::debug!("Downloading artifact for job {job_id} from {url}");

        let response = self
            .http
            .get(url)
            .timeout(self.download_timeout)
            .send()
            .await
            .map_err(|e| download_error(format!("request failed: {e}"), None))?;

        let status = response.status();
        if !status.is_success() {
            return Err(download_error(
                format!("HTTP {status} from {url}"),
                Some(status.as_u16()),
            ));
        }

        let total_size = response.content_length();
        let capacity = total_size.unwrap_or(0).min(MAX_PREALLOC_BYTES) as usize;
        let mut buffer = BytesMut::with_capacity(capacity);
        let mut stream = response.bytes_stream();

        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| download_error(format!("body read failed: {e}"), None))?;
            buffer.extend_from_slice(&chunk);

            if let Some(total) = total_size {
                let downloaded = buffer.len() as u64;
                if downloaded % (10 * 1024 * 1024) < chunk.len() as u64 {
                    tracing::debug!(
                        "  Progress: {:.0}%",
                        downloaded as f64 / total as f64 * 100.0
                    );
                }
            }
        }

        tracing::debug!("Downloaded {} bytes for job {job_id}", buffer.len());
        Ok(buffer.freeze())
    }
}

fn build_form(vendor: &str, parts: Vec<FormPart>) -> JobResult<reqwest::multipart::Form> {
    let mut form = reqwest::multipart::Form::new();
    for part in parts {
        form = match part {
            FormPart::Text { name, value } => form.text(name, value),
            FormPart::File { name, media } => {
                let file = reqwest::multipart::Part::bytes(media.bytes.to_vec())
                    .file_name(media.file_name.clone())
                    .mime_str(&media.media_type)
                    .map_err(|e| JobError::InvalidInput {
                        vendor: vendor.to_string(),
                        message: format!("bad media type '{}': {e}", media.media_type),
                    })?;
                form.part(name, file)
            }
        };
    }
    Ok(form)
}

/// Text results are written as-is; structured ones as pretty JSON.
fn text_bytes(value: &Value) -> Bytes {
    match value {
        Value::String(text) => Bytes::from(text.clone()),
        other => Bytes::from(serde_json::to_vec_pretty(other).unwrap_or_default()),
    }
}

async fn write_asset(output: &Path, bytes: Bytes) -> JobResult<MediaAsset> {
    MediaAsset::write(output, bytes)
        .await
        .map_err(|source| JobError::Write {
            path: output.to_path_buf(),
            source,
        })
}
