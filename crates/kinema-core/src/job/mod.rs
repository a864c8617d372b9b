//! Remote generation jobs: data model, polling policy, and the generic client.

mod client;
mod poll;
mod types;

pub use client::JobClient;
pub use poll::{is_transient_status, PollPolicy};
pub use types::{ArtifactRef, Job, JobInput, JobOutcome, JobSnapshot, JobStatus, TaskKind};
