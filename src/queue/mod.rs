//! The job-submission collaborator.
//!
//! Stages only ever submit; scheduling, dependency enforcement and retries
//! belong to the queueing service.

pub mod client;
pub mod memory;
mod request;

pub use client::HttpJobQueue;
pub use memory::MemoryJobQueue;
pub use request::*;

use batchflow_common::{JobId, Result};

/// Something that accepts job submissions and hands back job ids.
#[async_trait::async_trait]
pub trait JobQueue: Send + Sync {
    /// Submit a job. Fails with `Error::Submission` when the service rejects
    /// the request or cannot be reached.
    async fn submit(&self, request: &SubmissionRequest) -> Result<JobId>;
}
