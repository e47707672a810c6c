use crate::queue::{JobQueue, SubmissionRequest};
use batchflow_common::{Error, JobId, Result};
use parking_lot::Mutex;
use std::collections::HashSet;

/// In-process queue that records submissions instead of sending them.
///
/// Backs `--dry-run` and the pipeline tests. Job ids are random UUIDs, as a
/// real service would hand out.
#[derive(Default)]
pub struct MemoryJobQueue {
    calls: Mutex<Vec<SubmissionRequest>>,
    accepted: Mutex<Vec<(JobId, SubmissionRequest)>>,
    rejected_queues: HashSet<String>,
}

impl MemoryJobQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail every submission addressed to `queue`.
    #[must_use]
    pub fn reject_queue(mut self, queue: impl Into<String>) -> Self {
        self.rejected_queues.insert(queue.into());
        self
    }

    /// Every submission attempt, accepted or not, in call order.
    pub fn calls(&self) -> Vec<SubmissionRequest> {
        self.calls.lock().clone()
    }

    /// Accepted submissions with the ids they were given, in call order.
    pub fn accepted(&self) -> Vec<(JobId, SubmissionRequest)> {
        self.accepted.lock().clone()
    }
}

#[async_trait::async_trait]
impl JobQueue for MemoryJobQueue {
    async fn submit(&self, request: &SubmissionRequest) -> Result<JobId> {
        self.calls.lock().push(request.clone());

        if self.rejected_queues.contains(&request.job_queue) {
            return Err(Error::submission(
                &request.job_name,
                format!("queue {} rejected the job", request.job_queue),
            ));
        }

        let job_id = JobId::new(uuid::Uuid::new_v4().to_string());
        self.accepted.lock().push((job_id.clone(), request.clone()));
        Ok(job_id)
    }
}
