//! Typed ID wrappers.
//!
//! Job ids and run ids are opaque strings handed out by the queueing service,
//! so unlike most newtype IDs these wrap a `String` rather than a UUID. The
//! wrappers keep a run id from being passed where a job id is expected.

use serde::{Deserialize, Serialize};

/// Identifier of a single submitted job, as returned by the queueing service.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(String);

impl JobId {
    pub fn new<S: Into<String>>(id: S) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for JobId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier grouping every job spawned by one pipeline trigger.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(String);

impl RunId {
    pub fn new<S: Into<String>>(id: S) -> Self {
        Self(id.into())
    }

    /// The run started by the given (plan) job.
    pub fn from_job(job_id: &JobId) -> Self {
        Self(job_id.0.clone())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Partition key under which every audit record of this run is stored.
    #[must_use]
    pub fn partition_key(&self) -> String {
        format!("run-{}", self.0)
    }
}

impl From<String> for RunId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
