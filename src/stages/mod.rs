//! Stage executors and their shared outcome type.

pub mod encode;
pub mod plan;
pub mod render;

pub use render::{PlaceholderRenderer, RenderUnit, UnitRenderer};

use batchflow_common::{Error, JobId, Stage};
use serde::Serialize;
use std::fmt;

/// How a stage finished, short of failing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum StageStatus {
    Completed,
    /// The work was done but at least one audit record could not be written.
    CompletedWithAuditGaps,
}

impl fmt::Display for StageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Completed => write!(f, "completed"),
            Self::CompletedWithAuditGaps => write!(f, "completed with audit gaps"),
        }
    }
}

/// Result of a stage that did its work.
#[derive(Debug)]
pub struct StageOutcome {
    pub stage: Stage,
    /// Jobs submitted by this stage, in submission order.
    pub submitted: Vec<JobId>,
    /// Output locations produced by this stage.
    pub outputs: Vec<String>,
    /// Audit writes that failed along the way.
    pub audit_failures: Vec<Error>,
}

impl StageOutcome {
    pub fn new(stage: Stage) -> Self {
        Self {
            stage,
            submitted: Vec::new(),
            outputs: Vec::new(),
            audit_failures: Vec::new(),
        }
    }

    pub fn status(&self) -> StageStatus {
        if self.audit_failures.is_empty() {
            StageStatus::Completed
        } else {
            StageStatus::CompletedWithAuditGaps
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_reflects_audit_failures() {
        let mut outcome = StageOutcome::new(Stage::Encode);
        assert_eq!(outcome.status(), StageStatus::Completed);

        outcome.audit_failures.push(Error::audit_write("down"));
        assert_eq!(outcome.status(), StageStatus::CompletedWithAuditGaps);
        assert_eq!(outcome.status().to_string(), "completed with audit gaps");
    }
}
