//! Core type definitions for pipeline stages and audit events.
//!
//! All enums serialize in lowercase (stages) or camelCase (event kinds) so the
//! values written to the audit store match what external observers expect.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::Error;

/// A pipeline stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    /// Computes the workload and submits the downstream jobs.
    Plan,
    /// One array slot of frame rendering.
    Render,
    /// Combines rendered frames into the final artifact.
    Encode,
}

impl Stage {
    /// Every stage, in pipeline order.
    pub const ALL: [Stage; 3] = [Stage::Plan, Stage::Render, Stage::Encode];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Plan => "plan",
            Self::Render => "render",
            Self::Encode => "encode",
        }
    }

    /// Human-readable list of valid stage names, e.g. `plan, render, encode`.
    pub fn expected_names() -> String {
        Self::ALL
            .iter()
            .map(|s| s.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Stage {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "plan" => Ok(Self::Plan),
            "render" => Ok(Self::Render),
            "encode" => Ok(Self::Encode),
            _ => Err(Error::UnknownStage {
                given: s.to_string(),
                expected: Self::expected_names(),
            }),
        }
    }
}

/// Kind of event written to the audit log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EventKind {
    /// A downstream job was accepted by the queue.
    SubmittedJob,
    /// A render slot finished all of its units.
    ProducedOutputs,
    /// The encode stage produced the final artifact.
    CombinedOutputs,
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SubmittedJob => write!(f, "submittedJob"),
            Self::ProducedOutputs => write!(f, "producedOutputs"),
            Self::CombinedOutputs => write!(f, "combinedOutputs"),
        }
    }
}
