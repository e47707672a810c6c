//! Fan-out from the plan stage to the downstream render and encode jobs.

pub mod submitter;

pub use submitter::{resolve_target, PipelineSubmitter, ResolvedTarget, SubmittedPipeline};
