//! Batchflow - three-stage batch pipeline runner
//!
//! A single binary runs as every job of the pipeline. The `plan` stage splits
//! the workload and submits a render array job plus an encode job that waits
//! on it; each `render` slot produces its share of outputs; `encode` records
//! the combined artifact. Every stage appends to an audit trail keyed by run.
//!
//! This library crate exposes the stages for the binary and integration tests.

pub mod audit;
pub mod config;
pub mod context;
pub mod dispatch;
pub mod partition;
pub mod pipeline;
pub mod queue;
pub mod stages;
