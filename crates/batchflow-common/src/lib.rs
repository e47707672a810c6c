//! Batchflow-Common: shared types used across batchflow.
//!
//! - **Typed IDs**: [`JobId`] and [`RunId`] wrappers for queue-issued identifiers
//! - **Core Types**: the [`Stage`] enum and audit [`EventKind`]s
//! - **Error Handling**: the common [`Error`] type and [`Result`] alias
//!
//! # Examples
//!
//! ```
//! use batchflow_common::{Error, RunId, Stage};
//!
//! let run = RunId::new("1234");
//! assert_eq!(run.partition_key(), "run-1234");
//!
//! let stage: Stage = "render".parse().unwrap();
//! assert_eq!(stage, Stage::Render);
//!
//! assert!(matches!(
//!     "transcode".parse::<Stage>(),
//!     Err(Error::UnknownStage { .. })
//! ));
//! ```

pub mod error;
pub mod ids;
pub mod types;

pub use error::{Error, Result};
pub use ids::*;
pub use types::*;
