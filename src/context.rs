//! Job identity and stage parameters, read once from the runtime environment.
//!
//! The queueing service injects the job id, attempt, array index and queue
//! names; the job definition bakes in the pipeline, stage, bucket and audit
//! table; the submitting stage layers workload parameters on top as
//! overrides. Everything is collected into one immutable [`RuntimeContext`]
//! at startup and passed by reference from there on.

use batchflow_common::{Error, JobId, Result, RunId, Stage};
use serde::Serialize;
use std::fmt;

/// Environment variable names making up the runtime contract.
pub mod vars {
    pub const JOB_ID: &str = "AWS_BATCH_JOB_ID";
    pub const JOB_ATTEMPT: &str = "AWS_BATCH_JOB_ATTEMPT";
    pub const JOB_ARRAY_INDEX: &str = "AWS_BATCH_JOB_ARRAY_INDEX";
    pub const QUEUE_NAME: &str = "AWS_BATCH_JQ_NAME";
    pub const COMPUTE_ENVIRONMENT: &str = "AWS_BATCH_CE_NAME";
    pub const PIPELINE: &str = "WORKFLOW";
    pub const STAGE: &str = "WORKFLOW_STEP";
    pub const STORAGE: &str = "JOB_BUCKET";
    pub const AUDIT_STORE: &str = "JOB_TABLE";
    pub const RUN_ID: &str = "RUN_ID";
    pub const TOTAL_UNITS: &str = "TOTAL_FRAMES";
    pub const UNITS_PER_SLOT: &str = "FRAMES_PER_RENDER_JOB";
    pub const RENDER_QUEUE: &str = "RENDER_JOB_QUEUE";
    pub const RENDER_DEFINITION: &str = "RENDER_JOB_DEFINITION";
    pub const ENCODE_QUEUE: &str = "ENCODE_JOB_QUEUE";
    pub const ENCODE_DEFINITION: &str = "ENCODE_JOB_DEFINITION";
}

/// Root under which stage outputs are written.
///
/// A bare bucket name is treated as an S3 bucket; anything containing a
/// scheme is used as a prefix as-is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct StorageLocation(String);

impl StorageLocation {
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim().trim_end_matches('/');
        if raw.contains("://") {
            Self(raw.to_string())
        } else {
            Self(format!("s3://{}", raw))
        }
    }

    /// Append path segments to the location.
    pub fn join(&self, segments: &[&str]) -> String {
        let mut out = self.0.clone();
        for segment in segments {
            out.push('/');
            out.push_str(segment.trim_matches('/'));
        }
        out
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StorageLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Stage-specific values passed at submission time.
///
/// Kept raw here; each stage validates what it needs so the error names the
/// stage's own constraint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StageParams {
    pub total_units: Option<String>,
    pub units_per_slot: Option<String>,
    pub render_queue: Option<String>,
    pub render_definition: Option<String>,
    pub encode_queue: Option<String>,
    pub encode_definition: Option<String>,
}

/// Identity of the running job. Never mutated after construction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RuntimeContext {
    pub job_id: JobId,
    pub run_id: RunId,
    pub attempt: u32,
    pub array_index: Option<u32>,
    pub queue_name: String,
    pub compute_environment: String,
    pub pipeline_name: String,
    pub stage: Stage,
    pub storage: StorageLocation,
    pub audit_store_ref: String,
    pub params: StageParams,
}

impl RuntimeContext {
    /// Build the context from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build the context from an arbitrary variable lookup.
    ///
    /// Empty values count as unset, since job definitions commonly declare
    /// parameters with empty defaults. The stage is parsed first so a
    /// misconfigured stage name is reported as such even when other values
    /// are missing.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        let require = |name: &str| {
            get(name).ok_or_else(|| Error::context(format!("{} is not set", name)))
        };

        let stage: Stage = require(vars::STAGE)?.trim().parse()?;

        let job_id = JobId::new(require(vars::JOB_ID)?);
        let attempt = parse_attempt(&require(vars::JOB_ATTEMPT)?)?;
        let array_index = get(vars::JOB_ARRAY_INDEX)
            .map(|raw| parse_array_index(&raw))
            .transpose()?;

        let run_id = get(vars::RUN_ID)
            .map(RunId::new)
            .unwrap_or_else(|| RunId::from_job(&job_id));

        Ok(Self {
            job_id,
            run_id,
            attempt,
            array_index,
            queue_name: require(vars::QUEUE_NAME)?,
            compute_environment: require(vars::COMPUTE_ENVIRONMENT)?,
            pipeline_name: require(vars::PIPELINE)?,
            stage,
            storage: StorageLocation::parse(&require(vars::STORAGE)?),
            audit_store_ref: require(vars::AUDIT_STORE)?,
            params: StageParams {
                total_units: get(vars::TOTAL_UNITS),
                units_per_slot: get(vars::UNITS_PER_SLOT),
                render_queue: get(vars::RENDER_QUEUE),
                render_definition: get(vars::RENDER_DEFINITION),
                encode_queue: get(vars::ENCODE_QUEUE),
                encode_definition: get(vars::ENCODE_DEFINITION),
            },
        })
    }

    /// Pretty JSON rendering used for the startup log line.
    pub fn describe(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_else(|_| format!("{:?}", self))
    }
}

fn parse_attempt(raw: &str) -> Result<u32> {
    match raw.trim().parse::<u32>() {
        Ok(n) if n >= 1 => Ok(n),
        _ => Err(Error::context(format!(
            "{}={:?}, expected a positive integer",
            vars::JOB_ATTEMPT,
            raw
        ))),
    }
}

fn parse_array_index(raw: &str) -> Result<u32> {
    raw.trim().parse::<u32>().map_err(|_| {
        Error::context(format!(
            "{}={:?}, expected a non-negative integer",
            vars::JOB_ARRAY_INDEX,
            raw
        ))
    })
}
