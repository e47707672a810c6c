//! Shared helpers for integration tests.
//!
//! Builds runtime contexts from plain maps instead of the process
//! environment, so tests can run in parallel.

#![allow(dead_code)]

use std::collections::HashMap;

use batchflow::config::{Config, JobTarget};
use batchflow::context::{vars, RuntimeContext};
use batchflow::queue::SubmissionRequest;

/// Variables the queueing service and job definition provide for a job of
/// pipeline `demo`.
pub fn job_env(stage: &str, job_id: &str, table: &str) -> HashMap<String, String> {
    [
        (vars::JOB_ID, job_id),
        (vars::JOB_ATTEMPT, "1"),
        (vars::QUEUE_NAME, "demo-queue"),
        (vars::COMPUTE_ENVIRONMENT, "demo-ce"),
        (vars::PIPELINE, "demo"),
        (vars::STAGE, stage),
        (vars::STORAGE, "frames-bucket"),
        (vars::AUDIT_STORE, table),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect()
}

/// Environment of a job launched from `request`, as the queue would start
/// it: the job definition's variables plus the request's overrides.
pub fn launched_env(
    request: &SubmissionRequest,
    stage: &str,
    job_id: &str,
    array_index: Option<u32>,
    table: &str,
) -> HashMap<String, String> {
    let mut env = job_env(stage, job_id, table);
    env.insert(vars::QUEUE_NAME.to_string(), request.job_queue.clone());
    if let Some(index) = array_index {
        env.insert(vars::JOB_ARRAY_INDEX.to_string(), index.to_string());
    }
    if let Some(overrides) = &request.container_overrides {
        for kv in &overrides.environment {
            env.insert(kv.name.clone(), kv.value.clone());
        }
    }
    env
}

pub fn context(env: &HashMap<String, String>) -> RuntimeContext {
    RuntimeContext::from_lookup(|name| env.get(name).cloned())
        .expect("test environment should form a valid context")
}

/// Config with render and encode targets filled in.
pub fn config() -> Config {
    let mut config = Config::default();
    config.stages.render = JobTarget {
        queue: Some("render-q".into()),
        definition: Some("render-def:3".into()),
        ..Default::default()
    };
    config.stages.encode = JobTarget {
        queue: Some("encode-q".into()),
        definition: Some("encode-def:1".into()),
        ..Default::default()
    };
    config
}
