//! Job submission requests in the managed batch service's wire shape.

use batchflow_common::{Error, JobId, Result, RunId, Stage};
use serde::{Deserialize, Serialize};

use crate::config::ResourceOverrides;

/// Largest array the queueing service accepts.
pub const MAX_ARRAY_SIZE: u32 = 10_000;

/// Deterministic job name for a downstream submission.
///
/// Retrying the same plan job yields the same names; the queue tells the
/// submissions apart by job id.
///
/// ```
/// use batchflow::queue::job_name;
/// use batchflow_common::{RunId, Stage};
///
/// let name = job_name("demo", Stage::Render, Stage::Plan, &RunId::new("r1"));
/// assert_eq!(name, "demo-render-submittedBy-plan-r1");
/// ```
pub fn job_name(pipeline: &str, target: Stage, current: Stage, run_id: &RunId) -> String {
    format!("{}-{}-submittedBy-{}-{}", pipeline, target, current, run_id)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionRequest {
    pub job_name: String,
    pub job_queue: String,
    pub job_definition: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub array_properties: Option<ArrayProperties>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<JobDependency>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub container_overrides: Option<ContainerOverrides>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArrayProperties {
    pub size: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobDependency {
    pub job_id: JobId,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContainerOverrides {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub environment: Vec<KeyValuePair>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub resource_requirements: Vec<ResourceRequirement>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyValuePair {
    pub name: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceRequirement {
    #[serde(rename = "type")]
    pub kind: ResourceKind,
    pub value: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ResourceKind {
    Vcpu,
    Memory,
    Gpu,
}

impl SubmissionRequest {
    pub fn new(
        job_name: impl Into<String>,
        job_queue: impl Into<String>,
        job_definition: impl Into<String>,
    ) -> Self {
        Self {
            job_name: job_name.into(),
            job_queue: job_queue.into(),
            job_definition: job_definition.into(),
            array_properties: None,
            depends_on: Vec::new(),
            container_overrides: None,
        }
    }

    /// Submit as an array job of `size` members.
    pub fn with_array_size(mut self, size: u32) -> Result<Self> {
        if !(2..=MAX_ARRAY_SIZE).contains(&size) {
            return Err(Error::validation(format!(
                "array size {} for {} must be between 2 and {}",
                size, self.job_name, MAX_ARRAY_SIZE
            )));
        }
        self.array_properties = Some(ArrayProperties { size });
        Ok(self)
    }

    /// Hold the job until `job_id` succeeds. Replaces any earlier dependency.
    #[must_use]
    pub fn with_dependency(mut self, job_id: JobId) -> Self {
        self.depends_on = vec![JobDependency { job_id }];
        self
    }

    /// Add an environment override passed to the job's container.
    #[must_use]
    pub fn with_parameter(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        let name = name.into();
        let value = value.into();
        let env = &mut self
            .container_overrides
            .get_or_insert_with(ContainerOverrides::default)
            .environment;
        match env.iter_mut().find(|kv| kv.name == name) {
            Some(existing) => existing.value = value,
            None => env.push(KeyValuePair { name, value }),
        }
        self
    }

    /// Request container resources other than the job definition's.
    #[must_use]
    pub fn with_resources(mut self, resources: &ResourceOverrides) -> Self {
        if resources.is_empty() {
            return self;
        }
        let requirements = [
            (ResourceKind::Vcpu, resources.vcpus),
            (ResourceKind::Memory, resources.memory_mib),
            (ResourceKind::Gpu, resources.gpus),
        ]
        .into_iter()
        .filter_map(|(kind, value)| {
            value.map(|v| ResourceRequirement {
                kind,
                value: v.to_string(),
            })
        });

        self.container_overrides
            .get_or_insert_with(ContainerOverrides::default)
            .resource_requirements
            .extend(requirements);
        self
    }

    pub fn array_size(&self) -> Option<u32> {
        self.array_properties.map(|p| p.size)
    }

    pub fn depends_on_job_id(&self) -> Option<&JobId> {
        self.depends_on.first().map(|d| &d.job_id)
    }

    /// Value of an environment override, if set.
    pub fn parameter(&self, name: &str) -> Option<&str> {
        self.container_overrides
            .as_ref()?
            .environment
            .iter()
            .find(|kv| kv.name == name)
            .map(|kv| kv.value.as_str())
    }
}

/// Body returned by the submission endpoint. Only the job id is used; the
/// name and ARN it also carries are ignored.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitJobResponse {
    pub job_id: JobId,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_singleton_wire_shape() {
        let req = SubmissionRequest::new("demo-encode-submittedBy-plan-r1", "q", "def");
        assert_eq!(
            serde_json::to_value(&req).unwrap(),
            json!({
                "jobName": "demo-encode-submittedBy-plan-r1",
                "jobQueue": "q",
                "jobDefinition": "def",
            })
        );
    }

    #[test]
    fn test_full_wire_shape() {
        let req = SubmissionRequest::new("n", "q", "def")
            .with_array_size(5)
            .unwrap()
            .with_dependency(JobId::new("job-9"))
            .with_parameter("FRAMES_PER_RENDER_JOB", "50")
            .with_resources(&ResourceOverrides {
                vcpus: Some(2),
                memory_mib: None,
                gpus: Some(1),
            });

        assert_eq!(
            serde_json::to_value(&req).unwrap(),
            json!({
                "jobName": "n",
                "jobQueue": "q",
                "jobDefinition": "def",
                "arrayProperties": { "size": 5 },
                "dependsOn": [{ "jobId": "job-9" }],
                "containerOverrides": {
                    "environment": [{ "name": "FRAMES_PER_RENDER_JOB", "value": "50" }],
                    "resourceRequirements": [
                        { "type": "VCPU", "value": "2" },
                        { "type": "GPU", "value": "1" }
                    ]
                }
            })
        );
    }

    #[test]
    fn test_array_size_bounds() {
        assert!(SubmissionRequest::new("n", "q", "d").with_array_size(1).is_err());
        assert!(SubmissionRequest::new("n", "q", "d")
            .with_array_size(MAX_ARRAY_SIZE + 1)
            .is_err());
        let req = SubmissionRequest::new("n", "q", "d")
            .with_array_size(MAX_ARRAY_SIZE)
            .unwrap();
        assert_eq!(req.array_size(), Some(MAX_ARRAY_SIZE));
    }

    #[test]
    fn test_single_dependency() {
        let req = SubmissionRequest::new("n", "q", "d")
            .with_dependency(JobId::new("a"))
            .with_dependency(JobId::new("b"));
        assert_eq!(req.depends_on.len(), 1);
        assert_eq!(req.depends_on_job_id().unwrap().as_str(), "b");
    }

    #[test]
    fn test_parameter_overwrites_same_name() {
        let req = SubmissionRequest::new("n", "q", "d")
            .with_parameter("RUN_ID", "a")
            .with_parameter("RUN_ID", "b");
        assert_eq!(req.parameter("RUN_ID"), Some("b"));
        assert_eq!(req.container_overrides.unwrap().environment.len(), 1);
    }

    #[test]
    fn test_empty_resources_add_nothing() {
        let req =
            SubmissionRequest::new("n", "q", "d").with_resources(&ResourceOverrides::default());
        assert!(req.container_overrides.is_none());
    }

    #[test]
    fn test_response_parsing() {
        let resp: SubmitJobResponse = serde_json::from_value(json!({
            "jobId": "876da822-4198-45f2-a252-6cea32512ea8",
            "jobName": "n",
            "jobArn": "arn:aws:batch:us-east-1:123456789012:job/876da822"
        }))
        .unwrap();
        assert_eq!(resp.job_id.as_str(), "876da822-4198-45f2-a252-6cea32512ea8");

        let missing = serde_json::from_value::<SubmitJobResponse>(json!({ "jobName": "n" }));
        assert!(missing.is_err());
    }
}
