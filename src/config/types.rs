use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub queue: QueueConfig,

    #[serde(default)]
    pub audit: AuditConfig,

    #[serde(default)]
    pub stages: StagesConfig,

    #[serde(default)]
    pub render: RenderConfig,

    #[serde(default)]
    pub encode: EncodeConfig,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct QueueConfig {
    /// Base URL of the job-submission API
    #[serde(default)]
    pub endpoint: Option<String>,

    /// Bearer token sent with every submission
    #[serde(default)]
    pub api_key: Option<String>,

    /// Per-request timeout. Unset means the HTTP client's own default.
    #[serde(default)]
    pub request_timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AuditConfig {
    /// No default: running a stage without choosing one is an error.
    #[serde(default)]
    pub backend: Option<AuditBackend>,

    /// Base URL of the key/value store API (http backend only)
    #[serde(default)]
    pub endpoint: Option<String>,

    /// Bearer token for the key/value store API
    #[serde(default)]
    pub api_key: Option<String>,

    /// Per-request timeout for the key/value store API
    #[serde(default)]
    pub request_timeout_secs: Option<u64>,

    /// Exit non-zero when any audit record could not be written
    #[serde(default)]
    pub strict: bool,
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AuditBackend {
    /// `JOB_TABLE` is the absolute path of a SQLite file on shared storage
    Sqlite,
    /// `JOB_TABLE` is a table name on a key/value store HTTP API
    Http,
    /// Records are kept in process memory and dropped on exit
    Memory,
}

impl std::fmt::Display for AuditBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sqlite => write!(f, "sqlite"),
            Self::Http => write!(f, "http"),
            Self::Memory => write!(f, "memory"),
        }
    }
}

/// Where downstream jobs are submitted.
///
/// `defaults` applies to both stages; values set on a stage win field by
/// field. Queue and definition given in the environment win over both.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct StagesConfig {
    #[serde(default)]
    pub defaults: JobTarget,

    #[serde(default)]
    pub render: JobTarget,

    #[serde(default)]
    pub encode: JobTarget,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct JobTarget {
    #[serde(default)]
    pub queue: Option<String>,

    #[serde(default)]
    pub definition: Option<String>,

    #[serde(default, flatten)]
    pub resources: ResourceOverrides,
}

impl JobTarget {
    /// Layer `explicit` over `self`; any field `explicit` sets wins.
    #[must_use]
    pub fn merge(&self, explicit: &JobTarget) -> JobTarget {
        JobTarget {
            queue: explicit.queue.clone().or_else(|| self.queue.clone()),
            definition: explicit
                .definition
                .clone()
                .or_else(|| self.definition.clone()),
            resources: self.resources.merge(&explicit.resources),
        }
    }
}

/// Container resources requested at submission time instead of the values
/// baked into the job definition.
#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct ResourceOverrides {
    #[serde(default)]
    pub vcpus: Option<u32>,

    #[serde(default)]
    pub memory_mib: Option<u32>,

    #[serde(default)]
    pub gpus: Option<u32>,
}

impl ResourceOverrides {
    /// Layer `explicit` over `self`; any field `explicit` sets wins.
    #[must_use]
    pub fn merge(&self, explicit: &ResourceOverrides) -> ResourceOverrides {
        ResourceOverrides {
            vcpus: explicit.vcpus.or(self.vcpus),
            memory_mib: explicit.memory_mib.or(self.memory_mib),
            gpus: explicit.gpus.or(self.gpus),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.vcpus.is_none() && self.memory_mib.is_none() && self.gpus.is_none()
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RenderConfig {
    #[serde(default)]
    pub numbering: FrameNumbering,

    /// File extension of rendered frames (default: "jpg")
    #[serde(default = "default_output_extension")]
    pub output_extension: String,
}

fn default_output_extension() -> String {
    "jpg".to_string()
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            numbering: FrameNumbering::default(),
            output_extension: default_output_extension(),
        }
    }
}

/// How a render slot numbers the frames it produces.
#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FrameNumbering {
    /// `(local + 1) * (index + 1)`. Compatible with existing consumers, but
    /// positions repeat across slots (slot 0 frame 2 and slot 1 frame 1 are
    /// both 2).
    #[default]
    Legacy,
    /// `index * units_per_slot + local + 1`; unique across the run.
    Contiguous,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EncodeConfig {
    /// File name of the combined artifact (default: "video.mp4")
    #[serde(default = "default_artifact_name")]
    pub artifact_name: String,
}

fn default_artifact_name() -> String {
    "video.mp4".to_string()
}

impl Default for EncodeConfig {
    fn default() -> Self {
        Self {
            artifact_name: default_artifact_name(),
        }
    }
}
