mod types;

pub use types::*;

use anyhow::{Context, Result};
use std::path::Path;

/// Load configuration from a TOML file
pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;

    let config: Config = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {:?}", path))?;

    validate_config(&config)?;

    Ok(config)
}

/// Load config from default locations or return default config
pub fn load_config_or_default(custom_path: Option<&Path>) -> Result<Config> {
    if let Some(path) = custom_path {
        return load_config(path);
    }

    let default_paths = [
        "./batchflow.toml",
        "~/.config/batchflow/config.toml",
        "/etc/batchflow/config.toml",
    ];

    for path_str in default_paths {
        let path = shellexpand::tilde(path_str);
        let path = Path::new(path.as_ref());
        if path.exists() {
            return load_config(path);
        }
    }

    Ok(Config::default())
}

/// Validate configuration
pub fn validate_config(config: &Config) -> Result<()> {
    if let Some(endpoint) = &config.queue.endpoint {
        check_http_url("queue.endpoint", endpoint)?;
    }

    if config.queue.request_timeout_secs == Some(0) {
        anyhow::bail!("queue.request_timeout_secs cannot be 0");
    }

    match (config.audit.backend, &config.audit.endpoint) {
        (Some(AuditBackend::Http), None) => {
            anyhow::bail!("audit.backend is \"http\" but audit.endpoint is not set")
        }
        (Some(AuditBackend::Http), Some(endpoint)) => {
            check_http_url("audit.endpoint", endpoint)?
        }
        (Some(backend), Some(_)) => {
            tracing::warn!("audit.endpoint is ignored for the {} backend", backend);
        }
        _ => {}
    }

    if config.audit.request_timeout_secs == Some(0) {
        anyhow::bail!("audit.request_timeout_secs cannot be 0");
    }

    for (name, target) in [
        ("defaults", &config.stages.defaults),
        ("render", &config.stages.render),
        ("encode", &config.stages.encode),
    ] {
        if target.resources.vcpus == Some(0) {
            anyhow::bail!("stages.{}.vcpus cannot be 0", name);
        }
        if target.resources.memory_mib == Some(0) {
            anyhow::bail!("stages.{}.memory_mib cannot be 0", name);
        }
    }

    let ext = config.render.output_extension.trim_start_matches('.');
    if ext.is_empty() || ext.contains('/') {
        anyhow::bail!(
            "render.output_extension {:?} is not a file extension",
            config.render.output_extension
        );
    }

    if config.encode.artifact_name.is_empty() || config.encode.artifact_name.contains('/') {
        anyhow::bail!(
            "encode.artifact_name {:?} is not a file name",
            config.encode.artifact_name
        );
    }

    Ok(())
}

/// The audit backend a stage should write to, given `JOB_TABLE`.
///
/// Checked at startup, before any record is written. Dry runs skip it.
pub fn audit_backend(audit: &AuditConfig, table: &str) -> Result<AuditBackend> {
    let backend = audit.backend.context(
        "audit.backend is not set; choose \"sqlite\", \"http\" or \"memory\" in the [audit] section",
    )?;

    if backend == AuditBackend::Sqlite && !Path::new(table).is_absolute() {
        anyhow::bail!(
            "JOB_TABLE {:?} must be an absolute path to the SQLite audit database",
            table
        );
    }

    Ok(backend)
}

fn check_http_url(field: &str, value: &str) -> Result<()> {
    if !(value.starts_with("http://") || value.starts_with("https://")) {
        anyhow::bail!("{} must be an http(s) URL, got {:?}", field, value);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.audit.backend, None);
        assert!(!config.audit.strict);
        assert_eq!(config.render.numbering, FrameNumbering::Legacy);
        assert_eq!(config.render.output_extension, "jpg");
        assert_eq!(config.encode.artifact_name, "video.mp4");
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_load_full_config() {
        let file = write_config(
            r#"
[queue]
endpoint = "https://batch.example.com"
api_key = "secret"

[audit]
backend = "http"
endpoint = "http://kv.example.com"
request_timeout_secs = 5
strict = true

[stages.defaults]
vcpus = 1
memory_mib = 1000

[stages.render]
queue = "render-queue"
definition = "render-def:3"
vcpus = 4
gpus = 1

[stages.encode]
queue = "encode-queue"
definition = "encode-def"

[render]
numbering = "contiguous"
output_extension = "png"

[encode]
artifact_name = "movie.mkv"
"#,
        );

        let config = load_config(file.path()).unwrap();
        assert_eq!(
            config.queue.endpoint.as_deref(),
            Some("https://batch.example.com")
        );
        assert_eq!(config.audit.backend, Some(AuditBackend::Http));
        assert_eq!(config.audit.request_timeout_secs, Some(5));
        assert!(config.audit.strict);
        assert_eq!(config.stages.render.queue.as_deref(), Some("render-queue"));
        assert_eq!(config.stages.render.resources.vcpus, Some(4));
        assert_eq!(config.stages.defaults.resources.memory_mib, Some(1000));
        assert_eq!(config.render.numbering, FrameNumbering::Contiguous);
        assert_eq!(config.render.output_extension, "png");
        assert_eq!(config.encode.artifact_name, "movie.mkv");
    }

    #[test]
    fn test_explicit_override_wins() {
        let defaults = JobTarget {
            queue: Some("shared".into()),
            definition: Some("base-def".into()),
            resources: ResourceOverrides {
                vcpus: Some(1),
                memory_mib: Some(1000),
                gpus: None,
            },
        };
        let render = JobTarget {
            queue: Some("render".into()),
            definition: None,
            resources: ResourceOverrides {
                vcpus: Some(4),
                memory_mib: None,
                gpus: Some(1),
            },
        };

        let merged = defaults.merge(&render);
        assert_eq!(merged.queue.as_deref(), Some("render"));
        assert_eq!(merged.definition.as_deref(), Some("base-def"));
        assert_eq!(
            merged.resources,
            ResourceOverrides {
                vcpus: Some(4),
                memory_mib: Some(1000),
                gpus: Some(1),
            }
        );
    }

    #[test]
    fn test_http_audit_requires_endpoint() {
        let file = write_config("[audit]\nbackend = \"http\"\n");
        let err = load_config(file.path()).unwrap_err();
        assert!(err.to_string().contains("audit.endpoint"));
    }

    #[test]
    fn test_stage_needs_explicit_audit_backend() {
        let err = audit_backend(&AuditConfig::default(), "my-dynamo-table").unwrap_err();
        assert!(err.to_string().contains("audit.backend is not set"));
    }

    #[test]
    fn test_sqlite_audit_needs_absolute_table() {
        let audit = AuditConfig {
            backend: Some(AuditBackend::Sqlite),
            ..Default::default()
        };
        let err = audit_backend(&audit, "job-table").unwrap_err();
        assert!(err.to_string().contains("absolute path"));
        assert_eq!(
            audit_backend(&audit, "/mnt/shared/audit.db").unwrap(),
            AuditBackend::Sqlite
        );

        // Only sqlite treats the table as a path.
        let http = AuditConfig {
            backend: Some(AuditBackend::Http),
            ..Default::default()
        };
        assert_eq!(audit_backend(&http, "job-table").unwrap(), AuditBackend::Http);
    }

    #[test]
    fn test_rejects_zero_audit_timeout() {
        let file = write_config(
            "[audit]\nbackend = \"http\"\nendpoint = \"http://kv\"\nrequest_timeout_secs = 0\n",
        );
        let err = load_config(file.path()).unwrap_err();
        assert!(err.to_string().contains("audit.request_timeout_secs"));
    }

    #[test]
    fn test_rejects_non_http_queue_endpoint() {
        let file = write_config("[queue]\nendpoint = \"batch.example.com\"\n");
        assert!(load_config(file.path()).is_err());
    }

    #[test]
    fn test_rejects_zero_resources() {
        let file = write_config("[stages.render]\nvcpus = 0\n");
        let err = load_config(file.path()).unwrap_err();
        assert!(err.to_string().contains("stages.render.vcpus"));
    }

    #[test]
    fn test_rejects_unknown_numbering() {
        let file = write_config("[render]\nnumbering = \"random\"\n");
        assert!(load_config(file.path()).is_err());
    }

    #[test]
    fn test_missing_file() {
        let result = load_config(Path::new("/nonexistent/batchflow.toml"));
        assert!(result.is_err());
    }
}
