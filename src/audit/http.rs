use crate::audit::record::AuditRecord;
use crate::audit::store::AuditStore;
use crate::config::AuditConfig;
use batchflow_common::{Error, Result};
use reqwest::{Client, StatusCode};
use std::time::Duration;

/// Writes records to a key/value store exposed over HTTP.
///
/// Each record is a conditional create (`If-None-Match: *`), so the store
/// answers `409`/`412` instead of replacing an existing key.
#[derive(Debug)]
pub struct HttpAuditStore {
    client: Client,
    items_url: String,
    api_key: Option<String>,
}

impl HttpAuditStore {
    /// Store for table `table` behind `[audit].endpoint`.
    pub fn new(config: &AuditConfig, table: &str) -> Result<Self> {
        let endpoint = config
            .endpoint
            .as_deref()
            .ok_or_else(|| Error::context("audit.endpoint is not configured"))?;

        let mut builder = Client::builder().user_agent(concat!(
            env!("CARGO_PKG_NAME"),
            "/",
            env!("CARGO_PKG_VERSION")
        ));
        if let Some(secs) = config.request_timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        let client = builder
            .build()
            .map_err(|e| Error::context(format!("Cannot build audit HTTP client: {}", e)))?;

        Ok(Self {
            client,
            items_url: format!("{}/tables/{}/items", endpoint.trim_end_matches('/'), table),
            api_key: config.api_key.clone(),
        })
    }
}

#[async_trait::async_trait]
impl AuditStore for HttpAuditStore {
    async fn append(&self, record: &AuditRecord) -> Result<()> {
        let mut call = self
            .client
            .put(&self.items_url)
            .header("If-None-Match", "*")
            .json(record);
        if let Some(key) = &self.api_key {
            call = call.bearer_auth(key);
        }

        let response = call
            .send()
            .await
            .map_err(|e| Error::audit_write(e.to_string()))?;

        match response.status() {
            status if status.is_success() => Ok(()),
            StatusCode::CONFLICT | StatusCode::PRECONDITION_FAILED => {
                Err(Error::audit_write(format!(
                    "Audit key already exists: {}/{}",
                    record.partition_key, record.sort_key
                )))
            }
            status => {
                let body = response.text().await.unwrap_or_default();
                Err(Error::audit_write(format!("{}: {}", status, body)))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::record::AuditEvent;
    use assert_matches::assert_matches;
    use batchflow_common::Stage;
    use chrono::Utc;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn store_for(server: &MockServer, api_key: Option<&str>) -> HttpAuditStore {
        let config = AuditConfig {
            endpoint: Some(server.uri()),
            api_key: api_key.map(String::from),
            request_timeout_secs: Some(5),
            ..Default::default()
        };
        HttpAuditStore::new(&config, "job-table").unwrap()
    }

    fn record() -> AuditRecord {
        AuditRecord {
            partition_key: "run-r1".into(),
            sort_key: "step-plan_attempt-1_0000000000001_0000".into(),
            pipeline_name: "demo".into(),
            stage: Stage::Plan,
            queue_name: "plan-q".into(),
            recorded_at: Utc::now(),
            event: AuditEvent::CombinedOutputs {
                artifact: "x".into(),
            },
        }
    }

    #[tokio::test]
    async fn test_conditional_put() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/tables/job-table/items"))
            .and(header("if-none-match", "*"))
            .respond_with(ResponseTemplate::new(201))
            .expect(1)
            .mount(&server)
            .await;

        let store = store_for(&server, None);
        store.append(&record()).await.unwrap();
    }

    #[tokio::test]
    async fn test_conflict_is_audit_error() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .respond_with(ResponseTemplate::new(412))
            .mount(&server)
            .await;

        let store = store_for(&server, None);
        assert_matches!(
            store.append(&record()).await,
            Err(Error::AuditWrite(msg)) if msg.contains("already exists")
        );
    }

    #[tokio::test]
    async fn test_server_error_is_audit_error() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .respond_with(ResponseTemplate::new(503).set_body_string("throttled"))
            .mount(&server)
            .await;

        let store = store_for(&server, None);
        assert_matches!(
            store.append(&record()).await,
            Err(Error::AuditWrite(msg)) if msg.contains("throttled")
        );
    }

    #[tokio::test]
    async fn test_api_key_is_sent_as_bearer() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(header("authorization", "Bearer kv-secret"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let store = store_for(&server, Some("kv-secret"));
        store.append(&record()).await.unwrap();
    }

    #[tokio::test]
    async fn test_slow_store_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(3)))
            .mount(&server)
            .await;

        let config = AuditConfig {
            endpoint: Some(server.uri()),
            request_timeout_secs: Some(1),
            ..Default::default()
        };
        let store = HttpAuditStore::new(&config, "job-table").unwrap();
        assert_matches!(store.append(&record()).await, Err(Error::AuditWrite(_)));
    }

    #[test]
    fn test_endpoint_required() {
        let result = HttpAuditStore::new(&AuditConfig::default(), "job-table");
        assert_matches!(result, Err(Error::Context(_)));
    }
}
