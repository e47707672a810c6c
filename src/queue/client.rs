use crate::config::QueueConfig;
use crate::queue::{JobQueue, SubmissionRequest, SubmitJobResponse};
use batchflow_common::{Error, JobId, Result};
use reqwest::Client;
use std::time::Duration;

/// Submits jobs to a batch service speaking the `SubmitJob` JSON API.
#[derive(Debug)]
pub struct HttpJobQueue {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

impl HttpJobQueue {
    pub fn new(config: &QueueConfig) -> Result<Self> {
        let endpoint = config
            .endpoint
            .as_deref()
            .ok_or_else(|| Error::context("queue.endpoint is not configured"))?;

        let mut builder = Client::builder().user_agent(concat!(
            env!("CARGO_PKG_NAME"),
            "/",
            env!("CARGO_PKG_VERSION")
        ));
        if let Some(secs) = config.request_timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        let client = builder.build().unwrap_or_else(|e| {
            tracing::warn!("Failed to build HTTP client: {}", e);
            Client::new()
        });

        Ok(Self {
            client,
            base_url: endpoint.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

#[async_trait::async_trait]
impl JobQueue for HttpJobQueue {
    async fn submit(&self, request: &SubmissionRequest) -> Result<JobId> {
        let mut call = self.client.post(self.url("/v1/submitjob")).json(request);
        if let Some(key) = &self.api_key {
            call = call.bearer_auth(key);
        }

        let response = call
            .send()
            .await
            .map_err(|e| Error::submission(&request.job_name, e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::submission(
                &request.job_name,
                format!("{}: {}", status, body),
            ));
        }

        let parsed: SubmitJobResponse = response.json().await.map_err(|e| {
            Error::submission(&request.job_name, format!("Invalid response body: {}", e))
        })?;

        Ok(parsed.job_id)
    }
}
