//! # Worker API Client
//!
//! Sends one batch of CV ids to the scoring worker's `process-cvs` endpoint.
//! Every failure is reported as a [`WorkerCallError`]; retrying is the batch
//! executor's job.

use async_trait::async_trait;
use reqwest::Url;
use tracing::debug;

use super::traits::BatchWorker;
use super::{build_http_client, error_message, parse_base_url};
use crate::config::{ApiConfig, ConfigResult, ConfigurationError, WorkerConfig};
use crate::constants::endpoints;
use crate::error::WorkerCallError;
use crate::models::{WorkerBatchRequest, WorkerBatchResponse};

#[derive(Debug, Clone)]
pub struct WorkerApiClient {
    client: reqwest::Client,
    endpoint: Url,
}

impl WorkerApiClient {
    /// Build a client for `worker`, authenticated with the API bearer token
    pub fn new(worker: &WorkerConfig, api: &ApiConfig) -> ConfigResult<Self> {
        let base = parse_base_url("worker.url", &worker.url)?;
        let endpoint = base.join(endpoints::WORKER_PROCESS_CVS).map_err(|e| {
            ConfigurationError::invalid_value("worker.url", &worker.url, e.to_string())
        })?;

        Ok(Self {
            client: build_http_client(worker.timeout(), api.bearer_token())?,
            endpoint,
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

#[async_trait]
impl BatchWorker for WorkerApiClient {
    async fn process_batch(
        &self,
        request: &WorkerBatchRequest,
    ) -> Result<WorkerBatchResponse, WorkerCallError> {
        debug!(
            job_id = %request.processing_id,
            batch_index = request.batch_index,
            batch_size = request.cv_ids.len(),
            "Sending batch to worker"
        );

        let response = self
            .client
            .post(self.endpoint.clone())
            .json(request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(WorkerCallError::Status {
                status: status.as_u16(),
                message: error_message(status, &body),
            });
        }

        let body = response.text().await?;
        serde_json::from_str::<WorkerBatchResponse>(&body)
            .map_err(|e| WorkerCallError::MalformedResponse(e.to_string()))
    }
}
