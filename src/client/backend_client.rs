//! # Backend API Client
//!
//! `reqwest` client for the processing endpoints of the REST backend.

use async_trait::async_trait;
use reqwest::{Response, StatusCode, Url};
use serde::de::DeserializeOwned;
use tracing::{debug, instrument, warn};

use super::traits::ProcessingBackend;
use super::{build_http_client, error_message, parse_base_url};
use crate::config::{ApiConfig, ConfigResult};
use crate::constants::endpoints;
use crate::error::{ProcessingError, ProcessingResult};
use crate::models::{
    ExportFormat, ProcessingJob, ProcessingResults, ResultsQuery, StartProcessingRequest,
    StartProcessingResponse,
};

#[derive(Debug, Clone)]
pub struct BackendApiClient {
    client: reqwest::Client,
    base_url: Url,
}

impl BackendApiClient {
    pub fn new(config: &ApiConfig) -> ConfigResult<Self> {
        Ok(Self {
            client: build_http_client(config.timeout(), config.bearer_token())?,
            base_url: parse_base_url("api.base_url", &config.base_url)?,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn url(&self, path: &str) -> ProcessingResult<Url> {
        self.base_url
            .join(path)
            .map_err(|e| ProcessingError::Internal(format!("invalid endpoint path {path}: {e}")))
    }

    fn processing_url(&self, job_id: &str, action: Option<&str>) -> ProcessingResult<Url> {
        let path = match action {
            Some(action) => format!("{}/{job_id}/{action}", endpoints::PROCESSING),
            None => format!("{}/{job_id}", endpoints::PROCESSING),
        };
        self.url(&path)
    }

    /// Map a non-2xx response to an API error
    async fn check(response: Response) -> ProcessingResult<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(ProcessingError::api_error(
            status.as_u16(),
            error_message(status, &body),
        ))
    }

    async fn decode<T: DeserializeOwned>(response: Response, what: &str) -> ProcessingResult<T> {
        response
            .json::<T>()
            .await
            .map_err(|e| ProcessingError::invalid_response(what, e.to_string()))
    }
}

#[async_trait]
impl ProcessingBackend for BackendApiClient {
    #[instrument(skip(self, request), fields(posting_id = %request.ddc_id))]
    async fn start_processing(
        &self,
        request: &StartProcessingRequest,
    ) -> ProcessingResult<StartProcessingResponse> {
        let response = self
            .client
            .post(self.url(endpoints::START_PROCESSING)?)
            .json(request)
            .send()
            .await?;

        if response.status() == StatusCode::CONFLICT {
            let body = response.text().await.unwrap_or_default();
            let message = error_message(StatusCode::CONFLICT, &body);
            warn!(posting_id = %request.ddc_id, message = %message, "Processing already active");
            return Err(ProcessingError::AlreadyActive {
                posting_id: request.ddc_id.clone(),
                message,
            });
        }

        let started: StartProcessingResponse =
            Self::decode(Self::check(response).await?, "start_processing").await?;
        debug!(
            job_id = %started.processing_id,
            cv_count = started.cv_count,
            status = %started.status,
            "Backend accepted processing start"
        );
        Ok(started)
    }

    #[instrument(skip(self))]
    async fn finish_processing(&self, job_id: &str) -> ProcessingResult<()> {
        let response = self
            .client
            .post(self.processing_url(job_id, Some("finish"))?)
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn get_processing(&self, job_id: &str) -> ProcessingResult<ProcessingJob> {
        let response = self
            .client
            .get(self.processing_url(job_id, None)?)
            .send()
            .await?;
        Self::decode(Self::check(response).await?, "processing").await
    }

    #[instrument(skip(self))]
    async fn cancel_processing(&self, job_id: &str) -> ProcessingResult<()> {
        let response = self
            .client
            .post(self.processing_url(job_id, Some("cancel"))?)
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn list_processings(&self, posting_id: &str) -> ProcessingResult<Vec<ProcessingJob>> {
        let path = format!("{}/{posting_id}/processings", endpoints::DDCS);
        let response = self.client.get(self.url(&path)?).send().await?;
        Self::decode(Self::check(response).await?, "processings").await
    }

    #[instrument(skip(self, query))]
    async fn get_processing_results(
        &self,
        job_id: &str,
        query: &ResultsQuery,
    ) -> ProcessingResult<ProcessingResults> {
        let mut url = self.processing_url(job_id, Some("results"))?;
        let pairs = query.to_pairs();
        if !pairs.is_empty() {
            url.query_pairs_mut().extend_pairs(pairs);
        }

        let response = self.client.get(url).send().await?;
        let page: ProcessingResults =
            Self::decode(Self::check(response).await?, "processing_results").await?;
        debug!(job_id, returned = page.results.len(), total = page.total, "Fetched processing results");
        Ok(page)
    }

    #[instrument(skip(self))]
    async fn export_processing_results(
        &self,
        job_id: &str,
        format: ExportFormat,
    ) -> ProcessingResult<Vec<u8>> {
        let path = format!("{}/{job_id}/{format}", endpoints::EXPORT_PROCESSING);
        let response = self.client.get(self.url(&path)?).send().await?;
        let bytes = Self::check(response).await?.bytes().await?;
        Ok(bytes.to_vec())
    }
}
