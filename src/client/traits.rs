//! # Client Traits
//!
//! The two remote collaborators of a processing run. The orchestrator only
//! talks to them through these traits, so tests can swap in scripted fakes
//! and the HTTP clients stay thin.

use async_trait::async_trait;

use crate::error::{ProcessingResult, WorkerCallError};
use crate::models::{
    ExportFormat, ProcessingJob, ProcessingResults, ResultsQuery, StartProcessingRequest,
    StartProcessingResponse, WorkerBatchRequest, WorkerBatchResponse,
};

/// REST backend that owns the persisted processing record
#[async_trait]
pub trait ProcessingBackend: Send + Sync {
    /// Create a run for a posting and return its CV ids
    ///
    /// Must return [`ProcessingError::AlreadyActive`](crate::error::ProcessingError::AlreadyActive)
    /// when the posting already has a pending or processing run.
    async fn start_processing(
        &self,
        request: &StartProcessingRequest,
    ) -> ProcessingResult<StartProcessingResponse>;

    /// Move the run out of `processing` once every batch has settled
    async fn finish_processing(&self, job_id: &str) -> ProcessingResult<()>;

    async fn get_processing(&self, job_id: &str) -> ProcessingResult<ProcessingJob>;

    async fn cancel_processing(&self, job_id: &str) -> ProcessingResult<()>;

    /// Every run recorded for a posting, newest first
    async fn list_processings(&self, posting_id: &str) -> ProcessingResult<Vec<ProcessingJob>>;

    /// One page of the run's scored CVs
    async fn get_processing_results(
        &self,
        job_id: &str,
        query: &ResultsQuery,
    ) -> ProcessingResult<ProcessingResults>;

    /// The run's results rendered as a downloadable file
    async fn export_processing_results(
        &self,
        job_id: &str,
        format: ExportFormat,
    ) -> ProcessingResult<Vec<u8>>;

    /// The posting's pending or processing run, if any
    async fn active_processing(&self, posting_id: &str) -> ProcessingResult<Option<ProcessingJob>> {
        Ok(self
            .list_processings(posting_id)
            .await?
            .into_iter()
            .find(ProcessingJob::is_active))
    }
}

/// Remote scoring worker, one call per batch
#[async_trait]
pub trait BatchWorker: Send + Sync {
    async fn process_batch(
        &self,
        request: &WorkerBatchRequest,
    ) -> Result<WorkerBatchResponse, WorkerCallError>;
}
