//! # Processing Orchestrator
//!
//! Drives one processing run from start request to terminal report:
//!
//! 1. validate weights and ask the backend to start the run
//! 2. plan batches over the CV ids the backend returned
//! 3. fan the batches out with retry, updating progress as each settles
//! 4. summarize, then issue the finish call (skipped when cancelled)
//!
//! Batch failures never abort a run. Errors returned from
//! [`ProcessingOrchestrator::start_processing`] all happen before the first
//! batch is dispatched: invalid weights, an empty selection, a conflict with
//! an already active run, or a run that is no longer startable.

use chrono::Utc;
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};

use super::batch_executor::BatchExecutor;
use super::batch_planner::BatchPlanner;
use super::concurrency_controller::ConcurrencyController;
use super::event_publisher::{EventPublisher, PublishedEvent, RunEvent};
use super::progress::{ProcessingProgress, ProgressTracker};
use super::result_aggregator::{
    Finalization, ProcessingReport, ProcessingSummary, ResultAggregator,
};
use super::retry::{RetryPolicy, Sleeper};
use crate::client::{BackendApiClient, BatchWorker, ProcessingBackend, WorkerApiClient};
use crate::config::ProcessingConfig;
use crate::constants::operations;
use crate::error::{ProcessingError, ProcessingResult};
use crate::logging::{log_batch_operation, log_error, log_processing_operation};
use crate::models::{
    BatchResult, ExportFormat, ProcessingJob, ProcessingRequest, ProcessingResults, ResultsQuery,
    RunContext, StartProcessingResponse,
};
use crate::state_machine::{transition, ProcessingEvent, ProcessingStatus};
use crate::validation::validate_identifier;

pub struct ProcessingOrchestrator {
    backend: Arc<dyn ProcessingBackend>,
    planner: BatchPlanner,
    executor: BatchExecutor,
    controller: ConcurrencyController,
    aggregator: ResultAggregator,
    events: EventPublisher,
    /// Cancellation tokens of runs in flight, keyed by job id
    active_runs: Mutex<HashMap<String, CancellationToken>>,
    /// Counters of every run driven here, kept after the run settles
    progress: RwLock<HashMap<String, ProgressTracker>>,
}

impl std::fmt::Debug for ProcessingOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcessingOrchestrator")
            .field("planner", &self.planner)
            .field("executor", &self.executor)
            .field("controller", &self.controller)
            .field("active_runs", &self.active_runs.lock().len())
            .finish_non_exhaustive()
    }
}

impl ProcessingOrchestrator {
    /// Build HTTP clients for the configured backend and worker
    pub fn from_config(config: &ProcessingConfig) -> ProcessingResult<Self> {
        config.validate()?;
        let backend = Arc::new(BackendApiClient::new(&config.api)?);
        let worker = Arc::new(WorkerApiClient::new(&config.worker, &config.api)?);
        Ok(Self::new(backend, worker, config))
    }

    pub fn new(
        backend: Arc<dyn ProcessingBackend>,
        worker: Arc<dyn BatchWorker>,
        config: &ProcessingConfig,
    ) -> Self {
        Self {
            backend: Arc::clone(&backend),
            planner: BatchPlanner::new(config.batching),
            executor: BatchExecutor::new(worker, RetryPolicy::from(&config.retry)),
            controller: ConcurrencyController::from_limit(config.concurrency.limit()),
            aggregator: ResultAggregator::new(backend),
            events: EventPublisher::new(),
            active_runs: Mutex::new(HashMap::new()),
            progress: RwLock::new(HashMap::new()),
        }
    }

    /// Replace the clock used between retry attempts
    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.executor = self.executor.using_sleeper(sleeper);
        self
    }

    /// Snapshot of a run's progress, `None` if it was never driven here
    pub fn progress(&self, job_id: &str) -> Option<ProcessingProgress> {
        self.progress.read().get(job_id).map(ProgressTracker::snapshot)
    }

    pub fn progress_tracker(&self, job_id: &str) -> Option<ProgressTracker> {
        self.progress.read().get(job_id).cloned()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PublishedEvent> {
        self.events.subscribe()
    }

    pub fn is_running(&self, job_id: &str) -> bool {
        self.active_runs.lock().contains_key(job_id)
    }

    /// The posting's pending or processing run, if the backend has one
    pub async fn active_processing(
        &self,
        posting_id: &str,
    ) -> ProcessingResult<Option<ProcessingJob>> {
        self.backend.active_processing(posting_id).await
    }

    /// One page of a run's scored CVs
    pub async fn processing_results(
        &self,
        job_id: &str,
        query: &ResultsQuery,
    ) -> ProcessingResult<ProcessingResults> {
        validate_identifier("processing_id", job_id)?;
        self.backend.get_processing_results(job_id, query).await
    }

    /// A run's results as a CSV or Excel file
    pub async fn export_results(
        &self,
        job_id: &str,
        format: ExportFormat,
    ) -> ProcessingResult<Vec<u8>> {
        validate_identifier("processing_id", job_id)?;
        self.backend.export_processing_results(job_id, format).await
    }

    /// Start a run on the backend and drive it to completion
    #[instrument(skip(self, request), fields(posting_id = %request.posting_id))]
    pub async fn start_processing(
        &self,
        request: ProcessingRequest,
    ) -> ProcessingResult<ProcessingReport> {
        let start_request = request.to_start_request(Utc::now())?;

        log_processing_operation(
            operations::START,
            None,
            Some(&request.posting_id),
            "requested",
            Some(&request.weights.to_string()),
        );

        let started = match self.backend.start_processing(&start_request).await {
            Ok(started) => started,
            Err(error) if error.is_conflict() => {
                warn!(
                    posting_id = %request.posting_id,
                    error = %error,
                    "Processing already active for posting, not starting"
                );
                return Err(error);
            }
            Err(error) => {
                log_error(
                    "processing_orchestrator",
                    operations::START,
                    &error.to_string(),
                    Some(&request.posting_id),
                );
                return Err(error);
            }
        };

        if let Some(message) = &started.message {
            info!(job_id = %started.processing_id, message = %message, "Backend started processing");
        }

        self.run_processing(started).await
    }

    /// Drive a run the backend has already started
    #[instrument(skip(self, started), fields(job_id = %started.processing_id, posting_id = %started.ddc_id))]
    pub async fn run_processing(
        &self,
        started: StartProcessingResponse,
    ) -> ProcessingResult<ProcessingReport> {
        if !started.status.is_startable() {
            return Err(ProcessingError::NotStartable {
                job_id: started.processing_id,
                status: started.status,
            });
        }
        validate_identifier("processing_id", &started.processing_id)?;
        started.weights.validate()?;

        let started_at = Utc::now();
        let context = Arc::new(RunContext::new(
            started.processing_id.as_str(),
            started.ddc_id.as_str(),
        ));
        let job_id = context.job_id.clone();
        let mut status = advance(started.status, &ProcessingEvent::Start);

        let batches = self.planner.plan(&started.cv_ids, started.weights);
        let total_batches = batches.len();
        let registration = self.register_run(&job_id)?;
        let cancel = registration.token.clone();

        let progress = ProgressTracker::new();
        progress.begin(started.cv_ids.len(), total_batches);
        self.progress.write().insert(job_id.clone(), progress.clone());

        self.events.publish(RunEvent::RunStarted {
            job_id: job_id.clone(),
            posting_id: context.posting_id.clone(),
            total_cvs: started.cv_ids.len(),
            total_batches,
            started_at,
        });
        log_processing_operation(
            operations::PLAN,
            Some(&job_id),
            Some(&context.posting_id),
            status.as_str(),
            Some(&format!(
                "{} CVs in {total_batches} batches",
                started.cv_ids.len()
            )),
        );

        let results = self
            .controller
            .run_all(
                &self.executor,
                Arc::clone(&context),
                batches,
                &cancel,
                |result| self.on_batch_settled(&job_id, total_batches, &progress, result),
            )
            .await;

        let cancelled = cancel.is_cancelled();
        drop(registration);

        let summary = self.aggregator.summarize(&results);

        let finalization = if cancelled {
            Finalization::Skipped
        } else {
            self.aggregator.finalize(&job_id).await
        };

        status = match &finalization {
            Finalization::Skipped => advance(status, &ProcessingEvent::Cancel),
            Finalization::Finished if summary.total_batches > 0 && summary.succeeded_batches == 0 => {
                advance(status, &ProcessingEvent::Fail("every batch failed".to_string()))
            }
            Finalization::Finished => advance(status, &ProcessingEvent::Finish),
            // backend still holds the run as processing
            Finalization::Failed(_) => status,
        };

        progress.finish();
        self.publish_outcome(&job_id, summary, &finalization);

        let report = ProcessingReport {
            job_id,
            posting_id: context.posting_id.clone(),
            summary,
            finalization,
            cancelled,
            final_status: status,
            started_at,
            completed_at: Utc::now(),
        };

        log_processing_operation(
            operations::FINISH,
            Some(&report.job_id),
            Some(&report.posting_id),
            report.final_status.as_str(),
            Some(&report.to_string()),
        );

        Ok(report)
    }

    /// Cancel a pending or processing run
    ///
    /// The backend is told to cancel the run first. Only once it accepts are
    /// the in-flight batches of a run driven by this orchestrator aborted, so
    /// a refused cancel leaves the run going and finishing normally.
    #[instrument(skip(self))]
    pub async fn cancel(&self, job_id: &str) -> ProcessingResult<()> {
        validate_identifier("processing_id", job_id)?;
        let job = self.backend.get_processing(job_id).await?;
        if !job.status.can_cancel() {
            return Err(ProcessingError::NotCancellable {
                job_id: job_id.to_string(),
                status: job.status,
            });
        }

        if let Err(error) = self.backend.cancel_processing(job_id).await {
            log_error(
                "processing_orchestrator",
                operations::CANCEL,
                &error.to_string(),
                Some(job_id),
            );
            return Err(error);
        }

        let token = self.active_runs.lock().get(job_id).cloned();
        if let Some(token) = token {
            token.cancel();
        }

        log_processing_operation(
            operations::CANCEL,
            Some(job_id),
            Some(&job.ddc_id),
            ProcessingStatus::Cancelled.as_str(),
            None,
        );
        Ok(())
    }

    fn register_run(&self, job_id: &str) -> ProcessingResult<RunRegistration<'_>> {
        let mut runs = self.active_runs.lock();
        if runs.contains_key(job_id) {
            return Err(ProcessingError::Internal(format!(
                "processing {job_id} is already being driven by this orchestrator"
            )));
        }
        let token = CancellationToken::new();
        runs.insert(job_id.to_string(), token.clone());
        Ok(RunRegistration {
            runs: &self.active_runs,
            job_id: job_id.to_string(),
            token,
        })
    }

    fn on_batch_settled(
        &self,
        job_id: &str,
        total_batches: usize,
        progress: &ProgressTracker,
        result: &BatchResult,
    ) {
        progress.record(result);

        if result.is_success() {
            log_batch_operation(
                operations::EXECUTE_BATCH,
                job_id,
                result.batch_index,
                total_batches,
                "succeeded",
                None,
            );
            self.events.publish(RunEvent::BatchSucceeded {
                job_id: job_id.to_string(),
                batch_index: result.batch_index,
                total_batches,
                processed_count: result.processed_count(),
                failed_count: result.failed_count(),
            });
        } else {
            let error = result.error().unwrap_or_default().to_string();
            log_batch_operation(
                operations::EXECUTE_BATCH,
                job_id,
                result.batch_index,
                total_batches,
                "failed",
                Some(&error),
            );
            self.events.publish(RunEvent::BatchFailed {
                job_id: job_id.to_string(),
                batch_index: result.batch_index,
                total_batches,
                error,
            });
        }
    }

    fn publish_outcome(&self, job_id: &str, summary: ProcessingSummary, finalization: &Finalization) {
        match finalization {
            Finalization::Skipped => {
                self.events.publish(RunEvent::RunCancelled {
                    job_id: job_id.to_string(),
                    summary,
                });
            }
            Finalization::Finished => {
                self.events.publish(RunEvent::RunCompleted {
                    job_id: job_id.to_string(),
                    summary,
                    completed_at: Utc::now(),
                });
            }
            Finalization::Failed(reason) => {
                self.events.publish(RunEvent::RunCompleted {
                    job_id: job_id.to_string(),
                    summary,
                    completed_at: Utc::now(),
                });
                self.events.publish(RunEvent::FinalizationFailed {
                    job_id: job_id.to_string(),
                    reason: reason.clone(),
                });
            }
        }
    }
}

/// Entry in `active_runs` for the lifetime of one `run_processing` call
///
/// Dropping it, including when the caller drops the run future, removes the
/// entry and cancels any batches still in flight.
struct RunRegistration<'a> {
    runs: &'a Mutex<HashMap<String, CancellationToken>>,
    job_id: String,
    token: CancellationToken,
}

impl Drop for RunRegistration<'_> {
    fn drop(&mut self) {
        self.runs.lock().remove(&self.job_id);
        self.token.cancel();
    }
}

/// Apply `event`, staying put when the lifecycle does not allow it
fn advance(current: ProcessingStatus, event: &ProcessingEvent) -> ProcessingStatus {
    transition(current, event).unwrap_or(current)
}
