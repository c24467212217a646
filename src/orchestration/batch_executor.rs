//! # Batch Executor
//!
//! Runs one batch against the worker under a [`RetryPolicy`].
//!
//! `execute_batch` never fails: a batch that exhausts its attempts comes back
//! as a failed [`BatchResult`] carrying the last error, so the caller can keep
//! collecting the other batches. A successful response is final even when the
//! worker reports in-batch failures.

use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, warn};

use super::retry::{RetryPolicy, Sleeper, TokioSleeper};
use crate::client::BatchWorker;
use crate::error::WorkerCallError;
use crate::models::{Batch, BatchResult, RunContext};

#[derive(Clone)]
pub struct BatchExecutor {
    worker: Arc<dyn BatchWorker>,
    policy: RetryPolicy,
    sleeper: Arc<dyn Sleeper>,
}

impl std::fmt::Debug for BatchExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BatchExecutor")
            .field("policy", &self.policy)
            .field("sleeper", &self.sleeper)
            .finish_non_exhaustive()
    }
}

impl BatchExecutor {
    pub fn new(worker: Arc<dyn BatchWorker>, policy: RetryPolicy) -> Self {
        Self::with_sleeper(worker, policy, Arc::new(TokioSleeper))
    }

    pub fn with_sleeper(
        worker: Arc<dyn BatchWorker>,
        policy: RetryPolicy,
        sleeper: Arc<dyn Sleeper>,
    ) -> Self {
        Self {
            worker,
            policy,
            sleeper,
        }
    }

    /// Swap the clock used for backoff waits
    pub fn using_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Execute `batch`, retrying failed calls until the policy is exhausted
    #[instrument(skip_all, fields(job_id = %context.job_id, batch = batch.number(), total_batches = batch.total_batches))]
    pub async fn execute_batch(
        &self,
        batch: &Batch,
        context: &RunContext,
        cancel: &CancellationToken,
    ) -> BatchResult {
        let request = batch.to_worker_request(context);
        let mut attempt: u32 = 0;

        loop {
            attempt += 1;

            let outcome = tokio::select! {
                biased;
                _ = cancel.cancelled() => Err(WorkerCallError::Cancelled),
                response = self.worker.process_batch(&request) => response,
            };

            let error = match outcome {
                Ok(response) => {
                    debug!(
                        attempt = attempt,
                        processed = response.processed_count,
                        failed = response.failed_count,
                        "Batch succeeded"
                    );
                    return BatchResult::succeeded(batch, attempt, response);
                }
                Err(WorkerCallError::Cancelled) => {
                    return BatchResult::failed(
                        batch.index,
                        batch.len(),
                        attempt,
                        WorkerCallError::Cancelled.to_string(),
                    );
                }
                Err(error) => error,
            };

            if !self.policy.should_retry(attempt) {
                warn!(
                    attempts = attempt,
                    error = %error,
                    "Batch failed after exhausting retries"
                );
                return BatchResult::failed(batch.index, batch.len(), attempt, error.to_string());
            }

            let delay = self.policy.delay_after(attempt);
            warn!(
                attempt = attempt,
                max_attempts = self.policy.max_attempts,
                retry_in_ms = delay.as_millis() as u64,
                error = %error,
                "Batch attempt failed, retrying"
            );

            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    return BatchResult::failed(
                        batch.index,
                        batch.len(),
                        attempt,
                        WorkerCallError::Cancelled.to_string(),
                    );
                }
                _ = self.sleeper.sleep(delay) => {}
            }
        }
    }
}
