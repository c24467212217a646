//! # Concurrency Controller
//!
//! Fans a run's batches out to the [`BatchExecutor`] and settles all of them.
//!
//! Each batch runs in its own tokio task. Results are collected in completion
//! order through a `FuturesUnordered`, so one slow or failing batch never
//! holds back the others. With a limit configured, a semaphore permit is
//! taken in planning order before each batch is spawned.

use futures::stream::{FuturesUnordered, StreamExt};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

use super::batch_executor::BatchExecutor;
use crate::models::{Batch, BatchResult, RunContext};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConcurrencyController {
    limit: Option<usize>,
}

impl ConcurrencyController {
    /// Dispatch every batch at once
    pub fn unbounded() -> Self {
        Self { limit: None }
    }

    /// At most `limit` batches in flight; 0 means unbounded
    pub fn bounded(limit: usize) -> Self {
        Self {
            limit: Some(limit).filter(|limit| *limit > 0),
        }
    }

    pub fn from_limit(limit: Option<usize>) -> Self {
        limit.map_or_else(Self::unbounded, Self::bounded)
    }

    pub fn limit(&self) -> Option<usize> {
        self.limit
    }

    /// Run all batches and return one result per batch
    ///
    /// `on_settled` is called as each batch settles, in completion order.
    /// A batch task that panics is reported as a failed result.
    pub async fn run_all<F>(
        &self,
        executor: &BatchExecutor,
        context: Arc<RunContext>,
        batches: Vec<Batch>,
        cancel: &CancellationToken,
        mut on_settled: F,
    ) -> Vec<BatchResult>
    where
        F: FnMut(&BatchResult),
    {
        let total = batches.len();
        let semaphore = self.limit.map(|limit| Arc::new(Semaphore::new(limit)));
        let mut in_flight = FuturesUnordered::new();
        let mut results = Vec::with_capacity(total);

        debug!(
            job_id = %context.job_id,
            total_batches = total,
            limit = ?self.limit,
            "Dispatching batches"
        );

        for batch in batches {
            let permit = match &semaphore {
                Some(semaphore) => loop {
                    tokio::select! {
                        acquired = Arc::clone(semaphore).acquire_owned() => break acquired.ok(),
                        Some(result) = in_flight.next() => {
                            on_settled(&result);
                            results.push(result);
                        }
                    }
                },
                None => None,
            };

            let index = batch.index;
            let size = batch.len();
            let executor = executor.clone();
            let task_context = Arc::clone(&context);
            let cancel = cancel.clone();

            let handle = tokio::spawn(async move {
                let _permit = permit;
                executor.execute_batch(&batch, &task_context, &cancel).await
            });

            in_flight.push(async move {
                match handle.await {
                    Ok(result) => result,
                    Err(join_error) => {
                        error!(
                            batch_index = index,
                            error = %join_error,
                            "Batch task terminated unexpectedly"
                        );
                        BatchResult::failed(
                            index,
                            size,
                            0,
                            format!("batch task terminated unexpectedly: {join_error}"),
                        )
                    }
                }
            });
        }

        while let Some(result) = in_flight.next().await {
            on_settled(&result);
            results.push(result);
        }

        debug!(
            job_id = %context.job_id,
            settled = results.len(),
            "All batches settled"
        );

        results
    }
}
