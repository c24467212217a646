//! # Result Aggregator
//!
//! Folds settled batch results into a [`ProcessingSummary`] and issues the
//! backend finish call. A failed finish call is kept apart from failed
//! batches: it becomes [`Finalization::Failed`] and the summary stays valid.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use tracing::{info, instrument, warn};

use crate::client::ProcessingBackend;
use crate::error::{ProcessingError, ProcessingResult};
use crate::models::BatchResult;
use crate::state_machine::ProcessingStatus;

/// Aggregate counts for one run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessingSummary {
    pub total_batches: usize,
    pub succeeded_batches: usize,
    pub failed_batches: usize,
    /// CVs scored, summed over successful batches only
    pub processed: usize,
    /// CVs the worker reported as failed inside successful batches
    pub failed: usize,
}

impl ProcessingSummary {
    /// Summarize results keyed by batch index
    ///
    /// Results arrive in completion order; a repeated index keeps its last result.
    pub fn from_results(results: &[BatchResult]) -> Self {
        let by_index: BTreeMap<usize, &BatchResult> =
            results.iter().map(|r| (r.batch_index, r)).collect();

        by_index
            .values()
            .fold(Self::default(), |mut summary, result| {
                summary.total_batches += 1;
                if result.is_success() {
                    summary.succeeded_batches += 1;
                    summary.processed += result.processed_count();
                    summary.failed += result.failed_count();
                } else {
                    summary.failed_batches += 1;
                }
                summary
            })
    }

    /// Fraction of batches that succeeded; an empty run counts as fully successful
    pub fn success_rate(&self) -> f64 {
        if self.total_batches == 0 {
            1.0
        } else {
            self.succeeded_batches as f64 / self.total_batches as f64
        }
    }

    pub fn all_succeeded(&self) -> bool {
        self.failed_batches == 0
    }
}

impl fmt::Display for ProcessingSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{} batches succeeded ({:.1}%), {} CVs processed, {} failed",
            self.succeeded_batches,
            self.total_batches,
            self.success_rate() * 100.0,
            self.processed,
            self.failed
        )
    }
}

/// What happened to the backend finish call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "reason", rename_all = "snake_case")]
pub enum Finalization {
    Finished,
    Failed(String),
    /// Not attempted, the run was cancelled
    Skipped,
}

impl Finalization {
    pub fn is_finished(&self) -> bool {
        matches!(self, Self::Finished)
    }
}

/// Terminal report of one run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessingReport {
    pub job_id: String,
    pub posting_id: String,
    pub summary: ProcessingSummary,
    pub finalization: Finalization,
    pub cancelled: bool,
    /// Status the run reached as seen by this client
    pub final_status: ProcessingStatus,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
}

impl ProcessingReport {
    /// Surface a failed finish call as an error
    ///
    /// Batch failures never make this fail; only the status transition does.
    pub fn ensure_finalized(&self) -> ProcessingResult<()> {
        match &self.finalization {
            Finalization::Failed(reason) => Err(ProcessingError::FinalizationFailed {
                job_id: self.job_id.clone(),
                reason: reason.clone(),
            }),
            Finalization::Finished | Finalization::Skipped => Ok(()),
        }
    }

    pub fn duration(&self) -> chrono::Duration {
        self.completed_at - self.started_at
    }
}

impl fmt::Display for ProcessingReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Processing {}: {}", self.job_id, self.summary)?;
        match &self.finalization {
            Finalization::Finished => Ok(()),
            Finalization::Failed(reason) => write!(f, " (could not mark finished: {reason})"),
            Finalization::Skipped => write!(f, " (cancelled)"),
        }
    }
}

pub struct ResultAggregator {
    backend: Arc<dyn ProcessingBackend>,
}

impl fmt::Debug for ResultAggregator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResultAggregator").finish_non_exhaustive()
    }
}

impl ResultAggregator {
    pub fn new(backend: Arc<dyn ProcessingBackend>) -> Self {
        Self { backend }
    }

    pub fn summarize(&self, results: &[BatchResult]) -> ProcessingSummary {
        ProcessingSummary::from_results(results)
    }

    /// Issue the finish call once every batch has settled
    ///
    /// Any failure, including "already finished", maps to [`Finalization::Failed`].
    #[instrument(skip(self))]
    pub async fn finalize(&self, job_id: &str) -> Finalization {
        match self.backend.finish_processing(job_id).await {
            Ok(()) => {
                info!(job_id = %job_id, "Processing marked as finished");
                Finalization::Finished
            }
            Err(error) => {
                warn!(job_id = %job_id, error = %error, "Failed to mark processing as finished");
                Finalization::Failed(error.to_string())
            }
        }
    }
}
