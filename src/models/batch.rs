use serde::{Deserialize, Serialize};

use super::weights::WeightFractions;

/// Identifies the run a batch belongs to
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RunContext {
    pub job_id: String,
    pub posting_id: String,
}

impl RunContext {
    pub fn new(job_id: impl Into<String>, posting_id: impl Into<String>) -> Self {
        Self {
            job_id: job_id.into(),
            posting_id: posting_id.into(),
        }
    }
}

/// A contiguous slice of the run's CV ids, sent to the worker in one call
#[derive(Debug, Clone, PartialEq)]
pub struct Batch {
    /// Zero-based position in planning order
    pub index: usize,
    pub total_batches: usize,
    pub cv_ids: Vec<String>,
    pub weights: WeightFractions,
}

impl Batch {
    pub fn len(&self) -> usize {
        self.cv_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cv_ids.is_empty()
    }

    /// Human-facing 1-based position ("batch 3 of 13")
    pub fn number(&self) -> usize {
        self.index + 1
    }

    pub fn to_worker_request(&self, context: &RunContext) -> WorkerBatchRequest {
        WorkerBatchRequest {
            processing_id: context.job_id.clone(),
            ddc_id: context.posting_id.clone(),
            cv_ids: self.cv_ids.clone(),
            batch_index: self.index,
            total_batches: self.total_batches,
            weights: self.weights,
        }
    }
}

/// Body of the worker's `POST /process-cvs`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkerBatchRequest {
    pub processing_id: String,
    pub ddc_id: String,
    pub cv_ids: Vec<String>,
    pub batch_index: usize,
    pub total_batches: usize,
    pub weights: WeightFractions,
}

/// Worker-reported counts for one batch
///
/// `failed_count` covers CVs the worker could not score inside an otherwise
/// successful call; those are reported, never retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerBatchResponse {
    pub processed_count: usize,
    #[serde(default)]
    pub failed_count: usize,
}

/// Terminal outcome of a batch after its retry budget
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum BatchOutcome {
    Succeeded {
        processed_count: usize,
        failed_count: usize,
    },
    Failed {
        error: String,
    },
}

/// Outcome of executing one [`Batch`], keyed by its planning index
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchResult {
    pub batch_index: usize,
    /// Number of CVs that were in the batch
    pub batch_size: usize,
    /// Worker calls issued, including the successful one
    pub attempts: u32,
    pub outcome: BatchOutcome,
}

impl BatchResult {
    pub fn succeeded(batch: &Batch, attempts: u32, response: WorkerBatchResponse) -> Self {
        Self {
            batch_index: batch.index,
            batch_size: batch.len(),
            attempts,
            outcome: BatchOutcome::Succeeded {
                processed_count: response.processed_count,
                failed_count: response.failed_count,
            },
        }
    }

    pub fn failed(
        batch_index: usize,
        batch_size: usize,
        attempts: u32,
        error: impl Into<String>,
    ) -> Self {
        Self {
            batch_index,
            batch_size,
            attempts,
            outcome: BatchOutcome::Failed {
                error: error.into(),
            },
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self.outcome, BatchOutcome::Succeeded { .. })
    }

    /// Processed count, zero for failed batches
    pub fn processed_count(&self) -> usize {
        match self.outcome {
            BatchOutcome::Succeeded {
                processed_count, ..
            } => processed_count,
            BatchOutcome::Failed { .. } => 0,
        }
    }

    /// In-batch failed count, zero for failed batches
    pub fn failed_count(&self) -> usize {
        match self.outcome {
            BatchOutcome::Succeeded { failed_count, .. } => failed_count,
            BatchOutcome::Failed { .. } => 0,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match &self.outcome {
            BatchOutcome::Failed { error } => Some(error),
            BatchOutcome::Succeeded { .. } => None,
        }
    }
}
