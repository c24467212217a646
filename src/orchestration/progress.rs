//! # Run Progress
//!
//! In-memory counters for the run in flight. The orchestrator is the only
//! writer; callers take snapshots to render progress.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::models::BatchResult;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessingProgress {
    pub is_processing: bool,
    pub total_cvs: usize,
    pub total_batches: usize,
    pub completed_batches: usize,
    pub failed_batches: usize,
    pub processed_cvs: usize,
    pub failed_cvs: usize,
}

impl ProcessingProgress {
    pub fn settled_batches(&self) -> usize {
        self.completed_batches + self.failed_batches
    }

    /// Settled batches as a percentage, 0 before planning and 100 for an empty run
    pub fn percent_complete(&self) -> f64 {
        if self.total_batches == 0 {
            return if self.is_processing { 0.0 } else { 100.0 };
        }
        self.settled_batches() as f64 * 100.0 / self.total_batches as f64
    }
}

/// Shared handle to a [`ProcessingProgress`]
#[derive(Debug, Clone, Default)]
pub struct ProgressTracker {
    inner: Arc<RwLock<ProcessingProgress>>,
}

impl ProgressTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reset for a new run
    pub fn begin(&self, total_cvs: usize, total_batches: usize) {
        *self.inner.write() = ProcessingProgress {
            is_processing: true,
            total_cvs,
            total_batches,
            ..ProcessingProgress::default()
        };
    }

    pub fn record(&self, result: &BatchResult) {
        let mut progress = self.inner.write();
        if result.is_success() {
            progress.completed_batches += 1;
            progress.processed_cvs += result.processed_count();
            progress.failed_cvs += result.failed_count();
        } else {
            progress.failed_batches += 1;
        }
    }

    pub fn finish(&self) {
        self.inner.write().is_processing = false;
    }

    pub fn snapshot(&self) -> ProcessingProgress {
        *self.inner.read()
    }
}
