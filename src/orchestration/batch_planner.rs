//! # Batch Planner
//!
//! Splits a run's CV ids into ordered, contiguous batches.
//!
//! The batch size comes from a [`BatchSizePolicy`] chosen in configuration:
//! a fixed constant suits small postings, a worker fan-out target suits large
//! ones, and the adaptive policy switches between the two at a threshold.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::{ConfigResult, ConfigurationError};
use crate::constants::defaults;
use crate::models::{Batch, WeightFractions};

/// How many CV ids go into each batch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "strategy", rename_all = "snake_case")]
pub enum BatchSizePolicy {
    /// Every batch holds `size` ids (the last one may hold fewer)
    Fixed { size: usize },
    /// `ceil(total / worker_count)`, at least 1, so the run fans out to
    /// roughly `worker_count` worker calls
    Dynamic { worker_count: usize },
    /// `Fixed` up to and including `threshold` ids, `Dynamic` above it
    Adaptive {
        fixed_size: usize,
        worker_count: usize,
        threshold: usize,
    },
}

impl Default for BatchSizePolicy {
    fn default() -> Self {
        Self::Fixed {
            size: defaults::BATCH_SIZE,
        }
    }
}

impl BatchSizePolicy {
    pub fn dynamic_default() -> Self {
        Self::Dynamic {
            worker_count: defaults::WORKER_COUNT,
        }
    }

    pub fn adaptive_default() -> Self {
        Self::Adaptive {
            fixed_size: defaults::BATCH_SIZE,
            worker_count: defaults::WORKER_COUNT,
            threshold: defaults::ADAPTIVE_THRESHOLD,
        }
    }

    pub fn validate(&self) -> ConfigResult<()> {
        match *self {
            Self::Fixed { size } => non_zero("batching.size", size),
            Self::Dynamic { worker_count } => non_zero("batching.worker_count", worker_count),
            Self::Adaptive {
                fixed_size,
                worker_count,
                ..
            } => {
                non_zero("batching.fixed_size", fixed_size)?;
                non_zero("batching.worker_count", worker_count)
            }
        }
    }

    /// Batch size for a run of `total` ids, never below 1
    pub fn batch_size(&self, total: usize) -> usize {
        let size = match *self {
            Self::Fixed { size } => size,
            Self::Dynamic { worker_count } => dynamic_size(total, worker_count),
            Self::Adaptive {
                fixed_size,
                worker_count,
                threshold,
            } => {
                if total <= threshold {
                    fixed_size
                } else {
                    dynamic_size(total, worker_count)
                }
            }
        };
        size.max(1)
    }
}

fn dynamic_size(total: usize, worker_count: usize) -> usize {
    total.div_ceil(worker_count.max(1)).max(1)
}

fn non_zero(field: &str, value: usize) -> ConfigResult<()> {
    if value == 0 {
        return Err(ConfigurationError::invalid_value(
            field,
            "0",
            "must be greater than zero",
        ));
    }
    Ok(())
}

/// Turns a CV id list into batches according to a [`BatchSizePolicy`]
#[derive(Debug, Clone, Copy, Default)]
pub struct BatchPlanner {
    policy: BatchSizePolicy,
}

impl BatchPlanner {
    pub fn new(policy: BatchSizePolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> BatchSizePolicy {
        self.policy
    }

    /// Plan batches for `cv_ids`, preserving their order
    ///
    /// An empty id list yields no batches.
    pub fn plan(&self, cv_ids: &[String], weights: WeightFractions) -> Vec<Batch> {
        let batch_size = self.policy.batch_size(cv_ids.len());
        let batches = chunk(cv_ids, batch_size, weights);

        debug!(
            total_cvs = cv_ids.len(),
            batch_size = batch_size,
            total_batches = batches.len(),
            policy = ?self.policy,
            "Planned processing batches"
        );

        batches
    }
}

/// Contiguous chunks of at most `batch_size` ids
pub fn chunk(cv_ids: &[String], batch_size: usize, weights: WeightFractions) -> Vec<Batch> {
    let batch_size = batch_size.max(1);
    let total_batches = cv_ids.len().div_ceil(batch_size);

    cv_ids
        .chunks(batch_size)
        .enumerate()
        .map(|(index, ids)| Batch {
            index,
            total_batches,
            cv_ids: ids.to_vec(),
            weights,
        })
        .collect()
}
