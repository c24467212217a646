//! # Run Event Publisher
//!
//! Broadcasts per-batch and terminal notifications of a processing run.
//! Publishing never blocks and never fails: with no subscriber the event is
//! dropped, and a lagging subscriber loses the oldest events.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::trace;
use uuid::Uuid;

use super::result_aggregator::ProcessingSummary;
use crate::constants::defaults;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RunEvent {
    RunStarted {
        job_id: String,
        posting_id: String,
        total_cvs: usize,
        total_batches: usize,
        started_at: DateTime<Utc>,
    },
    BatchSucceeded {
        job_id: String,
        batch_index: usize,
        total_batches: usize,
        processed_count: usize,
        failed_count: usize,
    },
    BatchFailed {
        job_id: String,
        batch_index: usize,
        total_batches: usize,
        error: String,
    },
    RunCompleted {
        job_id: String,
        summary: ProcessingSummary,
        completed_at: DateTime<Utc>,
    },
    /// Batches settled but the finish call did not go through
    FinalizationFailed { job_id: String, reason: String },
    RunCancelled {
        job_id: String,
        summary: ProcessingSummary,
    },
}

impl RunEvent {
    pub fn job_id(&self) -> &str {
        match self {
            Self::RunStarted { job_id, .. }
            | Self::BatchSucceeded { job_id, .. }
            | Self::BatchFailed { job_id, .. }
            | Self::RunCompleted { job_id, .. }
            | Self::FinalizationFailed { job_id, .. }
            | Self::RunCancelled { job_id, .. } => job_id,
        }
    }

    pub fn event_type(&self) -> &'static str {
        match self {
            Self::RunStarted { .. } => "run_started",
            Self::BatchSucceeded { .. } => "batch_succeeded",
            Self::BatchFailed { .. } => "batch_failed",
            Self::RunCompleted { .. } => "run_completed",
            Self::FinalizationFailed { .. } => "finalization_failed",
            Self::RunCancelled { .. } => "run_cancelled",
        }
    }
}

/// An event stamped with the publisher's correlation id
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublishedEvent {
    pub correlation_id: String,
    pub published_at: DateTime<Utc>,
    pub event: RunEvent,
}

#[derive(Debug, Clone)]
pub struct EventPublisher {
    sender: broadcast::Sender<PublishedEvent>,
    correlation_id: String,
}

impl Default for EventPublisher {
    fn default() -> Self {
        Self::new()
    }
}

impl EventPublisher {
    pub fn new() -> Self {
        Self::with_capacity(defaults::EVENT_BUFFER_SIZE)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            sender,
            correlation_id: Uuid::new_v4().to_string(),
        }
    }

    pub fn correlation_id(&self) -> &str {
        &self.correlation_id
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PublishedEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    pub fn publish(&self, event: RunEvent) {
        trace!(
            event_type = event.event_type(),
            job_id = %event.job_id(),
            correlation_id = %self.correlation_id,
            "Publishing run event"
        );
        // no subscribers is fine
        let _ = self.sender.send(PublishedEvent {
            correlation_id: self.correlation_id.clone(),
            published_at: Utc::now(),
            event,
        });
    }
}
