//! # Processing Error Types
//!
//! Structured errors for starting, running and finalizing a processing run.
//!
//! Batch-level failures are *not* errors: a batch that exhausts its retries is
//! reported as a failed [`BatchResult`](crate::models::BatchResult) and the
//! run carries on. The variants here cover everything that stops a run from
//! starting, or that happens around it.

use thiserror::Error;

use crate::config::ConfigurationError;
use crate::state_machine::ProcessingStatus;

/// Crate-wide result type
pub type ProcessingResult<T> = Result<T, ProcessingError>;

#[derive(Debug, Error)]
pub enum ProcessingError {
    #[error("Invalid weight configuration: {0}")]
    InvalidWeights(String),

    #[error("Planning failed for posting {posting_id}: {reason}")]
    PlanningFailed { posting_id: String, reason: String },

    /// The backend already has a pending or processing run for this posting.
    #[error("A processing run is already active for posting {posting_id}: {message}")]
    AlreadyActive { posting_id: String, message: String },

    #[error("Processing {job_id} is {status} and cannot be started")]
    NotStartable {
        job_id: String,
        status: ProcessingStatus,
    },

    #[error("Processing {job_id} cannot be cancelled while {status}")]
    NotCancellable {
        job_id: String,
        status: ProcessingStatus,
    },

    /// The finish call failed. Batch results of the run remain valid.
    #[error("Failed to mark processing {job_id} as finished: {reason}")]
    FinalizationFailed { job_id: String, reason: String },

    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid response: {field} - {reason}")]
    InvalidResponse { field: String, reason: String },

    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ProcessingError {
    /// Create an API error from an HTTP status and message
    pub fn api_error(status: u16, message: impl Into<String>) -> Self {
        Self::Api {
            status,
            message: message.into(),
        }
    }

    pub fn invalid_response(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidResponse {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// True for the "one active run per posting" rejection
    #[must_use]
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::AlreadyActive { .. })
    }

    /// Check if error is recoverable (worth retrying by the caller)
    ///
    /// Conflicts, validation and state errors are never recoverable.
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::Http(e) => e.is_timeout() || e.is_connect(),
            Self::Api { status, .. } => *status >= 500,
            Self::FinalizationFailed { .. } => true,
            _ => false,
        }
    }
}

/// Failure of a single worker call (one attempt of one batch)
///
/// Never leaves the batch executor: an exhausted batch is reported through
/// its [`BatchResult`](crate::models::BatchResult) instead.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WorkerCallError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("HTTP {status}: {message}")]
    Status { status: u16, message: String },

    #[error("Malformed worker response: {0}")]
    MalformedResponse(String),

    #[error("Batch cancelled")]
    Cancelled,
}

impl From<reqwest::Error> for WorkerCallError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_decode() {
            WorkerCallError::MalformedResponse(error.to_string())
        } else {
            WorkerCallError::Network(error.to_string())
        }
    }
}
