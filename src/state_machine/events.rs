use serde::{Deserialize, Serialize};

use super::states::ProcessingStatus;

/// Events that move a processing run through its lifecycle
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum ProcessingEvent {
    /// First batch dispatched
    Start,
    /// Finish call acknowledged
    Finish,
    /// Run failed with error message
    Fail(String),
    /// Cancelled through the backend
    Cancel,
}

impl ProcessingEvent {
    /// Get a string representation of the event type for logging
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Finish => "finish",
            Self::Fail(_) => "fail",
            Self::Cancel => "cancel",
        }
    }

    /// Extract error message if this is a failure event
    pub fn error_message(&self) -> Option<&str> {
        match self {
            Self::Fail(msg) => Some(msg),
            _ => None,
        }
    }
}

/// Resolve the target state for `event` from `current`.
///
/// `pending → processing → {completed | failed}`; `cancelled` is reachable from
/// any non-terminal state. Returns `None` for transitions the lifecycle forbids.
pub fn transition(current: ProcessingStatus, event: &ProcessingEvent) -> Option<ProcessingStatus> {
    use ProcessingStatus::*;

    match (current, event) {
        (Pending, ProcessingEvent::Start) => Some(Processing),
        (Processing, ProcessingEvent::Finish) => Some(Completed),
        (Pending | Processing, ProcessingEvent::Fail(_)) => Some(Failed),
        (Pending | Processing, ProcessingEvent::Cancel) => Some(Cancelled),
        _ => None,
    }
}
