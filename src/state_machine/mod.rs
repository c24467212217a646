// Processing run lifecycle as observed by the orchestrator.
//
// The backend owns the persisted status; these types let the orchestrator
// decide whether a run may be started, cancelled or finished.

pub mod events;
pub mod states;

pub use events::{transition, ProcessingEvent};
pub use states::ProcessingStatus;
