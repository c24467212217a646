//! # Processing Orchestration
//!
//! Client-side coordination of a scoring run over a posting's CVs.
//!
//! ## Core Components
//!
//! - **BatchPlanner**: splits CV ids into ordered batches under a configurable size policy
//! - **BatchExecutor**: one worker call per attempt, retried with backoff, never fails
//! - **ConcurrencyController**: bounded or unbounded fan-out with settle-all collection
//! - **ResultAggregator**: summary statistics and the backend finish call
//! - **ProcessingOrchestrator**: ties the above to the backend lifecycle, progress and events
//!
//! ## Flow
//!
//! ```text
//! start request ──▶ backend start ──▶ plan ──▶ run_all ──▶ summarize ──▶ finish
//!                      │ 409                    │ per batch
//!                      ▼                        ▼
//!                 AlreadyActive         progress + RunEvent
//! ```

pub mod batch_executor;
pub mod batch_planner;
pub mod concurrency_controller;
pub mod event_publisher;
pub mod processing_orchestrator;
pub mod progress;
pub mod result_aggregator;
pub mod retry;

pub use batch_executor::BatchExecutor;
pub use batch_planner::{BatchPlanner, BatchSizePolicy};
pub use concurrency_controller::ConcurrencyController;
pub use event_publisher::{EventPublisher, PublishedEvent, RunEvent};
pub use processing_orchestrator::ProcessingOrchestrator;
pub use progress::{ProcessingProgress, ProgressTracker};
pub use result_aggregator::{Finalization, ProcessingReport, ProcessingSummary, ResultAggregator};
pub use retry::{BackoffType, RecordingSleeper, RetryPolicy, Sleeper, TokioSleeper};
