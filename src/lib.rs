#![allow(clippy::doc_markdown)] // Allow technical terms like DDC, CV in docs
#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # DDC Processing
//!
//! Client-side orchestration of CV scoring runs for job postings (DDCs).
//!
//! ## Overview
//!
//! A run scores every selected CV of a posting with a fixed weighting of
//! profession, experience and skills. The backend owns the run record; the
//! scoring itself happens in a remote worker. This crate sits between the
//! two: it starts the run, splits the CVs into batches, sends the batches to
//! the worker with retry and bounded concurrency, and reconciles the outcome
//! into a terminal report and a backend finish call.
//!
//! ## Module Organization
//!
//! - [`orchestration`] - Planner, executor, concurrency controller, aggregator and orchestrator
//! - [`client`] - Backend and worker HTTP clients behind async traits
//! - [`models`] - Wire payloads, batches, results and weight configuration
//! - [`state_machine`] - Processing run lifecycle
//! - [`config`] - Layered configuration
//! - [`error`] - Structured error handling
//! - [`logging`] - `tracing` setup and operation records
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use ddc_processing::config::ConfigManager;
//! use ddc_processing::models::{ProcessingRequest, WeightPreset};
//! use ddc_processing::orchestration::ProcessingOrchestrator;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let manager = ConfigManager::load()?;
//! ddc_processing::logging::init_structured_logging(&manager.config().logging);
//!
//! let orchestrator = ProcessingOrchestrator::from_config(manager.config())?;
//! let request = ProcessingRequest::new("ddc-42", WeightPreset::ExperienceFocused.into());
//!
//! match orchestrator.start_processing(request).await {
//!     Ok(report) => {
//!         println!("{report}");
//!         report.ensure_finalized()?;
//!     }
//!     Err(e) if e.is_conflict() => println!("A run is already active for this posting"),
//!     Err(e) => return Err(e.into()),
//! }
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod config;
pub mod constants;
pub mod error;
pub mod logging;
pub mod models;
pub mod orchestration;
pub mod state_machine;
pub mod validation;

pub use client::{BackendApiClient, BatchWorker, ProcessingBackend, WorkerApiClient};
pub use config::{ConfigManager, ProcessingConfig};
pub use error::{ProcessingError, ProcessingResult, WorkerCallError};
pub use models::{
    Batch, BatchResult, CvAnalysis, ExportFormat, ProcessingJob, ProcessingRequest,
    ProcessingResults, ResultsQuery, WeightConfig, WeightFractions, WeightPreset,
};
pub use orchestration::{
    BatchSizePolicy, Finalization, ProcessingOrchestrator, ProcessingReport, ProcessingSummary,
    RunEvent,
};
pub use state_machine::ProcessingStatus;
