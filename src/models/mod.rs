pub mod batch;
pub mod processing;
pub mod results;
pub mod weights;

// Re-export models for easy access
pub use batch::{
    Batch, BatchOutcome, BatchResult, RunContext, WorkerBatchRequest, WorkerBatchResponse,
};
pub use processing::{
    ProcessingJob, ProcessingRequest, StartProcessingRequest, StartProcessingResponse,
};
pub use results::{CvAnalysis, ExportFormat, ProcessingResults, ResultsQuery, SortDirection};
pub use weights::{WeightConfig, WeightFractions, WeightPreset};
