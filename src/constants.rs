//! # System Constants
//!
//! Endpoint paths, defaults and named values shared by the clients, the
//! configuration layer and the orchestrator.

/// Backend and worker endpoint paths
pub mod endpoints {
    pub const START_PROCESSING: &str = "v1/processing/start";
    pub const PROCESSING: &str = "v1/processing";
    pub const DDCS: &str = "v1/ddcs";
    pub const EXPORT_PROCESSING: &str = "v1/export/processing";
    pub const WORKER_PROCESS_CVS: &str = "process-cvs";
}

/// Default values used when configuration omits a field
pub mod defaults {
    pub const API_BASE_URL: &str = "http://localhost:5000/api";
    pub const WORKER_URL: &str = "http://localhost:8080";
    pub const REQUEST_TIMEOUT_MS: u64 = 30_000;
    /// Worker calls score several CVs each and can take a while
    pub const WORKER_TIMEOUT_MS: u64 = 300_000;
    pub const MAX_ATTEMPTS: u32 = 3;
    pub const RETRY_BASE_DELAY_MS: u64 = 1_000;
    pub const RETRY_MAX_DELAY_MS: u64 = 60_000;
    pub const BATCH_SIZE: usize = 3;
    pub const WORKER_COUNT: usize = 10;
    pub const ADAPTIVE_THRESHOLD: usize = 100;
    pub const EVENT_BUFFER_SIZE: usize = 256;

    /// Default weights at the wire boundary
    pub const PROFESSION_WEIGHT: f64 = 0.333;
    pub const EXPERIENCE_WEIGHT: f64 = 0.333;
    pub const SKILLS_WEIGHT: f64 = 0.334;
}

/// Tolerance for fractional weights summing to 1.0
pub const WEIGHT_SUM_TOLERANCE: f64 = 0.01;

/// Integer percent total the three UI weights must reach
pub const WEIGHT_PERCENT_TOTAL: u32 = 100;

/// Log/event operation names
pub mod operations {
    pub const START: &str = "start";
    pub const PLAN: &str = "plan";
    pub const EXECUTE_BATCH: &str = "execute_batch";
    pub const FINISH: &str = "finish";
    pub const CANCEL: &str = "cancel";
}
