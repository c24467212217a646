//! Configuration and data builders shared by the integration tests

use std::sync::Arc;

use ddc_processing::config::ProcessingConfig;
use ddc_processing::orchestration::{
    BackoffType, BatchSizePolicy, ProcessingOrchestrator, RecordingSleeper,
};
use ddc_processing::{BatchWorker, ProcessingBackend};

/// Base retry delay used by [`test_config`]
pub const BASE_DELAY_MS: u64 = 1_000;

/// `count` CV ids, `cv-0` .. `cv-{count-1}`
pub fn cv_ids(count: usize) -> Vec<String> {
    (0..count).map(|i| format!("cv-{i}")).collect()
}

/// Three linear attempts, fixed batches of `batch_size`, unbounded fan-out
pub fn test_config(batch_size: usize) -> ProcessingConfig {
    let mut config = ProcessingConfig::default();
    config.retry.max_attempts = 3;
    config.retry.base_delay_ms = BASE_DELAY_MS;
    config.retry.backoff = BackoffType::Linear;
    config.batching = BatchSizePolicy::Fixed { size: batch_size };
    config.concurrency.max_in_flight = 0;
    config
}

/// Orchestrator wired to fakes and a recording clock
pub fn orchestrator_with(
    backend: Arc<dyn ProcessingBackend>,
    worker: Arc<dyn BatchWorker>,
    config: &ProcessingConfig,
) -> (ProcessingOrchestrator, RecordingSleeper) {
    let sleeper = RecordingSleeper::new();
    let orchestrator =
        ProcessingOrchestrator::new(backend, worker, config).with_sleeper(Arc::new(sleeper.clone()));
    (orchestrator, sleeper)
}
