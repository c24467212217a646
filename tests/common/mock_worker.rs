use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::Notify;

use ddc_processing::models::{WorkerBatchRequest, WorkerBatchResponse};
use ddc_processing::{BatchWorker, WorkerCallError};

/// How the worker answers calls for one batch index
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Behaviour {
    /// Every CV of the batch is processed
    Succeed,
    /// Fail the first `n` calls, then succeed
    FailTimes(u32),
    AlwaysFail,
    /// Never answer
    Hang,
    /// Never answer the first `n` calls, then succeed
    HangTimes(u32),
}

/// Worker whose answers are scripted per batch index
#[derive(Debug)]
pub struct ScriptedWorker {
    default: Behaviour,
    behaviours: HashMap<usize, Behaviour>,
    latency: Duration,
    calls: Mutex<Vec<WorkerBatchRequest>>,
    current: AtomicUsize,
    peak: AtomicUsize,
    called: Notify,
}

impl ScriptedWorker {
    pub fn new(default: Behaviour) -> Self {
        Self {
            default,
            behaviours: HashMap::new(),
            latency: Duration::ZERO,
            calls: Mutex::default(),
            current: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
            called: Notify::new(),
        }
    }

    pub fn succeeding() -> Self {
        Self::new(Behaviour::Succeed)
    }

    pub fn with_batch(mut self, batch_index: usize, behaviour: Behaviour) -> Self {
        self.behaviours.insert(batch_index, behaviour);
        self
    }

    /// Real delay per call, so overlapping calls can be observed
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    pub fn calls_for(&self, batch_index: usize) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|call| call.batch_index == batch_index)
            .count()
    }

    pub fn calls(&self) -> Vec<WorkerBatchRequest> {
        self.calls.lock().clone()
    }

    /// Highest number of calls that were in flight at once
    pub fn peak_in_flight(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    /// Resolves once at least one call has been received
    pub async fn wait_for_call(&self) {
        self.called.notified().await;
    }
}

#[async_trait]
impl BatchWorker for ScriptedWorker {
    async fn process_batch(
        &self,
        request: &WorkerBatchRequest,
    ) -> Result<WorkerBatchResponse, WorkerCallError> {
        let attempt = {
            let mut calls = self.calls.lock();
            calls.push(request.clone());
            calls
                .iter()
                .filter(|call| call.batch_index == request.batch_index)
                .count() as u32
        };
        self.called.notify_one();

        let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        self.current.fetch_sub(1, Ordering::SeqCst);

        let behaviour = self
            .behaviours
            .get(&request.batch_index)
            .copied()
            .unwrap_or(self.default);

        match behaviour {
            Behaviour::Succeed => Ok(processed_all(request)),
            Behaviour::FailTimes(n) if attempt <= n => Err(WorkerCallError::Status {
                status: 503,
                message: format!("attempt {attempt} unavailable"),
            }),
            Behaviour::FailTimes(_) => Ok(processed_all(request)),
            Behaviour::AlwaysFail => Err(WorkerCallError::Network(format!(
                "batch {} connection reset (attempt {attempt})",
                request.batch_index
            ))),
            Behaviour::Hang => std::future::pending().await,
            Behaviour::HangTimes(n) if attempt <= n => std::future::pending().await,
            Behaviour::HangTimes(_) => Ok(processed_all(request)),
        }
    }
}

fn processed_all(request: &WorkerBatchRequest) -> WorkerBatchResponse {
    WorkerBatchResponse {
        processed_count: request.cv_ids.len(),
        failed_count: 0,
    }
}
