//! # Processing Configuration
//!
//! Everything the orchestrator reads from its environment: backend and worker
//! endpoints, the bearer credential, retry policy, batch-size strategy and the
//! in-flight limit.
//!
//! ## Sources
//!
//! Values are layered by [`ConfigManager`]: built-in defaults, then an optional
//! TOML file, then `DDC_PROCESSING__*` environment variables.
//!
//! ```toml
//! [worker]
//! url = "https://worker.example.com"
//!
//! [retry]
//! max_attempts = 3
//! base_delay_ms = 1000
//! backoff = "linear"
//!
//! [batching]
//! strategy = "dynamic"
//! worker_count = 10
//!
//! [concurrency]
//! max_in_flight = 0
//! ```

pub mod error;
pub mod loader;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

use crate::constants::defaults;
use crate::orchestration::batch_planner::BatchSizePolicy;
use crate::orchestration::retry::BackoffType;

pub use error::{ConfigResult, ConfigurationError};
pub use loader::ConfigManager;

/// Root configuration structure
#[derive(Debug, Clone, PartialEq, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct ProcessingConfig {
    /// REST backend (start, finish, status, cancel)
    pub api: ApiConfig,

    /// Remote scoring worker
    pub worker: WorkerConfig,

    /// Per-batch retry policy
    pub retry: RetryConfig,

    /// How CV ids are split into batches
    pub batching: BatchSizePolicy,

    /// In-flight batch limit
    pub concurrency: ConcurrencyConfig,

    pub logging: LoggingConfig,
}

impl ProcessingConfig {
    pub fn validate(&self) -> ConfigResult<()> {
        self.api.validate()?;
        self.worker.validate()?;
        self.retry.validate()?;
        self.batching.validate()?;
        Ok(())
    }
}

/// Backend REST API settings
#[derive(Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ApiConfig {
    pub base_url: String,
    pub timeout_ms: u64,
    /// Caller's bearer credential, sent to the backend and the worker. Empty = none.
    pub bearer_token: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: defaults::API_BASE_URL.to_string(),
            timeout_ms: defaults::REQUEST_TIMEOUT_MS,
            bearer_token: String::new(),
        }
    }
}

impl fmt::Debug for ApiConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiConfig")
            .field("base_url", &self.base_url)
            .field("timeout_ms", &self.timeout_ms)
            .field("bearer_token_set", &!self.bearer_token.is_empty())
            .finish()
    }
}

impl ApiConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn bearer_token(&self) -> Option<&str> {
        Some(self.bearer_token.as_str()).filter(|token| !token.is_empty())
    }

    fn validate(&self) -> ConfigResult<()> {
        if self.base_url.trim().is_empty() {
            return Err(ConfigurationError::missing_required_field(
                "base_url",
                "api",
            ));
        }
        if self.timeout_ms == 0 {
            return Err(ConfigurationError::invalid_value(
                "api.timeout_ms",
                "0",
                "request timeout must be positive",
            ));
        }
        Ok(())
    }
}

/// Scoring worker settings
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct WorkerConfig {
    pub url: String,
    pub timeout_ms: u64,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            url: defaults::WORKER_URL.to_string(),
            timeout_ms: defaults::WORKER_TIMEOUT_MS,
        }
    }
}

impl WorkerConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    fn validate(&self) -> ConfigResult<()> {
        if self.url.trim().is_empty() {
            return Err(ConfigurationError::missing_required_field("url", "worker"));
        }
        if self.timeout_ms == 0 {
            return Err(ConfigurationError::invalid_value(
                "worker.timeout_ms",
                "0",
                "request timeout must be positive",
            ));
        }
        Ok(())
    }
}

/// Retry settings for a single batch
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Total worker calls per batch, including the first one
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    pub backoff: BackoffType,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: defaults::MAX_ATTEMPTS,
            base_delay_ms: defaults::RETRY_BASE_DELAY_MS,
            max_delay_ms: defaults::RETRY_MAX_DELAY_MS,
            backoff: BackoffType::Linear,
        }
    }
}

impl RetryConfig {
    fn validate(&self) -> ConfigResult<()> {
        if self.max_attempts == 0 {
            return Err(ConfigurationError::invalid_value(
                "retry.max_attempts",
                "0",
                "at least one attempt is required",
            ));
        }
        if self.max_delay_ms < self.base_delay_ms {
            return Err(ConfigurationError::invalid_value(
                "retry.max_delay_ms",
                self.max_delay_ms.to_string(),
                "must not be lower than retry.base_delay_ms",
            ));
        }
        Ok(())
    }
}

/// Bounded or unbounded batch fan-out
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct ConcurrencyConfig {
    /// Maximum batches in flight; 0 dispatches every batch at once
    pub max_in_flight: usize,
}

impl ConcurrencyConfig {
    pub fn limit(&self) -> Option<usize> {
        Some(self.max_in_flight).filter(|limit| *limit > 0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `EnvFilter` directive; empty picks a level from the environment name
    pub level: String,
    /// Emit JSON lines instead of human-readable output
    pub json: bool,
}
