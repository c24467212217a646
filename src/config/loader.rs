//! Configuration Loader
//!
//! Layered loading with the `config` crate:
//! 0. Serialized [`ProcessingConfig::default()`]
//! 1. Optional TOML file (explicit path or `DDC_PROCESSING_CONFIG_PATH`)
//! 2. Environment variables, `DDC_PROCESSING__SECTION__KEY`
//!
//! The merged result is validated before it is handed out.

use config::{Config, Environment, File, FileFormat};
use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

use super::error::{ConfigResult, ConfigurationError};
use super::ProcessingConfig;

/// Prefix for environment overrides
pub const ENV_PREFIX: &str = "DDC_PROCESSING";

/// Environment variable naming an optional TOML configuration file
pub const CONFIG_PATH_VAR: &str = "DDC_PROCESSING_CONFIG_PATH";

const SENSITIVE_PATTERNS: [&str; 5] = ["password", "secret", "key", "token", "credential"];

/// Loaded configuration plus where it came from
#[derive(Debug)]
pub struct ConfigManager {
    config: ProcessingConfig,
    environment: String,
    config_file: Option<PathBuf>,
}

impl ConfigManager {
    /// Load configuration with environment auto-detection
    pub fn load() -> ConfigResult<Arc<ConfigManager>> {
        let config_file = env::var(CONFIG_PATH_VAR).ok().map(PathBuf::from);
        Self::load_from_sources(config_file.as_deref(), ENV_PREFIX)
    }

    /// Load from an explicit file (if any) and environment variables under `env_prefix`
    ///
    /// Tests pass a unique prefix so they never see each other's variables.
    pub fn load_from_sources(
        config_file: Option<&Path>,
        env_prefix: &str,
    ) -> ConfigResult<Arc<ConfigManager>> {
        let environment = detect_environment();

        debug!(
            environment = %environment,
            config_file = ?config_file.map(Path::display),
            env_prefix = env_prefix,
            "Loading processing configuration"
        );

        let mut builder = Config::builder().add_source(Config::try_from(&ProcessingConfig::default())?);

        if let Some(path) = config_file {
            let metadata = std::fs::metadata(path).map_err(|e| {
                ConfigurationError::file_read_error(path.display().to_string(), e)
            })?;
            if !metadata.is_file() {
                return Err(ConfigurationError::FileReadError {
                    file_path: path.display().to_string(),
                    error: "not a regular file".to_string(),
                });
            }
            builder = builder.add_source(
                File::from(path.to_path_buf())
                    .format(FileFormat::Toml)
                    .required(true),
            );
        }

        builder = builder.add_source(
            Environment::with_prefix(env_prefix)
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

        let config: ProcessingConfig = builder.build()?.try_deserialize()?;
        config.validate()?;

        info!(
            environment = %environment,
            worker_url = %config.worker.url,
            api_base_url = %config.api.base_url,
            max_attempts = config.retry.max_attempts,
            batching = ?config.batching,
            max_in_flight = config.concurrency.max_in_flight,
            "Configuration loaded successfully"
        );
        debug!(
            config = %sanitize_config_for_logging(&config),
            "Effective configuration"
        );

        Ok(Arc::new(ConfigManager {
            config,
            environment,
            config_file: config_file.map(Path::to_path_buf),
        }))
    }

    /// Wrap an already-built configuration (after validating it)
    pub fn from_config(config: ProcessingConfig) -> ConfigResult<Arc<ConfigManager>> {
        config.validate()?;
        Ok(Arc::new(ConfigManager {
            config,
            environment: detect_environment(),
            config_file: None,
        }))
    }

    /// Get the loaded configuration
    pub fn config(&self) -> &ProcessingConfig {
        &self.config
    }

    /// Sanitized configuration for debugging output
    pub fn debug_config(&self) -> serde_json::Value {
        sanitize_config_for_logging(&self.config)
    }

    pub fn environment(&self) -> &str {
        &self.environment
    }

    pub fn config_file(&self) -> Option<&Path> {
        self.config_file.as_deref()
    }
}

/// Detect current environment from environment variables
pub fn detect_environment() -> String {
    env::var("DDC_ENV")
        .or_else(|_| env::var("APP_ENV"))
        .unwrap_or_else(|_| "development".to_string())
        .to_lowercase()
}

/// Mask credential-like fields before a configuration is logged
fn sanitize_config_for_logging(config: &ProcessingConfig) -> serde_json::Value {
    let mut config_json = serde_json::json!(config);
    sanitize_json_recursive(&mut config_json);
    config_json
}

fn sanitize_json_recursive(value: &mut serde_json::Value) {
    match value {
        serde_json::Value::Object(map) => {
            for (key, val) in map.iter_mut() {
                let key_lower = key.to_lowercase();
                let is_sensitive = SENSITIVE_PATTERNS
                    .iter()
                    .any(|pattern| key_lower.contains(pattern));

                if is_sensitive {
                    *val = match val {
                        serde_json::Value::String(s) if s.is_empty() => {
                            serde_json::Value::String("[EMPTY]".to_string())
                        }
                        _ => serde_json::Value::String("[MASKED]".to_string()),
                    };
                } else {
                    sanitize_json_recursive(val);
                }
            }
        }
        serde_json::Value::Array(arr) => {
            for item in arr.iter_mut() {
                sanitize_json_recursive(item);
            }
        }
        _ => {}
    }
}
