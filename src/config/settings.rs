//! Application settings and configuration management

use crate::error::{AppError, Result};
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Root configuration structure
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Settings {
    pub server: ServerConfig,
    pub auth: AuthConfig,
    pub queue: QueueSettings,
    pub pipeline: PipelineSettings,
    pub storage: StorageConfig,
    pub image: ImagePolicyConfig,
    pub prompt_filter: PromptFilterConfig,
    pub logging: LoggingConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

/// Authentication configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AuthConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub api_keys: Vec<String>,
}

fn default_true() -> bool {
    true
}

/// Job queue configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct QueueSettings {
    /// Maximum number of jobs waiting for dispatch
    #[serde(default = "default_max_queue_size")]
    pub max_size: usize,
    /// Age in seconds before terminal jobs are removed from the lookup table
    #[serde(default = "default_retention_secs")]
    pub retention_secs: u64,
    /// Interval between reaper sweeps
    #[serde(default = "default_reap_interval_secs")]
    pub reap_interval_secs: u64,
    /// Bounded poll used by the worker so a stop signal is observed promptly
    #[serde(default = "default_worker_poll_ms")]
    pub worker_poll_ms: u64,
}

fn default_max_queue_size() -> usize {
    10
}

fn default_retention_secs() -> u64 {
    3600
}

fn default_reap_interval_secs() -> u64 {
    300
}

fn default_worker_poll_ms() -> u64 {
    1000
}

/// Pipeline collaborator configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PipelineSettings {
    /// Base URL of the inference sidecar
    #[serde(default = "default_pipeline_endpoint")]
    pub endpoint: String,
    /// Variant used when a job does not name one
    #[serde(default = "default_variant")]
    pub default_variant: String,
    /// Deadline applied to a single generation
    #[serde(default = "default_generation_timeout")]
    pub generation_timeout_secs: u64,
    /// Deadline applied to an explicit warmup load
    #[serde(default = "default_load_timeout")]
    pub load_timeout_secs: u64,
}

fn default_pipeline_endpoint() -> String {
    "http://127.0.0.1:8500".to_string()
}

fn default_variant() -> String {
    "4-step".to_string()
}

fn default_generation_timeout() -> u64 {
    600
}

fn default_load_timeout() -> u64 {
    900
}

/// Storage configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    #[serde(default = "default_storage_path")]
    pub base_path: String,
}

fn default_storage_path() -> String {
    "./generated-images/api".to_string()
}

/// Input image policy
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ImagePolicyConfig {
    #[serde(default = "default_max_image_bytes")]
    pub max_bytes: usize,
    #[serde(default = "default_max_dimension")]
    pub max_dimension: u32,
}

fn default_max_image_bytes() -> usize {
    25 * 1024 * 1024
}

fn default_max_dimension() -> u32 {
    8192
}

/// Prompt content filter configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PromptFilterConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_blocked_terms")]
    pub blocked_terms: Vec<String>,
}

fn default_blocked_terms() -> Vec<String> {
    crate::filter::DEFAULT_BLOCKED_TERMS
        .iter()
        .map(|t| t.to_string())
        .collect()
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "json".to_string()
}

impl Settings {
    /// Load settings from configuration files and environment variables
    pub fn load() -> Result<Self> {
        Self::load_from_path("config/default.toml")
    }

    /// Load settings from a specific configuration file path
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let config = Config::builder()
            // Start with default values
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 8080)?
            .set_default("auth.enabled", true)?
            .set_default("queue.max_size", 10)?
            .set_default("queue.retention_secs", 3600)?
            .set_default("pipeline.default_variant", "4-step")?
            // Load from configuration file
            .add_source(File::with_name(path.as_ref().to_str().unwrap_or("config/default")).required(false))
            // Override with environment variables (prefixed with IMG_EDIT_)
            .add_source(
                Environment::with_prefix("IMG_EDIT")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let settings: Settings = config.try_deserialize()?;
        Ok(settings)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.server.port == 0 {
            return Err(AppError::Config(config::ConfigError::Message(
                "Server port cannot be 0".to_string(),
            )));
        }

        if self.queue.max_size == 0 {
            return Err(AppError::Config(config::ConfigError::Message(
                "Queue max_size must be at least 1".to_string(),
            )));
        }

        if self.pipeline.endpoint.is_empty() {
            return Err(AppError::Config(config::ConfigError::Message(
                "Pipeline endpoint cannot be empty".to_string(),
            )));
        }

        if self.pipeline.generation_timeout_secs == 0 {
            return Err(AppError::Config(config::ConfigError::Message(
                "Generation timeout must be at least 1 second".to_string(),
            )));
        }

        Ok(())
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: default_host(),
                port: default_port(),
            },
            auth: AuthConfig {
                enabled: true,
                api_keys: vec![],
            },
            queue: QueueSettings {
                max_size: default_max_queue_size(),
                retention_secs: default_retention_secs(),
                reap_interval_secs: default_reap_interval_secs(),
                worker_poll_ms: default_worker_poll_ms(),
            },
            pipeline: PipelineSettings {
                endpoint: default_pipeline_endpoint(),
                default_variant: default_variant(),
                generation_timeout_secs: default_generation_timeout(),
                load_timeout_secs: default_load_timeout(),
            },
            storage: StorageConfig {
                base_path: default_storage_path(),
            },
            image: ImagePolicyConfig {
                max_bytes: default_max_image_bytes(),
                max_dimension: default_max_dimension(),
            },
            prompt_filter: PromptFilterConfig {
                enabled: true,
                blocked_terms: default_blocked_terms(),
            },
            logging: LoggingConfig {
                level: default_log_level(),
                format: default_log_format(),
            },
        }
    }
}
