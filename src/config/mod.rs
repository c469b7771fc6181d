use serde::Deserialize;
use std::path::{Path, PathBuf};
use config::{Config, ConfigError, Environment, File};

use crate::manager::BusyPolicy;
use crate::runtime::{Backend, LoadOptions};
use crate::session::SamplingConfig;

/// Where the model artifact lives and where bundled copies are extracted
#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    /// Application-private storage checked first
    pub install_dir: PathBuf,
    /// Extraction target for bundled artifacts
    pub cache_dir: PathBuf,
    /// Read-only directory standing in for the application bundle
    pub bundle_dir: PathBuf,
    /// Artifact filename, identical in all three locations
    pub model_filename: String,
}

/// Parameters fixed when the model is loaded
#[derive(Debug, Deserialize, Clone)]
pub struct RuntimeConfig {
    pub backend: Backend,
    pub max_tokens: u32,
    pub max_top_k: u32,
    pub max_images: u32,
    pub context_size: u32,
    pub gpu_layers: u32,
    /// 0 lets the engine pick
    pub threads: u32,
}

impl RuntimeConfig {
    pub fn load_options(&self) -> LoadOptions {
        LoadOptions {
            max_tokens: self.max_tokens,
            max_top_k: self.max_top_k,
            max_images: self.max_images,
            context_size: self.context_size,
            backend: self.backend,
            gpu_layers: self.gpu_layers,
            threads: self.threads,
        }
    }
}

/// Request scheduling on the model worker
#[derive(Debug, Deserialize, Clone)]
pub struct WorkerConfig {
    pub on_busy: BusyPolicy,
    /// Deadline the HTTP layer puts on one inference, 0 disables it
    pub request_timeout_secs: u64,
}

/// Configuration for the HTTP server
#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    /// Host address to bind to
    pub host: String,
    /// Port number to listen on
    pub port: u16,
}

/// Configuration for application logging
#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    /// Log level (debug, info, warn, error)
    pub level: String,
    /// Directory for the daily rolling log file
    pub file: Option<PathBuf>,
    /// Emit JSON lines instead of plain text
    #[serde(default)]
    pub json: bool,
}

/// Main settings struct that contains all configuration
#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    pub storage: StorageConfig,
    pub runtime: RuntimeConfig,
    pub sampling: SamplingConfig,
    pub worker: WorkerConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
}

impl Settings {
    /// Loads settings from `./config`.
    pub fn new() -> Result<Self, ConfigError> {
        let config_dir = std::env::current_dir()
            .map_err(|e| ConfigError::Message(format!("Failed to get current directory: {}", e)))?
            .join("config");
        Self::from_dir(&config_dir)
    }

    /// Loads settings from `config_dir` in the following order of precedence
    /// (highest to lowest):
    /// 1. Environment variables prefixed with `AIDY_`, sections split by `__`
    /// 2. Local config file (local.toml) if present
    /// 3. Default config file (default.toml)
    pub fn from_dir(config_dir: &Path) -> Result<Self, ConfigError> {
        if !config_dir.exists() {
            return Err(ConfigError::Message(format!(
                "Config directory not found at: {}",
                config_dir.display()
            )));
        }

        let default_config = config_dir.join("default.toml");
        if !default_config.exists() {
            return Err(ConfigError::Message(format!(
                "Default configuration file not found at: {}",
                default_config.display()
            )));
        }
        let local_config = config_dir.join("local.toml");

        let settings = Config::builder()
            .add_source(File::from(default_config))
            .add_source(File::from(local_config).required(false))
            .add_source(Environment::with_prefix("AIDY").prefix_separator("_").separator("__"))
            .build()?
            .try_deserialize::<Settings>()?;

        settings.validate()?;

        Ok(settings)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.storage.model_filename.trim().is_empty() {
            return Err(ConfigError::Message("storage.model_filename must not be empty".to_string()));
        }
        for dir in [&self.storage.install_dir, &self.storage.cache_dir] {
            if !dir.exists() {
                std::fs::create_dir_all(dir).map_err(|e| {
                    ConfigError::Message(format!("Failed to create directory at {}: {}", dir.display(), e))
                })?;
            }
        }

        if self.runtime.max_tokens == 0 {
            return Err(ConfigError::Message("runtime.max_tokens must be greater than 0".to_string()));
        }
        if self.runtime.max_top_k == 0 {
            return Err(ConfigError::Message("runtime.max_top_k must be greater than 0".to_string()));
        }
        if self.runtime.context_size == 0 {
            return Err(ConfigError::Message("runtime.context_size must be greater than 0".to_string()));
        }

        self.sampling
            .validate()
            .map_err(|e| ConfigError::Message(format!("Invalid sampling settings: {}", e)))?;
        if self.sampling.max_tokens > self.runtime.max_tokens {
            return Err(ConfigError::Message(format!(
                "sampling.max_tokens ({}) exceeds runtime.max_tokens ({})",
                self.sampling.max_tokens, self.runtime.max_tokens
            )));
        }

        if self.server.port == 0 {
            return Err(ConfigError::Message("Port must be between 1 and 65535, got: 0".to_string()));
        }

        match self.logging.level.to_lowercase().as_str() {
            "error" | "warn" | "info" | "debug" | "trace" => Ok(()),
            _ => Err(ConfigError::Message(format!(
                "Invalid logging level: {}. Must be one of: error, warn, info, debug, trace",
                self.logging.level
            ))),
        }?;

        Ok(())
    }
}
