//! Trial Configuration System
//!
//! Provides runner configuration for Trial test runs:
//! - Project configuration (trial.toml)
//! - Global user configuration (~/.trial/config.toml)
//! - Environment overrides (TRIAL_*)
//!
//! # Configuration Hierarchy
//!
//! Configuration is loaded and merged in the following order (later overrides earlier):
//! 1. Built-in defaults
//! 2. Global config (~/.trial/config.toml)
//! 3. Project config (./trial.toml)
//! 4. Environment variables (TRIAL_*)
//!
//! # Example
//!
//! ```no_run
//! use trial_config::ConfigLoader;
//! use std::path::Path;
//!
//! let mut loader = ConfigLoader::new();
//! let config = loader.load_from_directory(Path::new(".")).unwrap();
//! println!("per-test timeout: {:?}", config.runner.test_timeout());
//! ```

pub mod loader;
pub mod settings;

use std::path::PathBuf;
use thiserror::Error;

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    NotFound(PathBuf),

    #[error("Failed to read configuration file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Invalid TOML syntax in {file}: {error}")]
    TomlParseError {
        file: PathBuf,
        error: toml::de::Error,
    },

    #[error("Invalid value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },

    #[error("Home directory not found")]
    HomeNotFound,
}

/// Result type for configuration operations
pub type ConfigResult<T> = Result<T, ConfigError>;

pub use loader::{Config, ConfigLoader};
pub use settings::{ConfigFile, RunnerConfig, RunnerSection};
