//! Configuration Loader
//!
//! Handles loading and merging configuration from multiple sources with proper precedence.

use crate::settings::{ConfigFile, RunnerConfig};
use crate::{ConfigError, ConfigResult};
use std::env;
use std::path::{Path, PathBuf};

/// Name of the project configuration file
pub const PROJECT_CONFIG_FILE: &str = "trial.toml";

/// Configuration loader
///
/// Loads configuration from multiple sources and merges them with proper precedence:
/// 1. Global config (~/.trial/config.toml) - lowest priority
/// 2. Project config (./trial.toml) - overrides global
/// 3. Environment variables (TRIAL_*) - overrides project
pub struct ConfigLoader {
    /// Cached global config path
    global_config_path: Option<PathBuf>,
}

/// Merged configuration result
#[derive(Debug, Clone)]
pub struct Config {
    /// Resolved runner settings
    pub runner: RunnerConfig,

    /// Project root directory (where trial.toml was found)
    pub project_root: Option<PathBuf>,
}

impl ConfigLoader {
    /// Create a new configuration loader
    pub fn new() -> Self {
        Self {
            global_config_path: None,
        }
    }

    /// Use an explicit global config path instead of ~/.trial/config.toml
    pub fn with_global_config_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.global_config_path = Some(path.into());
        self
    }

    /// Load configuration starting from the given directory
    ///
    /// Walks up the directory tree to find trial.toml, then layers it over
    /// the global config if one exists.
    pub fn load_from_directory(&mut self, start_dir: &Path) -> ConfigResult<Config> {
        let (project_root, project_file) = self.find_project_config(start_dir)?;
        self.resolve(project_file, project_root)
    }

    /// Load configuration from a specific project config file
    pub fn load_from_file(&mut self, config_path: &Path) -> ConfigResult<Config> {
        let project_file = ConfigFile::load_from_file(config_path)?;
        let project_root = config_path.parent().map(|p| p.to_path_buf());
        self.resolve(project_file, project_root)
    }

    fn resolve(
        &mut self,
        project_file: ConfigFile,
        project_root: Option<PathBuf>,
    ) -> ConfigResult<Config> {
        let mut merged = self.load_global_config().unwrap_or_default();
        merged.merge(&project_file);

        let mut runner = RunnerConfig::default();
        if let Some(section) = &merged.runner {
            runner.apply(section);
        }
        apply_env_overrides(&mut runner)?;

        Ok(Config {
            runner,
            project_root,
        })
    }

    /// Find project configuration by walking up directory tree
    ///
    /// Returns (project_root, project_file) or the default file if none is found
    fn find_project_config(&self, start_dir: &Path) -> ConfigResult<(Option<PathBuf>, ConfigFile)> {
        let mut current = start_dir.to_path_buf();

        loop {
            let config_path = current.join(PROJECT_CONFIG_FILE);

            if config_path.exists() {
                let file = ConfigFile::load_from_file(&config_path)?;
                return Ok((Some(current), file));
            }

            match current.parent() {
                Some(parent) => current = parent.to_path_buf(),
                None => return Ok((None, ConfigFile::default())),
            }
        }
    }

    /// Load global configuration from ~/.trial/config.toml
    fn load_global_config(&mut self) -> ConfigResult<ConfigFile> {
        let path = match &self.global_config_path {
            Some(path) => path.clone(),
            None => {
                let path = Self::global_config_dir()?.join("config.toml");
                self.global_config_path = Some(path.clone());
                path
            }
        };

        // Global config is optional
        if !path.exists() {
            return Ok(ConfigFile::default());
        }

        ConfigFile::load_from_file(&path)
    }

    /// Get the global configuration directory (~/.trial)
    pub fn global_config_dir() -> ConfigResult<PathBuf> {
        let home = dirs::home_dir().ok_or(ConfigError::HomeNotFound)?;
        Ok(home.join(".trial"))
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl Config {
    /// Get the project root directory
    pub fn project_root(&self) -> Option<&Path> {
        self.project_root.as_deref()
    }

    /// Check if a trial.toml was found
    pub fn is_project(&self) -> bool {
        self.project_root.is_some()
    }
}

/// Apply environment variable overrides
///
/// Recognised variables: TRIAL_TEST_TIMEOUT, TRIAL_HOOK_TIMEOUT (milliseconds),
/// TRIAL_RETRY, TRIAL_BAIL and TRIAL_FILTER.
fn apply_env_overrides(runner: &mut RunnerConfig) -> ConfigResult<()> {
    if let Ok(value) = env::var("TRIAL_TEST_TIMEOUT") {
        runner.test_timeout_ms = parse_env("TRIAL_TEST_TIMEOUT", &value)?;
    }

    if let Ok(value) = env::var("TRIAL_HOOK_TIMEOUT") {
        let ms: u64 = parse_env("TRIAL_HOOK_TIMEOUT", &value)?;
        if ms == 0 {
            return Err(ConfigError::InvalidValue {
                field: "TRIAL_HOOK_TIMEOUT".to_string(),
                reason: "hook timeout must be greater than zero".to_string(),
            });
        }
        runner.hook_timeout_ms = ms;
    }

    if let Ok(value) = env::var("TRIAL_RETRY") {
        runner.retry = parse_env("TRIAL_RETRY", &value)?;
    }

    if let Ok(value) = env::var("TRIAL_BAIL") {
        runner.bail = parse_env("TRIAL_BAIL", &value)?;
    }

    if let Ok(value) = env::var("TRIAL_FILTER") {
        if !value.trim().is_empty() {
            runner.filter = Some(value);
        }
    }

    Ok(())
}

fn parse_env<T: std::str::FromStr>(name: &str, value: &str) -> ConfigResult<T> {
    value.trim().parse().map_err(|_| ConfigError::InvalidValue {
        field: name.to_string(),
        reason: format!("expected a non-negative integer, got '{}'", value),
    })
}
