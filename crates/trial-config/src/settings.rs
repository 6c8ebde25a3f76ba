//! Runner settings (trial.toml and ~/.trial/config.toml)
//!
//! Both files share one schema: a `[runner]` table whose keys are all
//! optional. Missing keys fall through to the next lower layer and finally
//! to the built-in defaults of [`RunnerConfig`].

use crate::{ConfigError, ConfigResult};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Default per-test timeout in milliseconds
pub const DEFAULT_TEST_TIMEOUT_MS: u64 = 5_000;

/// Default timeout for `before_all` / `after_all` hooks in milliseconds
pub const DEFAULT_HOOK_TIMEOUT_MS: u64 = 10_000;

/// On-disk configuration file
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    /// Runner settings
    #[serde(skip_serializing_if = "Option::is_none")]
    pub runner: Option<RunnerSection>,
}

/// `[runner]` table
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct RunnerSection {
    /// Per-test timeout in milliseconds (0 disables the deadline)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub test_timeout_ms: Option<u64>,

    /// Timeout for suite-level hooks in milliseconds
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hook_timeout_ms: Option<u64>,

    /// Extra attempts granted to every test unless overridden
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry: Option<u32>,

    /// Stop executing tests after this many failures (0 = never)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bail: Option<usize>,

    /// Only run tests whose full name contains this string
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filter: Option<String>,
}

impl ConfigFile {
    /// Load a configuration file from disk
    pub fn load_from_file(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ConfigError::NotFound(path.to_path_buf())
            } else {
                ConfigError::IoError(e)
            }
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::TomlParseError {
            file: path.to_path_buf(),
            error: e,
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Validate the file contents
    pub fn validate(&self) -> ConfigResult<()> {
        if let Some(runner) = &self.runner {
            runner.validate()?;
        }
        Ok(())
    }

    /// Merge another file into this one.
    /// Other config takes precedence for non-None values.
    pub fn merge(&mut self, other: &ConfigFile) {
        match (&mut self.runner, &other.runner) {
            (Some(mine), Some(theirs)) => mine.merge(theirs),
            (None, Some(theirs)) => self.runner = Some(theirs.clone()),
            _ => {}
        }
    }
}

impl RunnerSection {
    /// Validate the runner table
    pub fn validate(&self) -> ConfigResult<()> {
        if self.hook_timeout_ms == Some(0) {
            return Err(ConfigError::InvalidValue {
                field: "runner.hook_timeout_ms".to_string(),
                reason: "hook timeout must be greater than zero".to_string(),
            });
        }
        if let Some(filter) = &self.filter {
            if filter.trim().is_empty() {
                return Err(ConfigError::InvalidValue {
                    field: "runner.filter".to_string(),
                    reason: "filter cannot be empty".to_string(),
                });
            }
        }
        Ok(())
    }

    /// Merge another runner table into this one
    pub fn merge(&mut self, other: &RunnerSection) {
        if other.test_timeout_ms.is_some() {
            self.test_timeout_ms = other.test_timeout_ms;
        }
        if other.hook_timeout_ms.is_some() {
            self.hook_timeout_ms = other.hook_timeout_ms;
        }
        if other.retry.is_some() {
            self.retry = other.retry;
        }
        if other.bail.is_some() {
            self.bail = other.bail;
        }
        if other.filter.is_some() {
            self.filter = other.filter.clone();
        }
    }
}

/// Fully resolved runner configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunnerConfig {
    pub test_timeout_ms: u64,
    pub hook_timeout_ms: u64,
    pub retry: u32,
    pub bail: usize,
    pub filter: Option<String>,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            test_timeout_ms: DEFAULT_TEST_TIMEOUT_MS,
            hook_timeout_ms: DEFAULT_HOOK_TIMEOUT_MS,
            retry: 0,
            bail: 0,
            filter: None,
        }
    }
}

impl RunnerConfig {
    /// Overlay the values present in a runner table
    pub fn apply(&mut self, section: &RunnerSection) {
        if let Some(ms) = section.test_timeout_ms {
            self.test_timeout_ms = ms;
        }
        if let Some(ms) = section.hook_timeout_ms {
            self.hook_timeout_ms = ms;
        }
        if let Some(retry) = section.retry {
            self.retry = retry;
        }
        if let Some(bail) = section.bail {
            self.bail = bail;
        }
        if let Some(filter) = &section.filter {
            self.filter = Some(filter.clone());
        }
    }

    pub fn test_timeout(&self) -> Duration {
        Duration::from_millis(self.test_timeout_ms)
    }

    pub fn hook_timeout(&self) -> Duration {
        Duration::from_millis(self.hook_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_parse_full_runner_table() {
        let toml = r#"
[runner]
test_timeout_ms = 2500
hook_timeout_ms = 4000
retry = 2
bail = 1
filter = "parser"
"#;

        let config: ConfigFile = toml::from_str(toml).unwrap();
        assert!(config.validate().is_ok());
        let runner = config.runner.unwrap();
        assert_eq!(runner.test_timeout_ms, Some(2500));
        assert_eq!(runner.retry, Some(2));
        assert_eq!(runner.filter.as_deref(), Some("parser"));
    }

    #[test]
    fn test_unknown_key_rejected() {
        let toml = r#"
[runner]
timeout = 10
"#;
        assert!(toml::from_str::<ConfigFile>(toml).is_err());
    }

    #[test]
    fn test_zero_hook_timeout_invalid() {
        let section = RunnerSection {
            hook_timeout_ms: Some(0),
            ..Default::default()
        };
        assert!(section.validate().is_err());
    }

    #[rstest]
    #[case::zero_hook_timeout("[runner]\nhook_timeout_ms = 0\n", "runner.hook_timeout_ms")]
    #[case::blank_filter("[runner]\nfilter = \"  \"\n", "runner.filter")]
    fn test_invalid_values(#[case] toml: &str, #[case] expected_field: &str) {
        let config: ConfigFile = toml::from_str(toml).unwrap();
        match config.validate() {
            Err(ConfigError::InvalidValue { field, .. }) => assert_eq!(field, expected_field),
            other => panic!("expected invalid value, got {:?}", other),
        }
    }

    #[test]
    fn test_zero_test_timeout_allowed() {
        let section = RunnerSection {
            test_timeout_ms: Some(0),
            ..Default::default()
        };
        assert!(section.validate().is_ok());
    }

    #[test]
    fn test_merge_prefers_other() {
        let mut base = ConfigFile {
            runner: Some(RunnerSection {
                retry: Some(1),
                bail: Some(3),
                ..Default::default()
            }),
        };
        let other = ConfigFile {
            runner: Some(RunnerSection {
                retry: Some(4),
                ..Default::default()
            }),
        };

        base.merge(&other);
        let runner = base.runner.unwrap();
        assert_eq!(runner.retry, Some(4));
        assert_eq!(runner.bail, Some(3));
    }

    #[test]
    fn test_defaults() {
        let config = RunnerConfig::default();
        assert_eq!(config.test_timeout(), Duration::from_millis(5_000));
        assert_eq!(config.hook_timeout(), Duration::from_millis(10_000));
        assert_eq!(config.retry, 0);
        assert_eq!(config.filter, None);
    }
}
