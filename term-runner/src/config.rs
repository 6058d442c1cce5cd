//! Runner configuration.

use crate::core::ExecutorConfig;
use crate::logging::LogConfig;
use crate::prelude::*;
use crate::security::SqlSecurity;
use std::path::PathBuf;
use std::time::Duration;

/// Directory scanned for test definitions when none is given.
pub const DEFAULT_CONFIG_DIR: &str = "./test_config_files/";

/// Name of the table results are appended to when none is given.
pub const DEFAULT_RESULT_TABLE: &str = "test_results";

/// Configuration for a test run.
///
/// # Examples
///
/// ```rust
/// use std::time::Duration;
/// use term_runner::config::RunnerConfig;
///
/// let config = RunnerConfig::default()
///     .with_config_dir("tests/dq")
///     .with_max_concurrency(4)
///     .with_task_timeout(Duration::from_secs(30));
///
/// assert!(config.validate().is_ok());
/// assert_eq!(config.result_table, "test_results");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunnerConfig {
    /// Directory containing `*.yml` / `*.yaml` test definitions
    pub config_dir: PathBuf,
    /// Table results are appended to
    pub result_table: String,
    /// Maximum number of checks running at once
    pub max_concurrency: usize,
    /// Deadline for a single check
    pub task_timeout: Option<Duration>,
    /// Per-test and per-run logging
    pub log: LogConfig,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            config_dir: PathBuf::from(DEFAULT_CONFIG_DIR),
            result_table: DEFAULT_RESULT_TABLE.to_string(),
            max_concurrency: num_cpus::get().max(1),
            task_timeout: None,
            log: LogConfig::default(),
        }
    }
}

impl RunnerConfig {
    pub fn with_config_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config_dir = dir.into();
        self
    }

    pub fn with_result_table(mut self, table: impl Into<String>) -> Self {
        self.result_table = table.into();
        self
    }

    pub fn with_max_concurrency(mut self, max_concurrency: usize) -> Self {
        self.max_concurrency = max_concurrency;
        self
    }

    pub fn with_task_timeout(mut self, timeout: Duration) -> Self {
        self.task_timeout = Some(timeout);
        self
    }

    /// Sets per-test and per-run logging.
    pub fn with_log_config(mut self, log: LogConfig) -> Self {
        self.log = log;
        self
    }

    /// Checks the values a run depends on.
    pub fn validate(&self) -> Result<()> {
        if self.max_concurrency == 0 {
            return Err(TermError::Configuration(
                "max_concurrency must be at least 1".to_string(),
            ));
        }
        if self.task_timeout == Some(Duration::ZERO) {
            return Err(TermError::Configuration(
                "task_timeout must be greater than zero".to_string(),
            ));
        }
        SqlSecurity::validate_identifier(&self.result_table).map_err(|e| {
            TermError::Configuration(format!(
                "invalid result table '{}': {e}",
                self.result_table
            ))
        })
    }

    /// The executor limits for this run.
    pub fn executor_config(&self) -> ExecutorConfig {
        ExecutorConfig {
            max_concurrency: self.max_concurrency.max(1),
            task_timeout: self.task_timeout,
            log: self.log.clone(),
        }
    }
}
