//! Configuration file
//!
//! Every field has a default, so an empty file (or no file) is valid.
//! Command-line flags override what the file says.
//!
//! ```toml
//! pattern = "*.raw"
//! workers = 1
//! report_log = "rawFileAcquisitionInfo.txt"
//! format = "text"
//! first_spectrum_poll_secs = 5
//! monitoring_poll_secs = 30
//!
//! [open_retry]
//! max_attempts = 5
//! initial_backoff_ms = 2000
//! max_backoff_ms = 30000
//! ```

use crate::cli::Cli;
use orbiwatch_monitor::{DispatchConfig, MonitorConfig, ReportFormat, RetryPolicy};
use orbiwatch_scout::WatchConfig;
use serde::{Deserialize, Serialize};
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_REPORT_LOG: &str = "rawFileAcquisitionInfo.txt";
const CONFIG_FILE_NAME: &str = "config.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Invalid config {}: {message}", path.display())]
    Parse { path: PathBuf, message: String },

    #[error("Failed to write config {}: {message}", path.display())]
    Write { path: PathBuf, message: String },

    #[error("Invalid setting '{field}': {message}")]
    Invalid { field: &'static str, message: String },
}

/// Retry settings as written in the file.
///
/// Each table has its own defaults, so the open and refresh policies are
/// separate types; a partial table only overrides the keys it names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RefreshRetrySettings {
    pub max_attempts: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
}

impl Default for RefreshRetrySettings {
    fn default() -> Self {
        let policy = MonitorConfig::default().refresh_retry;
        Self {
            max_attempts: policy.max_attempts,
            initial_backoff_ms: millis(policy.initial_backoff),
            max_backoff_ms: millis(policy.max_backoff),
        }
    }
}

impl From<RefreshRetrySettings> for RetryPolicy {
    fn from(settings: RefreshRetrySettings) -> Self {
        retry_policy(settings.max_attempts, settings.initial_backoff_ms, settings.max_backoff_ms)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OpenRetrySettings {
    pub max_attempts: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
}

impl Default for OpenRetrySettings {
    fn default() -> Self {
        let policy = DispatchConfig::default().open_retry;
        Self {
            max_attempts: policy.max_attempts,
            initial_backoff_ms: millis(policy.initial_backoff),
            max_backoff_ms: millis(policy.max_backoff),
        }
    }
}

impl From<OpenRetrySettings> for RetryPolicy {
    fn from(settings: OpenRetrySettings) -> Self {
        retry_policy(settings.max_attempts, settings.initial_backoff_ms, settings.max_backoff_ms)
    }
}

fn millis(duration: Duration) -> u64 {
    duration.as_millis() as u64
}

fn retry_policy(max_attempts: u32, initial_backoff_ms: u64, max_backoff_ms: u64) -> RetryPolicy {
    RetryPolicy {
        max_attempts,
        initial_backoff: Duration::from_millis(initial_backoff_ms),
        max_backoff: Duration::from_millis(max_backoff_ms),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrbiwatchConfig {
    /// File name glob for new files
    #[serde(default = "default_pattern")]
    pub pattern: String,

    /// Sessions monitored at the same time
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Append-only report log; relative paths resolve against the working directory
    #[serde(default = "default_report_log")]
    pub report_log: PathBuf,

    #[serde(default)]
    pub format: ReportFormat,

    #[serde(default)]
    pub exit_after_first_run: bool,

    /// Directory listing interval
    #[serde(default = "default_watch_poll_ms")]
    pub watch_poll_interval_ms: u64,

    #[serde(default = "default_first_spectrum_poll_secs")]
    pub first_spectrum_poll_secs: u64,

    #[serde(default = "default_monitoring_poll_secs")]
    pub monitoring_poll_secs: u64,

    /// Around each refresh of a running session
    #[serde(default)]
    pub refresh_retry: RefreshRetrySettings,

    /// Around opening a newly detected file
    #[serde(default)]
    pub open_retry: OpenRetrySettings,
}

fn default_pattern() -> String {
    orbiwatch_scout::DEFAULT_PATTERN.to_string()
}

fn default_workers() -> usize {
    DispatchConfig::default().workers
}

fn default_report_log() -> PathBuf {
    PathBuf::from(DEFAULT_REPORT_LOG)
}

fn default_watch_poll_ms() -> u64 {
    orbiwatch_scout::DEFAULT_POLL_INTERVAL.as_millis() as u64
}

fn default_first_spectrum_poll_secs() -> u64 {
    MonitorConfig::default().first_spectrum_poll_interval.as_secs()
}

fn default_monitoring_poll_secs() -> u64 {
    MonitorConfig::default().monitoring_poll_interval.as_secs()
}

impl Default for OrbiwatchConfig {
    fn default() -> Self {
        Self {
            pattern: default_pattern(),
            workers: default_workers(),
            report_log: default_report_log(),
            format: ReportFormat::default(),
            exit_after_first_run: false,
            watch_poll_interval_ms: default_watch_poll_ms(),
            first_spectrum_poll_secs: default_first_spectrum_poll_secs(),
            monitoring_poll_secs: default_monitoring_poll_secs(),
            refresh_retry: RefreshRetrySettings::default(),
            open_retry: OpenRetrySettings::default(),
        }
    }
}

/// `<orbiwatch home>/config.toml`
pub fn default_config_path() -> PathBuf {
    orbiwatch_logging::orbiwatch_home().join(CONFIG_FILE_NAME)
}

impl OrbiwatchConfig {
    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    /// Save configuration to a TOML file
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let write_err = |message: String| ConfigError::Write {
            path: path.to_path_buf(),
            message,
        };
        let content = toml::to_string_pretty(self).map_err(|e| write_err(e.to_string()))?;
        std::fs::write(path, content).map_err(|e| write_err(e.to_string()))
    }

    /// File named on the command line, else the default file if it exists,
    /// else built-in defaults; then flags on top, then validation.
    pub fn resolve(cli: &Cli) -> Result<Self, ConfigError> {
        let mut config = match &cli.config {
            Some(path) => Self::load(path)?,
            None => {
                let path = default_config_path();
                if path.is_file() {
                    Self::load(&path)?
                } else {
                    Self::default()
                }
            }
        };
        config.apply_cli(cli);
        config.validate()?;
        Ok(config)
    }

    pub fn apply_cli(&mut self, cli: &Cli) {
        if let Some(pattern) = &cli.pattern {
            self.pattern = pattern.clone();
        }
        if let Some(workers) = cli.workers {
            self.workers = workers;
        }
        if let Some(report_log) = &cli.report_log {
            self.report_log = report_log.clone();
        }
        if let Some(format) = cli.format {
            self.format = format.into();
        }
        if cli.once {
            self.exit_after_first_run = true;
        }
        if let Some(secs) = cli.first_spectrum_interval {
            self.first_spectrum_poll_secs = secs;
        }
        if let Some(secs) = cli.monitoring_interval {
            self.monitoring_poll_secs = secs;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |field, message: &str| {
            Err(ConfigError::Invalid {
                field,
                message: message.to_string(),
            })
        };
        if self.pattern.trim().is_empty() {
            return invalid("pattern", "must not be empty");
        }
        if self.workers == 0 {
            return invalid("workers", "must be at least 1");
        }
        if self.watch_poll_interval_ms == 0 {
            return invalid("watch_poll_interval_ms", "must be greater than 0");
        }
        if self.first_spectrum_poll_secs == 0 {
            return invalid("first_spectrum_poll_secs", "must be greater than 0");
        }
        if self.monitoring_poll_secs == 0 {
            return invalid("monitoring_poll_secs", "must be greater than 0");
        }
        Ok(())
    }

    pub fn monitor_config(&self) -> MonitorConfig {
        MonitorConfig {
            first_spectrum_poll_interval: Duration::from_secs(self.first_spectrum_poll_secs),
            monitoring_poll_interval: Duration::from_secs(self.monitoring_poll_secs),
            refresh_retry: self.refresh_retry.into(),
        }
    }

    pub fn dispatch_config(&self) -> DispatchConfig {
        DispatchConfig {
            workers: self.workers,
            open_retry: self.open_retry.into(),
            exit_after_first_run: self.exit_after_first_run,
        }
    }

    pub fn watch_config(&self, root: &Path) -> WatchConfig {
        WatchConfig {
            root: root.to_path_buf(),
            pattern: self.pattern.clone(),
            poll_interval: Duration::from_millis(self.watch_poll_interval_ms),
        }
    }
}
