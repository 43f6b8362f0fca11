//! Shared logging setup for the orbiwatch binary.
//!
//! Diagnostics (tracing events) go to stderr and to a daily rolling file under
//! `~/.orbiwatch/logs`. Acquisition report lines are not logged here; they are
//! written by the report sink in `orbiwatch_monitor`.

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

const DEFAULT_LOG_FILTER: &str = "orbiwatch=info,orbiwatch_monitor=info,orbiwatch_scout=info";
const HOME_ENV_VAR: &str = "ORBIWATCH_HOME";

/// Logging configuration for orbiwatch binaries.
pub struct LogConfig<'a> {
    pub app_name: &'a str,
    /// Mirror debug-level events to stderr.
    pub verbose: bool,
}

/// Keeps the non-blocking file writer alive. Drop it only at process exit,
/// otherwise buffered lines are lost.
pub struct LogGuard {
    _file_guard: Option<WorkerGuard>,
}

/// Initialize tracing with a rolling file writer and stderr output.
///
/// A failure to create the log directory is not fatal: logging falls back to
/// stderr only and a warning is printed.
pub fn init_logging(config: LogConfig<'_>) -> Result<LogGuard> {
    let file_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

    let console_filter = if config.verbose {
        EnvFilter::new(verbose_filter())
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER))
    };

    let mut file_guard = None;
    let file_layer = match ensure_logs_dir() {
        Ok(dir) => {
            let appender =
                tracing_appender::rolling::daily(dir, format!("{}.log", sanitize_name(config.app_name)));
            let (writer, guard) = tracing_appender::non_blocking(appender);
            file_guard = Some(guard);
            Some(
                tracing_subscriber::fmt::layer()
                    .with_writer(writer)
                    .with_ansi(false)
                    .with_filter(file_filter),
            )
        }
        Err(err) => {
            eprintln!("Warning: failed to create logs directory: {:#}", err);
            None
        }
    };

    tracing_subscriber::registry()
        .with(file_layer)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_filter(console_filter),
        )
        .try_init()
        .context("Failed to install tracing subscriber")?;

    Ok(LogGuard {
        _file_guard: file_guard,
    })
}

fn verbose_filter() -> String {
    DEFAULT_LOG_FILTER.replace("=info", "=debug")
}

/// Get the orbiwatch home directory: `$ORBIWATCH_HOME` or `~/.orbiwatch`.
pub fn orbiwatch_home() -> PathBuf {
    if let Ok(override_path) = std::env::var(HOME_ENV_VAR) {
        return PathBuf::from(override_path);
    }
    home_in(dirs::home_dir().as_deref())
}

fn home_in(user_home: Option<&Path>) -> PathBuf {
    user_home
        .map(|home| home.join(".orbiwatch"))
        .unwrap_or_else(|| PathBuf::from(".orbiwatch"))
}

/// Get the logs directory: `<home>/logs`
pub fn logs_dir() -> PathBuf {
    orbiwatch_home().join("logs")
}

/// Ensure the logs directory exists.
pub fn ensure_logs_dir() -> Result<PathBuf> {
    let logs = logs_dir();
    fs::create_dir_all(&logs)
        .with_context(|| format!("Failed to create logs directory: {}", logs.display()))?;
    Ok(logs)
}

fn sanitize_name(name: &str) -> String {
    name.chars()
        .map(|ch| if ch.is_ascii_alphanumeric() || ch == '-' || ch == '_' { ch } else { '_' })
        .collect()
}
