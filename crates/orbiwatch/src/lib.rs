//! Orbiwatch - live acquisition monitoring for instrument output directories
//!
//! The binary wires three pieces together: an arrival watcher on the output
//! directory, a dispatcher that runs one monitoring session per new file, and
//! a report sink writing to the console and an append-only log.

pub mod cli;
pub mod config;

pub use cli::{is_usage_error, parse_args, Cli, FormatArg};
pub use config::{ConfigError, OpenRetrySettings, OrbiwatchConfig, RefreshRetrySettings};
