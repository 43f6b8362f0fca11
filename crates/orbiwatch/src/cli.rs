//! Command-line interface

use clap::error::ErrorKind;
use clap::{Parser, ValueEnum};
use orbiwatch_monitor::ReportFormat;
use std::ffi::OsString;
use std::path::PathBuf;

/// Watch a directory for new instrument raw files and report acquisition progress.
///
/// Called without a directory, or with more than one, orbiwatch prints usage
/// and exits with status 0.
#[derive(Parser, Debug, Clone, PartialEq)]
#[command(name = "orbiwatch", version, about)]
pub struct Cli {
    /// Directory the instrument writes raw files into
    pub directory: PathBuf,

    /// TOML configuration file (default: ~/.orbiwatch/config.toml if present)
    #[arg(short, long, env = "ORBIWATCH_CONFIG")]
    pub config: Option<PathBuf>,

    /// File name glob for new files, matched case-insensitively
    #[arg(long)]
    pub pattern: Option<String>,

    /// Number of files monitored at the same time
    #[arg(long)]
    pub workers: Option<usize>,

    /// Append-only report log
    #[arg(long, value_name = "PATH")]
    pub report_log: Option<PathBuf>,

    /// Report line format
    #[arg(long, value_enum)]
    pub format: Option<FormatArg>,

    /// Exit after the first completed acquisition
    #[arg(long)]
    pub once: bool,

    /// Seconds between polls while waiting for the first spectrum
    #[arg(long, value_name = "SECS")]
    pub first_spectrum_interval: Option<u64>,

    /// Seconds between polls while a run is being acquired
    #[arg(long, value_name = "SECS")]
    pub monitoring_interval: Option<u64>,

    /// Debug-level diagnostics on stderr
    #[arg(short, long)]
    pub verbose: bool,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatArg {
    Text,
    Json,
}

impl From<FormatArg> for ReportFormat {
    fn from(arg: FormatArg) -> Self {
        match arg {
            FormatArg::Text => ReportFormat::Text,
            FormatArg::Json => ReportFormat::Json,
        }
    }
}

/// Parse an explicit argument list (first item is the program name).
pub fn parse_args<I, T>(args: I) -> Result<Cli, clap::Error>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    Cli::try_parse_from(args)
}

/// A missing or extra directory argument. These print usage and exit with
/// status 0; other parse errors keep clap's exit status.
pub fn is_usage_error(err: &clap::Error) -> bool {
    matches!(
        err.kind(),
        ErrorKind::MissingRequiredArgument | ErrorKind::UnknownArgument
    )
}
