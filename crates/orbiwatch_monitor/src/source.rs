//! Read contract for live instrument data files.
//!
//! The vendor reader is not part of this crate. Anything that can answer the
//! questions below for a file that is still being written can drive a monitor.

use crate::error::{OpenError, ReadError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// Scan role in a multi-stage measurement. Reported, never interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MsOrder {
    NeutralGain,
    NeutralLoss,
    Parent,
    Any,
    Ms,
    Ms2,
    Ms3,
    Ms4,
    Ms5,
    Ms6,
    Ms7,
    Ms8,
    Ms9,
    Ms10,
    Other(i32),
}

impl MsOrder {
    /// Map the vendor's numeric level (-3..=10) onto the enum.
    pub fn from_level(level: i32) -> Self {
        match level {
            -3 => MsOrder::NeutralGain,
            -2 => MsOrder::NeutralLoss,
            -1 => MsOrder::Parent,
            0 => MsOrder::Any,
            1 => MsOrder::Ms,
            2 => MsOrder::Ms2,
            3 => MsOrder::Ms3,
            4 => MsOrder::Ms4,
            5 => MsOrder::Ms5,
            6 => MsOrder::Ms6,
            7 => MsOrder::Ms7,
            8 => MsOrder::Ms8,
            9 => MsOrder::Ms9,
            10 => MsOrder::Ms10,
            other => MsOrder::Other(other),
        }
    }
}

impl fmt::Display for MsOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MsOrder::NeutralGain => write!(f, "Ng"),
            MsOrder::NeutralLoss => write!(f, "Nl"),
            MsOrder::Parent => write!(f, "Par"),
            MsOrder::Any => write!(f, "Any"),
            MsOrder::Ms => write!(f, "Ms"),
            MsOrder::Ms2 => write!(f, "Ms2"),
            MsOrder::Ms3 => write!(f, "Ms3"),
            MsOrder::Ms4 => write!(f, "Ms4"),
            MsOrder::Ms5 => write!(f, "Ms5"),
            MsOrder::Ms6 => write!(f, "Ms6"),
            MsOrder::Ms7 => write!(f, "Ms7"),
            MsOrder::Ms8 => write!(f, "Ms8"),
            MsOrder::Ms9 => write!(f, "Ms9"),
            MsOrder::Ms10 => write!(f, "Ms10"),
            MsOrder::Other(level) => write!(f, "Level{}", level),
        }
    }
}

/// An open, refreshable view of a data file under acquisition.
///
/// Reads reflect the view as of the last [`refresh`](RawDataSource::refresh).
/// Scan indices are the vendor's scan numbers (1-based on real files).
pub trait RawDataSource: Send {
    /// Re-read the file so subsequent calls see newly written scans.
    fn refresh(&mut self) -> Result<(), ReadError>;

    fn is_in_acquisition(&self) -> Result<bool, ReadError>;

    fn spectrum_count(&self) -> Result<i64, ReadError>;

    fn first_spectrum_index(&self) -> Result<i64, ReadError>;

    fn last_spectrum_index(&self) -> Result<i64, ReadError>;

    /// Retention time of `scan`, in minutes.
    fn retention_time_minutes(&self, scan: i64) -> Result<f64, ReadError>;

    /// Expected total run duration, in seconds.
    fn expected_runtime_seconds(&self) -> Result<f64, ReadError>;

    fn ms_order(&self, scan: i64) -> Result<MsOrder, ReadError>;

    /// Largest intensity in the spectrum of `scan`.
    fn max_intensity(&self, scan: i64) -> Result<f64, ReadError>;

    fn file_name(&self) -> String;

    /// Free-form run header description, if the reader exposes one.
    fn run_header_summary(&self) -> Option<String> {
        None
    }
}

/// Opens data sources for newly observed paths.
pub trait SourceOpener: Send + Sync {
    type Source: RawDataSource + 'static;

    fn open(&self, path: &Path) -> Result<Self::Source, OpenError>;
}
