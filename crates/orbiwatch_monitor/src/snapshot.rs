//! Point-in-time reads of a data source

use crate::error::ReadError;
use crate::source::{MsOrder, RawDataSource};
use std::time::Duration;

/// Metrics of a single recorded scan.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScanMetrics {
    pub retention_time: Duration,
    pub ms_order: MsOrder,
    pub base_intensity: f64,
}

/// Immutable read of the data source, taken fresh on every poll.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub in_acquisition: bool,
    pub spectrum_count: i64,
    pub last_spectrum_index: i64,
    pub expected_runtime: Duration,
    /// Metrics of the last scan; `None` while nothing has been recorded.
    pub last_scan: Option<ScanMetrics>,
}

impl Snapshot {
    /// Read the acquisition flag, spectrum count and last index only.
    ///
    /// Used before monitoring starts, when the scans themselves may not be
    /// readable yet. `expected_runtime` is zero and `last_scan` is `None`.
    pub fn capture_header<S: RawDataSource + ?Sized>(source: &S) -> Result<Self, ReadError> {
        Ok(Self {
            in_acquisition: source.is_in_acquisition()?,
            spectrum_count: source.spectrum_count()?,
            last_spectrum_index: source.last_spectrum_index()?,
            expected_runtime: Duration::ZERO,
            last_scan: None,
        })
    }

    /// Read the current view of `source`, including the last scan's metrics.
    /// Does not refresh it.
    pub fn capture<S: RawDataSource + ?Sized>(source: &S) -> Result<Self, ReadError> {
        let mut snapshot = Self::capture_header(source)?;
        snapshot.expected_runtime = seconds_to_duration(source.expected_runtime_seconds()?);

        // Scan 0 does not exist on an empty file; asking for it fails on real readers.
        if snapshot.spectrum_count > 0 {
            let last = snapshot.last_spectrum_index;
            snapshot.last_scan = Some(ScanMetrics {
                retention_time: minutes_to_duration(source.retention_time_minutes(last)?),
                ms_order: source.ms_order(last)?,
                base_intensity: source.max_intensity(last)?.max(0.0),
            });
        }
        Ok(snapshot)
    }

    /// Expected run duration minus the retention time of the last scan.
    /// Saturates at zero once the run overruns its expected length.
    pub fn estimated_remaining(&self) -> Option<Duration> {
        self.last_scan
            .map(|scan| self.expected_runtime.saturating_sub(scan.retention_time))
    }
}

/// Convert a retention time in minutes into a duration. Negative and
/// non-finite values clamp to zero.
pub fn minutes_to_duration(minutes: f64) -> Duration {
    seconds_to_duration(minutes * 60.0)
}

pub fn seconds_to_duration(seconds: f64) -> Duration {
    if seconds.is_finite() && seconds > 0.0 {
        Duration::from_secs_f64(seconds)
    } else {
        Duration::ZERO
    }
}
