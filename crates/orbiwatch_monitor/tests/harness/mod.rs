//! Test harness for monitor integration tests
//!
//! Provides a scripted data source whose view advances one frame per
//! successful refresh, an opener that hands out copies of the script, and a
//! probe that stays observable after the source has moved into a monitor.
//!
//! # Example
//!
//! ```ignore
//! let script = Script::new(vec![Frame::new(0, 0), Frame::new(1, 1)]);
//! let (source, probe) = script.source("run01.raw");
//! ```

#![allow(dead_code)]

use orbiwatch_monitor::{
    MemorySink, MonitorConfig, MsOrder, OpenError, RawDataSource, ReadError, ReportEvent,
    ReportSink, RetryPolicy, SourceOpener,
};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Retention time of scan `n` is `n * RT_MINUTES_PER_SCAN`.
pub const RT_MINUTES_PER_SCAN: f64 = 0.05;

/// One view of the file, as seen between two refreshes.
#[derive(Debug, Clone, Copy)]
pub struct Frame {
    pub in_acquisition: bool,
    pub spectrum_count: i64,
    pub first_spectrum: i64,
    pub last_spectrum: i64,
    pub expected_runtime_secs: f64,
}

impl Frame {
    pub fn new(spectrum_count: i64, last_spectrum: i64) -> Self {
        Self {
            in_acquisition: true,
            spectrum_count,
            first_spectrum: if spectrum_count > 0 { 1 } else { 0 },
            last_spectrum,
            expected_runtime_secs: 3600.0,
        }
    }

    pub fn finished(mut self) -> Self {
        self.in_acquisition = false;
        self
    }
}

/// Counters shared between a scripted source and the test.
#[derive(Debug, Default)]
pub struct SourceProbe {
    pub refresh_calls: AtomicUsize,
    pub successful_refreshes: AtomicUsize,
}

impl SourceProbe {
    pub fn refresh_calls(&self) -> usize {
        self.refresh_calls.load(Ordering::SeqCst)
    }

    pub fn successful_refreshes(&self) -> usize {
        self.successful_refreshes.load(Ordering::SeqCst)
    }
}

/// Frames plus failure injection.
#[derive(Debug, Clone)]
pub struct Script {
    pub frames: Vec<Frame>,
    /// 1-based refresh calls that fail.
    pub failing_refreshes: HashSet<usize>,
    /// Every refresh from this call on fails.
    pub fail_from: Option<usize>,
    /// Per-scan reads fail while the view is on an earlier frame.
    pub scans_readable_from: usize,
}

impl Script {
    pub fn new(frames: Vec<Frame>) -> Self {
        assert!(!frames.is_empty(), "script needs at least one frame");
        Self {
            frames,
            failing_refreshes: HashSet::new(),
            fail_from: None,
            scans_readable_from: 0,
        }
    }

    pub fn fail_refresh(mut self, call: usize) -> Self {
        self.failing_refreshes.insert(call);
        self
    }

    pub fn fail_from(mut self, call: usize) -> Self {
        self.fail_from = Some(call);
        self
    }

    /// Header fields are readable from the start; scans only from `frame` on.
    pub fn scans_readable_from(mut self, frame: usize) -> Self {
        self.scans_readable_from = frame;
        self
    }

    pub fn source(&self, file_name: &str) -> (ScriptedSource, Arc<SourceProbe>) {
        let probe = Arc::new(SourceProbe::default());
        let source = ScriptedSource {
            script: self.clone(),
            file_name: file_name.to_string(),
            frame: 0,
            probe: Arc::clone(&probe),
        };
        (source, probe)
    }
}

/// The standard run: two quiet polls, first spectrum on the 3rd read,
/// three monitoring polls, then acquisition ends.
pub fn standard_run() -> Script {
    Script::new(vec![
        Frame::new(0, 0),
        Frame::new(0, 0),
        Frame::new(1, 1),
        Frame::new(2, 2),
        Frame::new(3, 3),
        Frame::new(3, 3).finished(),
    ])
}

pub struct ScriptedSource {
    script: Script,
    file_name: String,
    frame: usize,
    probe: Arc<SourceProbe>,
}

impl ScriptedSource {
    fn current(&self) -> &Frame {
        let last = self.script.frames.len() - 1;
        &self.script.frames[self.frame.min(last)]
    }

    fn check_scan(&self, operation: &'static str, scan: i64) -> Result<(), ReadError> {
        if self.frame < self.script.scans_readable_from {
            return Err(ReadError::new(operation, format!("scan {} not present", scan)));
        }
        let frame = self.current();
        if scan < 0 || scan > frame.last_spectrum.max(frame.spectrum_count) {
            return Err(ReadError::new(operation, format!("scan {} out of range", scan)));
        }
        Ok(())
    }
}

impl RawDataSource for ScriptedSource {
    fn refresh(&mut self) -> Result<(), ReadError> {
        let call = self.probe.refresh_calls.fetch_add(1, Ordering::SeqCst) + 1;
        let failing = self.script.failing_refreshes.contains(&call)
            || self.script.fail_from.is_some_and(|from| call >= from);
        if failing {
            return Err(ReadError::new("refresh", "file is locked"));
        }
        self.frame += 1;
        self.probe.successful_refreshes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn is_in_acquisition(&self) -> Result<bool, ReadError> {
        Ok(self.current().in_acquisition)
    }

    fn spectrum_count(&self) -> Result<i64, ReadError> {
        Ok(self.current().spectrum_count)
    }

    fn first_spectrum_index(&self) -> Result<i64, ReadError> {
        Ok(self.current().first_spectrum)
    }

    fn last_spectrum_index(&self) -> Result<i64, ReadError> {
        Ok(self.current().last_spectrum)
    }

    fn retention_time_minutes(&self, scan: i64) -> Result<f64, ReadError> {
        self.check_scan("retention time", scan)?;
        Ok(scan as f64 * RT_MINUTES_PER_SCAN)
    }

    fn expected_runtime_seconds(&self) -> Result<f64, ReadError> {
        Ok(self.current().expected_runtime_secs)
    }

    fn ms_order(&self, scan: i64) -> Result<MsOrder, ReadError> {
        self.check_scan("ms order", scan)?;
        Ok(if scan % 2 == 0 { MsOrder::Ms2 } else { MsOrder::Ms })
    }

    fn max_intensity(&self, scan: i64) -> Result<f64, ReadError> {
        self.check_scan("base intensity", scan)?;
        Ok(scan as f64 * 1000.0)
    }

    fn file_name(&self) -> String {
        self.file_name.clone()
    }

    fn run_header_summary(&self) -> Option<String> {
        Some("scripted run".to_string())
    }
}

#[derive(Debug, Default)]
struct OpenerState {
    failures_left: AtomicUsize,
    open_calls: AtomicUsize,
    opened: Mutex<Vec<PathBuf>>,
}

/// Hands out a fresh copy of the script for every path. Clones share counters.
#[derive(Clone)]
pub struct ScriptedOpener {
    script: Script,
    state: Arc<OpenerState>,
}

impl ScriptedOpener {
    pub fn new(script: Script) -> Self {
        Self {
            script,
            state: Arc::new(OpenerState::default()),
        }
    }

    /// Fail the next `count` open calls.
    pub fn failing_first(self, count: usize) -> Self {
        self.state.failures_left.store(count, Ordering::SeqCst);
        self
    }

    pub fn opened(&self) -> Vec<PathBuf> {
        self.state.opened.lock().unwrap().clone()
    }

    pub fn open_calls(&self) -> usize {
        self.state.open_calls.load(Ordering::SeqCst)
    }
}

impl SourceOpener for ScriptedOpener {
    type Source = ScriptedSource;

    fn open(&self, path: &Path) -> Result<ScriptedSource, OpenError> {
        self.state.open_calls.fetch_add(1, Ordering::SeqCst);
        let failed = self
            .state
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok();
        if failed {
            return Err(OpenError::new(path, "sharing violation"));
        }
        self.state.opened.lock().unwrap().push(path.to_path_buf());
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Ok(self.script.source(&name).0)
    }
}

/// Short retry backoff so retry tests stay readable in virtual time.
pub fn test_config() -> MonitorConfig {
    MonitorConfig {
        refresh_retry: RetryPolicy {
            max_attempts: 3,
            initial_backoff: Duration::from_secs(1),
            max_backoff: Duration::from_secs(4),
        },
        ..MonitorConfig::default()
    }
}

pub fn shared_sink(sink: &MemorySink) -> Arc<dyn ReportSink> {
    Arc::new(sink.clone())
}

/// Short name of each recorded event, in order.
pub fn kinds(sink: &MemorySink) -> Vec<&'static str> {
    sink.records().iter().map(|r| kind(&r.event)).collect()
}

pub fn kind(event: &ReportEvent) -> &'static str {
    match event {
        ReportEvent::FileObserved { .. } => "file_observed",
        ReportEvent::AwaitingFirstSpectrum { .. } => "awaiting",
        ReportEvent::FirstSpectrumRecorded { .. } => "first_spectrum",
        ReportEvent::Progress { .. } => "progress",
        ReportEvent::AcquisitionComplete { .. } => "complete",
        ReportEvent::SessionCancelled { .. } => "cancelled",
        ReportEvent::ReadFailed { .. } => "read_failed",
    }
}

pub fn assert_close(actual: f64, expected: f64) {
    assert!(
        (actual - expected).abs() < 0.01,
        "expected {} but got {}",
        expected,
        actual
    );
}
