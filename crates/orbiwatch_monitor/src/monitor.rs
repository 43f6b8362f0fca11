//! Acquisition monitor: drives one session from first sight of a file to the
//! end of its acquisition.
//!
//! ```text
//! bootstrap ─▶ AwaitingFirstSpectrum ─▶ BaselineComputed ─▶ Monitoring ─▶ Completed
//!              (poll every 5 s)          (dead time, once)   (poll every 30 s)
//! ```
//!
//! Every sleep races the cancellation token; a cancelled session emits one
//! `SessionCancelled` record after its last complete record.

use crate::cancel::{sleep_or_cancelled, CancellationToken};
use crate::config::MonitorConfig;
use crate::error::{MonitorError, ReadError, Result};
use crate::report::{ReportEvent, ReportRecord};
use crate::session::{AcquisitionSession, Phase};
use crate::sink::ReportSink;
use crate::snapshot::{minutes_to_duration, Snapshot};
use crate::source::{RawDataSource, SourceOpener};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Summary of a session that reached [`Phase::Completed`].
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSummary {
    pub path: PathBuf,
    pub file_name: String,
    pub dead_time_secs: f64,
    pub monitoring_polls: u64,
    pub final_spectrum_count: i64,
    pub elapsed: Duration,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SessionOutcome {
    Completed(SessionSummary),
    /// Stopped by the cancellation token while in `phase`.
    Cancelled { phase: Phase },
}

impl SessionOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, SessionOutcome::Completed(_))
    }
}

pub struct AcquisitionMonitor<S: RawDataSource> {
    source: S,
    session: AcquisitionSession,
    config: MonitorConfig,
    sink: Arc<dyn ReportSink>,
    cancel: CancellationToken,
    last_snapshot: Snapshot,
    monitoring_polls: u64,
}

impl<S: RawDataSource> AcquisitionMonitor<S> {
    /// Open `path` and start a session.
    ///
    /// An [`OpenError`](crate::OpenError) is returned as-is; retrying is the
    /// caller's decision.
    pub fn bootstrap<O>(
        opener: &O,
        path: &Path,
        config: MonitorConfig,
        sink: Arc<dyn ReportSink>,
        cancel: CancellationToken,
    ) -> Result<Self>
    where
        O: SourceOpener<Source = S> + ?Sized,
    {
        let source = opener.open(path)?;
        Self::from_source(source, path, config, sink, cancel)
    }

    /// Start a session on an already opened source.
    pub fn from_source(
        source: S,
        path: &Path,
        config: MonitorConfig,
        sink: Arc<dyn ReportSink>,
        cancel: CancellationToken,
    ) -> Result<Self> {
        let initial = Snapshot::capture_header(&source)?;
        let session = AcquisitionSession::start(path, &initial);

        info!(
            path = %path.display(),
            in_acquisition = initial.in_acquisition,
            spectrum_count = initial.spectrum_count,
            last_spectrum = initial.last_spectrum_index,
            "Session started"
        );
        sink.emit(&ReportRecord::now(ReportEvent::FileObserved {
            path: path.to_path_buf(),
            created_at: session.created_at(),
            in_acquisition: initial.in_acquisition,
            spectrum_count: initial.spectrum_count,
            last_spectrum_index: initial.last_spectrum_index,
            run_header: source.run_header_summary(),
        }));

        Ok(Self {
            source,
            session,
            config,
            sink,
            cancel,
            last_snapshot: initial,
            monitoring_polls: 0,
        })
    }

    pub fn session(&self) -> &AcquisitionSession {
        &self.session
    }

    /// Run the session to completion, cancellation, or a fatal read error.
    pub async fn run(mut self) -> Result<SessionOutcome> {
        match self.drive().await {
            Err(MonitorError::Read(err)) => {
                warn!(
                    path = %self.session.path().display(),
                    phase = ?self.session.phase(),
                    error = %err,
                    "Session terminated by read failure"
                );
                self.sink.emit(&ReportRecord::now(ReportEvent::ReadFailed {
                    path: self.session.path().to_path_buf(),
                    phase: self.session.phase(),
                    message: err.to_string(),
                }));
                Err(MonitorError::Read(err))
            }
            other => other,
        }
    }

    async fn drive(&mut self) -> Result<SessionOutcome> {
        if !self.await_first_spectrum().await? {
            return Ok(self.cancelled());
        }

        if !self.compute_baseline().await? {
            return Ok(self.cancelled());
        }
        self.session.advance_to(Phase::Monitoring)?;

        if !self.monitor_acquisition().await? {
            return Ok(self.cancelled());
        }
        self.session.advance_to(Phase::Completed)?;

        let file_name = self.source.file_name();
        info!(path = %self.session.path().display(), polls = self.monitoring_polls, "Acquisition complete");
        self.sink.emit(&ReportRecord::now(ReportEvent::AcquisitionComplete {
            file_name: file_name.clone(),
        }));

        Ok(SessionOutcome::Completed(SessionSummary {
            path: self.session.path().to_path_buf(),
            file_name,
            dead_time_secs: self.session.dead_time_secs().unwrap_or_default(),
            monitoring_polls: self.monitoring_polls,
            final_spectrum_count: self.last_snapshot.spectrum_count,
            elapsed: self.session.elapsed(),
        }))
    }

    /// Poll until both the spectrum count and the last index have moved.
    /// The bootstrap snapshot is checked first, without another read.
    async fn await_first_spectrum(&mut self) -> Result<bool> {
        while !self.session.first_spectrum_observed(&self.last_snapshot) {
            self.sink.emit(&ReportRecord::now(ReportEvent::AwaitingFirstSpectrum {
                elapsed_secs: self.session.elapsed().as_secs_f64(),
            }));

            let interval = self.config.first_spectrum_poll_interval;
            if !sleep_or_cancelled(&self.cancel, interval).await {
                return Ok(false);
            }
            match self.refresh_with(Snapshot::capture_header::<S>).await? {
                Some(snapshot) => self.last_snapshot = snapshot,
                None => return Ok(false),
            }
        }
        debug!(
            path = %self.session.path().display(),
            spectrum_count = self.last_snapshot.spectrum_count,
            last_spectrum = self.last_snapshot.last_spectrum_index,
            "First spectrum observed"
        );
        Ok(true)
    }

    async fn compute_baseline(&mut self) -> Result<bool> {
        let elapsed = self.session.elapsed();
        let read = self
            .read_with_retry("first spectrum retention time", |source| {
                let first = source.first_spectrum_index()?;
                let minutes = source.retention_time_minutes(first)?;
                Ok((first, minutes))
            })
            .await?;
        let Some((first_index, retention_minutes)) = read else {
            return Ok(false);
        };

        let dead_time = self.session.compute_baseline(retention_minutes, elapsed)?;
        info!(
            path = %self.session.path().display(),
            first_spectrum = first_index,
            dead_time_secs = dead_time,
            "Baseline computed"
        );
        self.sink.emit(&ReportRecord::now(ReportEvent::FirstSpectrumRecorded {
            first_spectrum_index: first_index,
            first_retention_secs: minutes_to_duration(retention_minutes).as_secs_f64(),
            dead_time_secs: dead_time,
        }));
        Ok(true)
    }

    async fn monitor_acquisition(&mut self) -> Result<bool> {
        loop {
            let in_acquisition = match self
                .read_with_retry("acquisition state", |source| source.is_in_acquisition())
                .await?
            {
                Some(flag) => flag,
                None => return Ok(false),
            };
            if !in_acquisition {
                return Ok(true);
            }

            let Some(snapshot) = self.refresh_with(Snapshot::capture::<S>).await? else {
                return Ok(false);
            };
            if snapshot.spectrum_count < self.last_snapshot.spectrum_count {
                warn!(
                    path = %self.session.path().display(),
                    previous = self.last_snapshot.spectrum_count,
                    current = snapshot.spectrum_count,
                    "Spectrum count went backwards"
                );
            }

            self.monitoring_polls += 1;
            self.sink
                .emit(&ReportRecord::progress(self.session.elapsed(), &snapshot));
            self.last_snapshot = snapshot;

            let interval = self.config.monitoring_poll_interval;
            if !sleep_or_cancelled(&self.cancel, interval).await {
                return Ok(false);
            }
        }
    }

    /// Refresh the source, then read it with `capture`. Scan metrics are
    /// only read once monitoring has started.
    async fn refresh_with(
        &mut self,
        capture: fn(&S) -> std::result::Result<Snapshot, ReadError>,
    ) -> Result<Option<Snapshot>> {
        self.read_with_retry("refresh", |source| {
            source.refresh()?;
            capture(&*source)
        })
        .await
    }

    /// Run `read` under the refresh retry policy.
    ///
    /// `Ok(None)` means the session was cancelled during a backoff.
    async fn read_with_retry<T>(
        &mut self,
        operation: &'static str,
        mut read: impl FnMut(&mut S) -> std::result::Result<T, ReadError>,
    ) -> Result<Option<T>> {
        let policy = self.config.refresh_retry;
        let mut attempt = 1;
        loop {
            match read(&mut self.source) {
                Ok(value) => return Ok(Some(value)),
                Err(err) if attempt < policy.attempts() => {
                    let delay = policy.backoff_after(attempt);
                    warn!(
                        path = %self.session.path().display(),
                        operation,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "Data source read failed, retrying"
                    );
                    if !sleep_or_cancelled(&self.cancel, delay).await {
                        return Ok(None);
                    }
                    attempt += 1;
                }
                Err(err) => return Err(err.into()),
            }
        }
    }

    fn cancelled(&self) -> SessionOutcome {
        let phase = self.session.phase();
        info!(path = %self.session.path().display(), ?phase, "Session cancelled");
        self.sink.emit(&ReportRecord::now(ReportEvent::SessionCancelled {
            path: self.session.path().to_path_buf(),
            phase,
        }));
        SessionOutcome::Cancelled { phase }
    }
}
