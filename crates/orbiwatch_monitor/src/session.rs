//! Per-file acquisition session and its phase machine

use crate::error::{MonitorError, Result};
use crate::snapshot::{minutes_to_duration, Snapshot};
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::time::Instant;

/// Session phases, in the only order they may be entered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    AwaitingFirstSpectrum,
    BaselineComputed,
    Monitoring,
    Completed,
}

impl Phase {
    pub fn successor(self) -> Option<Phase> {
        match self {
            Phase::AwaitingFirstSpectrum => Some(Phase::BaselineComputed),
            Phase::BaselineComputed => Some(Phase::Monitoring),
            Phase::Monitoring => Some(Phase::Completed),
            Phase::Completed => None,
        }
    }

    pub fn is_terminal(self) -> bool {
        self == Phase::Completed
    }
}

/// State of one observed file, owned by the monitor that created it.
///
/// The initial spectrum count and last-spectrum index are fixed at
/// construction; the baseline (first retention time and dead time) is
/// written exactly once, on entry to [`Phase::BaselineComputed`].
#[derive(Debug, Clone)]
pub struct AcquisitionSession {
    path: PathBuf,
    created_at: DateTime<Local>,
    created_instant: Instant,
    initial_spectrum_count: i64,
    initial_last_spectrum_index: i64,
    phase: Phase,
    first_spectrum_retention: Option<Duration>,
    dead_time_secs: Option<f64>,
}

impl AcquisitionSession {
    /// Start a session now, taking the initial values from `initial`.
    pub fn start(path: impl Into<PathBuf>, initial: &Snapshot) -> Self {
        Self::start_at(path, Local::now(), Instant::now(), initial)
    }

    pub fn start_at(
        path: impl Into<PathBuf>,
        created_at: DateTime<Local>,
        created_instant: Instant,
        initial: &Snapshot,
    ) -> Self {
        Self {
            path: path.into(),
            created_at,
            created_instant,
            initial_spectrum_count: initial.spectrum_count,
            initial_last_spectrum_index: initial.last_spectrum_index,
            phase: Phase::AwaitingFirstSpectrum,
            first_spectrum_retention: None,
            dead_time_secs: None,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn created_at(&self) -> DateTime<Local> {
        self.created_at
    }

    pub fn initial_spectrum_count(&self) -> i64 {
        self.initial_spectrum_count
    }

    pub fn initial_last_spectrum_index(&self) -> i64 {
        self.initial_last_spectrum_index
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn first_spectrum_retention(&self) -> Option<Duration> {
        self.first_spectrum_retention
    }

    /// Dead time in seconds. Negative when the instrument clock started
    /// before the file became visible.
    pub fn dead_time_secs(&self) -> Option<f64> {
        self.dead_time_secs
    }

    /// Time since the session was created.
    pub fn elapsed(&self) -> Duration {
        self.elapsed_at(Instant::now())
    }

    pub fn elapsed_at(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.created_instant)
    }

    /// True only when both the spectrum count and the last-spectrum index
    /// differ from their initial readings. One signal moving alone is not
    /// taken as proof that a full spectrum was written.
    pub fn first_spectrum_observed(&self, snapshot: &Snapshot) -> bool {
        snapshot.spectrum_count != self.initial_spectrum_count
            && snapshot.last_spectrum_index != self.initial_last_spectrum_index
    }

    /// Move to `next`, which must be the immediate successor of the current phase.
    pub fn advance_to(&mut self, next: Phase) -> Result<()> {
        if self.phase.successor() != Some(next) {
            return Err(MonitorError::InvalidTransition {
                from: self.phase,
                to: next,
            });
        }
        self.phase = next;
        Ok(())
    }

    /// Enter [`Phase::BaselineComputed`] and record the dead time.
    ///
    /// `dead time = elapsed seconds - first retention time (min) * 60`.
    /// Fails if the baseline was already computed.
    pub fn compute_baseline(&mut self, first_retention_minutes: f64, elapsed: Duration) -> Result<f64> {
        self.advance_to(Phase::BaselineComputed)?;
        let dead_time = elapsed.as_secs_f64() - first_retention_minutes * 60.0;
        self.first_spectrum_retention = Some(minutes_to_duration(first_retention_minutes));
        self.dead_time_secs = Some(dead_time);
        Ok(dead_time)
    }
}
