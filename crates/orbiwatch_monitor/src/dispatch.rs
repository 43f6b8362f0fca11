//! Worker pool that turns file arrivals into monitoring sessions.
//!
//! The arrival source pushes paths into a bounded channel. `workers` tasks
//! share the receiving end; each takes one path, runs its session to the end
//! and then takes the next one. With the default of one worker, sessions are
//! strictly serialised.

use crate::cancel::{sleep_or_cancelled, CancellationToken};
use crate::config::{DispatchConfig, MonitorConfig};
use crate::error::Result;
use crate::monitor::{AcquisitionMonitor, SessionOutcome};
use crate::sink::ReportSink;
use crate::source::SourceOpener;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Capacity of the queue between the arrival source and the workers.
pub const ARRIVAL_QUEUE_CAPACITY: usize = 64;

/// Channel pair to connect an arrival source to [`Dispatcher::run`].
pub fn arrival_channel() -> (mpsc::Sender<PathBuf>, mpsc::Receiver<PathBuf>) {
    mpsc::channel(ARRIVAL_QUEUE_CAPACITY)
}

/// Counts of how sessions ended.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchSummary {
    pub completed: usize,
    pub cancelled: usize,
    /// Sessions ended by a read failure after they started.
    pub failed: usize,
    /// Files that never produced a session.
    pub open_failures: usize,
}

impl DispatchSummary {
    fn merge(&mut self, other: DispatchSummary) {
        self.completed += other.completed;
        self.cancelled += other.cancelled;
        self.failed += other.failed;
        self.open_failures += other.open_failures;
    }
}

struct Shared<O: SourceOpener> {
    opener: O,
    monitor_config: MonitorConfig,
    config: DispatchConfig,
    sink: Arc<dyn ReportSink>,
    cancel: CancellationToken,
}

pub struct Dispatcher<O: SourceOpener> {
    shared: Arc<Shared<O>>,
}

impl<O: SourceOpener + 'static> Dispatcher<O> {
    pub fn new(
        opener: O,
        monitor_config: MonitorConfig,
        config: DispatchConfig,
        sink: Arc<dyn ReportSink>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                opener,
                monitor_config,
                config,
                sink,
                cancel,
            }),
        }
    }

    /// Drain `arrivals` until the channel closes or the token is cancelled.
    ///
    /// Running sessions are not abandoned: on cancellation each one emits its
    /// cancellation record before its worker exits.
    pub async fn run(self, arrivals: mpsc::Receiver<PathBuf>) -> DispatchSummary {
        let workers = self.shared.config.workers.max(1);
        info!(workers, "Dispatcher started");

        let arrivals = Arc::new(Mutex::new(arrivals));
        let handles: Vec<(usize, JoinHandle<DispatchSummary>)> = (0..workers)
            .map(|id| {
                let shared = Arc::clone(&self.shared);
                let arrivals = Arc::clone(&arrivals);
                (id, tokio::spawn(worker_loop(id, shared, arrivals)))
            })
            .collect();

        let mut summary = DispatchSummary::default();
        for (id, handle) in handles {
            match handle.await {
                Ok(worker_summary) => summary.merge(worker_summary),
                Err(e) => warn!(worker = id, "Worker task panicked: {:?}", e),
            }
        }

        info!(
            completed = summary.completed,
            cancelled = summary.cancelled,
            failed = summary.failed,
            open_failures = summary.open_failures,
            "Dispatcher stopped"
        );
        summary
    }
}

async fn worker_loop<O: SourceOpener + 'static>(
    id: usize,
    shared: Arc<Shared<O>>,
    arrivals: Arc<Mutex<mpsc::Receiver<PathBuf>>>,
) -> DispatchSummary {
    let mut summary = DispatchSummary::default();

    loop {
        let next = tokio::select! {
            biased;
            _ = shared.cancel.cancelled() => None,
            path = async { arrivals.lock().await.recv().await } => path,
        };
        let Some(path) = next else {
            break;
        };

        info!(worker = id, path = %path.display(), "New file observed");
        let Some(monitor) = open_with_retry(&shared, &path).await else {
            if !shared.cancel.is_cancelled() {
                summary.open_failures += 1;
            }
            continue;
        };

        match monitor.run().await {
            Ok(SessionOutcome::Completed(done)) => {
                summary.completed += 1;
                debug!(worker = id, file = %done.file_name, dead_time_secs = done.dead_time_secs, "Session completed");
                if shared.config.exit_after_first_run {
                    info!("First run complete, shutting down");
                    shared.cancel.cancel();
                }
            }
            Ok(SessionOutcome::Cancelled { .. }) => summary.cancelled += 1,
            Err(e) => {
                summary.failed += 1;
                warn!(worker = id, path = %path.display(), "Session failed: {}", e);
            }
        }
    }

    debug!(worker = id, "Worker stopped");
    summary
}

/// Bootstrap a session, retrying under the open policy.
///
/// `None` when every attempt failed or the token was cancelled first.
async fn open_with_retry<O: SourceOpener>(
    shared: &Shared<O>,
    path: &Path,
) -> Option<AcquisitionMonitor<O::Source>> {
    let policy = shared.config.open_retry;
    let mut attempt = 1;
    loop {
        if shared.cancel.is_cancelled() {
            return None;
        }
        let result: Result<_> = AcquisitionMonitor::bootstrap(
            &shared.opener,
            path,
            shared.monitor_config,
            Arc::clone(&shared.sink),
            shared.cancel.clone(),
        );
        match result {
            Ok(monitor) => return Some(monitor),
            Err(e) if attempt < policy.attempts() => {
                let delay = policy.backoff_after(attempt);
                warn!(
                    path = %path.display(),
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    "Could not start session, retrying: {}",
                    e
                );
                if !sleep_or_cancelled(&shared.cancel, delay).await {
                    return None;
                }
                attempt += 1;
            }
            Err(e) => {
                warn!(path = %path.display(), attempts = attempt, "Giving up on file: {}", e);
                return None;
            }
        }
    }
}
