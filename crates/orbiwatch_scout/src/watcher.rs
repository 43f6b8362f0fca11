//! Polling arrival watcher
//!
//! Each poll lists the root directory (non-recursive), keeps regular files
//! whose name matches the pattern, and diffs the result against the previous
//! listing. Files present when the watcher is created form the baseline and
//! are never reported. A file that disappears is forgotten, so recreating it
//! reports it again.

use crate::error::{Result, ScoutError};
use glob::{MatchOptions, Pattern};
use orbiwatch_monitor::{sleep_or_cancelled, CancellationToken};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

pub const DEFAULT_PATTERN: &str = "*.raw";
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);

// Vendor software is inconsistent about extension case (.raw / .RAW).
const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: false,
    require_literal_separator: true,
    require_literal_leading_dot: false,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchConfig {
    pub root: PathBuf,
    /// Glob matched against the file name only.
    pub pattern: String,
    pub poll_interval: Duration,
}

impl WatchConfig {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            pattern: DEFAULT_PATTERN.to_string(),
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

pub struct ArrivalWatcher {
    root: PathBuf,
    pattern: Pattern,
    poll_interval: Duration,
    known: HashSet<PathBuf>,
}

impl ArrivalWatcher {
    /// Validate the root and pattern, then take the baseline listing.
    pub fn new(config: WatchConfig) -> Result<Self> {
        if !config.root.is_dir() {
            return Err(ScoutError::NotADirectory(config.root));
        }
        let pattern = Pattern::new(&config.pattern)
            .map_err(|e| ScoutError::Pattern(format!("{}: {}", config.pattern, e)))?;

        let mut watcher = Self {
            root: config.root,
            pattern,
            poll_interval: config.poll_interval,
            known: HashSet::new(),
        };
        watcher.known = watcher.list_matching()?;
        debug!(
            root = %watcher.root.display(),
            baseline = watcher.known.len(),
            "Arrival watcher baseline taken"
        );
        Ok(watcher)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn pattern(&self) -> &str {
        self.pattern.as_str()
    }

    fn matches(&self, path: &Path) -> bool {
        path.file_name()
            .and_then(|name| name.to_str())
            .is_some_and(|name| self.pattern.matches_with(name, MATCH_OPTIONS))
    }

    fn list_matching(&self) -> Result<HashSet<PathBuf>> {
        let mut found = HashSet::new();
        for entry in std::fs::read_dir(&self.root)? {
            let path = entry?.path();
            if path.is_file() && self.matches(&path) {
                found.insert(path);
            }
        }
        Ok(found)
    }

    /// One poll: matching files that were not there last time, sorted by path.
    pub fn poll_once(&mut self) -> Result<Vec<PathBuf>> {
        let current = self.list_matching()?;
        let mut arrivals: Vec<PathBuf> = current.difference(&self.known).cloned().collect();
        arrivals.sort();
        self.known = current;
        Ok(arrivals)
    }

    /// Poll until cancelled, sending each arrival once.
    ///
    /// Listing errors are logged and the next poll tried; the watcher also
    /// stops when the receiving side is dropped.
    pub async fn run(mut self, tx: mpsc::Sender<PathBuf>, cancel: CancellationToken) -> Result<()> {
        info!(
            root = %self.root.display(),
            pattern = %self.pattern,
            interval_ms = self.poll_interval.as_millis() as u64,
            "Watching for new files"
        );

        while sleep_or_cancelled(&cancel, self.poll_interval).await {
            let arrivals = match self.poll_once() {
                Ok(arrivals) => arrivals,
                Err(e) => {
                    warn!(root = %self.root.display(), "Directory poll failed: {}", e);
                    continue;
                }
            };

            for path in arrivals {
                info!(path = %path.display(), "New file detected");
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => return Ok(()),
                    sent = tx.send(path) => {
                        if sent.is_err() {
                            debug!("Arrival receiver dropped, watcher stopping");
                            return Ok(());
                        }
                    }
                }
            }
        }

        debug!("Arrival watcher stopped");
        Ok(())
    }
}
