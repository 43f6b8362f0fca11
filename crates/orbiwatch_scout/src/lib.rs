//! Orbiwatch Scout - new-file detection for a watched directory
//!
//! Reports files matching a filename glob that appear after the watcher
//! started. Detection is by polling the directory listing, which behaves the
//! same on local disks and network shares where instruments usually write.

pub mod error;
pub mod watcher;

pub use error::{Result, ScoutError};
pub use watcher::{ArrivalWatcher, WatchConfig, DEFAULT_PATTERN, DEFAULT_POLL_INTERVAL};
