//! Error types for acquisition monitoring

use crate::session::Phase;
use std::path::PathBuf;
use thiserror::Error;

/// The data source could not be opened for a path.
///
/// Raised by [`crate::SourceOpener::open`]. Typical cause: the instrument
/// still holds the file in a lock state the reader cannot share.
#[derive(Error, Debug, Clone)]
#[error("Cannot open data source for {}: {message}", path.display())]
pub struct OpenError {
    pub path: PathBuf,
    pub message: String,
}

impl OpenError {
    pub fn new(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// A refresh or metric read failed on an open data source.
#[derive(Error, Debug, Clone)]
#[error("Read failed during {operation}: {message}")]
pub struct ReadError {
    pub operation: &'static str,
    pub message: String,
}

impl ReadError {
    pub fn new(operation: &'static str, message: impl Into<String>) -> Self {
        Self {
            operation,
            message: message.into(),
        }
    }
}

/// Monitor error type
#[derive(Error, Debug)]
pub enum MonitorError {
    #[error(transparent)]
    Open(#[from] OpenError),

    #[error(transparent)]
    Read(#[from] ReadError),

    #[error("Invalid phase transition: {from:?} -> {to:?}")]
    InvalidTransition { from: Phase, to: Phase },
}

impl MonitorError {
    pub fn is_open_error(&self) -> bool {
        matches!(self, MonitorError::Open(_))
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, MonitorError>;
