//! Error types for the arrival watcher

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Scout error type
#[derive(Error, Debug)]
pub enum ScoutError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Pattern error: {0}")]
    Pattern(String),

    #[error("Not a directory: {}", .0.display())]
    NotADirectory(PathBuf),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, ScoutError>;
