//! Error types for archive opening and scene parsing.
//!
//! Cache queries never return these: a missing node or unreadable sample is
//! reported as `None`. Errors only surface where a file has to be opened.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for archive operations.
#[derive(Error, Debug)]
pub enum Error {
    /// File does not exist or cannot be accessed
    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    /// An archive was requested with no files at all
    #[error("Archive has no files")]
    EmptyArchive,

    /// Invalid data structure in file
    #[error("Invalid file structure: {0}")]
    InvalidStructure(String),

    /// Scene document could not be parsed
    #[error("Invalid scene document: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error with message
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create an "other" error from a string.
    pub fn other(msg: impl Into<String>) -> Self {
        Self::Other(msg.into())
    }

    /// Create an invalid structure error.
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidStructure(msg.into())
    }
}

/// Result type alias for archive operations.
pub type Result<T> = std::result::Result<T, Error>;
