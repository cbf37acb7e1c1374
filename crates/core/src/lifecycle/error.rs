//! Error types for the lifecycle module.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while relocating a file into place.
#[derive(Debug, Error)]
pub enum PlacementError {
    /// Source file not found.
    #[error("Source file not found: {path}")]
    SourceNotFound { path: PathBuf },

    /// Failed to create the destination directory.
    #[error("Failed to create directory: {path}")]
    DirectoryCreationFailed {
        path: PathBuf,
        #[source]
        error: std::io::Error,
    },

    /// Failed to move the file.
    #[error("Failed to move file from {from} to {to}")]
    MoveFailed {
        from: PathBuf,
        to: PathBuf,
        #[source]
        error: std::io::Error,
    },

    /// Failed to copy the file across filesystems.
    #[error("Failed to copy file from {from} to {to}")]
    CopyFailed {
        from: PathBuf,
        to: PathBuf,
        #[source]
        error: std::io::Error,
    },

    /// Something else occupies the destination.
    #[error("Destination already exists: {path}")]
    DestinationExists { path: PathBuf },

    /// The copy does not match the source.
    #[error("Checksum mismatch for {path}: expected {expected}, got {actual}")]
    ChecksumMismatch {
        path: PathBuf,
        expected: String,
        actual: String,
    },
}

impl PlacementError {
    /// Creates a new copy failed error.
    pub fn copy_failed(from: PathBuf, to: PathBuf, error: std::io::Error) -> Self {
        Self::CopyFailed { from, to, error }
    }
}

/// Failure to remove an intermediate file. Only ever logged.
#[derive(Debug, Error)]
#[error("Failed to remove temporary file {path}: {error}")]
pub struct TempFileError {
    pub path: PathBuf,
    #[source]
    pub error: std::io::Error,
}
