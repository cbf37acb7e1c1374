//! Error types for the media module.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while probing a source. All of them are fatal for a job.
#[derive(Debug, Error)]
pub enum ProbeError {
    /// FFprobe binary not found.
    #[error("FFprobe not found at path: {path}")]
    FfprobeNotFound { path: PathBuf },

    /// Input file not found.
    #[error("Input file not found: {path}")]
    InputNotFound { path: PathBuf },

    /// FFprobe exited with a non-zero status.
    #[error("FFprobe failed on {path} (exit code {code:?}): {stderr}")]
    ProbeFailed {
        path: PathBuf,
        code: Option<i32>,
        stderr: String,
    },

    /// FFprobe output could not be interpreted.
    #[error("Malformed media info for {path}: {reason}")]
    Malformed { path: PathBuf, reason: String },

    /// The source carries no video stream.
    #[error("No video stream in {path}")]
    NoVideoStream { path: PathBuf },

    /// I/O error while running ffprobe.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ProbeError {
    /// Creates a new malformed metadata error.
    pub fn malformed(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::Malformed {
            path: path.into(),
            reason: reason.into(),
        }
    }
}
