//! Error types for the analysis module.

use std::path::PathBuf;
use thiserror::Error;

/// Errors from an analysis scan. None of them fail a job: the concerns the
/// scan was asked for are cached as unmeasured.
#[derive(Debug, Error)]
pub enum AnalysisError {
    /// FFmpeg binary not found.
    #[error("FFmpeg not found at path: {path}")]
    FfmpegNotFound { path: PathBuf },

    /// The scan process exited with a non-zero status.
    #[error("Analysis scan failed (exit code {code:?}): {diagnostics}")]
    ScanFailed {
        code: Option<i32>,
        diagnostics: String,
    },

    /// The scan was interrupted.
    #[error("Analysis scan cancelled")]
    Cancelled,

    /// I/O error while running the scan.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
