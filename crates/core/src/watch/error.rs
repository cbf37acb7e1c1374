//! Error types for the watch module.

use std::path::PathBuf;
use thiserror::Error;

use crate::profile::ProfileError;

/// Errors that stop a watch folder from running.
#[derive(Debug, Error)]
pub enum WatchError {
    #[error("Watch input directory does not exist: {path}")]
    InputDirMissing { path: PathBuf },

    #[error("Invalid profile: {0}")]
    Profile(#[from] ProfileError),
}
