//! Error types for the job module.

use std::path::PathBuf;
use thiserror::Error;

use crate::lifecycle::PlacementError;
use crate::media::ProbeError;
use crate::orchestrator::OrchestratorError;
use crate::profile::ProfileError;

/// Reasons a job fails. Turned into the job's diagnostic text.
#[derive(Debug, Error)]
pub enum JobError {
    #[error(transparent)]
    Probe(#[from] ProbeError),

    #[error("Invalid profile: {0}")]
    Profile(#[from] ProfileError),

    #[error(transparent)]
    Orchestrator(OrchestratorError),

    /// Moving the finished output into place failed.
    #[error(transparent)]
    Placement(PlacementError),

    /// The destination exists and overwriting is off.
    #[error("Destination already exists: {path}")]
    DestinationExists { path: PathBuf },

    /// Source and destination are the same file.
    #[error("Destination is the source file: {path}")]
    DestinationIsSource { path: PathBuf },

    /// A job can only be processed once.
    #[error("Job has already been processed")]
    AlreadyProcessed,

    #[error("Cancelled")]
    Cancelled,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

// A cancelled orchestrator is a cancelled job.
impl From<OrchestratorError> for JobError {
    fn from(err: OrchestratorError) -> Self {
        match err {
            OrchestratorError::Cancelled => Self::Cancelled,
            other => Self::Orchestrator(other),
        }
    }
}

// A destination taken at commit time reads like one taken up front.
impl From<PlacementError> for JobError {
    fn from(err: PlacementError) -> Self {
        match err {
            PlacementError::DestinationExists { path } => Self::DestinationExists { path },
            other => Self::Placement(other),
        }
    }
}
