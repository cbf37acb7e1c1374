//! Job status and status messages.

use serde::Serialize;
use std::fmt;

/// Where a job is in its lifecycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Running,
    Succeeded,
    Failed { diagnostic: String },
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed { .. })
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Running => write!(f, "running"),
            Self::Succeeded => write!(f, "succeeded"),
            Self::Failed { diagnostic } => write!(f, "failed: {}", diagnostic),
        }
    }
}

/// Severity of a human readable job status message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum StatusLevel {
    Debug,
    Info,
    Warning,
    Error,
}

impl StatusLevel {
    /// Logs `message` for `job_id` at this level.
    pub fn emit(self, job_id: &str, message: &str) {
        match self {
            Self::Debug => tracing::debug!(job_id, "{}", message),
            Self::Info => tracing::info!(job_id, "{}", message),
            Self::Warning => tracing::warn!(job_id, "{}", message),
            Self::Error => tracing::error!(job_id, "{}", message),
        }
    }
}
