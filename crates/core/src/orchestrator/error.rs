//! Error types for the orchestrator module.

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

use crate::lifecycle::PlacementError;

/// A stage that did not exit cleanly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageFailure {
    pub stage: String,
    /// `None` when the process was killed.
    pub code: Option<i32>,
    /// Tail of the stage's diagnostic output.
    pub diagnostics: String,
}

impl fmt::Display for StageFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.code {
            Some(code) => write!(f, "{} exited with code {}", self.stage, code)?,
            None => write!(f, "{} was terminated", self.stage)?,
        }
        if !self.diagnostics.is_empty() {
            write!(f, ":\n{}", self.diagnostics)?;
        }
        Ok(())
    }
}

/// Errors that can occur while running a job's processes.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    /// A stage's program could not be started.
    #[error("Failed to start {stage} ({program}): {source}")]
    ProcessSpawn {
        stage: String,
        program: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// One or more stages exited unsuccessfully.
    #[error("{}", describe_failures(.0))]
    ProcessExit(Vec<StageFailure>),

    /// The job was cancelled while stages were running.
    #[error("Cancelled")]
    Cancelled,

    /// Passthrough relocation failed.
    #[error(transparent)]
    Placement(#[from] PlacementError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl OrchestratorError {
    /// Creates a new spawn error.
    pub fn spawn(stage: impl Into<String>, program: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::ProcessSpawn {
            stage: stage.into(),
            program: program.into(),
            source,
        }
    }

    /// The failed stages, empty for other variants.
    pub fn failures(&self) -> &[StageFailure] {
        match self {
            Self::ProcessExit(failures) => failures,
            _ => &[],
        }
    }
}

fn describe_failures(failures: &[StageFailure]) -> String {
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("\n")
}
