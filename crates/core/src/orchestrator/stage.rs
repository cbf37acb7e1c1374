//! Spawning and supervising a single stage process.

use std::process::{ExitStatus, Stdio};
use tokio::process::{Child, Command};
use tokio_util::sync::CancellationToken;

use super::commands::ToolCommand;
use super::drain::{drain_lines, DiagnosticLog, MarkerValue, ProgressMarker};
use super::error::{OrchestratorError, StageFailure};

/// How a supervised stage ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageExit {
    Exited(ExitStatus),
    /// Killed because the token fired.
    Killed,
}

/// Result of supervising one stage to completion.
#[derive(Debug)]
pub struct StageReport {
    pub stage: String,
    pub exit: StageExit,
    pub diagnostics: DiagnosticLog,
}

impl StageReport {
    pub fn succeeded(&self) -> bool {
        matches!(self.exit, StageExit::Exited(status) if status.success())
    }

    /// Converts an unsuccessful report into a failure entry.
    pub fn failure(&self) -> Option<StageFailure> {
        if self.succeeded() {
            return None;
        }
        let code = match self.exit {
            StageExit::Exited(status) => status.code(),
            StageExit::Killed => None,
        };
        Some(StageFailure {
            stage: self.stage.clone(),
            code,
            diagnostics: self.diagnostics.text(),
        })
    }
}

/// Starts `command` with the given stdin and stdout. Stderr is always piped
/// and the child is killed if its handle is dropped.
pub fn spawn(command: &ToolCommand, stdin: Stdio, stdout: Stdio) -> Result<Child, OrchestratorError> {
    tracing::debug!(stage = %command.stage, command = %command, "Starting stage");

    Command::new(&command.program)
        .args(&command.args)
        .stdin(stdin)
        .stdout(stdout)
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| OrchestratorError::spawn(&command.stage, &command.program, e))
}

/// Drains the child's stderr until it exits, routing progress markers to
/// `on_marker` and every other line into the diagnostic tail.
///
/// When `cancel` fires first the child is killed and reaped; the report then
/// says [`StageExit::Killed`]. I/O errors while draining also kill the child.
pub async fn supervise<F>(
    stage: &str,
    mut child: Child,
    marker: Option<ProgressMarker>,
    mut on_marker: F,
    cancel: &CancellationToken,
) -> Result<StageReport, OrchestratorError>
where
    F: FnMut(MarkerValue),
{
    let Some(stderr) = child.stderr.take() else {
        let _ = child.start_kill();
        return Err(OrchestratorError::Io(std::io::Error::other(format!(
            "{} stderr was not captured",
            stage
        ))));
    };

    let mut diagnostics = DiagnosticLog::default();
    let run = async {
        drain_lines(stderr, |line| {
            match marker.and_then(|m| m.parse(line)) {
                Some(value) => on_marker(value),
                None => diagnostics.push(line),
            }
        })
        .await?;
        child.wait().await
    };

    let status = tokio::select! {
        status = run => Some(status),
        _ = cancel.cancelled() => None,
    };

    let exit = match status {
        Some(Ok(status)) => StageExit::Exited(status),
        Some(Err(e)) => {
            let _ = child.start_kill();
            let _ = child.wait().await;
            return Err(OrchestratorError::Io(e));
        }
        None => {
            let _ = child.start_kill();
            let _ = child.wait().await;
            tracing::debug!(stage, "Stage killed");
            StageExit::Killed
        }
    };

    if let StageExit::Exited(status) = exit {
        tracing::debug!(stage, code = ?status.code(), "Stage exited");
    }

    Ok(StageReport {
        stage: stage.to_string(),
        exit,
        diagnostics,
    })
}
