//! Process orchestration.
//!
//! The [`Orchestrator`] turns a [`Decision`](crate::policy::Decision) into
//! running processes:
//!
//! - `AudioGainOnly` and `DirectReencode` run one ffmpeg invocation.
//! - `Reclock` extracts and time-stretches the audio first, then runs a
//!   decoder and an encoder connected by a raw frame pipe. The two are
//!   supervised together and neither outlives a failure of the other.
//! - `Passthrough` runs nothing and relocates the source.
//!
//! Every stage's diagnostic stream is drained while it runs. Progress
//! markers feed the job's [`ProgressTracker`]; the remaining lines are kept
//! for failure reports.

mod commands;
mod drain;
mod error;
mod progress;
mod runner;
mod stage;

pub use commands::{CommandBuilder, ToolCommand};
pub use drain::{drain_lines, DiagnosticLog, MarkerValue, ProgressMarker};
pub use error::{OrchestratorError, StageFailure};
pub use progress::{JobProgress, ProgressTracker, MAX_RUNNING_PERCENT};
pub use runner::Orchestrator;
pub use stage::{spawn, supervise, StageExit, StageReport};
