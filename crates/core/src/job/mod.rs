//! Job lifecycle.
//!
//! A [`Job`] runs the whole chain for one source: probe, profile, lazy
//! analysis, decision, orchestration and cleanup. Failures of any step end
//! in [`JobStatus::Failed`] with a diagnostic; the caller only sees the
//! boolean returned by [`Job::process`].

mod error;
mod status;
mod transcode;

pub use error::JobError;
pub use status::{JobStatus, StatusLevel};
pub use transcode::Job;
