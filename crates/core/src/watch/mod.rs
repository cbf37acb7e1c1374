//! Watch folder.
//!
//! Polls an input directory and runs a [`Job`](crate::job::Job) for every
//! media file whose size stayed the same across two polls.

mod error;
mod folder;

pub use error::WatchError;
pub use folder::{BatchSummary, WatchFolder};
