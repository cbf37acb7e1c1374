//! Source media probing.
//!
//! [`MediaProbe`] runs ffprobe against a file and turns its JSON report into a
//! [`SourceMedia`]: one video stream (exact frame rate, display aspect with a
//! width/height fallback) plus the audio tracks in stream order. Audio stream
//! indices are kept as the tracks' ids for the rest of the job.

mod error;
mod probe;
mod rational;
mod types;

pub use error::ProbeError;
pub use probe::{parse_probe_output, MediaProbe};
pub use rational::{FrameRate, ParseFrameRateError};
pub use types::{container_of, AudioTrack, SourceMedia, VideoStream};
