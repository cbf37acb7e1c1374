//! Target profiles.
//!
//! A [`TargetProfile`] is the immutable description of what a job must
//! produce. It is assembled once per job from the built-in defaults plus any
//! [`ProfileOverrides`] (configuration file, profile file, command line) and
//! validated by [`ProfileBuilder::build`].

mod builder;
mod defaults;
mod error;
mod types;

pub use builder::ProfileBuilder;
pub use defaults::{
    default_audio_bitrate, default_audio_codec, default_video_bitrate, DEFAULT_LOUDNESS_TARGET,
};
pub use error::ProfileError;
pub use types::{LoudnessSetting, ProfileOverrides, TargetProfile, TrackPolicy};
