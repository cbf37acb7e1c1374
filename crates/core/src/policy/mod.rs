//! Transcode policy.
//!
//! Pure decision logic. [`decide`] compares a probed source with the target
//! profile and the cached analysis and returns a [`Decision`]: the
//! [`Strategy`], the video [`FilterChain`], the loudness gain and the audio
//! tracks to keep. The same inputs always produce the same decision.
//!
//! | Source vs profile                       | Gain | Strategy         |
//! |-----------------------------------------|------|------------------|
//! | conforms                                | none | `Passthrough`    |
//! | conforms                                | some | `AudioGainOnly`  |
//! | differs, `fps_src >= fps_tgt`           | any  | `DirectReencode` |
//! | differs, `fps_tgt - fps_src > 4`        | any  | `DirectReencode` |
//! | differs, small frame rate increase      | any  | `Reclock`        |

mod filters;
mod gain;
mod strategy;
mod tracks;

pub use filters::{aspect_correction, cropped_aspect, FilterChain, FilterStage, ASPECT_TOLERANCE};
pub use gain::{compute_gain, GAIN_SNAP_DB};
pub use strategy::{
    analysis_request, decide, find_mismatches, reencode_strategy, Decision, Mismatch, Strategy,
    MAX_RECLOCK_DELTA,
};
pub use tracks::select_tracks;
