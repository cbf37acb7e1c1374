//! Strategy selection.

use serde::Serialize;
use std::cmp::Ordering;
use std::fmt;

use super::filters::{aspect_correction, cropped_aspect, FilterChain, FilterStage};
use super::gain::compute_gain;
use super::tracks::select_tracks;
use crate::analysis::{AnalysisRequest, AnalysisResult};
use crate::media::{AudioTrack, FrameRate, SourceMedia};
use crate::profile::TargetProfile;

/// Largest frame rate increase (fps) handled by reclocking instead of
/// letting the encoder duplicate frames.
pub const MAX_RECLOCK_DELTA: f64 = 4.0;

/// How a job turns its source into the output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    /// Source already conforms; relocate it.
    Passthrough,
    /// Copy video, re-encode audio with a gain filter.
    AudioGainOnly,
    /// One encode pass with filters and frame rate conversion.
    DirectReencode,
    /// Decode to raw frames, retime, and time-stretch audio separately.
    Reclock,
}

impl Strategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Passthrough => "passthrough",
            Self::AudioGainOnly => "audio_gain_only",
            Self::DirectReencode => "direct_reencode",
            Self::Reclock => "reclock",
        }
    }

    pub fn reencodes_video(&self) -> bool {
        matches!(self, Self::DirectReencode | Self::Reclock)
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A property where source and profile disagree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "property", rename_all = "snake_case")]
pub enum Mismatch {
    Container { source: String, target: String },
    FrameRate { source: FrameRate, target: FrameRate },
    VideoCodec { source: String, target: String },
    PixelFormat { source: String, target: String },
    Width { source: u32, target: u32 },
    Height { source: u32, target: u32 },
}

impl fmt::Display for Mismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Container { source, target } => write!(f, "container {} -> {}", source, target),
            Self::FrameRate { source, target } => write!(f, "frame rate {} -> {}", source, target),
            Self::VideoCodec { source, target } => write!(f, "video codec {} -> {}", source, target),
            Self::PixelFormat { source, target } => {
                write!(f, "pixel format {} -> {}", source, target)
            }
            Self::Width { source, target } => write!(f, "width {} -> {}", source, target),
            Self::Height { source, target } => write!(f, "height {} -> {}", source, target),
        }
    }
}

/// Everything the orchestrator needs to run a job.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Decision {
    pub strategy: Strategy,
    /// Empty unless the video is re-encoded.
    pub filters: FilterChain,
    /// Gain in dB, `0.0` for none.
    pub gain_db: f64,
    /// Audio tracks surviving the track policy, in stream order.
    pub audio_tracks: Vec<AudioTrack>,
    /// Why the video must be re-encoded, empty when it need not be.
    pub mismatches: Vec<Mismatch>,
    /// Audio time-stretch ratio for [`Strategy::Reclock`] (`fps_tgt / fps_src`).
    pub tempo: f64,
}

impl Decision {
    pub fn has_gain(&self) -> bool {
        self.gain_db != 0.0
    }
}

/// Properties of `source` that differ from `profile`.
pub fn find_mismatches(source: &SourceMedia, profile: &TargetProfile) -> Vec<Mismatch> {
    let video = &source.video;
    let mut mismatches = Vec::new();

    if source.container != profile.container {
        mismatches.push(Mismatch::Container {
            source: source.container.clone(),
            target: profile.container.clone(),
        });
    }
    if video.frame_rate != profile.frame_rate {
        mismatches.push(Mismatch::FrameRate {
            source: video.frame_rate,
            target: profile.frame_rate,
        });
    }
    if video.codec != profile.video_codec {
        mismatches.push(Mismatch::VideoCodec {
            source: video.codec.clone(),
            target: profile.video_codec.clone(),
        });
    }
    if video.pixel_format != profile.pixel_format {
        mismatches.push(Mismatch::PixelFormat {
            source: video.pixel_format.clone(),
            target: profile.pixel_format.clone(),
        });
    }
    if video.width != profile.width {
        mismatches.push(Mismatch::Width {
            source: video.width,
            target: profile.width,
        });
    }
    if video.height != profile.height {
        mismatches.push(Mismatch::Height {
            source: video.height,
            target: profile.height,
        });
    }

    mismatches
}

/// Analysis the policy will consult for this source and profile.
///
/// Interlace and crop detection only matter when the video is re-encoded;
/// loudness only when normalization is on and there is audio.
pub fn analysis_request(source: &SourceMedia, profile: &TargetProfile) -> AnalysisRequest {
    let reencode = !find_mismatches(source, profile).is_empty();
    AnalysisRequest {
        interlace: reencode && profile.deinterlace,
        loudness: profile.loudness_target.is_some() && !source.audio_tracks.is_empty(),
        crop: reencode && profile.crop_detect,
    }
}

/// Picks the re-encode strategy for a frame rate change.
pub fn reencode_strategy(fps_src: FrameRate, fps_tgt: FrameRate) -> Strategy {
    let delta = fps_tgt.as_f64() - fps_src.as_f64();
    if compare_rates(fps_src, fps_tgt) != Ordering::Less || delta > MAX_RECLOCK_DELTA {
        Strategy::DirectReencode
    } else {
        Strategy::Reclock
    }
}

fn compare_rates(a: FrameRate, b: FrameRate) -> Ordering {
    let lhs = a.numerator() as u64 * b.denominator() as u64;
    let rhs = b.numerator() as u64 * a.denominator() as u64;
    lhs.cmp(&rhs)
}

/// Decides how to produce `profile` from `source`. Pure and deterministic.
pub fn decide(source: &SourceMedia, profile: &TargetProfile, analysis: &AnalysisResult) -> Decision {
    let audio_tracks = select_tracks(&source.audio_tracks, profile.track_policy);
    let gain_db = if audio_tracks.is_empty() {
        0.0
    } else {
        compute_gain(profile.loudness_target, analysis.measured_loudness)
    };
    let mismatches = find_mismatches(source, profile);

    if mismatches.is_empty() {
        let strategy = if gain_db != 0.0 {
            Strategy::AudioGainOnly
        } else {
            Strategy::Passthrough
        };
        return Decision {
            strategy,
            filters: FilterChain::default(),
            gain_db,
            audio_tracks,
            mismatches,
            tempo: 1.0,
        };
    }

    let video = &source.video;
    let mut stages = Vec::new();
    if profile.deinterlace && analysis.is_interlaced == Some(true) {
        stages.push(FilterStage::Deinterlace);
    }

    let mut source_aspect = video.aspect_ratio;
    if let Some(crop) = analysis.detected_crop {
        stages.push(FilterStage::Crop(crop));
        source_aspect = cropped_aspect(source_aspect, video.width, video.height, &crop);
    }
    stages.push(aspect_correction(profile.width, profile.height, source_aspect));

    let strategy = reencode_strategy(video.frame_rate, profile.frame_rate);
    let tempo = match strategy {
        Strategy::Reclock => profile.frame_rate.as_f64() / video.frame_rate.as_f64(),
        _ => 1.0,
    };

    Decision {
        strategy,
        filters: FilterChain::new(stages),
        gain_db,
        audio_tracks,
        mismatches,
        tempo,
    }
}
