//! Probed source description.

use serde::Serialize;
use std::path::{Path, PathBuf};

use super::rational::FrameRate;

/// Nominal display aspects used for logging.
const NOMINAL_ASPECTS: [(&str, f64); 3] = [("16:9", 16.0 / 9.0), ("4:3", 4.0 / 3.0), ("2.35:1", 2.35)];

/// A probed source file. Immutable once built.
#[derive(Debug, Clone, Serialize)]
pub struct SourceMedia {
    pub path: PathBuf,
    /// Lowercase file extension without the dot.
    pub container: String,
    pub video: VideoStream,
    /// Audio tracks in stream order.
    pub audio_tracks: Vec<AudioTrack>,
    pub duration_secs: f64,
    /// Start timecode, when the container carries a non-zero one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_timecode: Option<String>,
}

impl SourceMedia {
    /// Number of frames expected when `duration_secs` is played at `rate`.
    pub fn frames_at(&self, rate: FrameRate) -> u64 {
        (self.duration_secs * rate.as_f64()).round().max(0.0) as u64
    }

    /// Number of frames in the source video stream.
    pub fn frame_count(&self) -> u64 {
        self.frames_at(self.video.frame_rate)
    }

    /// Looks up an audio track by its stream index.
    pub fn audio_track(&self, index: u32) -> Option<&AudioTrack> {
        self.audio_tracks.iter().find(|t| t.index == index)
    }

    pub fn file_name(&self) -> &str {
        self.path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default()
    }
}

/// The single video stream of a source.
#[derive(Debug, Clone, Serialize)]
pub struct VideoStream {
    /// Stream index within the source container.
    pub index: u32,
    pub codec: String,
    pub width: u32,
    pub height: u32,
    pub pixel_format: String,
    pub frame_rate: FrameRate,
    /// Display aspect ratio (width over height).
    pub aspect_ratio: f64,
}

impl VideoStream {
    /// Closest of 16:9, 4:3 and 2.35:1.
    pub fn nominal_aspect(&self) -> &'static str {
        NOMINAL_ASPECTS
            .iter()
            .min_by(|a, b| {
                (a.1 - self.aspect_ratio)
                    .abs()
                    .total_cmp(&(b.1 - self.aspect_ratio).abs())
            })
            .map(|(label, _)| *label)
            .unwrap_or("16:9")
    }
}

/// An audio track. The stream index is the track's id for the whole job.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AudioTrack {
    pub index: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub codec: Option<String>,
    pub channels: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub channel_layout: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
}

impl AudioTrack {
    pub fn is_mono(&self) -> bool {
        self.channels == 1
    }
}

/// Lowercase extension of `path`, empty when there is none.
pub fn container_of(path: &Path) -> String {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default()
}
