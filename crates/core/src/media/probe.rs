//! FFprobe-backed metadata probe.

use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::process::Command;

use super::error::ProbeError;
use super::rational::FrameRate;
use super::types::{container_of, AudioTrack, SourceMedia, VideoStream};

const ZERO_TIMECODE: &str = "00:00:00:00";

/// Reads stream metadata with ffprobe.
#[derive(Debug, Clone)]
pub struct MediaProbe {
    ffprobe_path: PathBuf,
}

impl MediaProbe {
    pub fn new(ffprobe_path: impl Into<PathBuf>) -> Self {
        Self {
            ffprobe_path: ffprobe_path.into(),
        }
    }

    /// Probes `path` and returns its immutable description.
    pub async fn probe(&self, path: &Path) -> Result<SourceMedia, ProbeError> {
        if !path.exists() {
            return Err(ProbeError::InputNotFound {
                path: path.to_path_buf(),
            });
        }

        let output = Command::new(&self.ffprobe_path)
            .args([
                "-v",
                "error",
                "-print_format",
                "json",
                "-show_format",
                "-show_streams",
            ])
            .arg(path)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    ProbeError::FfprobeNotFound {
                        path: self.ffprobe_path.clone(),
                    }
                } else {
                    ProbeError::Io(e)
                }
            })?;

        if !output.status.success() {
            return Err(ProbeError::ProbeFailed {
                path: path.to_path_buf(),
                code: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let source = parse_probe_output(path, &stdout)?;

        tracing::debug!(
            path = %path.display(),
            codec = %source.video.codec,
            width = source.video.width,
            height = source.video.height,
            fps = %source.video.frame_rate,
            aspect = source.video.nominal_aspect(),
            audio_tracks = source.audio_tracks.len(),
            duration_secs = source.duration_secs,
            "Probed source"
        );

        Ok(source)
    }
}

/// Parses ffprobe JSON (`-show_format -show_streams`) into a [`SourceMedia`].
pub fn parse_probe_output(path: &Path, output: &str) -> Result<SourceMedia, ProbeError> {
    #[derive(Deserialize)]
    struct ProbeOutput {
        #[serde(default)]
        format: ProbeFormat,
        #[serde(default)]
        streams: Vec<ProbeStream>,
    }

    #[derive(Deserialize, Default)]
    struct ProbeFormat {
        duration: Option<String>,
        timecode: Option<String>,
        #[serde(default)]
        tags: HashMap<String, String>,
    }

    #[derive(Deserialize)]
    struct ProbeStream {
        index: u32,
        codec_type: Option<String>,
        codec_name: Option<String>,
        width: Option<u32>,
        height: Option<u32>,
        pix_fmt: Option<String>,
        r_frame_rate: Option<String>,
        display_aspect_ratio: Option<String>,
        duration: Option<String>,
        channels: Option<u32>,
        channel_layout: Option<String>,
        #[serde(default)]
        disposition: HashMap<String, i64>,
        #[serde(default)]
        tags: HashMap<String, String>,
    }

    let probe: ProbeOutput = serde_json::from_str(output)
        .map_err(|e| ProbeError::malformed(path, format!("failed to parse ffprobe output: {}", e)))?;

    // Cover art shows up as a single-frame video stream
    let video = probe
        .streams
        .iter()
        .filter(|s| s.codec_type.as_deref() == Some("video"))
        .find(|s| s.disposition.get("attached_pic").copied().unwrap_or(0) == 0)
        .ok_or_else(|| ProbeError::NoVideoStream {
            path: path.to_path_buf(),
        })?;

    let width = video
        .width
        .filter(|w| *w > 0)
        .ok_or_else(|| ProbeError::malformed(path, "video stream has no width"))?;
    let height = video
        .height
        .filter(|h| *h > 0)
        .ok_or_else(|| ProbeError::malformed(path, "video stream has no height"))?;

    let frame_rate = video
        .r_frame_rate
        .as_deref()
        .and_then(|r| r.parse::<FrameRate>().ok())
        .ok_or_else(|| {
            ProbeError::malformed(
                path,
                format!("invalid frame rate {:?}", video.r_frame_rate.as_deref().unwrap_or("")),
            )
        })?;

    let aspect_ratio = video
        .display_aspect_ratio
        .as_deref()
        .and_then(parse_display_aspect)
        .unwrap_or(width as f64 / height as f64);

    let duration_secs = video
        .duration
        .as_deref()
        .and_then(parse_duration)
        .or_else(|| probe.format.duration.as_deref().and_then(parse_duration))
        .unwrap_or(0.0);

    let audio_tracks = probe
        .streams
        .iter()
        .filter(|s| s.codec_type.as_deref() == Some("audio"))
        .map(|s| AudioTrack {
            index: s.index,
            codec: s.codec_name.clone(),
            channels: s.channels.unwrap_or(0),
            channel_layout: s.channel_layout.clone(),
            language: s.tags.get("language").cloned(),
        })
        .collect();

    let start_timecode = [
        probe.format.tags.get("timecode"),
        probe.format.timecode.as_ref(),
        video.tags.get("timecode"),
    ]
    .into_iter()
    .flatten()
    .find(|tc| tc.as_str() != ZERO_TIMECODE)
    .cloned();

    Ok(SourceMedia {
        path: path.to_path_buf(),
        container: container_of(path),
        video: VideoStream {
            index: video.index,
            codec: video.codec_name.clone().unwrap_or_default(),
            width,
            height,
            pixel_format: video.pix_fmt.clone().unwrap_or_default(),
            frame_rate,
            aspect_ratio,
        },
        audio_tracks,
        duration_secs,
        start_timecode,
    })
}

/// Parses an `"N:D"` display aspect; `None` when either side is zero or unparsable.
fn parse_display_aspect(dar: &str) -> Option<f64> {
    let (num, den) = dar.split_once(':')?;
    let num = num.trim().parse::<f64>().ok()?;
    let den = den.trim().parse::<f64>().ok()?;
    (num > 0.0 && den > 0.0).then(|| num / den)
}

fn parse_duration(value: &str) -> Option<f64> {
    value
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|d| d.is_finite() && *d > 0.0)
}
