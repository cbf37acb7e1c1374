//! Scan pass over a source with ffmpeg's measuring filters.

use async_trait::async_trait;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;

use super::error::AnalysisError;
use super::types::{AnalysisRequest, ScanReport};
use crate::media::SourceMedia;
use crate::orchestrator::{drain_lines, DiagnosticLog};

/// Something that can measure a source.
#[async_trait]
pub trait Scanner: Send + Sync {
    /// Returns the name of this scanner implementation.
    fn name(&self) -> &str;

    /// Runs one scan covering every concern set in `request`.
    async fn scan(
        &self,
        source: &SourceMedia,
        request: AnalysisRequest,
        cancel: &CancellationToken,
    ) -> Result<ScanReport, AnalysisError>;
}

/// Scanner that decodes the source once with `idet`, `cropdetect` and
/// `ebur128` attached as needed, discarding the output.
#[derive(Debug, Clone)]
pub struct FfmpegScanner {
    ffmpeg_path: PathBuf,
}

impl FfmpegScanner {
    pub fn new(ffmpeg_path: impl Into<PathBuf>) -> Self {
        Self {
            ffmpeg_path: ffmpeg_path.into(),
        }
    }

    /// Builds the scan arguments. Video and audio measurements go to two null
    /// outputs of the same invocation.
    fn build_args(source: &SourceMedia, request: AnalysisRequest) -> Vec<String> {
        let mut args = vec![
            "-hide_banner".to_string(),
            "-nostdin".to_string(),
            "-loglevel".to_string(),
            "info".to_string(),
            "-i".to_string(),
            source.path.to_string_lossy().to_string(),
        ];

        let mut video_filters = Vec::new();
        if request.interlace {
            video_filters.push("idet");
        }
        if request.crop {
            video_filters.push("cropdetect=24:2:0");
        }
        if !video_filters.is_empty() {
            args.extend([
                "-map".to_string(),
                format!("0:{}", source.video.index),
                "-filter:v".to_string(),
                video_filters.join(","),
                "-f".to_string(),
                "null".to_string(),
                "-".to_string(),
            ]);
        }

        if request.loudness {
            if let Some(track) = source.audio_tracks.first() {
                args.extend([
                    "-map".to_string(),
                    format!("0:{}", track.index),
                    "-filter:a".to_string(),
                    "ebur128".to_string(),
                    "-f".to_string(),
                    "null".to_string(),
                    "-".to_string(),
                ]);
            }
        }

        args
    }
}

#[async_trait]
impl Scanner for FfmpegScanner {
    fn name(&self) -> &str {
        "ffmpeg"
    }

    async fn scan(
        &self,
        source: &SourceMedia,
        request: AnalysisRequest,
        cancel: &CancellationToken,
    ) -> Result<ScanReport, AnalysisError> {
        let args = Self::build_args(source, request);
        tracing::debug!(path = %source.path.display(), ?request, "Starting analysis scan");

        let mut child = Command::new(&self.ffmpeg_path)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    AnalysisError::FfmpegNotFound {
                        path: self.ffmpeg_path.clone(),
                    }
                } else {
                    AnalysisError::Io(e)
                }
            })?;

        let Some(stderr) = child.stderr.take() else {
            let _ = child.start_kill();
            return Err(AnalysisError::Io(std::io::Error::other(
                "scan stderr was not captured",
            )));
        };

        let mut report = ScanReport::default();
        let mut log = DiagnosticLog::default();
        let run = async {
            drain_lines(stderr, |line| {
                report.ingest(line);
                log.push(line);
            })
            .await?;
            child.wait().await
        };

        let status = tokio::select! {
            status = run => Some(status),
            _ = cancel.cancelled() => None,
        };

        let Some(status) = status else {
            let _ = child.start_kill();
            let _ = child.wait().await;
            return Err(AnalysisError::Cancelled);
        };

        let status = status?;
        if !status.success() {
            return Err(AnalysisError::ScanFailed {
                code: status.code(),
                diagnostics: log.text(),
            });
        }

        tracing::debug!(path = %source.path.display(), ?report, "Analysis scan finished");
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::{AudioTrack, FrameRate, VideoStream};

    fn source(audio: bool) -> SourceMedia {
        SourceMedia {
            path: PathBuf::from("/in/clip.mov"),
            container: "mov".to_string(),
            video: VideoStream {
                index: 1,
                codec: "prores".to_string(),
                width: 1920,
                height: 1080,
                pixel_format: "yuv422p10le".to_string(),
                frame_rate: FrameRate::integer(25).unwrap(),
                aspect_ratio: 16.0 / 9.0,
            },
            audio_tracks: if audio {
                vec![AudioTrack {
                    index: 2,
                    codec: None,
                    channels: 2,
                    channel_layout: None,
                    language: None,
                }]
            } else {
                vec![]
            },
            duration_secs: 10.0,
            start_timecode: None,
        }
    }

    #[test]
    fn test_args_cover_requested_concerns() {
        let request = AnalysisRequest { interlace: true, loudness: true, crop: true };
        let args = FfmpegScanner::build_args(&source(true), request);
        let joined = args.join(" ");
        assert!(joined.contains("-map 0:1 -filter:v idet,cropdetect=24:2:0 -f null -"));
        assert!(joined.contains("-map 0:2 -filter:a ebur128 -f null -"));
    }

    #[test]
    fn test_args_without_audio_skip_loudness() {
        let request = AnalysisRequest { interlace: false, loudness: true, crop: false };
        let args = FfmpegScanner::build_args(&source(false), request);
        assert!(!args.iter().any(|a| a == "ebur128"));
        assert!(!args.iter().any(|a| a == "-map"));
    }

    #[tokio::test]
    async fn test_missing_ffmpeg() {
        let scanner = FfmpegScanner::new("/nonexistent/ffmpeg");
        let request = AnalysisRequest { interlace: true, ..Default::default() };
        let err = scanner
            .scan(&source(false), request, &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, AnalysisError::FfmpegNotFound { .. }));
    }
}
