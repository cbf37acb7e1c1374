//! Runs a decided strategy to completion.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio_util::sync::CancellationToken;

use super::commands::{CommandBuilder, ToolCommand};
use super::drain::{MarkerValue, ProgressMarker};
use super::error::OrchestratorError;
use super::progress::ProgressTracker;
use super::stage::{spawn, supervise, StageReport};
use crate::config::ToolsConfig;
use crate::lifecycle::{relocate, TempRegistry};
use crate::media::SourceMedia;
use crate::policy::{Decision, Strategy};
use crate::profile::TargetProfile;

/// Drives the processes of one job.
///
/// Intermediates are allocated from the job's [`TempRegistry`]; cleaning
/// them up and rolling back the output is left to the caller, which runs it
/// whatever [`Orchestrator::execute`] returns.
pub struct Orchestrator<'a> {
    tools: &'a ToolsConfig,
    progress: &'a ProgressTracker,
    cancel: &'a CancellationToken,
}

impl<'a> Orchestrator<'a> {
    pub fn new(
        tools: &'a ToolsConfig,
        progress: &'a ProgressTracker,
        cancel: &'a CancellationToken,
    ) -> Self {
        Self {
            tools,
            progress,
            cancel,
        }
    }

    /// Produces `output` from `source` the way `decision` says.
    pub async fn execute(
        &self,
        source: &SourceMedia,
        profile: &TargetProfile,
        decision: &Decision,
        output: &Path,
        temps: &mut TempRegistry,
    ) -> Result<(), OrchestratorError> {
        let commands = CommandBuilder::new(self.tools, source, profile, decision);

        match decision.strategy {
            Strategy::Passthrough => {
                // A relocation cannot be interrupted once started
                if self.cancel.is_cancelled() {
                    return Err(OrchestratorError::Cancelled);
                }
                let relocation = relocate(&source.path, output, self.tools.verify_copies).await?;
                tracing::debug!(
                    method = ?relocation.method,
                    bytes = relocation.bytes,
                    "Source relocated"
                );
                Ok(())
            }
            Strategy::AudioGainOnly => {
                self.progress.set_total_frames(source.frame_count());
                self.run_single(commands.audio_gain_only(output)).await
            }
            Strategy::DirectReencode => {
                self.progress
                    .set_total_frames(source.frames_at(profile.frame_rate));
                self.run_single(commands.direct_reencode(output)).await
            }
            Strategy::Reclock => {
                self.progress.set_total_frames(source.frame_count());
                let audio = self.retime_audio(&commands, decision, temps).await?;
                self.run_linked(commands.reclock_decoder(), commands.reclock_encoder(&audio, output))
                    .await
            }
        }
    }

    /// Extracts the kept tracks and time-stretches each one. Returns the
    /// retimed intermediates in track order.
    async fn retime_audio(
        &self,
        commands: &CommandBuilder<'_>,
        decision: &Decision,
        temps: &mut TempRegistry,
    ) -> Result<Vec<PathBuf>, OrchestratorError> {
        if decision.audio_tracks.is_empty() {
            return Ok(Vec::new());
        }

        let extracted: Vec<PathBuf> = decision
            .audio_tracks
            .iter()
            .map(|_| temps.allocate("wav"))
            .collect();
        self.run_helper(commands.extract_audio(&extracted)).await?;

        let mut retimed = Vec::with_capacity(extracted.len());
        for (track, input) in extracted.iter().enumerate() {
            let output = temps.allocate("wav");
            self.run_helper(commands.retime_audio(track, input, &output))
                .await?;
            retimed.push(output);
        }
        Ok(retimed)
    }

    /// Runs a stage whose frame counter drives the job's progress.
    async fn run_single(&self, command: ToolCommand) -> Result<(), OrchestratorError> {
        let child = spawn(&command, Stdio::null(), Stdio::null())?;
        let report = supervise(
            &command.stage,
            child,
            Some(ProgressMarker::Frames),
            |value| self.record(value),
            self.cancel,
        )
        .await?;
        self.finish(vec![report])
    }

    /// Runs an audio stage. Its progress is only logged.
    async fn run_helper(&self, command: ToolCommand) -> Result<(), OrchestratorError> {
        let child = spawn(&command, Stdio::null(), Stdio::null())?;
        let stage = command.stage.as_str();
        let report = supervise(
            stage,
            child,
            Some(ProgressMarker::Percent),
            |value| {
                if let MarkerValue::Percent(percent) = value {
                    tracing::trace!(stage, percent, "Audio stage progress");
                }
            },
            self.cancel,
        )
        .await?;
        self.finish(vec![report])
    }

    /// Runs a decoder piping raw frames into an encoder. Both run
    /// concurrently; when either fails the other is killed. Returns only
    /// after both have exited. Progress follows the encoder, the decoder
    /// runs ahead by however much the pipe buffers.
    async fn run_linked(
        &self,
        decoder: ToolCommand,
        encoder: ToolCommand,
    ) -> Result<(), OrchestratorError> {
        let link = self.cancel.child_token();

        let mut decoder_child = spawn(&decoder, Stdio::null(), Stdio::piped())?;
        let frames: Result<Stdio, OrchestratorError> = match decoder_child.stdout.take() {
            Some(stdout) => stdout.try_into().map_err(OrchestratorError::Io),
            None => Err(OrchestratorError::Io(std::io::Error::other(
                "decoder stdout was not captured",
            ))),
        };
        let encoder_child = match frames.and_then(|frames| spawn(&encoder, frames, Stdio::null())) {
            Ok(child) => child,
            Err(e) => {
                let _ = decoder_child.start_kill();
                let _ = decoder_child.wait().await;
                return Err(e);
            }
        };

        let (decoded, encoded) = tokio::join!(
            self.supervise_linked(&decoder.stage, decoder_child, false, &link),
            self.supervise_linked(&encoder.stage, encoder_child, true, &link),
        );

        let reports = vec![decoded?, encoded?];
        self.finish(reports)
    }

    async fn supervise_linked(
        &self,
        stage: &str,
        child: tokio::process::Child,
        drives_progress: bool,
        link: &CancellationToken,
    ) -> Result<StageReport, OrchestratorError> {
        let result = supervise(
            stage,
            child,
            Some(ProgressMarker::Frames),
            |value| {
                if drives_progress {
                    self.record(value);
                }
            },
            link,
        )
        .await;

        if !matches!(&result, Ok(report) if report.succeeded()) && !link.is_cancelled() {
            tracing::debug!(stage, "Stage failed, stopping the linked stage");
            link.cancel();
        }
        result
    }

    fn record(&self, value: MarkerValue) {
        match value {
            MarkerValue::Frame(frame) => self.progress.record_frame(frame),
            MarkerValue::Percent(percent) => self.progress.record_percent(percent),
        }
    }

    /// Turns stage reports into the job outcome. Cancellation of the job
    /// wins over any stage failure it caused.
    fn finish(&self, reports: Vec<StageReport>) -> Result<(), OrchestratorError> {
        if self.cancel.is_cancelled() {
            return Err(OrchestratorError::Cancelled);
        }
        let failures: Vec<_> = reports.iter().filter_map(StageReport::failure).collect();
        if failures.is_empty() {
            Ok(())
        } else {
            Err(OrchestratorError::ProcessExit(failures))
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::analysis::AnalysisResult;
    use crate::media::{AudioTrack, FrameRate, VideoStream};
    use crate::policy::decide;
    use std::os::unix::fs::PermissionsExt;
    use tempfile::TempDir;

    fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    fn source(path: PathBuf, fps: u32) -> SourceMedia {
        SourceMedia {
            path,
            container: "mp4".to_string(),
            video: VideoStream {
                index: 0,
                codec: "h264".to_string(),
                width: 1920,
                height: 1080,
                pixel_format: "yuv420p".to_string(),
                frame_rate: FrameRate::integer(fps).unwrap(),
                aspect_ratio: 16.0 / 9.0,
            },
            audio_tracks: vec![AudioTrack {
                index: 1,
                codec: Some("aac".to_string()),
                channels: 2,
                channel_layout: None,
                language: None,
            }],
            duration_secs: 4.0,
            start_timecode: None,
        }
    }

    fn unmeasured() -> AnalysisResult {
        AnalysisResult::default()
    }

    #[tokio::test]
    async fn test_direct_reencode_tracks_progress() {
        let dir = TempDir::new().unwrap();
        // Prints a status line and writes the last argument
        let ffmpeg = write_script(
            dir.path(),
            "ffmpeg",
            r#"printf 'frame=   50 fps=25\r' >&2
for last in "$@"; do :; done
echo encoded > "$last""#,
        );
        let tools = ToolsConfig::with_paths(ffmpeg, "ffprobe".into(), "sox".into());
        let source = source(dir.path().join("in.mp4"), 30);
        let profile = TargetProfile::builder().build().unwrap();
        let decision = decide(&source, &profile, &unmeasured());
        assert_eq!(decision.strategy, Strategy::DirectReencode);

        let progress = ProgressTracker::new("job");
        let cancel = CancellationToken::new();
        let mut temps = TempRegistry::new(dir.path().join("tmp"));
        let output = dir.path().join("out.mov");

        Orchestrator::new(&tools, &progress, &cancel)
            .execute(&source, &profile, &decision, &output, &mut temps)
            .await
            .unwrap();

        assert_eq!(progress.total_frames(), 100);
        assert_eq!(progress.frame(), 50);
        assert_eq!(progress.percent(), 50.0);
        assert_eq!(std::fs::read_to_string(&output).unwrap(), "encoded\n");
        assert!(temps.is_empty());
    }

    #[tokio::test]
    async fn test_reclock_encoder_failure_stops_decoder() {
        let dir = TempDir::new().unwrap();
        // Decoder runs until killed, encoder fails at once; other invocations succeed
        let ffmpeg = write_script(
            dir.path(),
            "ffmpeg",
            r#"case "$*" in
  *rawvideo*-i\ -*) echo 'Invalid frame size' >&2; exit 1 ;;
  *rawvideo*) exec sleep 30 ;;
esac
for arg in "$@"; do case "$arg" in *.wav) : > "$arg" ;; esac; done"#,
        );
        let sox = write_script(dir.path(), "sox", r#"printf 'In:50.00%%\r' >&2; : > "$5""#);
        let tools = ToolsConfig::with_paths(ffmpeg, "ffprobe".into(), sox);
        let source = source(dir.path().join("in.mp4"), 24);
        let profile = TargetProfile::builder().build().unwrap();
        let decision = decide(&source, &profile, &unmeasured());
        assert_eq!(decision.strategy, Strategy::Reclock);

        let progress = ProgressTracker::new("job");
        let cancel = CancellationToken::new();
        let mut temps = TempRegistry::new(dir.path());
        let output = dir.path().join("out.mov");

        let started = std::time::Instant::now();
        let err = Orchestrator::new(&tools, &progress, &cancel)
            .execute(&source, &profile, &decision, &output, &mut temps)
            .await
            .unwrap_err();

        assert!(started.elapsed() < std::time::Duration::from_secs(20));
        let failures = err.failures();
        assert_eq!(failures.len(), 2);
        assert_eq!(failures[0].stage, "decode");
        assert_eq!(failures[0].code, None);
        assert_eq!(failures[1].stage, "encode");
        assert_eq!(failures[1].code, Some(1));
        assert!(failures[1].diagnostics.contains("Invalid frame size"));
        // One extracted and one retimed intermediate
        assert_eq!(temps.len(), 2);
    }

    #[tokio::test]
    async fn test_reclock_progress_follows_encoder() {
        let dir = TempDir::new().unwrap();
        // The decoder reports every frame, the encoder only half of them
        let ffmpeg = write_script(
            dir.path(),
            "ffmpeg",
            r#"case "$*" in
  *rawvideo*-i\ -*)
    printf 'frame=   48 fps=24\r' >&2
    for last in "$@"; do :; done
    echo encoded > "$last" ;;
  *rawvideo*) printf 'frame=   96 fps=24\r' >&2 ;;
  *) for arg in "$@"; do case "$arg" in *.wav) : > "$arg" ;; esac; done ;;
esac"#,
        );
        let sox = write_script(dir.path(), "sox", r#": > "$5""#);
        let tools = ToolsConfig::with_paths(ffmpeg, "ffprobe".into(), sox);
        let source = source(dir.path().join("in.mp4"), 24);
        let profile = TargetProfile::builder().build().unwrap();
        let decision = decide(&source, &profile, &unmeasured());
        assert_eq!(decision.strategy, Strategy::Reclock);

        let progress = ProgressTracker::new("job");
        let cancel = CancellationToken::new();
        let mut temps = TempRegistry::new(dir.path());
        let output = dir.path().join("out.mov");

        Orchestrator::new(&tools, &progress, &cancel)
            .execute(&source, &profile, &decision, &output, &mut temps)
            .await
            .unwrap();

        assert_eq!(progress.total_frames(), 96);
        assert_eq!(progress.frame(), 48);
        assert_eq!(progress.percent(), 50.0);
        assert!(output.exists());
    }

    #[tokio::test]
    async fn test_passthrough_is_not_started_after_cancel() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("in.mov");
        std::fs::write(&input, b"mov").unwrap();
        let tools = ToolsConfig::with_paths("ffmpeg".into(), "ffprobe".into(), "sox".into());
        let mut source = source(input.clone(), 25);
        source.container = "mov".to_string();
        source.video.codec = "dnxhd".to_string();
        source.video.pixel_format = "yuv422p".to_string();
        let profile = TargetProfile::builder().build().unwrap();
        let decision = decide(&source, &profile, &unmeasured());
        assert_eq!(decision.strategy, Strategy::Passthrough);

        let progress = ProgressTracker::new("job");
        let cancel = CancellationToken::new();
        cancel.cancel();
        let mut temps = TempRegistry::new(dir.path());
        let output = dir.path().join("out.mov");

        let err = Orchestrator::new(&tools, &progress, &cancel)
            .execute(&source, &profile, &decision, &output, &mut temps)
            .await
            .unwrap_err();

        assert!(matches!(err, OrchestratorError::Cancelled));
        assert!(input.exists());
        assert!(!output.exists());
    }

    #[tokio::test]
    async fn test_cancelled_stage_reports_cancelled() {
        let dir = TempDir::new().unwrap();
        let ffmpeg = write_script(dir.path(), "ffmpeg", "exec sleep 30");
        let tools = ToolsConfig::with_paths(ffmpeg, "ffprobe".into(), "sox".into());
        let source = source(dir.path().join("in.mp4"), 30);
        let profile = TargetProfile::builder().build().unwrap();
        let decision = decide(&source, &profile, &unmeasured());

        let progress = ProgressTracker::new("job");
        let cancel = CancellationToken::new();
        let mut temps = TempRegistry::new(dir.path());
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(std::time::Duration::from_millis(100)).await;
            trigger.cancel();
        });

        let err = Orchestrator::new(&tools, &progress, &cancel)
            .execute(&source, &profile, &decision, &dir.path().join("out.mov"), &mut temps)
            .await
            .unwrap_err();

        assert!(matches!(err, OrchestratorError::Cancelled));
    }
}
