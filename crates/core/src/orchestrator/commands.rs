//! Command lines for every stage a strategy runs.

use std::fmt;
use std::path::{Path, PathBuf};

use crate::config::ToolsConfig;
use crate::media::SourceMedia;
use crate::policy::Decision;
use crate::profile::TargetProfile;

/// Containers whose muxer accepts `-video_track_timescale`.
const TIMESCALE_CONTAINERS: &[&str] = &["mov", "mp4"];

/// Containers whose muxer writes a `-timecode` track.
const TIMECODE_CONTAINERS: &[&str] = &["mov", "mp4", "mxf"];

/// Sample format of audio intermediates.
const INTERMEDIATE_AUDIO_CODEC: &str = "pcm_s16le";

/// One process invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolCommand {
    /// Stage name used in logs and failure reports.
    pub stage: String,
    pub program: PathBuf,
    pub args: Vec<String>,
}

impl fmt::Display for ToolCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program.display())?;
        for arg in &self.args {
            write!(f, " {}", arg)?;
        }
        Ok(())
    }
}

/// Builds the command lines for one job.
#[derive(Debug, Clone, Copy)]
pub struct CommandBuilder<'a> {
    tools: &'a ToolsConfig,
    source: &'a SourceMedia,
    profile: &'a TargetProfile,
    decision: &'a Decision,
}

impl<'a> CommandBuilder<'a> {
    pub fn new(
        tools: &'a ToolsConfig,
        source: &'a SourceMedia,
        profile: &'a TargetProfile,
        decision: &'a Decision,
    ) -> Self {
        Self {
            tools,
            source,
            profile,
            decision,
        }
    }

    /// Video stream copy with the audio re-encoded through a gain filter.
    pub fn audio_gain_only(&self, output: &Path) -> ToolCommand {
        let mut args = self.ffmpeg_prelude();
        args.extend(["-i".to_string(), path_arg(&self.source.path)]);
        args.extend(self.source_maps());
        args.extend(["-c:v".to_string(), "copy".to_string()]);
        args.extend(self.audio_encode_args(true, true));
        args.extend(self.language_args());
        args.extend(self.container_args(false));
        args.push(path_arg(output));
        self.ffmpeg("audio-gain", args)
    }

    /// Single pass encode with the filter chain and frame rate conversion.
    pub fn direct_reencode(&self, output: &Path) -> ToolCommand {
        let mut args = self.ffmpeg_prelude();
        args.extend(["-i".to_string(), path_arg(&self.source.path)]);
        args.extend(self.source_maps());
        if let Some(chain) = self.decision.filters.expression() {
            args.extend(["-filter:v".to_string(), chain]);
        }
        args.extend(self.video_encode_args());
        args.extend(self.audio_encode_args(true, true));
        args.extend(self.language_args());
        args.extend(self.container_args(true));
        args.push(path_arg(output));
        self.ffmpeg("reencode", args)
    }

    /// Extracts every kept audio track to its own PCM intermediate in one
    /// invocation. `outputs` pairs with `decision.audio_tracks`.
    pub fn extract_audio(&self, outputs: &[PathBuf]) -> ToolCommand {
        let mut args = self.ffmpeg_prelude();
        args.extend(["-i".to_string(), path_arg(&self.source.path)]);
        for (track, output) in self.decision.audio_tracks.iter().zip(outputs) {
            args.extend([
                "-map".to_string(),
                format!("0:{}", track.index),
                "-vn".to_string(),
                "-c:a".to_string(),
                INTERMEDIATE_AUDIO_CODEC.to_string(),
            ]);
            if self.profile.to_stereo {
                args.extend(["-ac".to_string(), "2".to_string()]);
            }
            args.push(path_arg(output));
        }
        self.ffmpeg("extract-audio", args)
    }

    /// Time-stretches one intermediate by the decision's tempo, resampling to
    /// the profile rate and applying the gain.
    pub fn retime_audio(&self, track: usize, input: &Path, output: &Path) -> ToolCommand {
        let mut args = vec![
            "-S".to_string(),
            path_arg(input),
            "-r".to_string(),
            self.profile.audio_sample_rate.to_string(),
            path_arg(output),
            "tempo".to_string(),
            format!("{:.6}", self.decision.tempo),
        ];
        if self.decision.has_gain() {
            args.extend(["gain".to_string(), format!("{:.2}", self.decision.gain_db)]);
        }
        ToolCommand {
            stage: format!("retime-audio-{}", track),
            program: self.tools.sox_path.clone(),
            args,
        }
    }

    /// Decodes the video through the filter chain to raw frames on stdout.
    pub fn reclock_decoder(&self) -> ToolCommand {
        let mut args = self.ffmpeg_prelude();
        args.extend([
            "-i".to_string(),
            path_arg(&self.source.path),
            "-map".to_string(),
            format!("0:{}", self.source.video.index),
            "-an".to_string(),
        ]);
        if let Some(chain) = self.decision.filters.expression() {
            args.extend(["-filter:v".to_string(), chain]);
        }
        args.extend([
            "-pix_fmt".to_string(),
            self.profile.pixel_format.clone(),
            "-f".to_string(),
            "rawvideo".to_string(),
            "-".to_string(),
        ]);
        self.ffmpeg("decode", args)
    }

    /// Reads raw frames from stdin at the target rate and muxes them with the
    /// retimed audio intermediates.
    pub fn reclock_encoder(&self, audio: &[PathBuf], output: &Path) -> ToolCommand {
        let mut args = self.ffmpeg_prelude();
        args.extend([
            "-f".to_string(),
            "rawvideo".to_string(),
            "-pix_fmt".to_string(),
            self.profile.pixel_format.clone(),
            "-s".to_string(),
            format!("{}x{}", self.profile.width, self.profile.height),
            "-r".to_string(),
            self.profile.frame_rate.to_string(),
            "-i".to_string(),
            "-".to_string(),
        ]);
        for path in audio {
            args.extend(["-i".to_string(), path_arg(path)]);
        }
        args.extend(["-map".to_string(), "0:0".to_string()]);
        for input in 1..=audio.len() {
            args.extend(["-map".to_string(), format!("{}:0", input)]);
        }
        args.extend(self.video_encode_args());
        if !audio.is_empty() {
            args.extend(self.audio_encode_args(false, false));
        }
        args.extend(self.language_args());
        args.extend(self.container_args(true));
        args.push(path_arg(output));
        self.ffmpeg("encode", args)
    }

    fn ffmpeg(&self, stage: &str, args: Vec<String>) -> ToolCommand {
        ToolCommand {
            stage: stage.to_string(),
            program: self.tools.ffmpeg_path.clone(),
            args,
        }
    }

    fn ffmpeg_prelude(&self) -> Vec<String> {
        vec![
            "-y".to_string(),
            "-hide_banner".to_string(),
            "-loglevel".to_string(),
            self.tools.log_level.clone(),
            "-stats".to_string(),
        ]
    }

    fn source_maps(&self) -> Vec<String> {
        let mut args = vec!["-map".to_string(), format!("0:{}", self.source.video.index)];
        for track in &self.decision.audio_tracks {
            args.extend(["-map".to_string(), format!("0:{}", track.index)]);
        }
        args
    }

    fn video_encode_args(&self) -> Vec<String> {
        let profile = self.profile;
        let mut args = vec![
            "-r".to_string(),
            profile.frame_rate.to_string(),
            "-pix_fmt".to_string(),
            profile.pixel_format.clone(),
            "-c:v".to_string(),
            profile.video_codec.clone(),
        ];
        if let Some(bitrate) = &profile.video_bitrate {
            args.extend(["-b:v".to_string(), bitrate.clone()]);
        }
        if let Some(qscale) = profile.qscale {
            args.extend(["-q:v".to_string(), qscale.to_string()]);
        }
        if let Some(gop) = profile.gop_size {
            args.extend([
                "-g".to_string(),
                gop.to_string(),
                "-keyint_min".to_string(),
                gop.to_string(),
            ]);
            if profile.video_codec == "libx264" {
                args.extend([
                    "-x264opts".to_string(),
                    format!("keyint={0}:min-keyint={0}:no-scenecut", gop),
                ]);
            }
        }
        args
    }

    /// Audio codec settings. `downmix` and `gain` are off when the input is
    /// an intermediate that already had them applied.
    fn audio_encode_args(&self, downmix: bool, gain: bool) -> Vec<String> {
        if self.decision.audio_tracks.is_empty() {
            return Vec::new();
        }
        let profile = self.profile;
        let mut args = vec![
            "-c:a".to_string(),
            profile.audio_codec.clone(),
            "-ar".to_string(),
            profile.audio_sample_rate.to_string(),
        ];
        if let Some(bitrate) = &profile.audio_bitrate {
            args.extend(["-b:a".to_string(), bitrate.clone()]);
        }
        if downmix && profile.to_stereo {
            args.extend(["-ac".to_string(), "2".to_string()]);
        }
        if gain && self.decision.has_gain() {
            args.extend([
                "-filter:a".to_string(),
                format!("volume={:.2}dB", self.decision.gain_db),
            ]);
        }
        args
    }

    fn language_args(&self) -> Vec<String> {
        let mut args = Vec::new();
        for (n, track) in self.decision.audio_tracks.iter().enumerate() {
            if let Some(language) = &track.language {
                args.extend([
                    format!("-metadata:s:a:{}", n),
                    format!("language={}", language),
                ]);
            }
        }
        args
    }

    fn container_args(&self, reencoded: bool) -> Vec<String> {
        let container = self.profile.container.as_str();
        let mut args = vec!["-map_metadata".to_string(), "-1".to_string()];
        if let Some(timecode) = &self.source.start_timecode {
            if TIMECODE_CONTAINERS.contains(&container) {
                args.extend(["-timecode".to_string(), timecode.clone()]);
            }
        }
        if reencoded && TIMESCALE_CONTAINERS.contains(&container) {
            if let Some(fps) = self.profile.frame_rate.as_integer() {
                args.extend(["-video_track_timescale".to_string(), fps.to_string()]);
            }
        }
        args
    }
}

fn path_arg(path: &Path) -> String {
    path.to_string_lossy().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::AnalysisResult;
    use crate::media::{AudioTrack, FrameRate, VideoStream};
    use crate::policy::decide;

    fn source(fps: u32, start_timecode: Option<&str>) -> SourceMedia {
        SourceMedia {
            path: PathBuf::from("/in/clip.mp4"),
            container: "mp4".to_string(),
            video: VideoStream {
                index: 0,
                codec: "h264".to_string(),
                width: 1280,
                height: 720,
                pixel_format: "yuv420p".to_string(),
                frame_rate: FrameRate::integer(fps).unwrap(),
                aspect_ratio: 16.0 / 9.0,
            },
            audio_tracks: vec![
                AudioTrack {
                    index: 1,
                    codec: Some("aac".to_string()),
                    channels: 2,
                    channel_layout: Some("stereo".to_string()),
                    language: Some("eng".to_string()),
                },
                AudioTrack {
                    index: 2,
                    codec: Some("aac".to_string()),
                    channels: 2,
                    channel_layout: Some("stereo".to_string()),
                    language: None,
                },
            ],
            duration_secs: 8.0,
            start_timecode: start_timecode.map(str::to_string),
        }
    }

    fn measured(lufs: f64) -> AnalysisResult {
        AnalysisResult {
            is_interlaced: Some(false),
            measured_loudness: Some(lufs),
            detected_crop: None,
        }
    }

    fn position(args: &[String], flag: &str) -> Option<usize> {
        args.iter().position(|a| a == flag)
    }

    fn value_of<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
        position(args, flag).map(|i| args[i + 1].as_str())
    }

    #[test]
    fn test_direct_reencode_arguments() {
        let tools = ToolsConfig::default();
        let source = source(30, Some("01:00:00:00"));
        let profile = TargetProfile::builder().gop_size(12).build().unwrap();
        let decision = decide(&source, &profile, &measured(-30.0));
        let command = CommandBuilder::new(&tools, &source, &profile, &decision)
            .direct_reencode(Path::new("/out/clip.mov"));
        let args = &command.args;

        assert_eq!(command.stage, "reencode");
        assert_eq!(command.program, PathBuf::from("ffmpeg"));
        assert_eq!(args[0], "-y");
        assert_eq!(value_of(args, "-loglevel"), Some("info"));
        assert_eq!(value_of(args, "-i"), Some("/in/clip.mp4"));
        assert_eq!(value_of(args, "-filter:v"), Some("scale=1920:1080,setsar=1"));
        assert_eq!(value_of(args, "-r"), Some("25"));
        assert_eq!(value_of(args, "-c:v"), Some("dnxhd"));
        assert_eq!(value_of(args, "-b:v"), Some("36M"));
        assert_eq!(value_of(args, "-g"), Some("12"));
        assert_eq!(value_of(args, "-keyint_min"), Some("12"));
        assert!(position(args, "-x264opts").is_none());
        assert_eq!(value_of(args, "-c:a"), Some("pcm_s16le"));
        assert_eq!(value_of(args, "-ar"), Some("48000"));
        assert_eq!(value_of(args, "-filter:a"), Some("volume=7.00dB"));
        assert_eq!(value_of(args, "-metadata:s:a:0"), Some("language=eng"));
        assert!(position(args, "-metadata:s:a:1").is_none());
        assert_eq!(value_of(args, "-map_metadata"), Some("-1"));
        assert_eq!(value_of(args, "-timecode"), Some("01:00:00:00"));
        assert_eq!(value_of(args, "-video_track_timescale"), Some("25"));
        assert_eq!(args.last().map(String::as_str), Some("/out/clip.mov"));

        let maps: Vec<&str> = args
            .iter()
            .enumerate()
            .filter(|(_, a)| *a == "-map")
            .map(|(i, _)| args[i + 1].as_str())
            .collect();
        assert_eq!(maps, vec!["0:0", "0:1", "0:2"]);
    }

    #[test]
    fn test_x264_gop_options() {
        let tools = ToolsConfig::default();
        let source = source(30, None);
        let profile = TargetProfile::builder()
            .container("mp4")
            .video_codec("libx264")
            .gop_size(50)
            .build()
            .unwrap();
        let decision = decide(&source, &profile, &measured(-23.0));
        let args = CommandBuilder::new(&tools, &source, &profile, &decision)
            .direct_reencode(Path::new("/out/clip.mp4"))
            .args;

        assert_eq!(
            value_of(&args, "-x264opts"),
            Some("keyint=50:min-keyint=50:no-scenecut")
        );
        assert_eq!(value_of(&args, "-c:a"), Some("aac"));
        assert_eq!(value_of(&args, "-b:a"), Some("128k"));
        assert!(position(&args, "-filter:a").is_none());
    }

    #[test]
    fn test_audio_gain_only_copies_video() {
        let tools = ToolsConfig::default();
        let mut source = source(25, None);
        source.container = "mov".to_string();
        source.video.codec = "dnxhd".to_string();
        source.video.width = 1920;
        source.video.height = 1080;
        source.video.pixel_format = "yuv422p".to_string();
        let profile = TargetProfile::builder().to_stereo(true).build().unwrap();
        let decision = decide(&source, &profile, &measured(-26.0));
        let command = CommandBuilder::new(&tools, &source, &profile, &decision)
            .audio_gain_only(Path::new("/out/clip.mov"));
        let args = &command.args;

        assert_eq!(value_of(args, "-c:v"), Some("copy"));
        assert_eq!(value_of(args, "-filter:a"), Some("volume=3.00dB"));
        assert_eq!(value_of(args, "-ac"), Some("2"));
        assert!(position(args, "-filter:v").is_none());
        assert!(position(args, "-video_track_timescale").is_none());
    }

    #[test]
    fn test_reclock_commands() {
        let tools = ToolsConfig::default();
        let source = source(24, None);
        let profile = TargetProfile::builder().to_stereo(true).build().unwrap();
        let decision = decide(&source, &profile, &measured(-25.0));
        let builder = CommandBuilder::new(&tools, &source, &profile, &decision);

        let wavs = vec![PathBuf::from("/tmp/a.wav"), PathBuf::from("/tmp/b.wav")];
        let extract = builder.extract_audio(&wavs);
        assert_eq!(extract.stage, "extract-audio");
        assert_eq!(
            extract.args.iter().filter(|a| *a == "pcm_s16le").count(),
            2
        );
        assert_eq!(extract.args.iter().filter(|a| *a == "-ac").count(), 2);
        assert_eq!(extract.args.last().map(String::as_str), Some("/tmp/b.wav"));

        let retime = builder.retime_audio(0, &wavs[0], Path::new("/tmp/a2.wav"));
        assert_eq!(retime.program, PathBuf::from("sox"));
        assert_eq!(
            retime.args,
            vec!["-S", "/tmp/a.wav", "-r", "48000", "/tmp/a2.wav", "tempo", "1.041667", "gain", "2.00"]
        );

        let decoder = builder.reclock_decoder();
        assert_eq!(value_of(&decoder.args, "-f"), Some("rawvideo"));
        assert_eq!(decoder.args.last().map(String::as_str), Some("-"));
        assert!(position(&decoder.args, "-r").is_none());
        assert!(position(&decoder.args, "-an").is_some());

        let encoder = builder.reclock_encoder(&wavs, Path::new("/out/clip.mov"));
        assert_eq!(value_of(&encoder.args, "-s"), Some("1920x1080"));
        assert_eq!(value_of(&encoder.args, "-r"), Some("25"));
        assert_eq!(value_of(&encoder.args, "-i"), Some("-"));
        assert!(encoder.args.contains(&"2:0".to_string()));
        assert!(position(&encoder.args, "-filter:a").is_none());
        assert!(position(&encoder.args, "-ac").is_none());
    }

    #[test]
    fn test_display_joins_program_and_args() {
        let command = ToolCommand {
            stage: "decode".to_string(),
            program: PathBuf::from("/usr/bin/ffmpeg"),
            args: vec!["-i".to_string(), "in.mov".to_string()],
        };
        assert_eq!(command.to_string(), "/usr/bin/ffmpeg -i in.mov");
    }
}
