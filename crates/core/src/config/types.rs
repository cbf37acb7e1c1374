use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::profile::ProfileOverrides;

/// Root configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub tools: ToolsConfig,
    /// Overrides layered over the built-in profile for every job.
    #[serde(default)]
    pub profile: ProfileOverrides,
    #[serde(default)]
    pub watch: Option<WatchConfig>,
}

/// External tools and job housekeeping.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ToolsConfig {
    /// Path to ffmpeg binary.
    #[serde(default = "default_ffmpeg_path")]
    pub ffmpeg_path: PathBuf,

    /// Path to ffprobe binary.
    #[serde(default = "default_ffprobe_path")]
    pub ffprobe_path: PathBuf,

    /// Path to sox binary, used to retime audio.
    #[serde(default = "default_sox_path")]
    pub sox_path: PathBuf,

    /// Directory for intermediate files.
    #[serde(default = "default_temp_dir")]
    pub temp_dir: PathBuf,

    /// FFmpeg log level (quiet, panic, fatal, error, warning, info, verbose, debug, trace).
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Replace an existing destination instead of refusing the job.
    #[serde(default)]
    pub overwrite: bool,

    /// Checksum cross-filesystem copies before removing the source.
    #[serde(default = "default_true")]
    pub verify_copies: bool,
}

fn default_ffmpeg_path() -> PathBuf {
    PathBuf::from("ffmpeg")
}

fn default_ffprobe_path() -> PathBuf {
    PathBuf::from("ffprobe")
}

fn default_sox_path() -> PathBuf {
    PathBuf::from("sox")
}

fn default_temp_dir() -> PathBuf {
    std::env::temp_dir().join("themis")
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_true() -> bool {
    true
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            ffmpeg_path: default_ffmpeg_path(),
            ffprobe_path: default_ffprobe_path(),
            sox_path: default_sox_path(),
            temp_dir: default_temp_dir(),
            log_level: default_log_level(),
            overwrite: false,
            verify_copies: true,
        }
    }
}

impl ToolsConfig {
    /// Creates a config with custom tool paths.
    pub fn with_paths(ffmpeg_path: PathBuf, ffprobe_path: PathBuf, sox_path: PathBuf) -> Self {
        Self {
            ffmpeg_path,
            ffprobe_path,
            sox_path,
            ..Default::default()
        }
    }

    /// Sets the temp directory.
    pub fn with_temp_dir(mut self, temp_dir: PathBuf) -> Self {
        self.temp_dir = temp_dir;
        self
    }

    /// Allows jobs to replace existing destinations.
    pub fn with_overwrite(mut self, overwrite: bool) -> Self {
        self.overwrite = overwrite;
        self
    }
}

/// Watch folder configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WatchConfig {
    pub input_dir: PathBuf,
    pub output_dir: PathBuf,
    /// Sources are moved here after a successful job.
    #[serde(default)]
    pub done_dir: Option<PathBuf>,
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
    #[serde(default = "default_true")]
    pub recursive: bool,
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,
    #[serde(default = "default_max_parallel")]
    pub max_parallel: usize,
}

fn default_poll_interval() -> u64 {
    5
}

fn default_extensions() -> Vec<String> {
    ["mov", "mp4", "avi", "flv", "mpg", "mpeg", "m4v", "mxf", "mkv", "ts"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_max_parallel() -> usize {
    1
}

impl WatchConfig {
    pub fn new(input_dir: impl Into<PathBuf>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            input_dir: input_dir.into(),
            output_dir: output_dir.into(),
            done_dir: None,
            poll_interval_secs: default_poll_interval(),
            recursive: true,
            extensions: default_extensions(),
            max_parallel: default_max_parallel(),
        }
    }

    /// Whether `extension` is one of the watched ones, ignoring case.
    pub fn accepts_extension(&self, extension: &str) -> bool {
        self.extensions
            .iter()
            .any(|e| e.trim_start_matches('.').eq_ignore_ascii_case(extension))
    }
}
