pub mod analysis;
pub mod config;
pub mod job;
pub mod lifecycle;
pub mod media;
pub mod orchestrator;
pub mod policy;
pub mod profile;
pub mod watch;

pub use analysis::{AnalysisError, AnalysisResult, FfmpegScanner, LazyAnalysis, Scanner};
pub use config::{
    load_config, load_config_from_str, load_profile_overrides, validate_config, Config,
    ConfigError, ToolsConfig, WatchConfig,
};
pub use job::{Job, JobError, JobStatus, StatusLevel};
pub use lifecycle::{PlacementError, TempFileError, TempRegistry};
pub use media::{AudioTrack, FrameRate, MediaProbe, ProbeError, SourceMedia, VideoStream};
pub use orchestrator::{JobProgress, Orchestrator, OrchestratorError, StageFailure};
pub use policy::{decide, Decision, FilterChain, FilterStage, Strategy};
pub use profile::{ProfileBuilder, ProfileError, ProfileOverrides, TargetProfile, TrackPolicy};
pub use watch::{WatchError, WatchFolder};
