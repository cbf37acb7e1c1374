//! A single transcode job from probe to cleanup.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tokio::fs;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use super::error::JobError;
use super::status::{JobStatus, StatusLevel};
use crate::analysis::{AnalysisResult, FfmpegScanner, LazyAnalysis, Scanner};
use crate::config::ToolsConfig;
use crate::lifecycle::{commit_output, relocate, TempRegistry};
use crate::media::{MediaProbe, SourceMedia};
use crate::orchestrator::{JobProgress, Orchestrator, ProgressTracker};
use crate::policy::{analysis_request, decide, Decision, Strategy};
use crate::profile::{ProfileOverrides, TargetProfile};

/// One source file on its way to one output.
///
/// A job owns everything it creates: the probed source, the frozen profile,
/// the analysis cache, the decision and the intermediate files, including
/// the output, which is staged next to the destination and only moved onto
/// it once everything succeeded. It runs once; afterwards [`Job::status`]
/// holds the outcome and the temp registry is empty whatever happened.
pub struct Job {
    id: String,
    input: PathBuf,
    tools: ToolsConfig,
    defaults: ProfileOverrides,
    scanner: Arc<dyn Scanner>,
    source: Option<SourceMedia>,
    profile: Option<TargetProfile>,
    analysis: LazyAnalysis,
    decision: Option<Decision>,
    temps: TempRegistry,
    progress: ProgressTracker,
    status: JobStatus,
}

impl Job {
    /// Creates a pending job measuring with ffmpeg.
    pub fn new(input: impl Into<PathBuf>, tools: ToolsConfig) -> Self {
        let id = Uuid::new_v4().to_string();
        let scanner = Arc::new(FfmpegScanner::new(tools.ffmpeg_path.clone()));
        Self {
            progress: ProgressTracker::new(id.clone()),
            temps: TempRegistry::new(tools.temp_dir.clone()),
            id,
            input: input.into(),
            tools,
            defaults: ProfileOverrides::default(),
            scanner,
            source: None,
            profile: None,
            analysis: LazyAnalysis::new(),
            decision: None,
            status: JobStatus::Pending,
        }
    }

    /// Replaces the scanner used for the analysis pass.
    pub fn with_scanner(mut self, scanner: Arc<dyn Scanner>) -> Self {
        self.scanner = scanner;
        self
    }

    /// Sets the overrides applied before the per-call ones, typically the
    /// `[profile]` section of the configuration.
    pub fn with_profile_defaults(mut self, defaults: ProfileOverrides) -> Self {
        self.defaults = defaults;
        self
    }

    /// Sends progress updates to `tx`.
    pub fn with_progress_listener(mut self, tx: mpsc::Sender<JobProgress>) -> Self {
        self.progress = ProgressTracker::new(self.id.clone()).with_listener(tx);
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn input(&self) -> &Path {
        &self.input
    }

    pub fn status(&self) -> &JobStatus {
        &self.status
    }

    /// Failure text, once the job has failed.
    pub fn diagnostic(&self) -> Option<&str> {
        match &self.status {
            JobStatus::Failed { diagnostic } => Some(diagnostic),
            _ => None,
        }
    }

    /// Progress in percent.
    pub fn progress(&self) -> f64 {
        self.progress.percent()
    }

    pub fn source(&self) -> Option<&SourceMedia> {
        self.source.as_ref()
    }

    pub fn profile(&self) -> Option<&TargetProfile> {
        self.profile.as_ref()
    }

    pub fn analysis(&self) -> AnalysisResult {
        self.analysis.result()
    }

    pub fn decision(&self) -> Option<&Decision> {
        self.decision.as_ref()
    }

    /// Intermediate files currently registered.
    pub fn temp_files(&self) -> &[PathBuf] {
        self.temps.paths()
    }

    /// Produces `output` with `overrides` layered over the job's profile
    /// defaults.
    ///
    /// Returns whether the job succeeded. On failure the destination is left
    /// as it was and [`Job::diagnostic`] explains what went wrong. In both
    /// cases every intermediate file has been removed.
    ///
    /// Cancellation is honoured up to the final move, except for a
    /// passthrough relocation, which runs to completion once started.
    pub async fn process(
        &mut self,
        output: &Path,
        overrides: &ProfileOverrides,
        cancel: &CancellationToken,
    ) -> bool {
        if self.status != JobStatus::Pending {
            let diagnostic = JobError::AlreadyProcessed.to_string();
            StatusLevel::Warning.emit(&self.id, &diagnostic);
            return false;
        }

        self.status = JobStatus::Running;
        let started = Instant::now();

        let result = self.run(output, overrides, cancel).await;
        // The token wins over whatever the stages reported
        let result = match result {
            Err(_) if cancel.is_cancelled() => Err(JobError::Cancelled),
            other => other,
        };

        for error in self.temps.cleanup().await {
            StatusLevel::Warning.emit(&self.id, &error.to_string());
        }

        match result {
            Ok(()) => {
                self.progress.complete();
                self.status = JobStatus::Succeeded;
                self.report(output, started);
                true
            }
            Err(e) => {
                let diagnostic = e.to_string();
                StatusLevel::Error.emit(&self.id, &format!("Job failed: {}", diagnostic));
                self.status = JobStatus::Failed { diagnostic };
                false
            }
        }
    }

    async fn run(
        &mut self,
        output: &Path,
        overrides: &ProfileOverrides,
        cancel: &CancellationToken,
    ) -> Result<(), JobError> {
        let source = MediaProbe::new(&self.tools.ffprobe_path)
            .probe(&self.input)
            .await?;
        StatusLevel::Info.emit(
            &self.id,
            &format!(
                "Probed {}: {} {}x{} ({}) at {} fps, {} audio track(s), {:.2}s",
                source.file_name(),
                source.video.codec,
                source.video.width,
                source.video.height,
                source.video.nominal_aspect(),
                source.video.frame_rate,
                source.audio_tracks.len(),
                source.duration_secs
            ),
        );

        let profile = TargetProfile::builder()
            .apply(&self.defaults)
            .apply(overrides)
            .build()?;

        self.claim_destination(output).await?;

        if cancel.is_cancelled() {
            return Err(JobError::Cancelled);
        }

        let request = analysis_request(&source, &profile);
        if !request.is_empty() {
            StatusLevel::Debug.emit(&self.id, &format!("Analysing {:?}", request));
            self.analysis
                .analyze(self.scanner.as_ref(), &source, request, cancel)
                .await;
        }
        if cancel.is_cancelled() {
            return Err(JobError::Cancelled);
        }

        let decision = decide(&source, &profile, &self.analysis.result());
        self.log_decision(&decision);

        if decision.strategy == Strategy::Reclock {
            self.temps.prepare().await?;
        }

        tracing::info!(
            job_id = %self.id,
            strategy = %decision.strategy,
            output = %output.display(),
            "Starting job"
        );

        let staged = self.temps.stage(output);
        let result = Orchestrator::new(&self.tools, &self.progress, cancel)
            .execute(&source, &profile, &decision, &staged, &mut self.temps)
            .await;

        let strategy = decision.strategy;
        self.source = Some(source);
        self.profile = Some(profile);
        self.decision = Some(decision);
        result?;

        if strategy != Strategy::Passthrough && cancel.is_cancelled() {
            return Err(JobError::Cancelled);
        }
        self.commit(&staged, output, strategy).await
    }

    /// Moves the staged output onto the destination. A passthrough source
    /// that cannot be committed goes back where it came from.
    async fn commit(
        &mut self,
        staged: &Path,
        output: &Path,
        strategy: Strategy,
    ) -> Result<(), JobError> {
        let Err(e) = commit_output(staged, output, self.tools.overwrite).await else {
            return Ok(());
        };

        if strategy == Strategy::Passthrough {
            match relocate(staged, &self.input, self.tools.verify_copies).await {
                Ok(_) => StatusLevel::Warning.emit(
                    &self.id,
                    &format!("Returned source to {}", self.input.display()),
                ),
                Err(restore) => {
                    self.temps.release(staged);
                    StatusLevel::Error.emit(
                        &self.id,
                        &format!(
                            "Could not return source to {}, it was left at {}: {}",
                            self.input.display(),
                            staged.display(),
                            restore
                        ),
                    );
                }
            }
        }
        Err(e.into())
    }

    /// Refuses destinations that exist (unless overwriting) or are the
    /// source itself, and creates the destination directory. The final
    /// commit checks again without overwrite, so a destination taken while
    /// the job ran is still never replaced.
    async fn claim_destination(&self, output: &Path) -> Result<(), JobError> {
        if fs::try_exists(output).await? {
            let same_file = match (
                fs::canonicalize(output).await,
                fs::canonicalize(&self.input).await,
            ) {
                (Ok(a), Ok(b)) => a == b,
                _ => false,
            };
            if same_file {
                return Err(JobError::DestinationIsSource {
                    path: output.to_path_buf(),
                });
            }
            if !self.tools.overwrite {
                return Err(JobError::DestinationExists {
                    path: output.to_path_buf(),
                });
            }
        }

        if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await?;
        }
        Ok(())
    }

    fn log_decision(&self, decision: &Decision) {
        let mismatches = decision
            .mismatches
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ");

        let message = match decision.strategy {
            Strategy::Passthrough => "Source conforms to the profile, relocating".to_string(),
            Strategy::AudioGainOnly => format!(
                "Source conforms to the profile, adjusting audio by {:+.2} dB",
                decision.gain_db
            ),
            Strategy::DirectReencode | Strategy::Reclock => format!(
                "Re-encoding ({}) with {}: filters {}, gain {:+.2} dB",
                mismatches, decision.strategy, decision.filters, decision.gain_db
            ),
        };
        StatusLevel::Info.emit(&self.id, &message);

        if decision.strategy == Strategy::Reclock {
            StatusLevel::Debug.emit(
                &self.id,
                &format!("Audio tempo {:.6}", decision.tempo),
            );
        }
    }

    fn report(&self, output: &Path, started: Instant) {
        let elapsed = started.elapsed().as_secs_f64();
        let duration = self
            .source
            .as_ref()
            .map(|s| s.duration_secs)
            .unwrap_or_default();
        let realtime = if elapsed > 0.0 { duration / elapsed } else { 0.0 };

        StatusLevel::Info.emit(
            &self.id,
            &format!(
                "Finished {}: {:.2}s of media in {:.2}s ({:.2}x realtime)",
                output.display(),
                duration,
                elapsed,
                realtime
            ),
        );
    }
}
