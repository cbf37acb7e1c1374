//! Polling watch folder.

use futures::stream::{self, StreamExt};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use walkdir::{DirEntry, WalkDir};

use super::error::WatchError;
use crate::config::{ToolsConfig, WatchConfig};
use crate::job::Job;
use crate::lifecycle::relocate;
use crate::profile::{ProfileOverrides, TargetProfile};

/// Counts from one batch of jobs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub succeeded: usize,
    pub failed: usize,
}

/// Finds new media in a directory and transcodes it once it stops growing.
pub struct WatchFolder {
    config: WatchConfig,
    tools: ToolsConfig,
    profile: ProfileOverrides,
    container: String,
    /// Size seen at the previous poll, per candidate.
    sizes: HashMap<PathBuf, u64>,
    /// Inputs that failed this session.
    ignored: HashSet<PathBuf>,
}

impl WatchFolder {
    /// Creates a watch folder. `profile` is validated up front so a bad
    /// profile fails here instead of once per file.
    pub fn new(
        config: WatchConfig,
        tools: ToolsConfig,
        profile: ProfileOverrides,
    ) -> Result<Self, WatchError> {
        let container = TargetProfile::from_overrides(&profile)?.container;
        Ok(Self {
            config,
            tools,
            profile,
            container,
            sizes: HashMap::new(),
            ignored: HashSet::new(),
        })
    }

    /// Inputs skipped for the rest of the session.
    pub fn ignored(&self) -> &HashSet<PathBuf> {
        &self.ignored
    }

    /// Where the output for `input` goes: the same relative directory under
    /// the output directory, with the profile's container as extension.
    pub fn output_path(&self, input: &Path) -> Option<PathBuf> {
        let relative = input.strip_prefix(&self.config.input_dir).ok()?;
        let stem = relative.file_stem()?;
        let mut name = stem.to_os_string();
        name.push(".");
        name.push(&self.container);
        Some(self.config.output_dir.join(relative).with_file_name(name))
    }

    /// Lists candidate inputs with their current size.
    pub fn scan(&self) -> Vec<(PathBuf, u64)> {
        let mut walker = WalkDir::new(&self.config.input_dir)
            .follow_links(false)
            .sort_by_file_name();
        if !self.config.recursive {
            walker = walker.max_depth(1);
        }

        let mut candidates = Vec::new();
        let entries = walker
            .into_iter()
            .filter_entry(|e| e.depth() == 0 || !self.is_excluded(e));

        for entry in entries {
            let entry = match entry {
                Ok(e) => e,
                Err(e) => {
                    tracing::warn!(error = %e, "Error reading watch folder entry");
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }

            let path = entry.path();
            let accepted = path
                .extension()
                .and_then(|s| s.to_str())
                .is_some_and(|ext| self.config.accepts_extension(ext));
            if !accepted || self.ignored.contains(path) {
                continue;
            }

            let size = match entry.metadata() {
                Ok(metadata) => metadata.len(),
                Err(e) => {
                    tracing::debug!(path = %path.display(), error = %e, "Cannot stat file");
                    continue;
                }
            };
            if size == 0 {
                continue;
            }

            if self.output_path(path).is_some_and(|output| output.exists()) {
                continue;
            }

            candidates.push((path.to_path_buf(), size));
        }

        candidates
    }

    /// Scans and returns the candidates whose size did not change since the
    /// previous poll.
    pub fn poll(&mut self) -> Vec<PathBuf> {
        let current = self.scan();
        let mut stable = Vec::new();
        let mut sizes = HashMap::with_capacity(current.len());

        for (path, size) in current {
            match self.sizes.get(&path) {
                Some(previous) if *previous == size => stable.push(path.clone()),
                Some(_) => tracing::debug!(path = %path.display(), size, "File still growing"),
                None => tracing::debug!(path = %path.display(), size, "New file"),
            }
            sizes.insert(path, size);
        }

        for path in &stable {
            sizes.remove(path);
        }
        self.sizes = sizes;
        stable
    }

    /// Runs a job for each input with at most `max_parallel` at a time.
    /// Inputs whose output another input of the batch already claimed are
    /// failed without running.
    pub async fn process(&mut self, inputs: Vec<PathBuf>, cancel: &CancellationToken) -> BatchSummary {
        let (claimed, duplicates) = self.assign_outputs(inputs);
        let this = &*self;
        let mut results: Vec<(PathBuf, bool)> = stream::iter(claimed)
            .map(|(input, output)| async move {
                let ok = this.process_one(&input, &output, cancel).await;
                (input, ok)
            })
            .buffer_unordered(self.config.max_parallel.max(1))
            .collect()
            .await;
        results.extend(duplicates.into_iter().map(|input| (input, false)));

        let mut summary = BatchSummary::default();
        for (input, ok) in results {
            if ok {
                summary.succeeded += 1;
            } else {
                summary.failed += 1;
                if !cancel.is_cancelled() {
                    tracing::warn!(path = %input.display(), "Ignoring input for this session");
                    self.ignored.insert(input);
                }
            }
        }
        summary
    }

    /// Pairs inputs with their outputs, first come first served. Returns the
    /// pairs to run and the inputs left without an output.
    fn assign_outputs(&self, inputs: Vec<PathBuf>) -> (Vec<(PathBuf, PathBuf)>, Vec<PathBuf>) {
        let mut taken = HashSet::new();
        let mut claimed = Vec::with_capacity(inputs.len());
        let mut rejected = Vec::new();

        for input in inputs {
            match self.output_path(&input) {
                Some(output) if taken.insert(output.clone()) => claimed.push((input, output)),
                Some(output) => {
                    tracing::warn!(
                        path = %input.display(),
                        output = %output.display(),
                        "Output already claimed by another input in this batch"
                    );
                    rejected.push(input);
                }
                None => rejected.push(input),
            }
        }
        (claimed, rejected)
    }

    async fn process_one(&self, input: &Path, output: &Path, cancel: &CancellationToken) -> bool {
        let mut job = Job::new(input, self.tools.clone()).with_profile_defaults(self.profile.clone());
        tracing::info!(job_id = job.id(), path = %input.display(), "Picked up file");

        if !job.process(output, &ProfileOverrides::default(), cancel).await {
            return false;
        }

        if let Some(done_dir) = &self.config.done_dir {
            self.archive(input, done_dir).await;
        }
        true
    }

    /// Moves a processed source into the done directory, keeping its
    /// relative path. Passthrough jobs have already moved it.
    async fn archive(&self, input: &Path, done_dir: &Path) {
        if !input.exists() {
            return;
        }
        let Ok(relative) = input.strip_prefix(&self.config.input_dir) else {
            return;
        };
        let destination = done_dir.join(relative);
        if let Err(e) = relocate(input, &destination, self.tools.verify_copies).await {
            tracing::warn!(path = %input.display(), error = %e, "Failed to move source to done directory");
        }
    }

    /// Polls until `cancel` fires.
    pub async fn run(&mut self, cancel: &CancellationToken) -> Result<(), WatchError> {
        if !self.config.input_dir.is_dir() {
            return Err(WatchError::InputDirMissing {
                path: self.config.input_dir.clone(),
            });
        }

        let interval = Duration::from_secs(self.config.poll_interval_secs.max(1));
        tracing::info!(
            input = %self.config.input_dir.display(),
            output = %self.config.output_dir.display(),
            interval_secs = interval.as_secs(),
            "Watching folder"
        );

        while !cancel.is_cancelled() {
            let stable = self.poll();
            if !stable.is_empty() {
                let summary = self.process(stable, cancel).await;
                tracing::info!(
                    succeeded = summary.succeeded,
                    failed = summary.failed,
                    "Batch finished"
                );
            }

            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(interval) => {}
            }
        }

        tracing::info!("Watch folder stopped");
        Ok(())
    }

    /// Hidden entries and the output or done directories when they live
    /// inside the input directory.
    fn is_excluded(&self, entry: &DirEntry) -> bool {
        let hidden = entry
            .file_name()
            .to_str()
            .is_some_and(|name| name.starts_with('.'));
        hidden
            || entry.path() == self.config.output_dir
            || self.config.done_dir.as_deref() == Some(entry.path())
    }
}
