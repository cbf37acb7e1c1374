//! Job scoped registry of intermediate files.

use std::path::{Path, PathBuf};
use tokio::fs;
use uuid::Uuid;

use super::error::TempFileError;

/// Prefix of every intermediate file name.
const TEMP_PREFIX: &str = "themis-";

/// Intermediate files owned by one job.
///
/// Names carry a random UUID so concurrent jobs sharing a directory never
/// collide. [`TempRegistry::cleanup`] removes everything and empties the
/// registry; dropping a registry that still holds paths removes them
/// synchronously as a last resort.
#[derive(Debug)]
pub struct TempRegistry {
    dir: PathBuf,
    paths: Vec<PathBuf>,
}

impl TempRegistry {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            paths: Vec::new(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Creates the temp directory if needed.
    pub async fn prepare(&self) -> std::io::Result<()> {
        fs::create_dir_all(&self.dir).await
    }

    /// Reserves a fresh path with the given extension. The file is not created.
    pub fn allocate(&mut self, extension: &str) -> PathBuf {
        let path = self
            .dir
            .join(format!("{}{}.{}", TEMP_PREFIX, Uuid::new_v4(), extension));
        self.paths.push(path.clone());
        path
    }

    /// Reserves a hidden sibling of `destination` for an output to be written
    /// before it is moved into place. Being in the same directory, the
    /// final move is a rename. The file is not created.
    pub fn stage(&mut self, destination: &Path) -> PathBuf {
        let stem = destination
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let mut name = format!(".{}.{}{}", stem, TEMP_PREFIX, Uuid::new_v4());
        if let Some(extension) = destination.extension() {
            name.push('.');
            name.push_str(&extension.to_string_lossy());
        }
        let path = destination.with_file_name(name);
        self.paths.push(path.clone());
        path
    }

    /// Stops tracking `path`; cleanup will leave it alone.
    pub fn release(&mut self, path: &Path) -> bool {
        let before = self.paths.len();
        self.paths.retain(|p| p != path);
        self.paths.len() != before
    }

    pub fn paths(&self) -> &[PathBuf] {
        &self.paths
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    /// Removes every registered file and empties the registry.
    ///
    /// Files that were never created are skipped. Failures are logged and
    /// returned but never stop the cleanup.
    pub async fn cleanup(&mut self) -> Vec<TempFileError> {
        let mut errors = Vec::new();

        for path in self.paths.drain(..) {
            match fs::remove_file(&path).await {
                Ok(()) => tracing::debug!(path = %path.display(), "Removed temporary file"),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => {
                    let error = TempFileError { path, error: e };
                    tracing::warn!(error = %error, "Temporary file cleanup failed");
                    errors.push(error);
                }
            }
        }

        errors
    }
}

impl Drop for TempRegistry {
    fn drop(&mut self) {
        for path in self.paths.drain(..) {
            match std::fs::remove_file(&path) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "Temporary file cleanup failed"
                ),
            }
        }
    }
}
