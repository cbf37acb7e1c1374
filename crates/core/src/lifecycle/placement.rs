//! Moving files into place and rolling back partial outputs.

use sha2::{Digest, Sha256};
use std::path::Path;
use tokio::fs::{self, File};
use tokio::io::{AsyncReadExt, AsyncWriteExt, BufReader, BufWriter};

use super::error::PlacementError;

/// Buffer size used for cross-filesystem copies.
const COPY_BUFFER_SIZE: usize = 1024 * 1024;

/// How a file ended up at its destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelocationMethod {
    Renamed,
    Copied,
}

/// Outcome of [`relocate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relocation {
    pub method: RelocationMethod,
    pub bytes: u64,
}

/// Moves `source` to `destination`, falling back to copy-then-delete when
/// the two are on different filesystems.
///
/// With `verify` set, a copy is re-read and compared by SHA-256 before the
/// source is removed. A failed copy never leaves a partial destination.
pub async fn relocate(
    source: &Path,
    destination: &Path,
    verify: bool,
) -> Result<Relocation, PlacementError> {
    let size = fs::metadata(source)
        .await
        .map_err(|_| PlacementError::SourceNotFound {
            path: source.to_path_buf(),
        })?
        .len();

    ensure_parent_dir(destination).await?;

    if try_atomic_move(source, destination)
        .await
        .map_err(|e| PlacementError::MoveFailed {
            from: source.to_path_buf(),
            to: destination.to_path_buf(),
            error: e,
        })?
    {
        return Ok(Relocation {
            method: RelocationMethod::Renamed,
            bytes: size,
        });
    }

    tracing::debug!(
        from = %source.display(),
        to = %destination.display(),
        "Rename crosses filesystems, copying instead"
    );

    let (bytes, checksum) = match copy_file(source, destination).await {
        Ok(result) => result,
        Err(e) => {
            discard_output(destination).await;
            return Err(e);
        }
    };

    if verify {
        let actual = match file_checksum(destination).await {
            Ok(actual) => actual,
            Err(e) => {
                discard_output(destination).await;
                return Err(PlacementError::copy_failed(
                    source.to_path_buf(),
                    destination.to_path_buf(),
                    e,
                ));
            }
        };
        if actual != checksum {
            discard_output(destination).await;
            return Err(PlacementError::ChecksumMismatch {
                path: destination.to_path_buf(),
                expected: checksum,
                actual,
            });
        }
    }

    if let Err(e) = fs::remove_file(source).await {
        tracing::warn!(
            path = %source.display(),
            error = %e,
            "Copied file into place but could not remove the source"
        );
    }

    Ok(Relocation {
        method: RelocationMethod::Copied,
        bytes,
    })
}

/// Moves a finished `staged` output onto `destination`, which must be on the
/// same filesystem.
///
/// Without `overwrite` the move never replaces an existing file: the staged
/// file is hard linked to the destination, which fails atomically if the
/// name is taken, then unlinked. Filesystems without hard links fall back
/// to a check followed by a rename.
pub async fn commit_output(
    staged: &Path,
    destination: &Path,
    overwrite: bool,
) -> Result<(), PlacementError> {
    let move_failed = |e| PlacementError::MoveFailed {
        from: staged.to_path_buf(),
        to: destination.to_path_buf(),
        error: e,
    };
    let exists = || PlacementError::DestinationExists {
        path: destination.to_path_buf(),
    };

    if overwrite {
        return fs::rename(staged, destination).await.map_err(move_failed);
    }

    match fs::hard_link(staged, destination).await {
        Ok(()) => {
            if let Err(e) = fs::remove_file(staged).await {
                tracing::warn!(path = %staged.display(), error = %e, "Failed to unlink staged output");
            }
            Ok(())
        }
        Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => Err(exists()),
        Err(e) => {
            tracing::debug!(error = %e, "Hard link unavailable, renaming staged output");
            if fs::try_exists(destination).await.map_err(move_failed)? {
                return Err(exists());
            }
            fs::rename(staged, destination).await.map_err(move_failed)
        }
    }
}

/// Removes a partial output. Returns whether a file was removed.
pub async fn discard_output(path: &Path) -> bool {
    match fs::remove_file(path).await {
        Ok(()) => {
            tracing::debug!(path = %path.display(), "Removed partial output");
            true
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => false,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "Failed to remove partial output");
            false
        }
    }
}

async fn ensure_parent_dir(path: &Path) -> Result<(), PlacementError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .await
            .map_err(|e| PlacementError::DirectoryCreationFailed {
                path: parent.to_path_buf(),
                error: e,
            })?;
    }
    Ok(())
}

/// Attempts a rename. `Ok(false)` means the paths are on different
/// filesystems and the caller has to copy.
async fn try_atomic_move(source: &Path, destination: &Path) -> Result<bool, std::io::Error> {
    match fs::rename(source, destination).await {
        Ok(()) => Ok(true),
        Err(e) => {
            // EXDEV is 18 on Linux
            if e.kind() == std::io::ErrorKind::CrossesDevices || e.raw_os_error() == Some(18) {
                Ok(false)
            } else {
                Err(e)
            }
        }
    }
}

/// Copies `source` to `destination`, returning the byte count and the
/// SHA-256 of what was read.
async fn copy_file(source: &Path, destination: &Path) -> Result<(u64, String), PlacementError> {
    let copy_failed =
        |e| PlacementError::copy_failed(source.to_path_buf(), destination.to_path_buf(), e);

    let source_file = File::open(source).await.map_err(copy_failed)?;
    let dest_file = File::create(destination).await.map_err(copy_failed)?;

    let mut reader = BufReader::with_capacity(COPY_BUFFER_SIZE, source_file);
    let mut writer = BufWriter::with_capacity(COPY_BUFFER_SIZE, dest_file);
    let mut hasher = Sha256::new();
    let mut buffer = vec![0u8; COPY_BUFFER_SIZE];
    let mut total_bytes = 0u64;

    loop {
        let bytes_read = reader.read(&mut buffer).await.map_err(copy_failed)?;
        if bytes_read == 0 {
            break;
        }
        hasher.update(&buffer[..bytes_read]);
        writer
            .write_all(&buffer[..bytes_read])
            .await
            .map_err(copy_failed)?;
        total_bytes += bytes_read as u64;
    }

    writer.flush().await.map_err(copy_failed)?;
    writer.into_inner().sync_all().await.map_err(copy_failed)?;

    Ok((total_bytes, format!("{:x}", hasher.finalize())))
}

async fn file_checksum(path: &Path) -> Result<String, std::io::Error> {
    let file = File::open(path).await?;
    let mut reader = BufReader::with_capacity(COPY_BUFFER_SIZE, file);
    let mut buffer = vec![0u8; COPY_BUFFER_SIZE];
    let mut hasher = Sha256::new();

    loop {
        let bytes_read = reader.read(&mut buffer).await?;
        if bytes_read == 0 {
            break;
        }
        hasher.update(&buffer[..bytes_read]);
    }

    Ok(format!("{:x}", hasher.finalize()))
}
