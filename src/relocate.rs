//! Artifact relocation
//!
//! Moves a fetched artifact out of the engine's working directory into its
//! final case directory. The move is the step hash verification guards, so
//! the [`Relocator`] trait is the seam tests use to inject faults.

use async_trait::async_trait;
use std::path::{Path, PathBuf};

use crate::utils::get_unique_path;

const MAX_RESERVE_ATTEMPTS: usize = 64;

/// Moves an artifact to its final location
#[async_trait]
pub trait Relocator: Send + Sync {
    /// Move `from` to `to` (or a collision-free variant of it)
    ///
    /// Returns the path the artifact actually ended up at. An existing file at
    /// `to` is never overwritten.
    ///
    /// # Errors
    ///
    /// Returns an error if the destination directory cannot be created or
    /// the file cannot be moved.
    async fn relocate(&self, from: &Path, to: &Path) -> crate::Result<PathBuf>;

    /// Human-readable name for logging
    fn name(&self) -> &'static str;
}

/// Filesystem relocator
///
/// Renames within a filesystem and falls back to copy-then-remove when the
/// working and final directories live on different devices.
#[derive(Debug, Default, Clone, Copy)]
pub struct FsRelocator;

#[async_trait]
impl Relocator for FsRelocator {
    async fn relocate(&self, from: &Path, to: &Path) -> crate::Result<PathBuf> {
        if let Some(parent) = to.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let destination = reserve(to).await?;

        if let Err(e) = move_file(from, &destination).await {
            // Give the reserved name back
            let _ = tokio::fs::remove_file(&destination).await;
            return Err(e.into());
        }

        if destination != to {
            tracing::info!(
                requested = %to.display(),
                actual = %destination.display(),
                "destination existed, artifact stored under a new name"
            );
        }

        Ok(destination)
    }

    fn name(&self) -> &'static str {
        "fs"
    }
}

/// Claim a collision-free destination by creating it exclusively
///
/// Two relocations aiming at the same name cannot both win `create_new`, so
/// the loser moves on to the next free name instead of overwriting.
async fn reserve(to: &Path) -> crate::Result<PathBuf> {
    for _ in 0..MAX_RESERVE_ATTEMPTS {
        let candidate = get_unique_path(to)?;
        match tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&candidate)
            .await
        {
            Ok(_) => return Ok(candidate),
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => continue,
            Err(e) => return Err(e.into()),
        }
    }
    Err(crate::Error::Other(format!(
        "could not reserve a destination for {}",
        to.display()
    )))
}

/// Replace the reserved placeholder at `to` with `from`
async fn move_file(from: &Path, to: &Path) -> std::io::Result<()> {
    match tokio::fs::rename(from, to).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::CrossesDevices => {
            tracing::debug!(
                from = %from.display(),
                to = %to.display(),
                "rename crosses devices, copying instead"
            );
            tokio::fs::copy(from, to).await?;
            tokio::fs::remove_file(from).await
        }
        Err(e) => Err(e),
    }
}
