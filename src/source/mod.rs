//! Source repository resolution and packaging

mod archive;

pub use archive::{ArchiveSummary, NestedExclusion, SourceArchiver};

use crate::error::{BuilderError, Result};
use std::path::{Path, PathBuf};

/// Resolves the root of the git working tree containing `start`.
pub fn repository_root(start: &Path) -> Result<PathBuf> {
    let repo = gix::discover(start).map_err(|e| {
        BuilderError::Git(format!(
            "{} is not inside a git repository: {}",
            start.display(),
            e
        ))
    })?;

    let workdir = repo.workdir().ok_or_else(|| {
        BuilderError::Git(format!(
            "Repository at {} has no working tree (bare repository)",
            repo.git_dir().display()
        ))
    })?;

    // gix may hand back a relative path when discovery started from one
    let workdir = workdir.canonicalize().map_err(|e| {
        BuilderError::Git(format!(
            "Cannot resolve working tree {}: {}",
            workdir.display(),
            e
        ))
    })?;

    log::debug!("Repository root: {}", workdir.display());
    Ok(workdir)
}

/// Writes the deterministic source archive on a blocking thread.
pub async fn create_source_archive(
    archiver: SourceArchiver,
    destination: PathBuf,
) -> Result<ArchiveSummary> {
    tokio::task::spawn_blocking(move || archiver.write(&destination))
        .await
        .map_err(|e| BuilderError::Anyhow(anyhow::anyhow!("Archive task panicked: {}", e)))?
}
