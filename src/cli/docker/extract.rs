//! Unpacking of built wheels from a container's tar stream.

use crate::error::{BuilderError, Result};
use std::ffi::OsStr;
use std::io::Read;
use std::path::{Component, Path, PathBuf};

/// Leading path components dropped from every entry (e.g. `wheel/wheelhouse/`)
pub const STRIP_COMPONENTS: usize = 2;

/// Extension of the artifacts kept from the stream
pub const ARTIFACT_EXTENSION: &str = "whl";

/// Drops the first `count` components of an archive path.
///
/// Returns `None` when nothing remains or the path tries to escape the
/// destination (`..` or a drive prefix).
pub fn strip_components(path: &Path, count: usize) -> Option<PathBuf> {
    let mut normal = Vec::new();
    for component in path.components() {
        match component {
            Component::Normal(part) => normal.push(part),
            Component::RootDir | Component::CurDir => {}
            Component::ParentDir | Component::Prefix(_) => return None,
        }
    }

    let remainder: PathBuf = normal.into_iter().skip(count).collect();
    if remainder.as_os_str().is_empty() {
        None
    } else {
        Some(remainder)
    }
}

/// Reads a tar stream and writes every regular `.whl` file into `output_dir`
/// after stripping `strip` leading components.
///
/// The stream is drained to EOF even after the end-of-archive marker so the
/// writing process never sees a closed pipe.
pub fn unpack_artifacts<R: Read>(reader: R, output_dir: &Path, strip: usize) -> Result<Vec<PathBuf>> {
    std::fs::create_dir_all(output_dir)?;

    let mut archive = tar::Archive::new(reader);
    let mut extracted = Vec::new();

    for entry in archive.entries()? {
        let mut entry = entry?;
        let path = entry.path()?.into_owned();

        if !entry.header().entry_type().is_file() {
            log::debug!("Skipping non-file entry {}", path.display());
            continue;
        }

        let Some(relative) = strip_components(&path, strip) else {
            log::warn!("Skipping archive entry {}", path.display());
            continue;
        };

        if relative.extension() != Some(OsStr::new(ARTIFACT_EXTENSION)) {
            log::debug!("Skipping non-artifact {}", path.display());
            continue;
        }

        let target = output_dir.join(&relative);
        if let Some(parent) = target.parent() {
            std::fs::create_dir_all(parent)?;
        }

        entry.unpack(&target).map_err(|e| {
            BuilderError::Anyhow(anyhow::anyhow!(
                "Failed to write {}: {}",
                target.display(),
                e
            ))
        })?;
        log::info!("Extracted {}", target.display());
        extracted.push(target);
    }

    std::io::copy(&mut archive.into_inner(), &mut std::io::sink())?;
    Ok(extracted)
}
