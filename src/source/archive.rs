//! Deterministic source archive creation for the container build context.
//!
//! The archive must be byte-identical for identical trees regardless of who
//! builds it, when, or on which machine. Every header is normalized to
//! root/root ownership, mtime 0 and a canonical mode, traversal is
//! lexicographic at every level, and the gzip header carries no timestamp.

use crate::error::{BuilderError, Result};
use flate2::{Compression, GzBuilder};
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use walkdir::{DirEntry, WalkDir};

/// Names excluded from the top level of the archive
pub const TOP_LEVEL_EXCLUDES: [&str; 1] = [".git"];

/// Prefix of build-output directories excluded from the top level
pub const BUILD_OUTPUT_PREFIX: &str = "bazel-";

/// Names excluded from a single nested directory only.
#[derive(Debug, Clone)]
pub struct NestedExclusion {
    /// Directory, relative to the root, where the exclusion applies
    pub directory: PathBuf,
    /// Entry names dropped from that directory
    pub names: Vec<String>,
}

impl Default for NestedExclusion {
    /// Drops the wheel build tooling (which also holds the archive itself).
    fn default() -> Self {
        Self {
            directory: PathBuf::from("tools"),
            names: vec!["wheel".to_string()],
        }
    }
}

/// Outcome of writing an archive
#[derive(Debug, Clone)]
pub struct ArchiveSummary {
    /// Archive location
    pub path: PathBuf,
    /// Number of entries written
    pub entries: usize,
    /// Hex-encoded SHA-256 of the compressed archive
    pub sha256: String,
}

/// Packs a working tree into a reproducible `.tar.gz`.
#[derive(Debug, Clone)]
pub struct SourceArchiver {
    root: PathBuf,
    extra_excludes: Vec<String>,
    nested: NestedExclusion,
}

impl SourceArchiver {
    pub fn new(root: PathBuf) -> Self {
        Self {
            root,
            extra_excludes: Vec::new(),
            nested: NestedExclusion::default(),
        }
    }

    /// Excludes additional top-level names.
    pub fn with_excludes(mut self, names: impl IntoIterator<Item = String>) -> Self {
        self.extra_excludes.extend(names);
        self
    }

    /// Replaces the nested exclusion.
    pub fn with_nested_exclusion(mut self, nested: NestedExclusion) -> Self {
        self.nested = nested;
        self
    }

    fn is_excluded(&self, entry: &DirEntry, destination: &Path) -> bool {
        if entry.path() == destination {
            return true;
        }

        let name = entry.file_name().to_string_lossy();
        let name: &str = &name;

        if entry.depth() == 1 {
            return TOP_LEVEL_EXCLUDES.contains(&name)
                || name.starts_with(BUILD_OUTPUT_PREFIX)
                || self.extra_excludes.iter().any(|e| e == name);
        }

        let parent = entry
            .path()
            .parent()
            .and_then(|p| p.strip_prefix(&self.root).ok());

        parent == Some(self.nested.directory.as_path())
            && self.nested.names.iter().any(|n| n == name)
    }

    /// Writes the archive to `destination`, creating its parent directory.
    pub fn write(&self, destination: &Path) -> Result<ArchiveSummary> {
        if let Some(parent) = destination.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let file = File::create(destination)?;
        let encoder = GzBuilder::new()
            .mtime(0)
            .write(BufWriter::new(file), Compression::default());
        let mut builder = tar::Builder::new(encoder);
        builder.follow_symlinks(false);

        let mut entries = 0usize;
        let walker = WalkDir::new(&self.root)
            .min_depth(1)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| !self.is_excluded(e, destination));

        for entry in walker {
            let entry = entry.map_err(|e| {
                BuilderError::Anyhow(anyhow::anyhow!("Failed to walk source tree: {}", e))
            })?;
            if self.append_entry(&mut builder, &entry)? {
                entries += 1;
            }
        }

        let encoder = builder.into_inner()?;
        let mut writer = encoder.finish()?;
        writer.flush()?;
        drop(writer);

        let sha256 = file_sha256(destination)?;
        log::info!(
            "Wrote source archive {} ({} entries, sha256 {})",
            destination.display(),
            entries,
            sha256
        );

        Ok(ArchiveSummary {
            path: destination.to_path_buf(),
            entries,
            sha256,
        })
    }

    /// Appends one entry with normalized metadata. Returns false for skipped
    /// special files (sockets, fifos, devices).
    fn append_entry<W: Write>(&self, builder: &mut tar::Builder<W>, entry: &DirEntry) -> Result<bool> {
        let relative = entry.path().strip_prefix(&self.root).map_err(|e| {
            BuilderError::Anyhow(anyhow::anyhow!(
                "{} is outside {}: {}",
                entry.path().display(),
                self.root.display(),
                e
            ))
        })?;
        let archive_path = tar_path(relative);
        let file_type = entry.file_type();

        if file_type.is_dir() {
            let mut header = normalized_header(tar::EntryType::Directory, 0o755)?;
            header.set_size(0);
            builder.append_data(&mut header, format!("{}/", archive_path), std::io::empty())?;
        } else if file_type.is_file() {
            let metadata = entry.metadata().map_err(|e| {
                BuilderError::Anyhow(anyhow::anyhow!(
                    "Cannot stat {}: {}",
                    entry.path().display(),
                    e
                ))
            })?;
            let mut header =
                normalized_header(tar::EntryType::Regular, normalize_mode(&metadata))?;
            header.set_size(metadata.len());
            let file = File::open(entry.path())?;
            builder.append_data(&mut header, &archive_path, file)?;
        } else if file_type.is_symlink() {
            let target = std::fs::read_link(entry.path())?;
            let mut header = normalized_header(tar::EntryType::Symlink, 0o777)?;
            header.set_size(0);
            builder.append_link(&mut header, &archive_path, &target)?;
        } else {
            log::debug!("Skipping special file {}", entry.path().display());
            return Ok(false);
        }

        Ok(true)
    }
}

/// Archive path with `/` separators regardless of host platform
fn tar_path(relative: &Path) -> String {
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

fn normalized_header(entry_type: tar::EntryType, mode: u32) -> Result<tar::Header> {
    let mut header = tar::Header::new_gnu();
    header.set_entry_type(entry_type);
    header.set_mode(mode);
    header.set_mtime(0);
    header.set_uid(0);
    header.set_gid(0);
    header.set_username("root")?;
    header.set_groupname("root")?;
    header.set_device_major(0)?;
    header.set_device_minor(0)?;
    Ok(header)
}

#[cfg(unix)]
fn normalize_mode(metadata: &std::fs::Metadata) -> u32 {
    use std::os::unix::fs::PermissionsExt;

    if metadata.permissions().mode() & 0o111 != 0 {
        0o755
    } else {
        0o644
    }
}

#[cfg(not(unix))]
fn normalize_mode(_metadata: &std::fs::Metadata) -> u32 {
    0o644
}

/// Hex-encoded SHA-256 of a file, read in 8KB chunks.
pub fn file_sha256(path: &Path) -> Result<String> {
    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buffer = vec![0u8; 8192];

    loop {
        let n = file.read(&mut buffer)?;
        if n == 0 {
            break;
        }
        hasher.update(&buffer[..n]);
    }

    Ok(format!("{:x}", hasher.finalize()))
}
