//! Per-run registry of temporary files and images, torn down exactly once.

use super::engine::ContainerEngine;
use std::io;
use std::path::{Path, PathBuf};

/// Everything a run creates that must not outlive it.
///
/// Register a resource *before* the operation that creates it, so a failure
/// halfway through still leaves it known here. Teardown runs on
/// [`cleanup`](Self::cleanup) or on drop, whichever comes first, on every
/// exit path including `?` propagation.
pub struct BuildSession<'a, E: ContainerEngine> {
    engine: &'a E,
    files: Vec<PathBuf>,
    images: Vec<String>,
    finished: bool,
}

impl<'a, E: ContainerEngine> BuildSession<'a, E> {
    pub fn new(engine: &'a E) -> Self {
        Self {
            engine,
            files: Vec::new(),
            images: Vec::new(),
            finished: false,
        }
    }

    /// Registers a file to unlink at teardown.
    pub fn register_file(&mut self, path: impl Into<PathBuf>) {
        let path = path.into();
        log::debug!("Registered temporary file {}", path.display());
        self.files.push(path);
    }

    /// Registers an image tag to remove at teardown.
    pub fn register_image(&mut self, tag: impl Into<String>) {
        let tag = tag.into();
        log::debug!("Registered temporary image {}", tag);
        self.images.push(tag);
    }

    pub fn images(&self) -> &[String] {
        &self.images
    }

    /// Unlinks registered files, then removes registered images in one call.
    ///
    /// Failures are logged as warnings and never surface as errors. Only the
    /// first call does anything.
    pub fn cleanup(&mut self) {
        if self.finished {
            return;
        }
        self.finished = true;

        for file in std::mem::take(&mut self.files) {
            remove_file(&file);
        }

        let images = std::mem::take(&mut self.images);
        if images.is_empty() {
            return;
        }

        log::info!("Removing {} temporary image(s)", images.len());
        if let Err(e) = self.engine.remove_images(&images) {
            log::warn!("Failed to remove images {}: {}", images.join(" "), e);
        }
    }
}

impl<E: ContainerEngine> Drop for BuildSession<'_, E> {
    fn drop(&mut self) {
        self.cleanup();
    }
}

fn remove_file(path: &Path) {
    match std::fs::remove_file(path) {
        Ok(()) => log::debug!("Removed {}", path.display()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            log::warn!("Temporary file already removed: {}", path.display())
        }
        Err(e) => log::warn!("Failed to remove {}: {}", path.display(), e),
    }
}
