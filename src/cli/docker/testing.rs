//! In-memory container engine for exercising the pipeline without docker.

use super::engine::{BuildRequest, ContainerEngine};
use crate::cli::RuntimeConfig;
use crate::error::{CliError, Result};
use std::cell::RefCell;
use std::path::{Path, PathBuf};

/// Records every call and fails on request.
#[derive(Debug, Default)]
pub(crate) struct RecordingEngine {
    /// Builds whose tag contains this text exit with code 2
    pub(crate) fail_on: Option<String>,
    /// Image removal exits with code 1
    pub(crate) fail_removal: bool,
    /// Builds whose tag contains this text never finish
    pub(crate) stall_on: Option<String>,
    pub(crate) builds: RefCell<Vec<BuildRequest>>,
    pub(crate) extractions: RefCell<Vec<(String, Vec<String>)>>,
    pub(crate) removals: RefCell<Vec<Vec<String>>>,
}

impl RecordingEngine {
    pub(crate) fn failing_on(tag_fragment: &str) -> Self {
        Self {
            fail_on: Some(tag_fragment.to_string()),
            ..Self::default()
        }
    }

    pub(crate) fn stalling_on(tag_fragment: &str) -> Self {
        Self {
            stall_on: Some(tag_fragment.to_string()),
            ..Self::default()
        }
    }

    pub(crate) fn built_tags(&self) -> Vec<String> {
        self.builds.borrow().iter().map(|b| b.tag.clone()).collect()
    }

    pub(crate) fn removals(&self) -> Vec<Vec<String>> {
        self.removals.borrow().clone()
    }
}

impl ContainerEngine for RecordingEngine {
    async fn build(&self, request: &BuildRequest, _runtime_config: &RuntimeConfig) -> Result<()> {
        self.builds.borrow_mut().push(request.clone());

        if let Some(fragment) = &self.fail_on
            && request.tag.contains(fragment.as_str())
        {
            return Err(CliError::CommandFailed {
                command: format!("docker build -t {}", request.tag),
                code: Some(2),
            }
            .into());
        }

        if let Some(fragment) = &self.stall_on
            && request.tag.contains(fragment.as_str())
        {
            std::future::pending::<()>().await;
        }
        Ok(())
    }

    async fn extract(
        &self,
        tag: &str,
        command: &[String],
        output_dir: &Path,
        _runtime_config: &RuntimeConfig,
    ) -> Result<Vec<PathBuf>> {
        self.extractions
            .borrow_mut()
            .push((tag.to_string(), command.to_vec()));

        std::fs::create_dir_all(output_dir)?;
        let name = tag.rsplit(':').next().unwrap_or(tag);
        let wheel = output_dir.join(format!("{}.whl", name));
        std::fs::write(&wheel, tag)?;
        Ok(vec![wheel])
    }

    fn remove_images(&self, tags: &[String]) -> Result<()> {
        self.removals.borrow_mut().push(tags.to_vec());

        if self.fail_removal {
            return Err(CliError::CommandFailed {
                command: "docker rmi".to_string(),
                code: Some(1),
            }
            .into());
        }
        Ok(())
    }
}
