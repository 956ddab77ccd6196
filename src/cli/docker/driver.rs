//! Per-target container builds and artifact extraction.
//!
//! Targets are built one at a time in selection order. The first failing
//! engine call aborts the whole run; images tagged so far are left to the
//! session's teardown.

use super::engine::{BuildRequest, ContainerEngine};
use super::image::{BuildId, image_tag};
use super::session::BuildSession;
use crate::cli::RuntimeConfig;
use crate::error::{CliError, Result};
use crate::matrix::Target;
use std::path::PathBuf;

/// How built images are tagged.
#[derive(Debug, Clone)]
pub enum TagMode {
    /// One full build per target, tagged with the run id and removed at exit
    Ephemeral(BuildId),
    /// One build per stage, tagged with the stage name and kept
    Stages(Vec<String>),
}

/// Where and how wheels are pulled out of the final image.
#[derive(Debug, Clone)]
pub struct ExtractPlan {
    /// Command emitting the wheel tar stream inside the image
    pub command: Vec<String>,
    /// Host directory receiving the wheels
    pub output_dir: PathBuf,
}

/// Drives the container engine for each selected target.
pub struct BuildDriver<'a, E: ContainerEngine> {
    engine: &'a E,
    namespace: String,
    context: PathBuf,
    dockerfile: PathBuf,
    keep_containers: bool,
    mode: TagMode,
}

impl<'a, E: ContainerEngine> BuildDriver<'a, E> {
    /// Creates a driver. Stage mode needs at least one stage.
    pub fn new(
        engine: &'a E,
        namespace: impl Into<String>,
        context: PathBuf,
        dockerfile: PathBuf,
        keep_containers: bool,
        mode: TagMode,
    ) -> Result<Self> {
        if let TagMode::Stages(stages) = &mode
            && stages.is_empty()
        {
            return Err(CliError::InvalidArguments {
                reason: "stage-tagged builds need at least one stage".to_string(),
            }
            .into());
        }

        Ok(Self {
            engine,
            namespace: namespace.into(),
            context,
            dockerfile,
            keep_containers,
            mode,
        })
    }

    fn request(&self, tag: String, target: &Target, stage: Option<&str>) -> BuildRequest {
        BuildRequest {
            tag,
            context: self.context.clone(),
            dockerfile: self.dockerfile.clone(),
            build_args: vec![
                ("PYTHON".to_string(), target.python.clone()),
                ("PLATFORM".to_string(), target.platform_id()),
            ],
            stage: stage.map(String::from),
            remove_intermediate: !self.keep_containers,
        }
    }

    /// Builds one target and returns the tag of its final image.
    pub async fn build_target(
        &self,
        session: &mut BuildSession<'_, E>,
        target: &Target,
        runtime_config: &RuntimeConfig,
    ) -> Result<String> {
        match &self.mode {
            TagMode::Ephemeral(build_id) => {
                let tag = image_tag(&self.namespace, build_id.as_str(), target);
                session.register_image(tag.clone());
                runtime_config.progress(&format!("Building {}", tag))?;
                self.engine
                    .build(&self.request(tag.clone(), target, None), runtime_config)
                    .await?;
                Ok(tag)
            }
            TagMode::Stages(stages) => {
                let mut last = String::new();
                for stage in stages {
                    let tag = image_tag(&self.namespace, stage, target);
                    runtime_config.progress(&format!("Building stage {} as {}", stage, tag))?;
                    self.engine
                        .build(&self.request(tag.clone(), target, Some(stage.as_str())), runtime_config)
                        .await?;
                    last = tag;
                }
                Ok(last)
            }
        }
    }

    /// Builds every target in order, extracting wheels after each build when
    /// `extract` is given. Stops at the first failure.
    pub async fn build_targets(
        &self,
        session: &mut BuildSession<'_, E>,
        targets: &[Target],
        extract: Option<&ExtractPlan>,
        runtime_config: &RuntimeConfig,
    ) -> Result<Vec<PathBuf>> {
        let mut wheels = Vec::new();

        for (index, target) in targets.iter().enumerate() {
            runtime_config.section(&format!(
                "[{}/{}] {}",
                index + 1,
                targets.len(),
                target
            ))?;

            let tag = self.build_target(session, target, runtime_config).await?;

            if let Some(plan) = extract {
                runtime_config.progress(&format!(
                    "Extracting wheels from {} into {}",
                    tag,
                    plan.output_dir.display()
                ))?;
                let extracted = self
                    .engine
                    .extract(&tag, &plan.command, &plan.output_dir, runtime_config)
                    .await?;
                for wheel in &extracted {
                    runtime_config.indent(&format!("✓ {}", wheel.display()))?;
                }
                wheels.extend(extracted);
            }
        }

        Ok(wheels)
    }
}
