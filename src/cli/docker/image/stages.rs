//! Build stage discovery for stage-tagged builds.

use crate::config::BuildConfig;
use crate::error::{BuilderError, CliError, Result};
use regex::Regex;
use std::path::Path;
use std::sync::LazyLock;

/// `FROM [--flag=value ...] <image> AS <name>`
static STAGE_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\s*FROM\s+(?:--\S+\s+)*\S+\s+AS\s+(\S+)\s*$")
        .expect("stage pattern is valid")
});

/// Named stages declared in a Dockerfile, in declaration order.
pub fn parse_stages(dockerfile: &str) -> Vec<String> {
    dockerfile
        .lines()
        .filter_map(|line| STAGE_LINE.captures(line))
        .map(|caps| caps[1].to_string())
        .collect()
}

/// Stages to build: the configured list, or the ones declared in the Dockerfile.
pub fn resolve_stages(config: &BuildConfig, dockerfile: &Path) -> Result<Vec<String>> {
    if let Some(stages) = &config.stages {
        log::debug!("Using configured stages: {}", stages.join(", "));
        return Ok(stages.clone());
    }

    let contents = std::fs::read_to_string(dockerfile).map_err(|e| {
        BuilderError::Cli(CliError::ExecutionFailed {
            command: "read_dockerfile".to_string(),
            reason: format!("Failed to read {}: {}", dockerfile.display(), e),
        })
    })?;

    let stages = parse_stages(&contents);
    if stages.is_empty() {
        return Err(CliError::InvalidArguments {
            reason: format!(
                "--tag-stages requires named stages (FROM <image> AS <name>) in {}",
                dockerfile.display()
            ),
        }
        .into());
    }

    log::debug!("Discovered stages: {}", stages.join(", "));
    Ok(stages)
}
