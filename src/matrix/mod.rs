//! Build target matrix and target selection.

use crate::error::{CliError, Result};
use serde::Deserialize;
use std::collections::HashSet;

/// One buildable (python, platform) configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Target {
    /// Python version without the dot (e.g., "36")
    pub python: String,

    /// Platform name passed to the build (e.g., "ubuntu")
    pub platform: String,

    /// Platform version (e.g., "18.04")
    pub platform_version: String,

    /// Short platform alias used in image tags (e.g., "bionic")
    pub alias: String,
}

impl Target {
    pub fn new(python: &str, platform: &str, platform_version: &str, alias: &str) -> Self {
        Self {
            python: python.to_string(),
            platform: platform.to_string(),
            platform_version: platform_version.to_string(),
            alias: alias.to_string(),
        }
    }

    /// Platform identifier handed to the build as `PLATFORM` (e.g., "ubuntu:18.04")
    pub fn platform_id(&self) -> String {
        format!("{}:{}", self.platform, self.platform_version)
    }
}

impl std::fmt::Display for Target {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "python {} on {} {} ({})",
            self.python, self.platform, self.platform_version, self.alias
        )
    }
}

/// The declared build matrix, in build order.
pub fn default_matrix() -> Vec<Target> {
    vec![
        Target::new("36", "ubuntu", "18.04", "bionic"),
        Target::new("37", "ubuntu", "18.04", "bionic"),
        Target::new("38", "ubuntu", "18.04", "bionic"),
        Target::new("38", "ubuntu", "20.04", "focal"),
    ]
}

/// Checks a matrix for empty fields and duplicate `(alias, python)` pairs.
///
/// Image tags are derived from the alias and python version, so two targets
/// sharing both would overwrite each other's images.
pub fn validate_matrix(matrix: &[Target]) -> Result<()> {
    let mut seen = HashSet::new();

    for target in matrix {
        let fields = [
            ("python", &target.python),
            ("platform", &target.platform),
            ("platform_version", &target.platform_version),
            ("alias", &target.alias),
        ];
        if let Some((name, _)) = fields.iter().find(|(_, value)| value.trim().is_empty()) {
            return Err(CliError::InvalidArguments {
                reason: format!("Target '{}' has an empty '{}' field", target, name),
            }
            .into());
        }

        if !seen.insert((target.alias.as_str(), target.python.as_str())) {
            return Err(CliError::InvalidArguments {
                reason: format!(
                    "Duplicate target for alias '{}' and python {}",
                    target.alias, target.python
                ),
            }
            .into());
        }
    }

    Ok(())
}

/// Every distinct platform name in the matrix, in first-seen order.
pub fn platform_names(matrix: &[Target]) -> Vec<String> {
    distinct(matrix.iter().map(|t| t.platform.as_str()))
}

/// Every distinct python version in the matrix, in first-seen order.
pub fn python_versions(matrix: &[Target]) -> Vec<String> {
    distinct(matrix.iter().map(|t| t.python.as_str()))
}

fn distinct<'a>(values: impl Iterator<Item = &'a str>) -> Vec<String> {
    let mut seen = HashSet::new();
    values
        .filter(|v| seen.insert(*v))
        .map(String::from)
        .collect()
}

/// Selects targets whose platform and python version were both requested.
///
/// Matrix order is preserved. An empty selection is a user error.
pub fn select_targets(
    matrix: &[Target],
    platforms: &[String],
    pythons: &[String],
) -> Result<Vec<Target>> {
    let selected: Vec<Target> = matrix
        .iter()
        .filter(|t| platforms.contains(&t.platform) && pythons.contains(&t.python))
        .cloned()
        .collect();

    if selected.is_empty() {
        return Err(CliError::NoTargets {
            platforms: platforms.to_vec(),
            pythons: pythons.to_vec(),
        }
        .into());
    }

    Ok(selected)
}
