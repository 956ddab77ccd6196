//! Build configuration loaded from an optional TOML file.

use crate::error::{BuilderError, CliError, Result};
use crate::matrix::{Target, default_matrix, validate_matrix};
use crate::source::NestedExclusion;
use serde::Deserialize;
use std::path::{Component, Path, PathBuf};

/// Image repository that every tag lives under
pub const DEFAULT_NAMESPACE: &str = "pip-drake";

/// Build context, relative to the repository root
pub const DEFAULT_CONTEXT: &str = "tools/wheel";

/// Dockerfile, relative to the build context
pub const DEFAULT_DOCKERFILE: &str = "Dockerfile";

/// Source archive, relative to the build context
pub const DEFAULT_ARCHIVE: &str = "image/source.tar.gz";

/// Command run inside the image to emit the wheel archive on stdout
pub const DEFAULT_EXTRACT_COMMAND: [&str; 3] =
    ["bash", "-c", "tar -cf - /wheel/wheelhouse/*.whl"];

/// On-disk shape of the configuration file. Every key is optional.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    namespace: Option<String>,
    context: Option<PathBuf>,
    dockerfile: Option<PathBuf>,
    archive: Option<PathBuf>,
    stages: Option<Vec<String>>,
    extract_command: Option<Vec<String>>,
    excludes: Option<Vec<String>>,
    targets: Option<Vec<Target>>,
}

/// Resolved build configuration
#[derive(Debug, Clone)]
pub struct BuildConfig {
    /// Image repository used in every tag
    pub namespace: String,

    /// Build context relative to the repository root
    pub context: PathBuf,

    /// Dockerfile relative to the build context
    pub dockerfile: PathBuf,

    /// Source archive relative to the build context
    pub archive: PathBuf,

    /// Explicit stage list; `None` means parse the Dockerfile
    pub stages: Option<Vec<String>>,

    /// Command emitting the wheel tar stream inside the image
    pub extract_command: Vec<String>,

    /// Extra top-level names left out of the source archive
    pub excludes: Vec<String>,

    /// Target matrix
    pub matrix: Vec<Target>,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            namespace: DEFAULT_NAMESPACE.to_string(),
            context: PathBuf::from(DEFAULT_CONTEXT),
            dockerfile: PathBuf::from(DEFAULT_DOCKERFILE),
            archive: PathBuf::from(DEFAULT_ARCHIVE),
            stages: None,
            extract_command: DEFAULT_EXTRACT_COMMAND.iter().map(|s| s.to_string()).collect(),
            excludes: Vec::new(),
            matrix: default_matrix(),
        }
    }
}

impl BuildConfig {
    /// Loads configuration from `path`, or the defaults when `path` is `None`.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            None => Ok(Self::default()),
            Some(path) => {
                let contents = std::fs::read_to_string(path).map_err(|e| {
                    BuilderError::Cli(CliError::InvalidArguments {
                        reason: format!("Failed to read config {}: {}", path.display(), e),
                    })
                })?;
                log::debug!("Loaded configuration from {}", path.display());
                Self::from_toml(&contents)
            }
        }
    }

    /// Parses configuration text, filling missing keys with defaults.
    pub fn from_toml(contents: &str) -> Result<Self> {
        let file: ConfigFile = toml::from_str(contents)?;
        let defaults = Self::default();

        let config = Self {
            namespace: file.namespace.unwrap_or(defaults.namespace),
            context: file.context.unwrap_or(defaults.context),
            dockerfile: file.dockerfile.unwrap_or(defaults.dockerfile),
            archive: file.archive.unwrap_or(defaults.archive),
            stages: file.stages,
            extract_command: file.extract_command.unwrap_or(defaults.extract_command),
            excludes: file.excludes.unwrap_or(defaults.excludes),
            matrix: file.targets.unwrap_or(defaults.matrix),
        };
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        let invalid = |reason: String| -> Result<()> {
            Err(CliError::InvalidArguments { reason }.into())
        };

        if self.namespace.is_empty() || self.namespace.contains(':') {
            return invalid(format!("Invalid image namespace '{}'", self.namespace));
        }
        // The archiver drops the context by name from inside its parent
        let context_parts: Vec<_> = self.context.components().collect();
        if context_parts.len() < 2
            || !context_parts.iter().all(|c| matches!(c, Component::Normal(_)))
        {
            return invalid(format!(
                "context '{}' must be a relative path below a top-level directory, such as {}",
                self.context.display(),
                DEFAULT_CONTEXT
            ));
        }
        if self.archive.is_absolute() {
            return invalid("archive path must be relative".to_string());
        }
        if let Some(name) = self
            .excludes
            .iter()
            .find(|name| name.trim().is_empty() || name.contains('/'))
        {
            return invalid(format!("excludes entry '{}' must be a single file name", name));
        }
        if self.extract_command.is_empty() {
            return invalid("extract_command must not be empty".to_string());
        }
        if let Some(stages) = &self.stages
            && (stages.is_empty() || stages.iter().any(|s| s.trim().is_empty()))
        {
            return invalid("stages must list at least one non-empty stage name".to_string());
        }

        validate_matrix(&self.matrix)
    }

    /// Absolute build context for the given repository root
    pub fn context_dir(&self, repo_root: &Path) -> PathBuf {
        repo_root.join(&self.context)
    }

    /// Absolute Dockerfile path for the given repository root
    pub fn dockerfile_path(&self, repo_root: &Path) -> PathBuf {
        self.context_dir(repo_root).join(&self.dockerfile)
    }

    /// Absolute source archive path for the given repository root
    pub fn archive_path(&self, repo_root: &Path) -> PathBuf {
        self.context_dir(repo_root).join(&self.archive)
    }

    /// Keeps the build context itself out of the source archive.
    pub fn context_exclusion(&self) -> NestedExclusion {
        NestedExclusion {
            directory: self.context.parent().map(Path::to_path_buf).unwrap_or_default(),
            names: self
                .context
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .into_iter()
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_yields_defaults() {
        let config = BuildConfig::from_toml("").unwrap();
        assert_eq!(config.namespace, DEFAULT_NAMESPACE);
        assert_eq!(config.matrix, default_matrix());
        assert!(config.stages.is_none());
        assert_eq!(config.extract_command.len(), 3);
    }

    #[test]
    fn targets_replace_the_matrix() {
        let config = BuildConfig::from_toml(
            r#"
            namespace = "pip-example"
            stages = ["base", "wheel"]

            [[targets]]
            python = "310"
            platform = "ubuntu"
            platform_version = "22.04"
            alias = "jammy"
            "#,
        )
        .unwrap();

        assert_eq!(config.namespace, "pip-example");
        assert_eq!(config.stages, Some(vec!["base".to_string(), "wheel".to_string()]));
        assert_eq!(config.matrix, vec![Target::new("310", "ubuntu", "22.04", "jammy")]);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        assert!(BuildConfig::from_toml("parallel = true").is_err());
    }

    #[test]
    fn duplicate_targets_are_rejected() {
        let err = BuildConfig::from_toml(
            r#"
            [[targets]]
            python = "38"
            platform = "ubuntu"
            platform_version = "20.04"
            alias = "focal"

            [[targets]]
            python = "38"
            platform = "ubuntu"
            platform_version = "20.04"
            alias = "focal"
            "#,
        )
        .unwrap_err();
        assert!(err.is_user_error());
    }

    #[test]
    fn namespace_with_colon_is_rejected() {
        assert!(BuildConfig::from_toml(r#"namespace = "repo:tag""#).is_err());
    }

    #[test]
    fn empty_stage_list_is_rejected() {
        assert!(BuildConfig::from_toml("stages = []").is_err());
    }

    #[test]
    fn paths_resolve_under_repository_root() {
        let config = BuildConfig::default();
        let root = Path::new("/src/project");
        assert_eq!(config.context_dir(root), root.join("tools/wheel"));
        assert_eq!(config.dockerfile_path(root), root.join("tools/wheel/Dockerfile"));
        assert_eq!(
            config.archive_path(root),
            root.join("tools/wheel/image/source.tar.gz")
        );
    }

    #[test]
    fn context_exclusion_follows_configured_context() {
        let config = BuildConfig::from_toml(r#"context = "ci/docker/wheel""#).unwrap();
        let exclusion = config.context_exclusion();
        assert_eq!(exclusion.directory, PathBuf::from("ci/docker"));
        assert_eq!(exclusion.names, ["wheel"]);

        let default = BuildConfig::default().context_exclusion();
        assert_eq!(default.directory, PathBuf::from("tools"));
        assert_eq!(default.names, ["wheel"]);
    }

    #[test]
    fn top_level_or_escaping_context_is_rejected() {
        for context in ["wheel", "../wheel", "tools/../wheel", "/abs/wheel", ""] {
            let err = BuildConfig::from_toml(&format!("context = {:?}", context)).unwrap_err();
            assert!(err.is_user_error(), "{} accepted", context);
        }
    }

    #[test]
    fn excludes_are_read_and_checked() {
        let config = BuildConfig::from_toml(r#"excludes = ["node_modules", "out"]"#).unwrap();
        assert_eq!(config.excludes, ["node_modules", "out"]);

        assert!(BuildConfig::from_toml(r#"excludes = ["a/b"]"#).is_err());
        assert!(BuildConfig::from_toml(r#"excludes = [" "]"#).is_err());
    }

    #[test]
    fn missing_file_is_a_user_error() {
        let err = BuildConfig::load(Some(Path::new("/nonexistent/wheels.toml"))).unwrap_err();
        assert!(err.is_user_error());
    }
}
