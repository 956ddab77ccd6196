//! Command line argument parsing and validation.
//!
//! This module provides CLI argument parsing using clap, and resolves the
//! parsed arguments into immutable build options.

use crate::matrix::{Target, platform_names, python_versions};
use clap::Parser;
use std::path::PathBuf;

/// Container-driven wheel builds across a platform matrix
#[derive(Parser, Debug)]
#[command(
    name = "kodegen_bundler_wheels",
    version,
    about = "Build Python wheels in containers for every platform in the matrix",
    long_about = "Builds Python wheels inside containers for a matrix of platforms and python versions.

Packs the repository source into a reproducible archive, runs one container build per
selected target, copies the produced wheels out, and removes temporary images on exit.

Usage:
  kodegen_bundler_wheels ./wheelhouse
  kodegen_bundler_wheels --platforms ubuntu --pythons 36,38 /tmp/wheels
  kodegen_bundler_wheels --tag-stages --no-extract

Exit code 0 = every selected target was built (and extracted)."
)]
pub struct Args {
    /// Directory receiving the built wheels
    #[arg(value_name = "OUTPUT_DIR", default_value = ".")]
    pub output_dir: PathBuf,

    /// Do not copy wheels out of the built images
    #[arg(short = 'n', long)]
    pub no_extract: bool,

    /// Keep intermediate containers after each build
    #[arg(short = 'k', long)]
    pub keep_containers: bool,

    /// Build and keep a tag for every stage of the build
    #[arg(short = 's', long)]
    pub tag_stages: bool,

    /// Platforms to build, comma-separated (default: all)
    #[arg(short = 'p', long, value_name = "LIST", value_delimiter = ',')]
    pub platforms: Option<Vec<String>>,

    /// Python versions to build, comma-separated (default: all)
    #[arg(short = 'v', long, value_name = "LIST", value_delimiter = ',')]
    pub pythons: Option<Vec<String>>,

    /// TOML configuration overriding the matrix and build layout
    #[arg(short = 'c', long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Container engine binary
    #[arg(long, value_name = "PROGRAM", env = "WHEEL_BUILD_ENGINE", default_value = "docker")]
    pub engine: String,

    /// Print the selected targets and exit
    #[arg(long)]
    pub list: bool,

    /// Show detailed progress
    #[arg(long, conflicts_with = "quiet")]
    pub verbose: bool,

    /// Only print errors
    #[arg(short = 'q', long)]
    pub quiet: bool,
}

impl Args {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate arguments for consistency
    pub fn validate(&self) -> Result<(), String> {
        if self.engine.trim().is_empty() {
            return Err("Engine cannot be empty".to_string());
        }

        let filters = [("platforms", &self.platforms), ("pythons", &self.pythons)];
        for (name, values) in filters {
            if let Some(values) = values
                && values.iter().any(|v| v.trim().is_empty())
            {
                return Err(format!("--{} contains an empty entry", name));
            }
        }

        Ok(())
    }
}

/// Immutable options for one run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildOptions {
    /// Host directory receiving wheels
    pub output_dir: PathBuf,
    /// Copy wheels out of the final image
    pub extract: bool,
    /// Keep intermediate containers
    pub keep_containers: bool,
    /// Tag every stage instead of one ephemeral image
    pub tag_stages: bool,
    /// Selected platform names
    pub platforms: Vec<String>,
    /// Selected python versions
    pub pythons: Vec<String>,
}

impl BuildOptions {
    /// Resolves arguments against the matrix; absent filters select everything.
    pub fn resolve(args: &Args, matrix: &[Target]) -> Self {
        let trimmed = |values: &Vec<String>| -> Vec<String> {
            values.iter().map(|v| v.trim().to_string()).collect()
        };

        Self {
            output_dir: args.output_dir.clone(),
            extract: !args.no_extract,
            keep_containers: args.keep_containers,
            tag_stages: args.tag_stages,
            platforms: args
                .platforms
                .as_ref()
                .map(trimmed)
                .unwrap_or_else(|| platform_names(matrix)),
            pythons: args
                .pythons
                .as_ref()
                .map(trimmed)
                .unwrap_or_else(|| python_versions(matrix)),
        }
    }
}

/// Configuration derived from command line arguments
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// Output manager for colored terminal output
    output: super::OutputManager,
}

impl From<&Args> for RuntimeConfig {
    fn from(args: &Args) -> Self {
        Self {
            output: super::OutputManager::new(args.verbose, args.quiet),
        }
    }
}

impl RuntimeConfig {
    pub fn new(output: super::OutputManager) -> Self {
        Self { output }
    }

    /// Configuration that prints nothing
    pub fn quiet() -> Self {
        Self::new(super::OutputManager::new(false, true))
    }

    /// Print verbose message if in verbose mode
    pub fn verbose_println(&self, message: &str) -> std::io::Result<()> {
        self.output.verbose(message)
    }

    /// Print success message if not in quiet mode
    pub fn success(&self, message: &str) -> std::io::Result<()> {
        self.output.success(message)
    }

    /// Print warning message if not in quiet mode
    pub fn warn(&self, message: &str) -> std::io::Result<()> {
        self.output.warn(message)
    }

    /// Print progress message
    pub fn progress(&self, message: &str) -> std::io::Result<()> {
        self.output.progress(message)
    }

    /// Print section header
    pub fn section(&self, title: &str) -> std::io::Result<()> {
        self.output.section(title)
    }

    /// Print indented text
    pub fn indent(&self, message: &str) -> std::io::Result<()> {
        self.output.indent(message)
    }
}
