//! Command line interface for the wheel builder.
//!
//! This module wires argument parsing, target selection, source packaging
//! and the container build driver into a single run.

mod args;
pub mod docker;
mod output;

pub use args::{Args, BuildOptions, RuntimeConfig};
pub use output::OutputManager;

use crate::config::BuildConfig;
use crate::error::{CliError, Result};
use crate::matrix::{Target, select_targets};
use crate::source::{SourceArchiver, create_source_archive, repository_root};
use docker::{
    BuildDriver, BuildId, BuildSession, ContainerEngine, DockerEngine, ExtractPlan, TagMode,
    resolve_stages,
};
use std::path::Path;

/// Exit code after Ctrl-C, as a shell reports SIGINT
pub const INTERRUPTED_EXIT_CODE: i32 = 130;

/// Main CLI entry point
///
/// Ctrl-C drops the in-flight run, which tears down its build session
/// before the interrupted exit code is returned.
pub async fn run() -> Result<i32> {
    let args = Args::parse_args();
    let runtime_config = RuntimeConfig::from(&args);

    tokio::select! {
        result = execute(args, &runtime_config) => result,
        Ok(()) = tokio::signal::ctrl_c() => {
            log::warn!("Interrupted");
            runtime_config.warn("Interrupted, temporary images and files removed")?;
            Ok(INTERRUPTED_EXIT_CODE)
        }
    }
}

/// Runs the tool for already-parsed arguments and returns the exit code.
pub async fn execute(args: Args, runtime_config: &RuntimeConfig) -> Result<i32> {
    args.validate()
        .map_err(|reason| CliError::InvalidArguments { reason })?;

    let config = BuildConfig::load(args.config.as_deref())?;
    let options = BuildOptions::resolve(&args, &config.matrix);
    let targets = select_targets(&config.matrix, &options.platforms, &options.pythons)?;

    if args.list {
        print_targets(&targets);
        return Ok(0);
    }

    let engine = DockerEngine::locate(&args.engine)?;
    let repo_root = repository_root(&std::env::current_dir()?)?;

    build_all(&engine, &config, &options, &targets, &repo_root, runtime_config).await?;
    Ok(0)
}

fn print_targets(targets: &[Target]) {
    for target in targets {
        println!(
            "{}\t{}\t{}\t{}",
            target.python, target.platform, target.platform_version, target.alias
        );
    }
}

/// Archiver for `repo_root` that leaves out the build context and the
/// configured extra names.
fn source_archiver(config: &BuildConfig, repo_root: &Path) -> SourceArchiver {
    SourceArchiver::new(repo_root.to_path_buf())
        .with_excludes(config.excludes.iter().cloned())
        .with_nested_exclusion(config.context_exclusion())
}

/// Packs the source and builds every target against `engine`.
///
/// Temporary files and images are torn down before this returns, on success
/// and on every error path.
pub async fn build_all<E: ContainerEngine>(
    engine: &E,
    config: &BuildConfig,
    options: &BuildOptions,
    targets: &[Target],
    repo_root: &Path,
    runtime_config: &RuntimeConfig,
) -> Result<()> {
    let context = config.context_dir(repo_root);
    let dockerfile = config.dockerfile_path(repo_root);

    if !dockerfile.is_file() {
        return Err(CliError::InvalidArguments {
            reason: format!(
                "Dockerfile not found at: {}\n\
                 \n\
                 The wheel build context is expected at {} relative to the repository root.\n\
                 Use --config to point at a different context or Dockerfile.",
                dockerfile.display(),
                config.context.display()
            ),
        }
        .into());
    }

    // Resolve the tagging mode before anything is created
    let mode = if options.tag_stages {
        TagMode::Stages(resolve_stages(config, &dockerfile)?)
    } else {
        let build_id = BuildId::generate();
        log::info!("Build identifier: {}", build_id);
        TagMode::Ephemeral(build_id)
    };

    let driver = BuildDriver::new(
        engine,
        config.namespace.clone(),
        context,
        dockerfile,
        options.keep_containers,
        mode,
    )?;

    let mut session = BuildSession::new(engine);

    let archive_path = config.archive_path(repo_root);
    session.register_file(archive_path.clone());

    runtime_config.section("Packing source")?;
    let summary = create_source_archive(source_archiver(config, repo_root), archive_path).await?;
    runtime_config.success(&format!(
        "Packed {} entries into {}",
        summary.entries,
        summary.path.display()
    ))?;
    runtime_config.verbose_println(&format!("sha256 {}", summary.sha256))?;

    let extract = options.extract.then(|| ExtractPlan {
        command: config.extract_command.clone(),
        output_dir: options.output_dir.clone(),
    });

    let wheels = driver
        .build_targets(&mut session, targets, extract.as_ref(), runtime_config)
        .await?;

    session.cleanup();

    runtime_config.section("Done")?;
    if options.extract {
        runtime_config.success(&format!(
            "Built {} target(s), extracted {} wheel(s) into {}",
            targets.len(),
            wheels.len(),
            options.output_dir.display()
        ))?;
    } else {
        runtime_config.success(&format!("Built {} target(s)", targets.len()))?;
    }

    Ok(())
}
