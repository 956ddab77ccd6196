//! Container engine invocation and process management.

use super::extract::{STRIP_COMPONENTS, unpack_artifacts};
use crate::cli::RuntimeConfig;
use crate::error::{BuilderError, CliError, Result};
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio_util::io::SyncIoBridge;

/// Platform-specific engine startup instructions
#[cfg(target_os = "macos")]
pub const DOCKER_START_HELP: &str = "Start Docker Desktop from Applications or Spotlight";

#[cfg(not(target_os = "macos"))]
pub const DOCKER_START_HELP: &str = "Start Docker daemon: sudo systemctl start docker";

/// One `build` invocation of the container engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildRequest {
    /// Tag applied to the resulting image
    pub tag: String,
    /// Build context directory
    pub context: PathBuf,
    /// Dockerfile path
    pub dockerfile: PathBuf,
    /// `--build-arg` pairs, in order
    pub build_args: Vec<(String, String)>,
    /// Build only up to this stage
    pub stage: Option<String>,
    /// Remove intermediate containers, even after a failed build
    pub remove_intermediate: bool,
}

impl BuildRequest {
    /// Engine arguments for this request, starting with `build`.
    pub fn to_args(&self) -> Vec<String> {
        let mut args = vec![
            "build".to_string(),
            "-f".to_string(),
            self.dockerfile.display().to_string(),
            "-t".to_string(),
            self.tag.clone(),
        ];

        for (key, value) in &self.build_args {
            args.push("--build-arg".to_string());
            args.push(format!("{}={}", key, value));
        }

        if self.remove_intermediate {
            args.push("--force-rm".to_string());
        }

        if let Some(stage) = &self.stage {
            args.push("--target".to_string());
            args.push(stage.clone());
        }

        args.push(self.context.display().to_string());
        args
    }
}

/// Operations the build pipeline needs from a container engine.
///
/// Calls are issued strictly one at a time.
#[allow(async_fn_in_trait)]
pub trait ContainerEngine {
    /// Builds and tags an image. Fails on a non-zero exit.
    async fn build(&self, request: &BuildRequest, runtime_config: &RuntimeConfig) -> Result<()>;

    /// Runs `command` in a throwaway container from `tag` and unpacks the tar
    /// stream it writes on stdout into `output_dir`.
    async fn extract(
        &self,
        tag: &str,
        command: &[String],
        output_dir: &Path,
        runtime_config: &RuntimeConfig,
    ) -> Result<Vec<PathBuf>>;

    /// Removes images in a single batched call.
    ///
    /// Synchronous so it can run from `Drop`.
    fn remove_images(&self, tags: &[String]) -> Result<()>;
}

/// Engine backed by the `docker` CLI (or a compatible one such as `podman`).
#[derive(Debug, Clone)]
pub struct DockerEngine {
    program: PathBuf,
}

impl DockerEngine {
    /// Locates `program` on `PATH`.
    pub fn locate(program: &str) -> Result<Self> {
        let path = which::which(program).map_err(|e| {
            BuilderError::Cli(CliError::ExecutionFailed {
                command: program.to_string(),
                reason: format!(
                    "Container engine not found: {}\n\
                     \n\
                     {} does not appear to be installed.\n\
                     Install from: https://docs.docker.com/get-docker/\n\
                     or point --engine at a compatible binary.\n\
                     If it is installed, ensure the daemon is running.\n\
                     {}",
                    e, program, DOCKER_START_HELP
                ),
            })
        })?;

        log::debug!("Using container engine at {}", path.display());
        Ok(Self { program: path })
    }

    /// Engine for an already-resolved binary path
    pub fn with_program(program: PathBuf) -> Self {
        Self { program }
    }

    fn program_name(&self) -> String {
        self.program
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.program.display().to_string())
    }
}

impl ContainerEngine for DockerEngine {
    async fn build(&self, request: &BuildRequest, runtime_config: &RuntimeConfig) -> Result<()> {
        let args = request.to_args();
        let label = format!("{} build -t {}", self.program_name(), request.tag);
        log::info!("Running: {} {}", self.program_name(), args.join(" "));

        let mut command = Command::new(&self.program);
        command.args(&args);

        let status = stream_command(&mut command, &label, runtime_config).await?;
        if !status.success() {
            return Err(CliError::from_status(label, status).into());
        }

        runtime_config.success(&format!("Built image {}", request.tag))?;
        Ok(())
    }

    async fn extract(
        &self,
        tag: &str,
        command: &[String],
        output_dir: &Path,
        runtime_config: &RuntimeConfig,
    ) -> Result<Vec<PathBuf>> {
        let label = format!("{} run --rm {}", self.program_name(), tag);
        log::info!("Running: {} {}", label, command.join(" "));

        let mut child = Command::new(&self.program)
            .arg("run")
            .arg("--rm")
            .arg(tag)
            .args(command)
            .kill_on_drop(true)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                BuilderError::Cli(CliError::ExecutionFailed {
                    command: label.clone(),
                    reason: e.to_string(),
                })
            })?;

        let stdout = child.stdout.take().ok_or_else(|| {
            BuilderError::Cli(CliError::ExecutionFailed {
                command: label.clone(),
                reason: "stdout was not captured".to_string(),
            })
        })?;

        // The bridge must be created inside the runtime; it is then driven
        // from the blocking pool.
        let reader = SyncIoBridge::new(stdout);
        let destination = output_dir.to_path_buf();
        let unpack = tokio::task::spawn_blocking(move || {
            unpack_artifacts(reader, &destination, STRIP_COMPONENTS)
        });

        let stderr = child.stderr.take();
        let (unpacked, ()) = tokio::join!(unpack, forward_lines(stderr, runtime_config));

        let status = child.wait().await.map_err(|e| {
            BuilderError::Cli(CliError::ExecutionFailed {
                command: label.clone(),
                reason: e.to_string(),
            })
        })?;

        let unpacked = unpacked.map_err(|e| {
            BuilderError::Anyhow(anyhow::anyhow!("Extraction task panicked: {}", e))
        })?;

        if !status.success() {
            if let Err(e) = &unpacked {
                log::warn!("Extraction stream from {} was incomplete: {}", tag, e);
            }
            return Err(CliError::from_status(label, status).into());
        }

        unpacked
    }

    fn remove_images(&self, tags: &[String]) -> Result<()> {
        let label = format!("{} rmi", self.program_name());
        log::info!("Running: {} {}", label, tags.join(" "));

        let output = std::process::Command::new(&self.program)
            .arg("rmi")
            .args(tags)
            .stdin(Stdio::null())
            .output()
            .map_err(|e| {
                BuilderError::Cli(CliError::ExecutionFailed {
                    command: label.clone(),
                    reason: e.to_string(),
                })
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            log::debug!("{} stderr: {}", label, stderr.trim());
            return Err(CliError::from_status(label, output.status).into());
        }

        Ok(())
    }
}

/// Spawns `command` with piped output and streams both streams line by line
/// until the process exits. No timeout is applied; dropping the returned
/// future kills the child.
pub async fn stream_command(
    command: &mut Command,
    label: &str,
    runtime_config: &RuntimeConfig,
) -> Result<ExitStatus> {
    let mut child = command
        .kill_on_drop(true)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| {
            BuilderError::Cli(CliError::ExecutionFailed {
                command: label.to_string(),
                reason: e.to_string(),
            })
        })?;

    // Both streams must be drained before waiting or the child can block
    tokio::join!(
        forward_lines(child.stdout.take(), runtime_config),
        forward_lines(child.stderr.take(), runtime_config)
    );

    child.wait().await.map_err(|e| {
        BuilderError::Cli(CliError::ExecutionFailed {
            command: label.to_string(),
            reason: e.to_string(),
        })
    })
}

/// Echoes `stream` line by line until EOF.
///
/// Lines are raw bytes shown lossily; the pipe is never closed early, since
/// the child would otherwise die of SIGPIPE on its next write.
async fn forward_lines<R: AsyncRead + Unpin>(stream: Option<R>, runtime_config: &RuntimeConfig) {
    let Some(stream) = stream else {
        return;
    };

    let mut reader = BufReader::new(stream);
    let mut line = Vec::new();
    loop {
        line.clear();
        match reader.read_until(b'\n', &mut line).await {
            Ok(0) => break,
            Ok(_) => {
                let text = String::from_utf8_lossy(&line);
                let _ = runtime_config.indent(text.trim_end_matches(['\n', '\r']));
            }
            Err(e) => {
                log::warn!("Failed to read command output: {}", e);
                if let Err(e) = tokio::io::copy(&mut reader, &mut tokio::io::sink()).await {
                    log::debug!("Discarding remaining output failed: {}", e);
                }
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> BuildRequest {
        BuildRequest {
            tag: "pip-drake:run-bionic-py36".to_string(),
            context: PathBuf::from("/repo/tools/wheel"),
            dockerfile: PathBuf::from("/repo/tools/wheel/Dockerfile"),
            build_args: vec![
                ("PYTHON".to_string(), "36".to_string()),
                ("PLATFORM".to_string(), "ubuntu:18.04".to_string()),
            ],
            stage: None,
            remove_intermediate: true,
        }
    }

    #[test]
    fn full_build_arguments() {
        assert_eq!(
            request().to_args(),
            [
                "build",
                "-f",
                "/repo/tools/wheel/Dockerfile",
                "-t",
                "pip-drake:run-bionic-py36",
                "--build-arg",
                "PYTHON=36",
                "--build-arg",
                "PLATFORM=ubuntu:18.04",
                "--force-rm",
                "/repo/tools/wheel",
            ]
        );
    }

    #[test]
    fn stage_build_keeping_containers() {
        let mut request = request();
        request.stage = Some("wheel".to_string());
        request.remove_intermediate = false;

        let args = request.to_args();
        assert!(!args.contains(&"--force-rm".to_string()));
        let target = args.iter().position(|a| a == "--target").unwrap();
        assert_eq!(args[target + 1], "wheel");
        // Context is always last
        assert_eq!(args.last().unwrap(), "/repo/tools/wheel");
    }

    #[test]
    fn missing_engine_is_reported() {
        let err = DockerEngine::locate("definitely-not-a-container-engine").unwrap_err();
        assert!(err.to_string().contains("Container engine not found"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn streamed_command_reports_exit_status() {
        let runtime_config = RuntimeConfig::quiet();
        let mut command = Command::new("sh");
        command.args(["-c", "echo out; echo err >&2; exit 3"]);

        let status = stream_command(&mut command, "sh", &runtime_config)
            .await
            .unwrap();
        assert_eq!(status.code(), Some(3));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn failing_build_propagates_exit_code() {
        // `false` ignores its arguments and exits 1
        let engine = DockerEngine::with_program(PathBuf::from("false"));
        let err = engine
            .build(&request(), &RuntimeConfig::quiet())
            .await
            .unwrap_err();
        assert_eq!(err.exit_code(), 1);
        assert!(matches!(err, BuilderError::Cli(CliError::CommandFailed { .. })));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn non_utf8_output_is_drained_to_exit() {
        let mut command = Command::new("sh");
        command.args([
            "-c",
            "printf 'caf\\351\\n'; printf '\\377\\n' >&2; sleep 0.3; \
             i=0; while [ $i -lt 200 ]; do echo line $i; echo err $i >&2; i=$((i+1)); done; exit 0",
        ]);

        let status = stream_command(&mut command, "sh", &RuntimeConfig::quiet())
            .await
            .unwrap();
        assert!(status.success(), "exited with {:?}", status);
    }

    /// Writes an executable stand-in for the engine CLI. `run --rm <tag>`
    /// streams a wheel archive on stdout, or exits 5 for tags containing
    /// "broken".
    #[cfg(unix)]
    fn scripted_engine(dir: &Path) -> DockerEngine {
        use std::os::unix::fs::PermissionsExt;

        let stream = dir.join("wheels.tar");
        let mut builder = tar::Builder::new(std::fs::File::create(&stream).unwrap());
        let contents = b"wheel bytes";
        let mut header = tar::Header::new_gnu();
        header.set_size(contents.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        builder
            .append_data(
                &mut header,
                "wheel/wheelhouse/drake-0.1-cp36-linux_x86_64.whl",
                &contents[..],
            )
            .unwrap();
        builder
            .append_data(&mut header, "wheel/wheelhouse/notes.txt", &contents[..])
            .unwrap();
        builder.into_inner().unwrap();

        let script = dir.join("engine.sh");
        std::fs::write(
            &script,
            format!(
                "#!/bin/sh\n\
                 [ \"$1\" = run ] && [ \"$2\" = --rm ] || exit 64\n\
                 echo \"starting $3\" >&2\n\
                 case \"$3\" in *broken*) echo 'no wheelhouse' >&2; exit 5 ;; esac\n\
                 cat '{}'\n",
                stream.display()
            ),
        )
        .unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();
        DockerEngine::with_program(script)
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn extract_unpacks_wheels_from_container_stdout() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("out");
        let engine = scripted_engine(dir.path());

        let wheels = engine
            .extract(
                "pip-drake:wheel-bionic-py36",
                &["tar".to_string(), "-cf".to_string(), "-".to_string()],
                &out,
                &RuntimeConfig::quiet(),
            )
            .await
            .unwrap();

        let wheel = out.join("drake-0.1-cp36-linux_x86_64.whl");
        assert_eq!(wheels, [wheel.clone()]);
        assert_eq!(std::fs::read(&wheel).unwrap(), b"wheel bytes");
        assert!(!out.join("notes.txt").exists());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn failing_extraction_propagates_exit_code() {
        let dir = tempfile::tempdir().unwrap();
        let engine = scripted_engine(dir.path());

        let err = engine
            .extract(
                "pip-drake:broken-bionic-py36",
                &["tar".to_string()],
                &dir.path().join("out"),
                &RuntimeConfig::quiet(),
            )
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            BuilderError::Cli(CliError::CommandFailed { code: Some(5), .. })
        ));
        assert_eq!(err.exit_code(), 5);
    }

    #[cfg(unix)]
    #[test]
    fn failing_image_removal_is_an_error() {
        let engine = DockerEngine::with_program(PathBuf::from("false"));
        assert!(engine.remove_images(&["pip-drake:x".to_string()]).is_err());
    }
}
