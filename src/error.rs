//! Comprehensive error types for wheel build operations.
//!
//! This module defines all error types with actionable error messages and
//! the exit-code mapping used by the binary.

use thiserror::Error;

/// Result type alias for builder operations
pub type Result<T> = std::result::Result<T, BuilderError>;

/// Main error type for all builder operations
#[derive(Error, Debug)]
pub enum BuilderError {
    /// CLI argument and external command errors
    #[error("CLI error: {0}")]
    Cli(#[from] CliError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// TOML parsing errors
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Repository discovery errors
    #[error("Git error: {0}")]
    Git(String),

    /// Generic errors from anyhow
    #[error("{0}")]
    Anyhow(#[from] anyhow::Error),
}

/// CLI-specific errors
#[derive(Error, Debug)]
pub enum CliError {
    /// Invalid command line arguments or configuration
    #[error("Invalid arguments: {reason}")]
    InvalidArguments {
        /// Reason for the error
        reason: String,
    },

    /// Filtering the matrix left nothing to build
    #[error(
        "No targets match platforms [{}] and python versions [{}]",
        platforms.join(", "),
        pythons.join(", ")
    )]
    NoTargets {
        /// Requested platform names
        platforms: Vec<String>,
        /// Requested python versions
        pythons: Vec<String>,
    },

    /// Command could not be spawned or its IO failed
    #[error("Command execution failed: {command} - {reason}")]
    ExecutionFailed {
        /// Command that failed
        command: String,
        /// Reason for the error
        reason: String,
    },

    /// Command ran and exited non-zero
    #[error("Command failed: {command} (exit code: {})", code.map_or("signal".to_string(), |c| c.to_string()))]
    CommandFailed {
        /// Command that failed
        command: String,
        /// Exit code, `None` when terminated by a signal
        code: Option<i32>,
    },
}

impl CliError {
    /// Builds a `CommandFailed` from a finished process status.
    pub fn from_status(command: impl Into<String>, status: std::process::ExitStatus) -> Self {
        CliError::CommandFailed {
            command: command.into(),
            code: status.code(),
        }
    }
}

impl BuilderError {
    /// Process exit code for this error.
    ///
    /// User-input errors exit with 1; a failing external command propagates
    /// its own exit code.
    pub fn exit_code(&self) -> i32 {
        match self {
            BuilderError::Cli(CliError::CommandFailed {
                code: Some(code), ..
            }) if *code != 0 => *code,
            _ => 1,
        }
    }

    /// Whether this error was caused by user input rather than a tool failure
    pub fn is_user_error(&self) -> bool {
        matches!(
            self,
            BuilderError::Cli(CliError::InvalidArguments { .. } | CliError::NoTargets { .. })
                | BuilderError::Toml(_)
        )
    }
}
