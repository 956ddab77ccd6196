//! Container-driven Python wheel builds across a platform matrix
//!
//! This library provides the pieces of the wheel build pipeline:
//! - target matrix and selection
//! - deterministic source archives for the build context
//! - container builds per target, optionally tagged per stage
//! - wheel extraction and exit-time cleanup of temporary images
//!
//! It can be used both as a CLI tool and as a library dependency.

pub mod cli;
pub mod config;
pub mod error;
pub mod matrix;
pub mod source;

// Re-export commonly used types
pub use error::{BuilderError, CliError, Result};
