//! Container engine integration for wheel builds.
//!
//! Every target is built by the container engine from the wheel build
//! context; this crate only sequences the engine calls.
//!
//! # Module Structure
//!
//! - `driver` - Per-target builds, stage tagging and extraction sequencing
//! - `engine` - Engine trait and the `docker` CLI implementation
//! - `extract` - Unpacking wheels from a container's tar stream
//! - `image` - Tag naming, build identifiers and stage discovery
//! - `session` - Cleanup registry torn down on every exit path

mod driver;
mod engine;
mod extract;
mod image;
mod session;

#[cfg(test)]
pub(crate) mod testing;

pub use driver::{BuildDriver, ExtractPlan, TagMode};
pub use engine::{BuildRequest, ContainerEngine, DockerEngine, stream_command};
pub use extract::{ARTIFACT_EXTENSION, STRIP_COMPONENTS, strip_components, unpack_artifacts};
pub use image::{BuildId, image_tag, parse_stages, resolve_stages};
pub use session::BuildSession;
