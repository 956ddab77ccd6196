//! Image naming and stage discovery for wheel builds.

mod stages;
mod tag;

pub use stages::{parse_stages, resolve_stages};
pub use tag::{BuildId, image_tag};
