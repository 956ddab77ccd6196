//! Image tag naming and per-run build identifiers.

use crate::matrix::Target;
use chrono::Utc;
use uuid::Uuid;

/// Unique token namespacing the ephemeral images of one run.
///
/// UTC timestamp plus a random salt, e.g. `20261018143005-1f3a9c2e`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildId(String);

impl BuildId {
    pub fn generate() -> Self {
        let timestamp = Utc::now().format("%Y%m%d%H%M%S");
        let salt = Uuid::new_v4().simple().to_string();
        Self(format!("{}-{}", timestamp, &salt[..8]))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for BuildId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Tag for `target` under `namespace`: `<namespace>:<prefix>-<alias>-py<python>`
pub fn image_tag(namespace: &str, prefix: &str, target: &Target) -> String {
    format!(
        "{}:{}-{}-py{}",
        namespace, prefix, target.alias, target.python
    )
}
