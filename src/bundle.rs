//! Read-only view of an OCI bundle's `config.json`.
//!
//! Only the `mounts` array matters to the hook; everything else in the
//! runtime configuration is ignored.

use crate::error::{HookError, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Name of the runtime configuration file inside a bundle.
pub const BUNDLE_CONFIG_FILE: &str = "config.json";

/// OCI mount entry.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct MountSpec {
    pub destination: String,
    #[serde(default)]
    pub source: String,
    #[serde(rename = "type", default)]
    pub mount_type: Option<String>,
    #[serde(default)]
    pub options: Vec<String>,
}

/// The part of a bundle's runtime configuration the hook reads.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BundleConfig {
    #[serde(default)]
    pub mounts: Vec<MountSpec>,
}

impl BundleConfig {
    /// Load `<bundle>/config.json`.
    pub fn load(bundle: &Path) -> Result<Self> {
        let path = config_path(bundle);
        info!(path = %path.display(), "reading bundle config");

        let data = fs::read(&path).map_err(|source| HookError::ConfigUnreadable {
            path: path.clone(),
            source,
        })?;

        serde_json::from_slice(&data).map_err(|source| HookError::ConfigMalformed { path, source })
    }

    /// Source of the first mount whose destination contains `tag`.
    ///
    /// Mounts are scanned in declaration order; later matches are ignored.
    pub fn find_mount_source(&self, tag: &str) -> Option<&str> {
        self.mounts
            .iter()
            .inspect(|m| debug!(source = %m.source, destination = %m.destination, "mount"))
            .find(|m| m.destination.contains(tag))
            .map(|m| m.source.as_str())
    }
}

fn config_path(bundle: &Path) -> PathBuf {
    bundle.join(BUNDLE_CONFIG_FILE)
}

/// Resolve the host directory backing the secrets mount of `bundle`.
///
/// # Errors
///
/// - [`HookError::ConfigUnreadable`] / [`HookError::ConfigMalformed`] from loading
/// - [`HookError::MountNotFound`] if no destination contains `tag`, or the
///   matching mount has no source
pub fn resolve_secret_mount(bundle: &Path, tag: &str) -> Result<PathBuf> {
    let config = BundleConfig::load(bundle)?;

    match config.find_mount_source(tag) {
        Some(source) if !source.is_empty() => {
            info!(source, "mount source from config.json");
            Ok(PathBuf::from(source))
        }
        _ => Err(HookError::MountNotFound {
            tag: tag.to_string(),
            config: config_path(bundle),
        }),
    }
}
