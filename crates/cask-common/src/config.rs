//! Global configuration model for the cask runtime.
//!
//! A [`CaskConfig`] is constructed once per command invocation and passed
//! explicitly to every component that needs a path, so no process-wide
//! mutable state is involved.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::constants;

/// Root configuration for a single runtime invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaskConfig {
    /// Base directory for volatile runtime state.
    pub runtime_dir: PathBuf,
    /// Base directory for images, layers, and sandbox workspaces.
    pub data_dir: PathBuf,
}

impl Default for CaskConfig {
    fn default() -> Self {
        Self {
            runtime_dir: std::env::var(constants::ENV_RUNTIME_DIR)
                .map_or_else(|_| PathBuf::from(constants::DEFAULT_RUNTIME_DIR), PathBuf::from),
            data_dir: std::env::var(constants::ENV_DATA_DIR)
                .map_or_else(|_| PathBuf::from(constants::DEFAULT_DATA_DIR), PathBuf::from),
        }
    }
}

impl CaskConfig {
    /// Directory holding one metadata directory per sandbox.
    #[must_use]
    pub fn sandboxes_dir(&self) -> PathBuf {
        self.runtime_dir.join("sandboxes")
    }

    /// Metadata directory of a single sandbox.
    #[must_use]
    pub fn sandbox_dir(&self, name: &str) -> PathBuf {
        self.sandboxes_dir().join(name)
    }

    /// Directory holding one JSON file per virtual network.
    #[must_use]
    pub fn networks_dir(&self) -> PathBuf {
        self.runtime_dir.join("networks")
    }

    /// Path of the single IPAM state file.
    #[must_use]
    pub fn ipam_file(&self) -> PathBuf {
        self.runtime_dir.join("ipam").join("subnets.json")
    }

    /// Directory holding packed image archives.
    #[must_use]
    pub fn images_dir(&self) -> PathBuf {
        self.data_dir.join("images")
    }

    /// Directory holding unpacked read-only image layers.
    #[must_use]
    pub fn layers_dir(&self) -> PathBuf {
        self.data_dir.join("layers")
    }

    /// Directory holding per-sandbox writable workspaces.
    #[must_use]
    pub fn workspaces_dir(&self) -> PathBuf {
        self.data_dir.join("sandboxes")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paths_derive_from_base_dirs() {
        let config = CaskConfig {
            runtime_dir: PathBuf::from("/run/x"),
            data_dir: PathBuf::from("/lib/x"),
        };
        assert_eq!(config.networks_dir(), PathBuf::from("/run/x/networks"));
        assert_eq!(config.ipam_file(), PathBuf::from("/run/x/ipam/subnets.json"));
        assert_eq!(config.sandbox_dir("web"), PathBuf::from("/run/x/sandboxes/web"));
        assert_eq!(config.images_dir(), PathBuf::from("/lib/x/images"));
    }
}
