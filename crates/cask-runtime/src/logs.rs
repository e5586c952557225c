//! Access to the per-sandbox log file.
//!
//! Detached sandboxes have their stdout and stderr redirected into a log
//! file inside the metadata directory at bootstrap time; this module only
//! reads it back.

use cask_common::error::{CaskError, Result};

use crate::metadata::MetadataStore;

/// Reads a sandbox's combined stdout/stderr log.
///
/// Returns an empty string when the sandbox exists but has produced no
/// log file, which is the normal case for interactive sandboxes.
///
/// # Errors
///
/// Returns a not-found error for unknown sandboxes, or a read error if
/// the file exists but cannot be read.
pub fn read_logs(store: &MetadataStore, name: &str) -> Result<String> {
    let _ = store.load(name)?;
    let path = store.log_path(name);
    if !path.exists() {
        return Ok(String::new());
    }
    std::fs::read_to_string(&path).map_err(|e| CaskError::io(&path, e))
}
