//! Unified error types for the cask workspace.
//!
//! Every crate in the workspace reports failures through [`CaskError`];
//! the CLI boundary converts them to `anyhow` for display.

use std::path::PathBuf;

use thiserror::Error;

/// Top-level error type shared across the workspace.
#[derive(Debug, Error)]
pub enum CaskError {
    /// An I/O operation failed.
    #[error("I/O error at {path}: {source}")]
    Io {
        /// Path where the I/O error occurred.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// A configuration value or user-supplied argument is invalid.
    #[error("invalid configuration: {message}")]
    Config {
        /// Description of the invalid configuration.
        message: String,
    },

    /// A required resource was not found.
    #[error("{kind} not found: {id}")]
    NotFound {
        /// Type of the missing resource.
        kind: &'static str,
        /// Identifier of the missing resource.
        id: String,
    },

    /// A resource is still referenced and cannot be removed.
    #[error("{kind} is in use: {id}")]
    InUse {
        /// Type of the busy resource.
        kind: &'static str,
        /// Identifier of the busy resource.
        id: String,
    },

    /// A subnet has no free addresses left.
    #[error("subnet exhausted: {subnet}")]
    SubnetExhausted {
        /// CIDR text of the exhausted subnet.
        subnet: String,
    },

    /// A kernel-configuration step failed.
    ///
    /// Covers syscalls as well as `ip`/`iptables` invocations; `step`
    /// names the operation that failed so callers can surface it.
    #[error("{step} failed: {detail}")]
    Kernel {
        /// Name of the failing step.
        step: &'static str,
        /// Underlying error or captured stderr.
        detail: String,
    },

    /// Serialization or deserialization failed.
    #[error("serialization error: {source}")]
    Serialization {
        /// Underlying serialization error.
        #[from]
        source: serde_json::Error,
    },
}

impl CaskError {
    /// Builds an [`CaskError::Io`] from a path and an I/O error.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Builds a [`CaskError::Kernel`] from a step name and any displayable cause.
    pub fn kernel(step: &'static str, detail: impl std::fmt::Display) -> Self {
        Self::Kernel {
            step,
            detail: detail.to_string(),
        }
    }
}

/// Convenience alias used throughout the workspace.
pub type Result<T> = std::result::Result<T, CaskError>;
