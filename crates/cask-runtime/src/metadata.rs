//! Persistent sandbox metadata.
//!
//! Each sandbox owns a directory under the runtime dir holding its
//! `config.json` record and, in detached mode, its log file. Every command
//! invocation is a fresh process, so the store is the only channel through
//! which invocations see each other.

use std::net::Ipv4Addr;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use cask_common::config::CaskConfig;
use cask_common::constants::{SANDBOX_CONFIG_FILE, SANDBOX_LOG_FILE};
use cask_common::error::{CaskError, Result};
use cask_common::types::{SandboxId, SandboxStatus};

/// Persistent record of one sandbox.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SandboxRecord {
    /// Unique identifier.
    pub id: SandboxId,
    /// PID of the init process while running.
    pub pid: Option<u32>,
    /// User-visible name; also the metadata directory name.
    pub name: String,
    /// Payload command and its arguments.
    pub command: Vec<String>,
    /// Current lifecycle state.
    pub status: SandboxStatus,
    /// ISO-8601 timestamp of creation.
    pub created_at: String,
    /// Optional `host:sandbox` volume spec, kept for teardown.
    pub volume: Option<String>,
    /// `host:sandbox` port mappings, kept for DNAT teardown.
    pub port_mappings: Vec<String>,
    /// Name of the attached network, if any.
    pub network: Option<String>,
    /// Address allocated on the attached network.
    pub ip: Option<Ipv4Addr>,
}

impl SandboxRecord {
    /// Builds a fresh record in the `Running` state stamped with the
    /// current time.
    #[must_use]
    pub fn new(name: &str, pid: u32, command: Vec<String>) -> Self {
        Self {
            id: SandboxId::generate(),
            pid: Some(pid),
            name: name.to_string(),
            command,
            status: SandboxStatus::Running,
            created_at: chrono::Utc::now().to_rfc3339(),
            volume: None,
            port_mappings: Vec::new(),
            network: None,
            ip: None,
        }
    }
}

/// Directory-per-sandbox metadata store.
pub struct MetadataStore {
    config: CaskConfig,
}

impl MetadataStore {
    /// Creates a store over the configured runtime directory.
    #[must_use]
    pub fn new(config: CaskConfig) -> Self {
        Self { config }
    }

    /// Path of a sandbox's detached-mode log file.
    #[must_use]
    pub fn log_path(&self, name: &str) -> PathBuf {
        self.config.sandbox_dir(name).join(SANDBOX_LOG_FILE)
    }

    /// Writes a record, creating the sandbox directory when missing.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory or file cannot be written.
    pub fn save(&self, record: &SandboxRecord) -> Result<()> {
        let dir = self.config.sandbox_dir(&record.name);
        std::fs::create_dir_all(&dir).map_err(|e| CaskError::io(&dir, e))?;
        let path = dir.join(SANDBOX_CONFIG_FILE);
        let json = serde_json::to_vec_pretty(record)?;
        std::fs::write(&path, json).map_err(|e| CaskError::io(&path, e))?;
        tracing::debug!(sandbox = %record.name, status = %record.status, "record saved");
        Ok(())
    }

    /// Loads a record by sandbox name.
    ///
    /// # Errors
    ///
    /// Returns a not-found error when no record exists, or a read/parse
    /// error.
    pub fn load(&self, name: &str) -> Result<SandboxRecord> {
        let path = self.config.sandbox_dir(name).join(SANDBOX_CONFIG_FILE);
        if !path.exists() {
            return Err(CaskError::NotFound {
                kind: "sandbox",
                id: name.to_string(),
            });
        }
        let bytes = std::fs::read(&path).map_err(|e| CaskError::io(&path, e))?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Removes a sandbox's whole metadata directory, logs included.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory exists but cannot be removed.
    pub fn delete(&self, name: &str) -> Result<()> {
        let dir = self.config.sandbox_dir(name);
        if dir.exists() {
            std::fs::remove_dir_all(&dir).map_err(|e| CaskError::io(&dir, e))?;
        }
        Ok(())
    }

    /// Loads every record, in name order. Directories without a parseable
    /// record are skipped with a warning rather than failing the listing.
    ///
    /// # Errors
    ///
    /// Returns an error if the sandboxes directory cannot be scanned.
    pub fn list_all(&self) -> Result<Vec<SandboxRecord>> {
        let dir = self.config.sandboxes_dir();
        if !dir.exists() {
            return Ok(Vec::new());
        }
        let mut records = Vec::new();
        let entries = std::fs::read_dir(&dir).map_err(|e| CaskError::io(&dir, e))?;
        for entry in entries {
            let entry = entry.map_err(|e| CaskError::io(&dir, e))?;
            let name = entry.file_name().to_string_lossy().into_owned();
            match self.load(&name) {
                Ok(record) => records.push(record),
                Err(e) => {
                    tracing::warn!(sandbox = %name, error = %e, "skipping unreadable record");
                }
            }
        }
        records.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(records)
    }
}
