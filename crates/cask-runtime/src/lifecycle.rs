//! Stopping and removing sandboxes.

use std::path::Path;

use nix::sys::signal::{Signal, kill};
use nix::unistd::Pid;

use cask_common::config::CaskConfig;
use cask_common::error::{CaskError, Result};
use cask_common::types::SandboxStatus;
use cask_core::filesystem::overlayfs::teardown_workspace;
use cask_network::attach::detach_sandbox;
use cask_network::driver::DriverRegistry;
use cask_network::ipam::IpamStore;
use cask_network::store::NetworkStore;

use crate::metadata::{MetadataStore, SandboxRecord};

/// Stops a running sandbox: SIGTERM to the recorded pid, then network
/// detach, then the record flips to `Stopped` with the pid cleared.
///
/// # Errors
///
/// Fails cleanly when the sandbox is not running (a second stop hits
/// this, the pid field being already cleared). A signal failure leaves
/// the record untouched.
pub fn stop_sandbox(config: &CaskConfig, store: &MetadataStore, name: &str) -> Result<()> {
    let mut record = store.load(name)?;
    let pid = record.pid.ok_or_else(|| CaskError::Config {
        message: format!("sandbox is not running: {name}"),
    })?;

    let raw = i32::try_from(pid).map_err(|_| CaskError::Config {
        message: format!("recorded pid out of range: {pid}"),
    })?;
    kill(Pid::from_raw(raw), Signal::SIGTERM).map_err(|e| CaskError::kernel("kill", e))?;

    detach_networking(config, &record);
    record.status = SandboxStatus::Stopped;
    record.pid = None;
    record.ip = None;
    store.save(&record)?;
    tracing::info!(sandbox = name, "sandbox stopped");
    Ok(())
}

/// Removes a stopped sandbox: workspace teardown, then the metadata
/// directory.
///
/// # Errors
///
/// Rejects sandboxes that are not `Stopped`, leaving their metadata
/// untouched.
pub fn remove_sandbox(config: &CaskConfig, store: &MetadataStore, name: &str) -> Result<()> {
    let record = store.load(name)?;
    if record.status != SandboxStatus::Stopped {
        return Err(CaskError::InUse {
            kind: "sandbox",
            id: name.to_string(),
        });
    }

    // Mounts may already be gone if the machine rebooted since the stop.
    if let Err(e) = teardown_workspace(config, name, record.volume.as_deref()) {
        tracing::warn!(sandbox = name, error = %e, "workspace teardown failed");
    }
    store.delete(name)?;
    tracing::info!(sandbox = name, "sandbox removed");
    Ok(())
}

/// All sandbox records, for the process listing.
///
/// There is no daemon watching children, so records of detached
/// sandboxes whose process died on its own are reconciled here: a
/// running record without a live pid flips to `Exited`.
///
/// # Errors
///
/// Returns an error if the records directory cannot be scanned.
pub fn list_sandboxes(store: &MetadataStore) -> Result<Vec<SandboxRecord>> {
    let mut records = store.list_all()?;
    for record in &mut records {
        let vanished = record.status == SandboxStatus::Running
            && record
                .pid
                .is_none_or(|pid| !Path::new(&format!("/proc/{pid}")).exists());
        if vanished {
            record.status = SandboxStatus::Exited;
            if let Err(e) = store.save(record) {
                tracing::warn!(sandbox = %record.name, error = %e, "failed to persist exited state");
            }
        }
    }
    Ok(records)
}

/// Returns the name of a non-stopped sandbox still attached to the
/// network, if any. `network rm` refuses while one exists.
///
/// # Errors
///
/// Returns an error if the records directory cannot be scanned.
pub fn network_in_use(store: &MetadataStore, network: &str) -> Result<Option<String>> {
    let holder = store.list_all()?.into_iter().find(|record| {
        record.network.as_deref() == Some(network) && record.status != SandboxStatus::Stopped
    });
    Ok(holder.map(|record| record.name))
}

/// Releases a record's network attachment, when it has one. Failures are
/// logged rather than propagated so teardown keeps going.
pub(crate) fn detach_networking(config: &CaskConfig, record: &SandboxRecord) {
    let (Some(network), Some(ip)) = (&record.network, record.ip) else {
        return;
    };
    let result = NetworkStore::open(config.networks_dir()).and_then(|networks| {
        let ipam = IpamStore::new(config.ipam_file());
        let registry = DriverRegistry::default();
        detach_sandbox(
            &networks,
            &ipam,
            &registry,
            network,
            record.id.as_str(),
            ip,
            &record.port_mappings,
        )
    });
    if let Err(e) = result {
        tracing::warn!(sandbox = %record.name, network = %network, error = %e, "network detach failed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixture() -> (tempfile::TempDir, CaskConfig, MetadataStore) {
        let tmp = tempfile::tempdir().expect("tempdir");
        let config = CaskConfig {
            runtime_dir: tmp.path().join("run"),
            data_dir: tmp.path().join("lib"),
        };
        let store = MetadataStore::new(config.clone());
        (tmp, config, store)
    }

    #[test]
    fn stopping_a_stopped_sandbox_fails_cleanly() {
        let (_tmp, config, store) = fixture();
        let mut record = SandboxRecord::new("web", 1, vec!["sh".to_string()]);
        record.pid = None;
        record.status = SandboxStatus::Stopped;
        store.save(&record).expect("save");

        assert!(stop_sandbox(&config, &store, "web").is_err());
    }

    #[test]
    fn signal_failure_leaves_the_record_untouched() {
        let (_tmp, config, store) = fixture();
        // A pid far past the kernel's pid ceiling, so the signal fails.
        let record = SandboxRecord::new("web", 999_999_999, vec!["sh".to_string()]);
        store.save(&record).expect("save");

        assert!(stop_sandbox(&config, &store, "web").is_err());
        let reloaded = store.load("web").expect("load");
        assert_eq!(reloaded.status, SandboxStatus::Running);
        assert_eq!(reloaded.pid, Some(999_999_999));
    }

    #[test]
    fn removing_a_running_sandbox_is_rejected() {
        let (_tmp, config, store) = fixture();
        let record = SandboxRecord::new("web", 1, vec!["sh".to_string()]);
        store.save(&record).expect("save");

        let err = remove_sandbox(&config, &store, "web").expect_err("should fail");
        assert!(matches!(err, CaskError::InUse { kind: "sandbox", .. }));
        assert!(store.load("web").is_ok());
    }

    #[test]
    fn removing_an_unknown_sandbox_is_not_found() {
        let (_tmp, config, store) = fixture();
        let err = remove_sandbox(&config, &store, "ghost").expect_err("should fail");
        assert!(matches!(err, CaskError::NotFound { kind: "sandbox", .. }));
    }

    #[test]
    fn network_in_use_only_counts_non_stopped_holders() {
        let (_tmp, _config, store) = fixture();
        let mut attached = SandboxRecord::new("web", 1, vec!["sh".to_string()]);
        attached.network = Some("backend".to_string());
        store.save(&attached).expect("save");

        let mut stopped = SandboxRecord::new("old", 1, vec!["sh".to_string()]);
        stopped.network = Some("frontend".to_string());
        stopped.status = SandboxStatus::Stopped;
        stopped.pid = None;
        store.save(&stopped).expect("save");

        assert_eq!(
            network_in_use(&store, "backend").expect("check"),
            Some("web".to_string())
        );
        assert_eq!(network_in_use(&store, "frontend").expect("check"), None);
        assert_eq!(network_in_use(&store, "unknown").expect("check"), None);
    }

    #[test]
    fn list_reflects_saved_records() {
        let (_tmp, _config, store) = fixture();
        for name in ["a", "b"] {
            let record = SandboxRecord::new(name, 1, vec!["sh".to_string()]);
            store.save(&record).expect("save");
        }
        assert_eq!(list_sandboxes(&store).expect("list").len(), 2);
    }
}
