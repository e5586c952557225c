//! Named virtual networks and their on-disk store.
//!
//! Each network is one JSON file, named after the network, inside a
//! well-known directory. The store loads the whole directory at open so
//! lookups and listings work off an in-memory map; mutations write through
//! to disk under the same advisory-lock discipline as the allocator.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use cask_common::error::{CaskError, Result};
use cask_common::types::IpRange;

use crate::driver::DriverRegistry;
use crate::ipam::IpamStore;
use crate::lock::StateLock;

/// A named virtual network.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Network {
    /// Unique name; also the on-disk filename and the bridge device name.
    pub name: String,
    /// Address range; the address part carries the network's gateway.
    pub ip_range: IpRange,
    /// Driver backing this network.
    pub driver: String,
}

/// The directory-backed collection of all networks.
pub struct NetworkStore {
    dir: PathBuf,
    networks: BTreeMap<String, Network>,
}

impl NetworkStore {
    /// Opens the store, creating the directory when missing and loading
    /// every network file into memory.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created or scanned, or
    /// if a network file fails to parse.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir).map_err(|e| CaskError::io(&dir, e))?;

        let mut networks = BTreeMap::new();
        let entries = std::fs::read_dir(&dir).map_err(|e| CaskError::io(&dir, e))?;
        for entry in entries {
            let entry = entry.map_err(|e| CaskError::io(&dir, e))?;
            let path = entry.path();
            if !path.is_file() || path.extension().is_some_and(|ext| ext == "lock") {
                continue;
            }
            let bytes = std::fs::read(&path).map_err(|e| CaskError::io(&path, e))?;
            let network: Network = serde_json::from_slice(&bytes)?;
            tracing::debug!(network = %network.name, range = %network.ip_range, "network loaded");
            let _ = networks.insert(network.name.clone(), network);
        }

        Ok(Self { dir, networks })
    }

    /// Looks up a network by name.
    ///
    /// # Errors
    ///
    /// Returns a not-found error for unknown names.
    pub fn get(&self, name: &str) -> Result<&Network> {
        self.networks.get(name).ok_or_else(|| CaskError::NotFound {
            kind: "network",
            id: name.to_string(),
        })
    }

    /// Returns all networks in name order.
    #[must_use]
    pub fn list(&self) -> Vec<&Network> {
        self.networks.values().collect()
    }

    /// Creates a network: reserves the subnet's gateway, builds the kernel
    /// state through the named driver, and persists the record.
    ///
    /// # Errors
    ///
    /// Returns an error for a duplicate name, an unknown driver, gateway
    /// reservation failure, driver failure, or persistence failure.
    pub fn create(
        &mut self,
        registry: &DriverRegistry,
        ipam: &IpamStore,
        driver_name: &str,
        subnet: IpRange,
        name: &str,
    ) -> Result<&Network> {
        if self.networks.contains_key(name) {
            return Err(CaskError::Config {
                message: format!("network already exists: {name}"),
            });
        }
        let driver = registry.get(driver_name)?;

        let _lock = self.lock()?;
        let gateway = ipam.reserve_gateway(&subnet)?;
        let network = driver.create(&subnet.with_addr(gateway), name)?;
        self.persist(&network)?;

        tracing::info!(network = name, range = %network.ip_range, driver = driver_name, "network created");
        Ok(self.networks.entry(name.to_string()).or_insert(network))
    }

    /// Deletes a network: releases its gateway, tears down the kernel
    /// state, and removes the persisted file.
    ///
    /// Attachment checking is the caller's job — the store has no view of
    /// sandbox records.
    ///
    /// # Errors
    ///
    /// Returns a not-found error for unknown names, or the first failure
    /// of release, driver teardown, or file removal.
    pub fn delete(&mut self, registry: &DriverRegistry, ipam: &IpamStore, name: &str) -> Result<()> {
        let network = self.get(name)?.clone();
        let driver = registry.get(&network.driver)?;

        let _lock = self.lock()?;
        ipam.release(&network.ip_range, network.ip_range.addr())?;
        driver.delete(&network)?;

        let path = self.dir.join(name);
        if let Err(e) = std::fs::remove_file(&path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                return Err(CaskError::io(&path, e));
            }
        }
        let _ = self.networks.remove(name);

        tracing::info!(network = name, "network deleted");
        Ok(())
    }

    fn persist(&self, network: &Network) -> Result<()> {
        let path = self.dir.join(&network.name);
        let json = serde_json::to_vec(network)?;
        std::fs::write(&path, json).map_err(|e| CaskError::io(&path, e))
    }

    fn lock(&self) -> Result<StateLock> {
        StateLock::acquire(&self.dir.join(".networks.lock"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::driver::NetworkDriver;
    use crate::endpoint::Endpoint;

    /// Driver that records nothing in the kernel, for store tests.
    #[derive(Debug)]
    struct NullDriver;

    impl NetworkDriver for NullDriver {
        fn name(&self) -> &'static str {
            "null"
        }

        fn create(&self, ip_range: &IpRange, name: &str) -> Result<Network> {
            Ok(Network {
                name: name.to_string(),
                ip_range: *ip_range,
                driver: "null".to_string(),
            })
        }

        fn delete(&self, _network: &Network) -> Result<()> {
            Ok(())
        }

        fn connect(&self, _network: &Network, _endpoint: &mut Endpoint) -> Result<()> {
            Ok(())
        }

        fn disconnect(&self, _network: &Network, _endpoint: &Endpoint) -> Result<()> {
            Ok(())
        }
    }

    fn fixture() -> (tempfile::TempDir, DriverRegistry, IpamStore) {
        let tmp = tempfile::tempdir().expect("tempdir");
        let mut registry = DriverRegistry::default();
        registry.register(Box::new(NullDriver));
        let ipam = IpamStore::new(tmp.path().join("subnets.json"));
        (tmp, registry, ipam)
    }

    #[test]
    fn create_normalizes_range_to_the_gateway() {
        let (tmp, registry, ipam) = fixture();
        let mut store = NetworkStore::open(tmp.path().join("networks")).expect("open");

        let subnet: IpRange = "10.0.0.0/24".parse().expect("parse");
        let network = store
            .create(&registry, &ipam, "null", subnet, "testnet")
            .expect("create");

        assert_eq!(network.ip_range.to_string(), "10.0.0.1/24");
        assert_eq!(network.driver, "null");
    }

    #[test]
    fn created_network_round_trips_through_disk() {
        let (tmp, registry, ipam) = fixture();
        let dir = tmp.path().join("networks");
        let subnet: IpRange = "192.168.20.0/24".parse().expect("parse");
        {
            let mut store = NetworkStore::open(&dir).expect("open");
            let _ = store
                .create(&registry, &ipam, "null", subnet, "backnet")
                .expect("create");
        }

        let reopened = NetworkStore::open(&dir).expect("reopen");
        let network = reopened.get("backnet").expect("get");
        assert_eq!(network.name, "backnet");
        assert_eq!(network.ip_range.to_string(), "192.168.20.1/24");
        assert_eq!(network.driver, "null");
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let (tmp, registry, ipam) = fixture();
        let mut store = NetworkStore::open(tmp.path().join("networks")).expect("open");
        let subnet: IpRange = "10.1.0.0/24".parse().expect("parse");

        let _ = store
            .create(&registry, &ipam, "null", subnet, "dup")
            .expect("first create");
        assert!(store.create(&registry, &ipam, "null", subnet, "dup").is_err());
    }

    #[test]
    fn delete_unknown_network_is_not_found() {
        let (tmp, registry, ipam) = fixture();
        let mut store = NetworkStore::open(tmp.path().join("networks")).expect("open");
        let err = store
            .delete(&registry, &ipam, "ghost")
            .expect_err("should fail");
        assert!(matches!(err, CaskError::NotFound { kind: "network", .. }));
    }

    #[test]
    fn delete_releases_gateway_and_removes_file() {
        let (tmp, registry, ipam) = fixture();
        let dir = tmp.path().join("networks");
        let mut store = NetworkStore::open(&dir).expect("open");
        let subnet: IpRange = "10.2.0.0/24".parse().expect("parse");

        let _ = store
            .create(&registry, &ipam, "null", subnet, "gone")
            .expect("create");
        assert!(dir.join("gone").exists());

        store.delete(&registry, &ipam, "gone").expect("delete");
        assert!(!dir.join("gone").exists());
        assert!(store.get("gone").is_err());

        // Gateway slot is free again: a fresh create reserves .1 anew.
        let mut store = NetworkStore::open(&dir).expect("reopen");
        let network = store
            .create(&registry, &ipam, "null", subnet, "again")
            .expect("recreate");
        assert_eq!(network.ip_range.addr(), std::net::Ipv4Addr::new(10, 2, 0, 1));
    }

    #[test]
    fn list_is_ordered_by_name() {
        let (tmp, registry, ipam) = fixture();
        let mut store = NetworkStore::open(tmp.path().join("networks")).expect("open");
        for (name, cidr) in [("zeta", "10.3.0.0/24"), ("alpha", "10.4.0.0/24")] {
            let subnet: IpRange = cidr.parse().expect("parse");
            let _ = store
                .create(&registry, &ipam, "null", subnet, name)
                .expect("create");
        }

        let names: Vec<_> = store.list().iter().map(|n| n.name.as_str()).collect();
        assert_eq!(names, vec!["alpha", "zeta"]);
    }

    #[test]
    fn lock_files_are_skipped_when_scanning() {
        let (tmp, registry, ipam) = fixture();
        let dir = tmp.path().join("networks");
        let mut store = NetworkStore::open(&dir).expect("open");
        let subnet: IpRange = "10.5.0.0/24".parse().expect("parse");
        let _ = store
            .create(&registry, &ipam, "null", subnet, "only")
            .expect("create");

        // The store's own lock file must not be parsed as a network.
        let reopened = NetworkStore::open(&dir).expect("reopen");
        assert_eq!(reopened.list().len(), 1);
    }
}
