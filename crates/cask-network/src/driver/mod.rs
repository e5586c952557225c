//! Network drivers and their per-invocation registry.
//!
//! A driver owns the kernel state backing a network: the device that
//! switches traffic, the NAT rules, and the veth pairs that attach
//! sandboxes. The registry is an explicit object built once per command
//! invocation and passed to whoever needs driver dispatch — there is no
//! process-wide driver table.

pub mod bridge;

use std::collections::BTreeMap;

use cask_common::error::{CaskError, Result};
use cask_common::types::IpRange;

use crate::endpoint::Endpoint;
use crate::store::Network;

/// The capability set every network driver provides.
pub trait NetworkDriver: std::fmt::Debug {
    /// Driver identifier recorded in network files.
    fn name(&self) -> &'static str;

    /// Creates the kernel state for a new network.
    ///
    /// `ip_range` carries the network's gateway address.
    ///
    /// # Errors
    ///
    /// Returns an error if any kernel-configuration step fails.
    fn create(&self, ip_range: &IpRange, name: &str) -> Result<Network>;

    /// Tears down the kernel state of a network.
    ///
    /// # Errors
    ///
    /// Returns an error if device removal fails.
    fn delete(&self, network: &Network) -> Result<()>;

    /// Provisions the host-side attachment for a sandbox endpoint.
    ///
    /// # Errors
    ///
    /// Returns an error if device creation or activation fails.
    fn connect(&self, network: &Network, endpoint: &mut Endpoint) -> Result<()>;

    /// Removes a sandbox endpoint's host-side attachment.
    ///
    /// # Errors
    ///
    /// Returns an error if device removal fails.
    fn disconnect(&self, network: &Network, endpoint: &Endpoint) -> Result<()>;
}

/// Driver dispatch table for one runtime invocation.
pub struct DriverRegistry {
    drivers: BTreeMap<&'static str, Box<dyn NetworkDriver>>,
}

impl Default for DriverRegistry {
    fn default() -> Self {
        let mut registry = Self {
            drivers: BTreeMap::new(),
        };
        registry.register(Box::new(bridge::BridgeDriver));
        registry
    }
}

impl DriverRegistry {
    /// Adds a driver to the registry.
    pub fn register(&mut self, driver: Box<dyn NetworkDriver>) {
        let _ = self.drivers.insert(driver.name(), driver);
    }

    /// Looks up a driver by name.
    ///
    /// # Errors
    ///
    /// Returns a not-found error for unknown driver names.
    pub fn get(&self, name: &str) -> Result<&dyn NetworkDriver> {
        self.drivers
            .get(name)
            .map(AsRef::as_ref)
            .ok_or_else(|| CaskError::NotFound {
                kind: "network driver",
                id: name.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_registry_knows_the_bridge_driver() {
        let registry = DriverRegistry::default();
        let driver = registry
            .get(cask_common::constants::BRIDGE_DRIVER)
            .expect("bridge");
        assert_eq!(driver.name(), "bridge");
    }

    #[test]
    fn unknown_driver_is_not_found() {
        let registry = DriverRegistry::default();
        let err = registry.get("macvlan").expect_err("should fail");
        assert!(matches!(err, CaskError::NotFound { kind: "network driver", .. }));
    }
}
