//! Attaching and detaching sandboxes to virtual networks.
//!
//! An attach ties together the allocator, the driver, and the namespace
//! configuration. Partial failures release what was already taken so a
//! failed attach leaves no address or interface behind.

use std::net::Ipv4Addr;

use cask_common::error::{CaskError, Result};
use cask_common::types::IpRange;

use crate::driver::DriverRegistry;
use crate::endpoint::Endpoint;
use crate::ipam::{Allocation, IpamStore};
use crate::netns;
use crate::portmap;
use crate::store::NetworkStore;

/// Connects a running sandbox to a network.
///
/// Allocates an address, wires the veth pair through the driver, moves
/// and configures the peer inside the sandbox's namespace, and installs
/// any port mappings. Returns the resulting endpoint.
///
/// # Errors
///
/// Returns a not-found error for unknown networks, an exhaustion error
/// when the subnet has no free address, or the first kernel failure.
/// The allocated address is released again on any failure past the
/// allocation.
pub fn attach_sandbox(
    store: &NetworkStore,
    ipam: &IpamStore,
    registry: &DriverRegistry,
    network_name: &str,
    sandbox_id: &str,
    pid: u32,
    port_mappings: &[String],
) -> Result<Endpoint> {
    let network = store.get(network_name)?;
    let driver = registry.get(&network.driver)?;

    let ip = match ipam.allocate(&network.ip_range)? {
        Allocation::Allocated(ip) => ip,
        Allocation::Exhausted => {
            return Err(CaskError::SubnetExhausted {
                subnet: network.ip_range.network_key(),
            });
        }
    };

    let mut endpoint = Endpoint::new(sandbox_id, network_name, ip, port_mappings.to_vec());
    if let Err(e) = driver.connect(network, &mut endpoint) {
        release_after_failure(ipam, &network.ip_range, ip);
        return Err(e);
    }

    if let Err(e) = netns::configure_endpoint(&endpoint, network, pid) {
        // The veth pair exists at this point; tear it down before handing
        // the address back.
        if let Err(disconnect_err) = driver.disconnect(network, &endpoint) {
            tracing::warn!(sandbox = sandbox_id, error = %disconnect_err, "failed to undo endpoint after attach failure");
        }
        release_after_failure(ipam, &network.ip_range, ip);
        return Err(e);
    }

    portmap::install_port_mappings(port_mappings, ip);
    tracing::info!(sandbox = sandbox_id, network = network_name, ip = %ip, "sandbox attached");
    Ok(endpoint)
}

fn release_after_failure(ipam: &IpamStore, range: &IpRange, ip: Ipv4Addr) {
    if let Err(e) = ipam.release(range, ip) {
        tracing::warn!(ip = %ip, error = %e, "failed to release address after attach failure");
    }
}

/// Disconnects a sandbox from a network and returns its address to the
/// pool.
///
/// Kernel teardown is best effort: a vanished interface or rule does not
/// block the release. The address release itself is propagated so a
/// leaked allocation is visible.
///
/// # Errors
///
/// Returns a not-found error for unknown networks, or the release
/// failure.
pub fn detach_sandbox(
    store: &NetworkStore,
    ipam: &IpamStore,
    registry: &DriverRegistry,
    network_name: &str,
    sandbox_id: &str,
    ip: Ipv4Addr,
    port_mappings: &[String],
) -> Result<()> {
    let network = store.get(network_name)?;
    let driver = registry.get(&network.driver)?;

    portmap::remove_port_mappings(port_mappings, ip);

    let endpoint = Endpoint::new(sandbox_id, network_name, ip, port_mappings.to_vec());
    if let Err(e) = driver.disconnect(network, &endpoint) {
        tracing::warn!(sandbox = sandbox_id, network = network_name, error = %e, "endpoint teardown failed");
    }

    ipam.release(&network.ip_range, ip)?;
    tracing::info!(sandbox = sandbox_id, network = network_name, ip = %ip, "sandbox detached");
    Ok(())
}
