//! A sandbox's attachment point to a network.
//!
//! Endpoints are not persisted on their own: they are derived from the
//! sandbox id, the network name, and the allocated address whenever a
//! connect or disconnect needs one, and live only for that operation.

use std::net::Ipv4Addr;

use cask_common::constants::SANDBOX_IF_PREFIX;

/// One sandbox's attachment to one network.
#[derive(Debug, Clone)]
pub struct Endpoint {
    /// `<sandbox-id>-<network-name>`.
    pub id: String,
    /// Address allocated to the sandbox from the network's subnet.
    pub ip: Ipv4Addr,
    /// Host-side veth interface name (attached to the bridge).
    pub host_ifname: String,
    /// Sandbox-side veth interface name (moved into the sandbox's netns).
    pub peer_ifname: String,
    /// Hardware address of the host-side interface, once created.
    pub mac: Option<String>,
    /// `host:sandbox` port forwarding rules copied from the sandbox.
    pub port_mappings: Vec<String>,
}

impl Endpoint {
    /// Derives an endpoint for a sandbox/network pair.
    ///
    /// Interface names are built from the first five characters of the
    /// endpoint id; the sandbox side carries the well-known prefix.
    #[must_use]
    pub fn new(
        sandbox_id: &str,
        network_name: &str,
        ip: Ipv4Addr,
        port_mappings: Vec<String>,
    ) -> Self {
        let id = format!("{sandbox_id}-{network_name}");
        let suffix: String = id.chars().take(5).collect();
        Self {
            host_ifname: suffix.clone(),
            peer_ifname: format!("{SANDBOX_IF_PREFIX}{suffix}"),
            id,
            ip,
            mac: None,
            port_mappings,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_id_joins_sandbox_and_network() {
        let ep = Endpoint::new("abcde-12345", "testnet", Ipv4Addr::new(10, 0, 0, 2), vec![]);
        assert_eq!(ep.id, "abcde-12345-testnet");
    }

    #[test]
    fn interface_names_derive_from_id_prefix() {
        let ep = Endpoint::new("abcdef", "net", Ipv4Addr::new(10, 0, 0, 2), vec![]);
        assert_eq!(ep.host_ifname, "abcde");
        assert_eq!(ep.peer_ifname, "cif-abcde");
    }

    #[test]
    fn short_ids_still_produce_names() {
        let ep = Endpoint::new("ab", "n", Ipv4Addr::new(10, 0, 0, 2), vec![]);
        assert_eq!(ep.host_ifname, "ab-n");
        assert_eq!(ep.peer_ifname, "cif-ab-n");
    }
}
