//! The bridge network driver.
//!
//! Backs each network with a kernel bridge device named after the network,
//! carrying the gateway address, with a masquerade rule so sandbox traffic
//! from the subnet reaches the outside world. Sandboxes attach through
//! veth pairs whose host side is enslaved to the bridge.
//!
//! Network creation is a sequence of independent kernel calls; to avoid
//! stranding partial state, every applied step arms an inverse in an undo
//! log that runs (newest first, best effort) when a later step fails.

use std::path::Path;

use cask_common::constants::BRIDGE_DRIVER;
use cask_common::error::Result;
use cask_common::types::IpRange;

use crate::endpoint::Endpoint;
use crate::shell;
use crate::store::Network;

use super::NetworkDriver;

/// Ordered log of inverse steps for a partially-applied configuration.
#[derive(Default)]
struct UndoLog {
    inverses: Vec<(&'static str, Box<dyn FnOnce()>)>,
}

impl UndoLog {
    fn arm(&mut self, step: &'static str, inverse: impl FnOnce() + 'static) {
        self.inverses.push((step, Box::new(inverse)));
    }

    /// Runs the armed inverses, newest first.
    fn rollback(mut self) {
        while let Some((step, inverse)) = self.inverses.pop() {
            tracing::warn!(step, "rolling back");
            inverse();
        }
    }
}

/// Driver variant backing networks with a kernel bridge device.
#[derive(Debug)]
pub struct BridgeDriver;

impl NetworkDriver for BridgeDriver {
    fn name(&self) -> &'static str {
        BRIDGE_DRIVER
    }

    fn create(&self, ip_range: &IpRange, name: &str) -> Result<Network> {
        let mut undo = UndoLog::default();
        match create_bridge(ip_range, name, &mut undo) {
            Ok(()) => Ok(Network {
                name: name.to_string(),
                ip_range: *ip_range,
                driver: BRIDGE_DRIVER.to_string(),
            }),
            Err(e) => {
                undo.rollback();
                Err(e)
            }
        }
    }

    fn delete(&self, network: &Network) -> Result<()> {
        // The masquerade rule references the device by name; drop it first
        // so the iptables args still match, but never let a missing rule
        // block device removal.
        shell::run_best_effort(
            "remove masquerade rule",
            "iptables",
            &masquerade_args("-D", &network.ip_range, &network.name),
        );
        shell::run(
            "delete bridge device",
            "ip",
            &["link", "del", &network.name],
        )?;
        tracing::info!(network = %network.name, "bridge deleted");
        Ok(())
    }

    fn connect(&self, network: &Network, endpoint: &mut Endpoint) -> Result<()> {
        shell::run(
            "create veth pair",
            "ip",
            &[
                "link", "add", &endpoint.host_ifname, "type", "veth", "peer", "name",
                &endpoint.peer_ifname,
            ],
        )?;

        let attach_and_up = || -> Result<()> {
            shell::run(
                "attach veth to bridge",
                "ip",
                &["link", "set", &endpoint.host_ifname, "master", &network.name],
            )?;
            shell::run(
                "activate veth device",
                "ip",
                &["link", "set", &endpoint.host_ifname, "up"],
            )
        };
        if let Err(e) = attach_and_up() {
            shell::run_best_effort(
                "delete veth pair",
                "ip",
                &["link", "del", &endpoint.host_ifname],
            );
            return Err(e);
        }

        endpoint.mac = read_hardware_address(&endpoint.host_ifname);
        tracing::info!(
            endpoint = %endpoint.id,
            host_if = %endpoint.host_ifname,
            "endpoint connected to bridge"
        );
        Ok(())
    }

    fn disconnect(&self, _network: &Network, endpoint: &Endpoint) -> Result<()> {
        // Deleting the host side tears down the whole pair.
        shell::run(
            "delete veth device",
            "ip",
            &["link", "del", &endpoint.host_ifname],
        )?;
        tracing::info!(endpoint = %endpoint.id, "endpoint disconnected");
        Ok(())
    }
}

fn create_bridge(ip_range: &IpRange, name: &str, undo: &mut UndoLog) -> Result<()> {
    if !device_exists(name) {
        shell::run(
            "create bridge device",
            "ip",
            &["link", "add", name, "type", "bridge"],
        )?;
        let bridge = name.to_string();
        undo.arm("create bridge device", move || {
            shell::run_best_effort("delete bridge device", "ip", &["link", "del", &bridge]);
        });
    }

    let gateway = format!("{}/{}", ip_range.addr(), ip_range.prefix_len());
    shell::run(
        "assign gateway address",
        "ip",
        &["addr", "add", &gateway, "dev", name],
    )?;
    {
        let (gateway, bridge) = (gateway.clone(), name.to_string());
        undo.arm("assign gateway address", move || {
            shell::run_best_effort(
                "remove gateway address",
                "ip",
                &["addr", "del", &gateway, "dev", &bridge],
            );
        });
    }

    shell::run("activate bridge device", "ip", &["link", "set", name, "up"])?;
    {
        let bridge = name.to_string();
        undo.arm("activate bridge device", move || {
            shell::run_best_effort(
                "deactivate bridge device",
                "ip",
                &["link", "set", &bridge, "down"],
            );
        });
    }

    shell::run(
        "install masquerade rule",
        "iptables",
        &masquerade_args("-A", ip_range, name),
    )?;

    tracing::info!(network = name, gateway = %gateway, "bridge created");
    Ok(())
}

/// Arguments of the subnet masquerade rule, shared by install and remove.
fn masquerade_args(op: &'static str, ip_range: &IpRange, device: &str) -> [String; 11] {
    [
        "-t".into(),
        "nat".into(),
        op.into(),
        "POSTROUTING".into(),
        "-s".into(),
        ip_range.network_key(),
        "!".into(),
        "-o".into(),
        device.into(),
        "-j".into(),
        "MASQUERADE".into(),
    ]
}

fn device_exists(name: &str) -> bool {
    Path::new("/sys/class/net").join(name).exists()
}

fn read_hardware_address(ifname: &str) -> Option<String> {
    let path = Path::new("/sys/class/net").join(ifname).join("address");
    std::fs::read_to_string(path)
        .ok()
        .map(|s| s.trim().to_string())
}
