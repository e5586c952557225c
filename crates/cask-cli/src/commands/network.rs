//! `cask network` — manage virtual networks.

use anyhow::bail;
use clap::{Args, Subcommand};

use cask_common::config::CaskConfig;
use cask_common::constants::BRIDGE_DRIVER;
use cask_common::types::IpRange;
use cask_network::driver::DriverRegistry;
use cask_network::ipam::IpamStore;
use cask_network::store::NetworkStore;
use cask_runtime::lifecycle::network_in_use;
use cask_runtime::metadata::MetadataStore;

/// Arguments for the `network` command group.
#[derive(Args, Debug)]
pub struct NetworkArgs {
    /// Network operation to perform.
    #[command(subcommand)]
    pub command: NetworkCommand,
}

/// Network subcommands.
#[derive(Subcommand, Debug)]
pub enum NetworkCommand {
    /// Create a network over a subnet.
    Create {
        /// Subnet in CIDR form, e.g. 192.168.10.0/24.
        #[arg(long)]
        subnet: IpRange,

        /// Network driver.
        #[arg(long, default_value = BRIDGE_DRIVER)]
        driver: String,

        /// Network name; also the bridge device name.
        name: String,
    },
    /// List networks.
    List,
    /// Delete a network with no attached sandboxes.
    Rm {
        /// Network name.
        name: String,
    },
}

/// Executes a `network` subcommand.
///
/// # Errors
///
/// Returns an error if the operation fails or, for `rm`, while any
/// non-stopped sandbox is still attached.
pub fn execute(config: &CaskConfig, args: NetworkArgs) -> anyhow::Result<()> {
    let mut networks = NetworkStore::open(config.networks_dir())?;
    let ipam = IpamStore::new(config.ipam_file());
    let registry = DriverRegistry::default();

    match args.command {
        NetworkCommand::Create {
            subnet,
            driver,
            name,
        } => {
            let network = networks.create(&registry, &ipam, &driver, subnet, &name)?;
            println!("{} {}", network.name, network.ip_range);
        }
        NetworkCommand::List => {
            let all = networks.list();
            if all.is_empty() {
                println!("No networks found.");
                return Ok(());
            }
            println!("{:<15} {:<20} {:<10}", "NAME", "RANGE", "DRIVER");
            for network in all {
                println!(
                    "{:<15} {:<20} {:<10}",
                    network.name, network.ip_range, network.driver
                );
            }
        }
        NetworkCommand::Rm { name } => {
            ensure_unattached(config, &name)?;
            networks.delete(&registry, &ipam, &name)?;
            println!("{name}");
        }
    }
    Ok(())
}

/// A network cannot go away under a sandbox that still holds an address
/// on it.
fn ensure_unattached(config: &CaskConfig, network: &str) -> anyhow::Result<()> {
    let store = MetadataStore::new(config.clone());
    if let Some(holder) = network_in_use(&store, network)? {
        bail!("network {network} is in use by sandbox {holder}; stop it first");
    }
    Ok(())
}
