//! `cask rm` — remove a stopped sandbox.

use clap::Args;

use cask_common::config::CaskConfig;
use cask_runtime::lifecycle::remove_sandbox;
use cask_runtime::metadata::MetadataStore;

/// Arguments for the `rm` command.
#[derive(Args, Debug)]
pub struct RmArgs {
    /// Sandbox name.
    pub name: String,
}

/// Executes the `rm` command.
///
/// # Errors
///
/// Returns an error if the sandbox is unknown or not stopped.
pub fn execute(config: &CaskConfig, args: &RmArgs) -> anyhow::Result<()> {
    let store = MetadataStore::new(config.clone());
    remove_sandbox(config, &store, &args.name)?;
    println!("{}", args.name);
    Ok(())
}
