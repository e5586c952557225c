//! `cask stop` — stop a running sandbox.

use clap::Args;

use cask_common::config::CaskConfig;
use cask_runtime::lifecycle::stop_sandbox;
use cask_runtime::metadata::MetadataStore;

/// Arguments for the `stop` command.
#[derive(Args, Debug)]
pub struct StopArgs {
    /// Sandbox name.
    pub name: String,
}

/// Executes the `stop` command.
///
/// # Errors
///
/// Returns an error if the sandbox is unknown or not running.
pub fn execute(config: &CaskConfig, args: &StopArgs) -> anyhow::Result<()> {
    let store = MetadataStore::new(config.clone());
    stop_sandbox(config, &store, &args.name)?;
    println!("{}", args.name);
    Ok(())
}
