//! `cask logs` — print a sandbox's log output.

use clap::Args;

use cask_common::config::CaskConfig;
use cask_runtime::logs::read_logs;
use cask_runtime::metadata::MetadataStore;

/// Arguments for the `logs` command.
#[derive(Args, Debug)]
pub struct LogsArgs {
    /// Sandbox name.
    pub name: String,
}

/// Executes the `logs` command.
///
/// # Errors
///
/// Returns an error if the sandbox is unknown or its log unreadable.
pub fn execute(config: &CaskConfig, args: &LogsArgs) -> anyhow::Result<()> {
    let store = MetadataStore::new(config.clone());
    print!("{}", read_logs(&store, &args.name)?);
    Ok(())
}
