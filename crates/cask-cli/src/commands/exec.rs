//! `cask exec` — run a command inside a running sandbox.

use clap::Args;

use cask_common::config::CaskConfig;
use cask_runtime::exec::exec_into_sandbox;
use cask_runtime::metadata::MetadataStore;

/// Arguments for the `exec` command.
#[derive(Args, Debug)]
pub struct ExecArgs {
    /// Sandbox name.
    pub name: String,

    /// Command and its arguments.
    #[arg(trailing_var_arg = true, required = true)]
    pub command: Vec<String>,
}

/// Executes the `exec` command, exiting with the inner command's code.
///
/// # Errors
///
/// Returns an error if the sandbox lookup or re-invocation fails.
pub fn execute(config: &CaskConfig, args: &ExecArgs) -> anyhow::Result<()> {
    let store = MetadataStore::new(config.clone());
    let code = exec_into_sandbox(&store, &args.name, &args.command)?;
    if code != 0 {
        std::process::exit(code);
    }
    Ok(())
}
