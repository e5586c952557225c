//! `cask init` — hidden namespace-side entry point.

use cask_runtime::init::run_as_sandbox_init;

/// Executes the `init` command. Does not return on success.
///
/// # Errors
///
/// Returns an error if the sandbox handover fails.
pub fn execute() -> anyhow::Result<()> {
    run_as_sandbox_init()?;
    Ok(())
}
