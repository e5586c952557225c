//! `cask commit` — capture a sandbox's rootfs as an image.

use clap::Args;

use cask_common::config::CaskConfig;
use cask_runtime::commit::commit_sandbox;

/// Arguments for the `commit` command.
#[derive(Args, Debug)]
pub struct CommitArgs {
    /// Sandbox name.
    pub name: String,

    /// Name of the image to create.
    pub image: String,
}

/// Executes the `commit` command.
///
/// # Errors
///
/// Returns an error if the sandbox has no workspace or the archive
/// cannot be written.
pub fn execute(config: &CaskConfig, args: &CommitArgs) -> anyhow::Result<()> {
    let archive = commit_sandbox(config, &args.name, &args.image)?;
    println!("{}", archive.display());
    Ok(())
}
