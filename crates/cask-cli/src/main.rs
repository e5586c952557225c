//! # cask — minimal sandbox runtime CLI
//!
//! Daemon-less namespace sandboxes with overlay rootfs and virtual
//! bridge networking. Single binary; every invocation is a short-lived
//! process working off shared on-disk state.

mod commands;
mod output;

use clap::Parser;

use crate::commands::Cli;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    // An exec passthrough re-invocation carries its instructions in the
    // environment and never reaches argument parsing.
    if let Some(code) = cask_runtime::exec::run_exec_passthrough()? {
        std::process::exit(code);
    }

    let cli = Cli::parse();
    commands::execute(cli)
}
