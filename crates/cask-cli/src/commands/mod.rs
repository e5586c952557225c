//! CLI command definitions and dispatch.

pub mod commit;
pub mod exec;
pub mod init;
pub mod logs;
pub mod network;
pub mod ps;
pub mod rm;
pub mod run;
pub mod stop;

use clap::{Parser, Subcommand};

use cask_common::config::CaskConfig;

/// cask — minimal daemon-less sandbox runtime.
#[derive(Parser, Debug)]
#[command(name = "cask", version, about, long_about = None)]
pub struct Cli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Command,
}

/// Available CLI subcommands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Start a sandbox from an image.
    Run(run::RunArgs),
    /// Internal re-invocation target; becomes pid 1 inside a sandbox.
    #[command(hide = true)]
    Init,
    /// Execute a command inside a running sandbox.
    Exec(exec::ExecArgs),
    /// List sandboxes.
    Ps(ps::PsArgs),
    /// View a sandbox's log output.
    Logs(logs::LogsArgs),
    /// Stop a running sandbox.
    Stop(stop::StopArgs),
    /// Remove a stopped sandbox.
    Rm(rm::RmArgs),
    /// Capture a sandbox's rootfs as a new image.
    Commit(commit::CommitArgs),
    /// Manage virtual networks.
    Network(network::NetworkArgs),
}

/// Dispatches the parsed CLI command to its handler.
///
/// # Errors
///
/// Returns an error if the command execution fails.
pub fn execute(cli: Cli) -> anyhow::Result<()> {
    let config = CaskConfig::default();
    match cli.command {
        Command::Run(args) => run::execute(&config, args),
        Command::Init => init::execute(),
        Command::Exec(args) => exec::execute(&config, &args),
        Command::Ps(args) => ps::execute(&config, &args),
        Command::Logs(args) => logs::execute(&config, &args),
        Command::Stop(args) => stop::execute(&config, &args),
        Command::Rm(args) => rm::execute(&config, &args),
        Command::Commit(args) => commit::execute(&config, &args),
        Command::Network(args) => network::execute(&config, args),
    }
}
