//! `cask run` — start a sandbox from an image.

use clap::Args;

use cask_common::config::CaskConfig;
use cask_common::types::SandboxId;
use cask_runtime::bootstrap::{StartOptions, start_sandbox};

/// Arguments for the `run` command.
#[derive(Args, Debug)]
pub struct RunArgs {
    /// Image to build the rootfs from.
    #[arg(long)]
    pub image: String,

    /// Sandbox name (a short id is generated when omitted).
    #[arg(long)]
    pub name: Option<String>,

    /// Return immediately; output goes to the sandbox log.
    /// Without this flag stdio stays attached until the payload exits.
    #[arg(short, long)]
    pub detach: bool,

    /// Bind-mount a host directory, as host:sandbox.
    #[arg(short, long)]
    pub volume: Option<String>,

    /// Extra environment entry, as KEY=VALUE. Repeatable.
    #[arg(short, long = "env")]
    pub env: Vec<String>,

    /// Network to attach the sandbox to.
    #[arg(long = "net")]
    pub network: Option<String>,

    /// Forward a host TCP port, as host:sandbox. Repeatable.
    #[arg(short = 'p', long = "publish")]
    pub port_mappings: Vec<String>,

    /// Payload command and its arguments.
    #[arg(trailing_var_arg = true, required = true)]
    pub command: Vec<String>,
}

/// Executes the `run` command.
///
/// # Errors
///
/// Returns an error if the bootstrap fails.
pub fn execute(config: &CaskConfig, args: RunArgs) -> anyhow::Result<()> {
    let name = args
        .name
        .unwrap_or_else(|| SandboxId::generate().as_str().chars().take(8).collect());

    let options = StartOptions {
        name: name.clone(),
        image: args.image,
        command: args.command,
        interactive: !args.detach,
        volume: args.volume,
        env: args.env,
        network: args.network,
        port_mappings: args.port_mappings,
    };
    start_sandbox(config, &options)?;

    if args.detach {
        println!("{name}");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::*;

    #[derive(Parser)]
    struct Harness {
        #[command(flatten)]
        args: RunArgs,
    }

    #[test]
    fn stdio_stays_attached_by_default() {
        let parsed = Harness::try_parse_from(["run", "--image", "alpine", "sh"]).expect("parse");
        assert!(!parsed.args.detach);
    }

    #[test]
    fn detach_flag_switches_the_mode() {
        let parsed =
            Harness::try_parse_from(["run", "--image", "alpine", "-d", "sh"]).expect("parse");
        assert!(parsed.args.detach);
    }
}
