//! `cask ps` — list sandboxes.

use clap::Args;

use cask_common::config::CaskConfig;
use cask_common::types::SandboxStatus;
use cask_runtime::lifecycle::list_sandboxes;
use cask_runtime::metadata::MetadataStore;

use crate::output::{format_age, short_id};

/// Arguments for the `ps` command.
#[derive(Args, Debug)]
pub struct PsArgs {
    /// Show all sandboxes, not only running ones.
    #[arg(short, long)]
    pub all: bool,
}

/// Executes the `ps` command.
///
/// # Errors
///
/// Returns an error if the records cannot be listed.
pub fn execute(config: &CaskConfig, args: &PsArgs) -> anyhow::Result<()> {
    let store = MetadataStore::new(config.clone());
    let records = list_sandboxes(&store)?;

    let filtered: Vec<_> = if args.all {
        records
    } else {
        records
            .into_iter()
            .filter(|r| r.status == SandboxStatus::Running)
            .collect()
    };

    if filtered.is_empty() {
        println!("No sandboxes found.");
        return Ok(());
    }

    println!(
        "{:<14} {:<15} {:<8} {:<9} {:<16} {:<12} {:<20}",
        "SANDBOX ID", "NAME", "PID", "STATUS", "IP", "CREATED", "COMMAND"
    );
    for r in &filtered {
        println!(
            "{:<14} {:<15} {:<8} {:<9} {:<16} {:<12} {:<20}",
            short_id(r.id.as_str()),
            r.name,
            r.pid.map_or_else(|| "-".to_string(), |p| p.to_string()),
            r.status.to_string(),
            r.ip.map_or_else(|| "-".to_string(), |ip| ip.to_string()),
            format_age(&r.created_at),
            r.command.join(" "),
        );
    }
    Ok(())
}
