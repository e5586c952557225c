//! Thin wrapper around external `ip`/`iptables` invocations.

use std::process::Command;

use cask_common::error::{CaskError, Result};

/// Runs an external command, treating a non-zero exit as a failed step.
///
/// `step` names the kernel-configuration step for error wrapping; the
/// captured stderr becomes the error detail.
pub(crate) fn run<S: AsRef<str>>(step: &'static str, program: &str, args: &[S]) -> Result<()> {
    let args: Vec<&str> = args.iter().map(AsRef::as_ref).collect();
    tracing::debug!(step, program, ?args, "running");

    let output = Command::new(program)
        .args(&args)
        .output()
        .map_err(|e| CaskError::kernel(step, format!("spawning {program}: {e}")))?;

    if output.status.success() {
        return Ok(());
    }
    let stderr = String::from_utf8_lossy(&output.stderr);
    Err(CaskError::kernel(
        step,
        format!("{program} {}: {}", args.join(" "), stderr.trim()),
    ))
}

/// Runs an external command, logging instead of failing on error.
///
/// Used for inverse/cleanup steps where the forward state may already be
/// gone (e.g. a veth pair that died with its namespace).
pub(crate) fn run_best_effort<S: AsRef<str>>(step: &'static str, program: &str, args: &[S]) {
    if let Err(e) = run(step, program, args) {
        tracing::warn!(step, error = %e, "cleanup step failed");
    }
}
