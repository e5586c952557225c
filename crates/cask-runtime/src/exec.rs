//! Running a command inside an existing sandbox.
//!
//! The host side re-invokes this binary with the target pid and command
//! in environment variables; the re-invoked process joins the sandbox's
//! namespaces and runs the command as a child so the PID namespace takes
//! effect.

use std::process::Command;

use cask_common::constants::{ENV_EXEC_CMD, ENV_EXEC_PID};
use cask_common::error::{CaskError, Result};
use cask_core::namespace::join::join_sandbox_namespaces;

use crate::metadata::MetadataStore;

/// Host side of `exec`: looks up the sandbox, captures its environment,
/// and re-invokes this binary with the passthrough variables set.
/// Returns the inner command's exit code.
///
/// # Errors
///
/// Returns a not-found error for unknown sandboxes, an error when the
/// sandbox is not running, or a spawn failure.
pub fn exec_into_sandbox(store: &MetadataStore, name: &str, command: &[String]) -> Result<i32> {
    if command.is_empty() {
        return Err(CaskError::Config {
            message: "no command given".to_string(),
        });
    }
    let record = store.load(name)?;
    let pid = record.pid.ok_or_else(|| CaskError::Config {
        message: format!("sandbox is not running: {name}"),
    })?;

    let environ_path = format!("/proc/{pid}/environ");
    let environ = std::fs::read(&environ_path).map_err(|e| CaskError::io(&environ_path, e))?;

    let status = Command::new("/proc/self/exe")
        .arg("exec")
        .env(ENV_EXEC_PID, pid.to_string())
        .env(ENV_EXEC_CMD, command.join(" "))
        .envs(parse_environ(&environ))
        .status()
        .map_err(|e| CaskError::io("/proc/self/exe", e))?;
    Ok(status.code().unwrap_or(1))
}

/// Namespace side of `exec`. Returns `None` when the passthrough
/// variables are absent, meaning this is an ordinary invocation.
///
/// # Errors
///
/// Returns an error for a malformed pid, a failed namespace join, an
/// empty command, or a spawn failure.
pub fn run_exec_passthrough() -> Result<Option<i32>> {
    let Ok(pid_var) = std::env::var(ENV_EXEC_PID) else {
        return Ok(None);
    };
    let command = std::env::var(ENV_EXEC_CMD).unwrap_or_default();

    let pid: u32 = pid_var.parse().map_err(|_| CaskError::Config {
        message: format!("malformed target pid: {pid_var}"),
    })?;
    join_sandbox_namespaces(pid)?;

    let argv: Vec<&str> = command.split_whitespace().collect();
    let Some((program, args)) = argv.split_first() else {
        return Err(CaskError::Config {
            message: "empty exec command".to_string(),
        });
    };

    // A child process rather than an exec, so the joined PID namespace
    // applies to the payload.
    let status = Command::new(program)
        .args(args)
        .status()
        .map_err(|e| CaskError::io(*program, e))?;
    Ok(Some(status.code().unwrap_or(1)))
}

/// Parses a NUL-delimited `/proc/<pid>/environ` image into pairs.
fn parse_environ(raw: &[u8]) -> Vec<(String, String)> {
    raw.split(|b| *b == 0)
        .filter_map(|entry| {
            let entry = String::from_utf8_lossy(entry);
            entry
                .split_once('=')
                .map(|(k, v)| (k.to_string(), v.to_string()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn environ_image_parses_into_pairs() {
        let raw = b"PATH=/bin\0HOME=/root\0\0";
        let pairs = parse_environ(raw);
        assert_eq!(
            pairs,
            vec![
                ("PATH".to_string(), "/bin".to_string()),
                ("HOME".to_string(), "/root".to_string()),
            ]
        );
    }

    #[test]
    fn entries_without_separator_are_dropped() {
        assert!(parse_environ(b"garbage\0").is_empty());
    }

    #[test]
    fn exec_into_stopped_sandbox_fails() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let config = cask_common::config::CaskConfig {
            runtime_dir: tmp.path().join("run"),
            data_dir: tmp.path().join("lib"),
        };
        let store = MetadataStore::new(config);
        let mut record =
            crate::metadata::SandboxRecord::new("web", 1, vec!["sh".to_string()]);
        record.pid = None;
        store.save(&record).expect("save");

        let cmd = vec!["ls".to_string()];
        assert!(exec_into_sandbox(&store, "web", &cmd).is_err());
    }
}
