//! Namespace-side sandbox init.
//!
//! Runs as pid 1 of a fresh PID namespace, chdir'ed into the merged
//! rootfs by the bootstrapper. It blocks on the inherited pipe until the
//! host side releases it, re-roots the mount tree, mounts the runtime
//! filesystems, and execs the payload.

use std::ffi::CString;
use std::fs::File;
use std::io::Read;
use std::os::fd::FromRawFd;
use std::os::unix::ffi::OsStrExt;

use nix::unistd::execv;

use cask_common::constants::INIT_PIPE_FD;
use cask_common::error::{CaskError, Result};
use cask_core::filesystem::mount::mount_runtime_filesystems;
use cask_core::filesystem::pivot_root::pivot_to;

/// Becomes the sandbox payload. Only returns on error.
///
/// # Errors
///
/// Returns an error if the pipe read fails, the command is empty or not
/// on the new root's PATH, or re-rooting, mounting, or the final exec
/// fails.
pub fn run_as_sandbox_init() -> Result<()> {
    let raw = read_bootstrap_command()?;
    let argv = split_command(&raw);
    let Some(program) = argv.first() else {
        return Err(CaskError::Config {
            message: "empty bootstrap command".to_string(),
        });
    };

    let rootfs = std::env::current_dir().map_err(|e| CaskError::io("cwd", e))?;
    pivot_to(&rootfs)?;
    mount_runtime_filesystems()?;

    // PATH lookup happens on the new root, after the pivot.
    let resolved = which::which(program).map_err(|e| CaskError::Config {
        message: format!("command not found in sandbox: {program}: {e}"),
    })?;
    tracing::debug!(program = %resolved.display(), "handing over to payload");

    let c_program = CString::new(resolved.as_os_str().as_bytes()).map_err(|_| CaskError::Config {
        message: format!("interior NUL byte in command: {program}"),
    })?;
    let c_argv = argv
        .iter()
        .map(|arg| {
            CString::new(arg.as_str()).map_err(|_| CaskError::Config {
                message: format!("interior NUL byte in argument: {arg}"),
            })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(match execv(&c_program, &c_argv).map_err(|e| CaskError::kernel("execv", e))? {})
}

/// Reads the whole command string from the inherited pipe. Blocks until
/// the host side closes its write end.
#[allow(unsafe_code)]
fn read_bootstrap_command() -> Result<String> {
    // The bootstrapper parked the read end at this descriptor via dup2.
    let mut pipe = unsafe { File::from_raw_fd(INIT_PIPE_FD) };
    let mut raw = String::new();
    let _ = pipe
        .read_to_string(&mut raw)
        .map_err(|e| CaskError::io("bootstrap pipe", e))?;
    Ok(raw)
}

// Splitting on whitespace means multi-word arguments cannot be passed
// through `run`; `exec` shares the limitation.
fn split_command(raw: &str) -> Vec<String> {
    raw.split_whitespace().map(str::to_string).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn commands_split_on_whitespace() {
        assert_eq!(
            split_command("ls -l /tmp"),
            vec!["ls".to_string(), "-l".to_string(), "/tmp".to_string()]
        );
    }

    #[test]
    fn blank_input_yields_no_command() {
        assert!(split_command("").is_empty());
        assert!(split_command("   \n").is_empty());
    }
}
