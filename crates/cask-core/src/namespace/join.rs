//! Joining the namespaces of a running sandbox.
//!
//! Used by the exec-attach path: the re-invoked runtime process calls
//! [`join_sandbox_namespaces`] before running the requested command, so the
//! command observes the target sandbox's mounts, hostname, and network.

use std::fs::File;

use nix::sched::{CloneFlags, setns};

use cask_common::error::{CaskError, Result};

/// Namespace kinds joined for an exec attach, in entry order.
///
/// `mnt` goes last: once the mount namespace is switched, `/proc/<pid>`
/// paths from the host view are no longer reachable.
const JOIN_ORDER: [&str; 5] = ["ipc", "uts", "net", "pid", "mnt"];

/// Moves the calling thread into every namespace of the target process.
///
/// Joining the PID namespace only affects children spawned afterwards, so
/// callers must fork (or spawn) the payload command after this returns.
///
/// # Errors
///
/// Returns an error if a namespace handle cannot be opened or `setns(2)`
/// rejects it (typically for lack of `CAP_SYS_ADMIN`).
pub fn join_sandbox_namespaces(pid: u32) -> Result<()> {
    // Open every handle before the first switch; after joining mnt the
    // host's /proc entries for the target are gone.
    let mut handles = Vec::with_capacity(JOIN_ORDER.len());
    for kind in JOIN_ORDER {
        let path = format!("/proc/{pid}/ns/{kind}");
        let file = File::open(&path).map_err(|e| CaskError::io(&path, e))?;
        handles.push((kind, file));
    }

    for (kind, file) in &handles {
        setns(file, CloneFlags::empty())
            .map_err(|e| CaskError::kernel("join namespace", format!("{kind}: {e}")))?;
        tracing::debug!(pid, namespace = kind, "joined namespace");
    }
    Ok(())
}
