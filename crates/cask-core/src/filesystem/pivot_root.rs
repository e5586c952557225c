//! Re-rooting a sandbox via `pivot_root(2)`.
//!
//! More secure than `chroot` because the old root is actually detached
//! from the process's mount table rather than merely hidden.

use std::path::Path;

use nix::mount::{MntFlags, MsFlags, mount, umount2};
use nix::unistd;

use cask_common::error::{CaskError, Result};

/// Transient directory the old root is parked under during the switch.
const PUT_OLD: &str = ".pivot_old";

/// Replaces the calling process's root filesystem with `new_root`.
///
/// Sequence: detach the mount tree from host propagation (recursively
/// private), bind-mount `new_root` onto itself so it becomes a mount point
/// distinct from its parent (a `pivot_root` requirement), park the old root
/// under a transient directory, switch, then lazily unmount and remove the
/// parked root. On return, `/` is `new_root` and the working directory is `/`.
///
/// # Errors
///
/// Returns an error if any mount, `pivot_root(2)`, or cleanup step fails.
pub fn pivot_to(new_root: &Path) -> Result<()> {
    mount(
        None::<&str>,
        "/",
        None::<&str>,
        MsFlags::MS_PRIVATE | MsFlags::MS_REC,
        None::<&str>,
    )
    .map_err(|e| CaskError::kernel("make mount tree private", e))?;

    mount(
        Some(new_root),
        new_root,
        None::<&str>,
        MsFlags::MS_BIND | MsFlags::MS_REC,
        None::<&str>,
    )
    .map_err(|e| CaskError::kernel("bind rootfs onto itself", e))?;

    let put_old = new_root.join(PUT_OLD);
    std::fs::create_dir_all(&put_old).map_err(|e| CaskError::io(&put_old, e))?;

    unistd::pivot_root(new_root, &put_old).map_err(|e| CaskError::kernel("pivot_root", e))?;
    unistd::chdir("/").map_err(|e| CaskError::kernel("chdir to new root", e))?;

    let old_root = Path::new("/").join(PUT_OLD);
    umount2(&old_root, MntFlags::MNT_DETACH)
        .map_err(|e| CaskError::kernel("detach old root", e))?;
    std::fs::remove_dir_all(&old_root).map_err(|e| CaskError::io(&old_root, e))?;

    tracing::debug!(new_root = %new_root.display(), "root filesystem switched");
    Ok(())
}
