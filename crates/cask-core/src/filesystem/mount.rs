//! Mount utilities for sandbox filesystem setup.
//!
//! Mounts the pseudo-filesystems an untrusted root expects (`/proc`,
//! `/dev`) and handles bind mounts for volumes.

use std::path::Path;

use nix::mount::{MntFlags, MsFlags, mount, umount2};

use cask_common::error::{CaskError, Result};

/// Mounts `/proc` and a private `/dev` tmpfs inside the sandbox root.
///
/// Both carry flags appropriate to an untrusted root: `/proc` is
/// nosuid/noexec/nodev, `/dev` is a size-capped nosuid tmpfs.
/// Must run after [`crate::filesystem::pivot_root::pivot_to`].
///
/// # Errors
///
/// Returns an error if either mount syscall fails.
pub fn mount_runtime_filesystems() -> Result<()> {
    std::fs::create_dir_all("/proc").map_err(|e| CaskError::io("/proc", e))?;
    mount(
        Some("proc"),
        "/proc",
        Some("proc"),
        MsFlags::MS_NOEXEC | MsFlags::MS_NOSUID | MsFlags::MS_NODEV,
        None::<&str>,
    )
    .map_err(|e| CaskError::kernel("mount /proc", e))?;

    std::fs::create_dir_all("/dev").map_err(|e| CaskError::io("/dev", e))?;
    mount(
        Some("tmpfs"),
        "/dev",
        Some("tmpfs"),
        MsFlags::MS_NOSUID | MsFlags::MS_STRICTATIME,
        Some("mode=755,size=65536k"),
    )
    .map_err(|e| CaskError::kernel("mount /dev", e))?;

    Ok(())
}

/// Creates a bind mount from `source` to `target`.
///
/// Both directories are created when missing.
///
/// # Errors
///
/// Returns an error if directory creation or the `mount(2)` syscall fails.
pub fn bind_mount(source: &Path, target: &Path) -> Result<()> {
    std::fs::create_dir_all(source).map_err(|e| CaskError::io(source, e))?;
    std::fs::create_dir_all(target).map_err(|e| CaskError::io(target, e))?;
    mount(
        Some(source),
        target,
        None::<&str>,
        MsFlags::MS_BIND,
        None::<&str>,
    )
    .map_err(|e| CaskError::kernel("bind mount", e))?;
    tracing::debug!(source = %source.display(), target = %target.display(), "bind mounted");
    Ok(())
}

/// Lazily unmounts the filesystem at `target`.
///
/// # Errors
///
/// Returns an error if the `umount2(2)` syscall fails.
pub fn unmount_detached(target: &Path) -> Result<()> {
    umount2(target, MntFlags::MNT_DETACH).map_err(|e| CaskError::kernel("unmount", e))?;
    tracing::debug!(target = %target.display(), "unmounted");
    Ok(())
}
