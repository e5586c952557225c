//! Overlay workspace provider for sandbox root filesystems.
//!
//! Each sandbox gets a private root built from a shared read-only image
//! layer, a per-sandbox writable upper layer, and an `OverlayFS` merged
//! mount point. An optional `host:container` volume is bind-mounted into
//! the merged tree.

use std::io::Read;
use std::path::{Path, PathBuf};

use nix::mount::{MsFlags, mount};

use cask_common::config::CaskConfig;
use cask_common::error::{CaskError, Result};

use crate::filesystem::mount::{bind_mount, unmount_detached};

/// Path of the packed archive for an image name.
#[must_use]
pub fn image_archive(config: &CaskConfig, image: &str) -> PathBuf {
    config.images_dir().join(format!("{image}.tar"))
}

/// Path of the unpacked read-only layer for an image name.
#[must_use]
pub fn image_layer(config: &CaskConfig, image: &str) -> PathBuf {
    config.layers_dir().join(image)
}

/// Path of a sandbox's merged mount point.
#[must_use]
pub fn merged_dir(config: &CaskConfig, sandbox: &str) -> PathBuf {
    config.workspaces_dir().join(sandbox).join("merged")
}

fn upper_dir(config: &CaskConfig, sandbox: &str) -> PathBuf {
    config.workspaces_dir().join(sandbox).join("upper")
}

fn work_dir(config: &CaskConfig, sandbox: &str) -> PathBuf {
    config.workspaces_dir().join(sandbox).join("work")
}

/// Splits a `host:container` volume spec into its two parts.
///
/// # Errors
///
/// Returns an error unless the spec has exactly two non-empty fields.
pub fn parse_volume_spec(spec: &str) -> Result<(PathBuf, PathBuf)> {
    match spec.split(':').collect::<Vec<_>>().as_slice() {
        [host, container] if !host.is_empty() && !container.is_empty() => {
            Ok((PathBuf::from(host), PathBuf::from(container)))
        }
        _ => Err(CaskError::Config {
            message: format!("invalid volume spec (want host:container): {spec}"),
        }),
    }
}

/// Prepares the root filesystem workspace for a sandbox.
///
/// Unpacks the image archive into the shared read-only layer on first use,
/// creates the sandbox's upper/work/merged directories, mounts the overlay,
/// and bind-mounts the optional volume. Returns the merged mount point that
/// becomes the sandbox's root.
///
/// # Errors
///
/// Returns an error if the image archive is missing, unpacking fails, or
/// any mount fails.
pub fn prepare_workspace(
    config: &CaskConfig,
    image: &str,
    sandbox: &str,
    volume: Option<&str>,
) -> Result<PathBuf> {
    ensure_image_unpacked(config, image)?;

    let merged = merged_dir(config, sandbox);
    mount_overlay(
        &image_layer(config, image),
        &upper_dir(config, sandbox),
        &work_dir(config, sandbox),
        &merged,
    )?;

    if let Some(spec) = volume {
        let (host, container) = parse_volume_spec(spec)?;
        let target = merged.join(container.strip_prefix("/").unwrap_or(&container));
        bind_mount(&host, &target)?;
    }

    tracing::info!(sandbox, image, merged = %merged.display(), "workspace prepared");
    Ok(merged)
}

/// Tears down a sandbox's workspace.
///
/// Unmounts the volume (when present) and the overlay, then removes the
/// sandbox's workspace directories. The shared image layer is kept.
///
/// # Errors
///
/// Returns an error if an unmount or directory removal fails.
pub fn teardown_workspace(config: &CaskConfig, sandbox: &str, volume: Option<&str>) -> Result<()> {
    let merged = merged_dir(config, sandbox);

    if let Some(spec) = volume {
        let (_, container) = parse_volume_spec(spec)?;
        let target = merged.join(container.strip_prefix("/").unwrap_or(&container));
        unmount_detached(&target)?;
    }

    unmount_detached(&merged)?;

    let workspace = config.workspaces_dir().join(sandbox);
    std::fs::remove_dir_all(&workspace).map_err(|e| CaskError::io(&workspace, e))?;
    tracing::info!(sandbox, "workspace removed");
    Ok(())
}

/// Unpacks the image archive into the shared layer directory on first use.
///
/// Gzip compression is auto-detected from the archive's magic bytes, so
/// both plain and `commit`-produced compressed archives work.
fn ensure_image_unpacked(config: &CaskConfig, image: &str) -> Result<()> {
    let layer = image_layer(config, image);
    if layer.exists() {
        return Ok(());
    }

    let archive_path = image_archive(config, image);
    let mut file =
        std::fs::File::open(&archive_path).map_err(|e| CaskError::io(&archive_path, e))?;

    std::fs::create_dir_all(&layer).map_err(|e| CaskError::io(&layer, e))?;

    let mut magic = [0u8; 2];
    let gzip = file
        .read_exact(&mut magic)
        .map(|()| magic == [0x1f, 0x8b])
        .unwrap_or(false);
    drop(file);
    let file = std::fs::File::open(&archive_path).map_err(|e| CaskError::io(&archive_path, e))?;

    if gzip {
        let mut archive = tar::Archive::new(flate2::read::GzDecoder::new(file));
        archive
            .unpack(&layer)
            .map_err(|e| CaskError::io(&layer, e))?;
    } else {
        let mut archive = tar::Archive::new(file);
        archive
            .unpack(&layer)
            .map_err(|e| CaskError::io(&layer, e))?;
    }

    tracing::info!(image, layer = %layer.display(), "image layer unpacked");
    Ok(())
}

/// Mounts an overlay of `lower` with the given writable layers at `merged`.
fn mount_overlay(lower: &Path, upper: &Path, work: &Path, merged: &Path) -> Result<()> {
    for dir in [upper, work, merged] {
        std::fs::create_dir_all(dir).map_err(|e| CaskError::io(dir, e))?;
    }

    let opts = format!(
        "lowerdir={},upperdir={},workdir={}",
        lower.display(),
        upper.display(),
        work.display()
    );
    mount(
        Some("overlay"),
        merged,
        Some("overlay"),
        MsFlags::empty(),
        Some(opts.as_str()),
    )
    .map_err(|e| CaskError::kernel("mount overlay", e))?;

    tracing::debug!(merged = %merged.display(), "overlayfs mounted");
    Ok(())
}
