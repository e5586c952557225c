//! Capturing a sandbox's rootfs as a new image.

use std::fs::File;
use std::path::PathBuf;

use flate2::Compression;
use flate2::write::GzEncoder;

use cask_common::config::CaskConfig;
use cask_common::error::{CaskError, Result};
use cask_core::filesystem::overlayfs::{image_archive, merged_dir};

/// Packs a sandbox's merged rootfs into a gzipped image archive that
/// later `run` invocations can start from. Returns the archive path.
///
/// # Errors
///
/// Returns a not-found error when the sandbox has no workspace, or a
/// write failure.
pub fn commit_sandbox(config: &CaskConfig, sandbox: &str, image: &str) -> Result<PathBuf> {
    let merged = merged_dir(config, sandbox);
    if !merged.is_dir() {
        return Err(CaskError::NotFound {
            kind: "sandbox workspace",
            id: sandbox.to_string(),
        });
    }

    let images = config.images_dir();
    std::fs::create_dir_all(&images).map_err(|e| CaskError::io(&images, e))?;
    let archive = image_archive(config, image);

    let file = File::create(&archive).map_err(|e| CaskError::io(&archive, e))?;
    let encoder = GzEncoder::new(file, Compression::default());
    let mut builder = tar::Builder::new(encoder);
    builder
        .append_dir_all(".", &merged)
        .map_err(|e| CaskError::io(&merged, e))?;
    builder
        .into_inner()
        .and_then(GzEncoder::finish)
        .map_err(|e| CaskError::io(&archive, e))?;

    tracing::info!(sandbox, image, archive = %archive.display(), "rootfs committed");
    Ok(archive)
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::io::Read;

    use flate2::read::GzDecoder;

    #[test]
    fn committing_without_a_workspace_is_not_found() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let config = CaskConfig {
            runtime_dir: tmp.path().join("run"),
            data_dir: tmp.path().join("lib"),
        };
        assert!(commit_sandbox(&config, "ghost", "snap").is_err());
    }

    #[test]
    fn committed_archive_contains_the_rootfs() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let config = CaskConfig {
            runtime_dir: tmp.path().join("run"),
            data_dir: tmp.path().join("lib"),
        };
        let merged = merged_dir(&config, "web");
        std::fs::create_dir_all(merged.join("etc")).expect("mkdir");
        std::fs::write(merged.join("etc/hostname"), "web\n").expect("write");

        let archive = commit_sandbox(&config, "web", "snap").expect("commit");
        assert!(archive.ends_with("snap.tar"));

        let file = File::open(&archive).expect("open");
        let mut tar = tar::Archive::new(GzDecoder::new(file));
        let mut found = false;
        for entry in tar.entries().expect("entries") {
            let mut entry = entry.expect("entry");
            if entry.path().expect("path").ends_with("etc/hostname") {
                let mut content = String::new();
                entry.read_to_string(&mut content).expect("read");
                assert_eq!(content, "web\n");
                found = true;
            }
        }
        assert!(found, "hostname entry missing from archive");
    }
}
