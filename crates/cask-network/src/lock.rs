//! Advisory file locking for shared on-disk state.
//!
//! Every IPAM and network-store read-modify-write cycle runs as its own
//! short-lived process, so mutual exclusion has to live in the filesystem:
//! an exclusive `flock(2)` on a lock file next to the guarded state. The
//! OS releases the lock when the [`StateLock`] is dropped or the process
//! exits.

use std::fs::File;
use std::path::Path;

use nix::fcntl::{Flock, FlockArg};

use cask_common::error::{CaskError, Result};

/// An exclusive advisory lock held for the duration of one state update.
#[derive(Debug)]
pub(crate) struct StateLock {
    _flock: Flock<File>,
}

impl StateLock {
    /// Blocks until the exclusive lock on `path` is acquired.
    pub(crate) fn acquire(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| CaskError::io(parent, e))?;
        }
        let file = File::options()
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)
            .map_err(|e| CaskError::io(path, e))?;
        let flock = Flock::lock(file, FlockArg::LockExclusive)
            .map_err(|(_, errno)| CaskError::kernel("lock state file", errno))?;
        tracing::trace!(path = %path.display(), "state lock acquired");
        Ok(Self { _flock: flock })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn acquire_creates_lock_file_and_parent_dirs() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let path = tmp.path().join("nested/state.lock");
        let lock = StateLock::acquire(&path).expect("should lock");
        assert!(path.exists());
        drop(lock);
    }

    #[test]
    fn lock_can_be_reacquired_after_drop() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let path = tmp.path().join("state.lock");
        drop(StateLock::acquire(&path).expect("first"));
        drop(StateLock::acquire(&path).expect("second"));
    }
}
