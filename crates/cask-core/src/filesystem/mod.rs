//! Sandbox filesystem management.
//!
//! The pivot-root sequence, runtime pseudo-filesystem mounts, and the
//! overlay workspace that backs each sandbox's private root.

pub mod mount;
pub mod overlayfs;
pub mod pivot_root;
