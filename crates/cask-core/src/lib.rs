//! # cask-core
//!
//! Kernel-facing primitives for sandbox isolation: namespace selection and
//! joining, the pivot-root sequence, mount helpers, and the overlay
//! filesystem workspace provider.
//!
//! Everything here talks to the Linux kernel directly; policy (which
//! sandbox gets which workspace, when namespaces are entered) lives in
//! `cask-runtime`.

pub mod filesystem;
pub mod namespace;
