//! # cask-runtime
//!
//! Sandbox lifecycle management. The host-side bootstrapper clones an
//! isolated child and synchronizes with it over a pipe; the namespace-side
//! init re-roots the filesystem and becomes the payload command. Around
//! those two sit the metadata store, the exec passthrough, stop/remove
//! handling, log access, and image commit.

pub mod bootstrap;
pub mod commit;
pub mod exec;
pub mod init;
pub mod lifecycle;
pub mod logs;
pub mod metadata;
