//! Integration tests for sandbox state management.
//!
//! The pieces that need namespaces or root are exercised up to their
//! first privileged step; everything else (records, logs, lifecycle
//! rules, image commit) runs for real against tempdir-backed state.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::net::Ipv4Addr;

use cask_common::config::CaskConfig;
use cask_common::error::CaskError;
use cask_common::types::SandboxStatus;
use cask_runtime::commit::commit_sandbox;
use cask_runtime::lifecycle::{list_sandboxes, remove_sandbox, stop_sandbox};
use cask_runtime::logs::read_logs;
use cask_runtime::metadata::{MetadataStore, SandboxRecord};

fn fixture() -> (tempfile::TempDir, CaskConfig, MetadataStore) {
    let tmp = tempfile::tempdir().expect("tempdir");
    let config = CaskConfig {
        runtime_dir: tmp.path().join("run"),
        data_dir: tmp.path().join("lib"),
    };
    let store = MetadataStore::new(config.clone());
    (tmp, config, store)
}

// ── Record lifecycle ─────────────────────────────────────────────────

#[test]
fn pipeline_record_log_stop_remove() {
    let (_tmp, config, store) = fixture();

    let mut record = SandboxRecord::new("web", 999_999_999, vec!["sleep".to_string()]);
    record.ip = Some(Ipv4Addr::new(192, 168, 10, 2));
    store.save(&record).expect("save");
    std::fs::write(store.log_path("web"), "booted\n").expect("write log");

    assert_eq!(read_logs(&store, "web").expect("logs"), "booted\n");

    // The recorded pid does not exist, so the listing reconciles the
    // record to exited while keeping the pid for the stop path.
    let listed = list_sandboxes(&store).expect("list");
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].status, SandboxStatus::Exited);

    // The signal fails against the dead pid and the record keeps it.
    assert!(stop_sandbox(&config, &store, "web").is_err());
    let reloaded = store.load("web").expect("load");
    assert_eq!(reloaded.pid, Some(999_999_999));

    // Not stopped, so removal is refused and the record survives.
    assert!(matches!(
        remove_sandbox(&config, &store, "web"),
        Err(CaskError::InUse { kind: "sandbox", .. })
    ));

    // Mark it stopped the way a successful stop would, then remove.
    let mut reloaded = reloaded;
    reloaded.status = SandboxStatus::Stopped;
    reloaded.pid = None;
    reloaded.ip = None;
    store.save(&reloaded).expect("save stopped");
    remove_sandbox(&config, &store, "web").expect("remove");

    assert!(matches!(
        store.load("web"),
        Err(CaskError::NotFound { kind: "sandbox", .. })
    ));
    assert!(list_sandboxes(&store).expect("list").is_empty());
}

#[test]
fn stop_on_a_cleared_pid_fails_cleanly() {
    let (_tmp, config, store) = fixture();
    let mut record = SandboxRecord::new("done", 1, vec!["true".to_string()]);
    record.pid = None;
    record.status = SandboxStatus::Stopped;
    store.save(&record).expect("save");

    assert!(stop_sandbox(&config, &store, "done").is_err());
    assert!(store.load("done").expect("load").pid.is_none());
}

// ── Image commit ─────────────────────────────────────────────────────

#[test]
fn pipeline_commit_produces_a_loadable_archive() {
    let (_tmp, config, _store) = fixture();

    let merged = config.workspaces_dir().join("web").join("merged");
    std::fs::create_dir_all(merged.join("bin")).expect("mkdir");
    std::fs::write(merged.join("bin/app"), b"#!/bin/sh\n").expect("write");

    let archive = commit_sandbox(&config, "web", "web-snapshot").expect("commit");
    assert!(archive.exists());
    assert_eq!(
        archive,
        config.images_dir().join("web-snapshot.tar")
    );

    // The archive is gzipped.
    let bytes = std::fs::read(&archive).expect("read");
    assert_eq!(&bytes[..2], &[0x1f, 0x8b]);
}

#[test]
fn commit_unknown_sandbox_is_not_found() {
    let (_tmp, config, _store) = fixture();
    assert!(matches!(
        commit_sandbox(&config, "ghost", "snap"),
        Err(CaskError::NotFound { .. })
    ));
}
