//! Entering a sandbox's network namespace to configure its interface.
//!
//! The guard pins the calling thread: it keeps a handle to the original
//! namespace and moves the thread into the target's. It is deliberately
//! `!Send` so the restore happens on the thread that entered.

use std::fs::File;
use std::marker::PhantomData;
use std::path::Path;

use nix::sched::{CloneFlags, setns};

use cask_common::error::{CaskError, Result};

use crate::endpoint::Endpoint;
use crate::shell;
use crate::store::Network;

/// Scoped entry into another process's network namespace.
///
/// Dropping the guard restores the original namespace as a safety net;
/// call [`NetnsGuard::restore`] to observe the result explicitly.
pub struct NetnsGuard {
    original: File,
    restored: bool,
    _pinned: PhantomData<*const ()>,
}

impl NetnsGuard {
    /// Moves the current thread into the network namespace of `pid`.
    ///
    /// # Errors
    ///
    /// Returns an error if either namespace handle cannot be opened or
    /// the `setns` call fails.
    pub fn enter(pid: u32) -> Result<Self> {
        let original = open_ns("/proc/self/ns/net")?;
        let target = open_ns(format!("/proc/{pid}/ns/net"))?;

        setns(&target, CloneFlags::CLONE_NEWNET)
            .map_err(|e| CaskError::kernel("setns net", e))?;

        Ok(Self {
            original,
            restored: false,
            _pinned: PhantomData,
        })
    }

    /// Returns the thread to the namespace it started in.
    ///
    /// # Errors
    ///
    /// Returns an error if the `setns` back fails; the guard will not
    /// retry on drop.
    pub fn restore(mut self) -> Result<()> {
        self.restored = true;
        setns(&self.original, CloneFlags::CLONE_NEWNET)
            .map_err(|e| CaskError::kernel("setns restore", e))
    }
}

impl Drop for NetnsGuard {
    fn drop(&mut self) {
        if !self.restored {
            if let Err(e) = setns(&self.original, CloneFlags::CLONE_NEWNET) {
                tracing::error!(error = %e, "failed to restore network namespace");
            }
        }
    }
}

fn open_ns(path: impl AsRef<Path>) -> Result<File> {
    let path = path.as_ref();
    File::open(path).map_err(|e| CaskError::io(path, e))
}

/// Moves an endpoint's peer interface into the sandbox at `pid` and
/// configures it from inside: address, link up, loopback up, and a
/// default route via the network's gateway.
///
/// # Errors
///
/// Returns the first kernel configuration failure; the original
/// namespace is restored either way.
pub fn configure_endpoint(endpoint: &Endpoint, network: &Network, pid: u32) -> Result<()> {
    let pid_str = pid.to_string();
    shell::run(
        "move peer into sandbox",
        "ip",
        &["link", "set", &endpoint.peer_ifname, "netns", &pid_str],
    )?;

    let addr = network.ip_range.with_addr(endpoint.ip).to_string();
    let gateway = network.ip_range.addr().to_string();

    let guard = NetnsGuard::enter(pid)?;
    let result = configure_inside(endpoint, &addr, &gateway);
    result.and(guard.restore())
}

fn configure_inside(endpoint: &Endpoint, addr: &str, gateway: &str) -> Result<()> {
    shell::run(
        "assign endpoint address",
        "ip",
        &["addr", "add", addr, "dev", &endpoint.peer_ifname],
    )?;
    shell::run(
        "bring endpoint up",
        "ip",
        &["link", "set", &endpoint.peer_ifname, "up"],
    )?;
    shell::run("bring loopback up", "ip", &["link", "set", "lo", "up"])?;
    shell::run(
        "install default route",
        "ip",
        &[
            "route",
            "add",
            "default",
            "via",
            gateway,
            "dev",
            &endpoint.peer_ifname,
        ],
    )?;
    tracing::debug!(endpoint = %endpoint.id, addr, gateway, "endpoint configured");
    Ok(())
}
