//! Host-side sandbox bootstrap.
//!
//! Starting a sandbox clones a child into fresh namespaces with this same
//! binary re-invoked as `init`. The two processes synchronize over a pipe
//! inherited at a fixed descriptor: the child blocks reading its command
//! until the host side has recorded metadata and attached networking, then
//! the host writes the command and closes its end.

use std::ffi::CString;
use std::fs::File;
use std::io::Write;
use std::os::fd::{AsRawFd, RawFd};
use std::os::unix::ffi::OsStrExt;

use nix::fcntl::OFlag;
use nix::sched::clone;
use nix::sys::signal::{Signal, kill};
use nix::sys::wait::waitpid;
use nix::unistd::{Pid, execve, pipe2, sethostname};

use cask_common::config::CaskConfig;
use cask_common::constants::{APP_NAME, INIT_PIPE_FD, SANDBOX_LOG_FILE};
use cask_common::error::{CaskError, Result};
use cask_core::filesystem::overlayfs::{prepare_workspace, teardown_workspace};
use cask_core::namespace::NamespaceConfig;
use cask_network::attach::attach_sandbox;
use cask_network::driver::DriverRegistry;
use cask_network::ipam::IpamStore;
use cask_network::store::NetworkStore;

use crate::lifecycle::detach_networking;
use crate::metadata::{MetadataStore, SandboxRecord};

const CHILD_STACK_SIZE: usize = 1024 * 1024;

/// Everything a `run` invocation asks for.
#[derive(Debug, Clone)]
pub struct StartOptions {
    /// Sandbox name; doubles as its hostname.
    pub name: String,
    /// Image to build the rootfs from.
    pub image: String,
    /// Payload command and arguments.
    pub command: Vec<String>,
    /// Keep stdio attached and wait for the payload to exit.
    pub interactive: bool,
    /// Optional `host:sandbox` bind mount.
    pub volume: Option<String>,
    /// Extra `KEY=VALUE` environment entries for the payload.
    pub env: Vec<String>,
    /// Network to attach to, if any.
    pub network: Option<String>,
    /// `host:sandbox` TCP port mappings; only meaningful with a network.
    pub port_mappings: Vec<String>,
}

/// Starts a sandbox.
///
/// Interactive mode waits for the payload and cleans everything up on
/// exit; detached mode returns as soon as the child is released.
///
/// # Errors
///
/// Returns an error for an empty command, a name already in use, or any
/// failure of workspace preparation, the clone, metadata persistence, or
/// network attachment. A failed attach kills the half-started child and
/// undoes the workspace and record.
#[allow(unsafe_code)]
pub fn start_sandbox(config: &CaskConfig, options: &StartOptions) -> Result<()> {
    if options.command.is_empty() {
        return Err(CaskError::Config {
            message: "no command given".to_string(),
        });
    }
    let store = MetadataStore::new(config.clone());
    if store.load(&options.name).is_ok() {
        return Err(CaskError::InUse {
            kind: "sandbox",
            id: options.name.clone(),
        });
    }

    let merged = prepare_workspace(config, &options.image, &options.name, options.volume.as_deref())?;

    // Close-on-exec everywhere except the one descriptor parked at the
    // init side's slot.
    let (pipe_read, pipe_write) =
        pipe2(OFlag::O_CLOEXEC).map_err(|e| CaskError::kernel("pipe", e))?;

    // Detached output goes to the log file; the metadata directory has to
    // exist before the child does.
    let log_file = if options.interactive {
        None
    } else {
        Some(open_log_file(config, &options.name)?)
    };

    let exe = cstring("/proc/self/exe")?;
    let argv = [cstring(APP_NAME)?, cstring("init")?];
    let envp = build_envp(&options.env)?;
    let hostname = options.name.clone();
    let workdir = cstring(merged.as_os_str().as_bytes())?;

    let read_raw = pipe_read.as_raw_fd();
    let log_raw = log_file.as_ref().map(File::as_raw_fd);

    let child = move || -> isize {
        if !park_fd_at(read_raw, INIT_PIPE_FD) {
            return 1;
        }
        if let Some(fd) = log_raw {
            if !park_fd_at(fd, 1) || !park_fd_at(fd, 2) {
                return 1;
            }
        }
        if sethostname(&hostname).is_err() {
            return 1;
        }
        if unsafe { libc::chdir(workdir.as_ptr()) } < 0 {
            return 1;
        }
        let _ = execve(&exe, &argv, &envp);
        1
    };

    let mut stack = vec![0u8; CHILD_STACK_SIZE];
    let flags = NamespaceConfig::default().clone_flags();
    let pid = unsafe { clone(Box::new(child), &mut stack, flags, Some(libc::SIGCHLD)) }
        .map_err(|e| CaskError::kernel("clone", e))?;
    drop(pipe_read);
    drop(log_file);
    let child_pid = u32::try_from(pid.as_raw()).map_err(|_| CaskError::Config {
        message: format!("clone returned a negative pid: {pid}"),
    })?;

    let mut record = SandboxRecord::new(&options.name, child_pid, options.command.clone());
    record.volume = options.volume.clone();
    record.port_mappings = options.port_mappings.clone();
    store.save(&record)?;

    if let Some(network) = &options.network {
        match attach_to_network(config, network, &record, child_pid) {
            Ok(ip) => {
                record.network = Some(network.clone());
                record.ip = Some(ip);
                store.save(&record)?;
            }
            Err(e) => {
                abort_half_started(config, &store, &options.name, pid, options.volume.as_deref());
                return Err(e);
            }
        }
    }

    // The sync point: the child's init has been blocking on this read.
    let mut writer = File::from(pipe_write);
    writer
        .write_all(options.command.join(" ").as_bytes())
        .map_err(|e| CaskError::io("bootstrap pipe", e))?;
    drop(writer);

    tracing::info!(sandbox = %options.name, pid = child_pid, "sandbox started");

    if options.interactive {
        let _ = waitpid(pid, None).map_err(|e| CaskError::kernel("waitpid", e))?;
        detach_networking(config, &record);
        teardown_workspace(config, &options.name, options.volume.as_deref())?;
        store.delete(&options.name)?;
        tracing::info!(sandbox = %options.name, "sandbox exited");
    }
    Ok(())
}

fn attach_to_network(
    config: &CaskConfig,
    network: &str,
    record: &SandboxRecord,
    pid: u32,
) -> Result<std::net::Ipv4Addr> {
    let networks = NetworkStore::open(config.networks_dir())?;
    let ipam = IpamStore::new(config.ipam_file());
    let registry = DriverRegistry::default();
    let endpoint = attach_sandbox(
        &networks,
        &ipam,
        &registry,
        network,
        record.id.as_str(),
        pid,
        &record.port_mappings,
    )?;
    Ok(endpoint.ip)
}

/// A failed attach leaves a child parked on the pipe read. Kill it and
/// undo what the bootstrap already built.
fn abort_half_started(
    config: &CaskConfig,
    store: &MetadataStore,
    name: &str,
    pid: Pid,
    volume: Option<&str>,
) {
    if let Err(e) = kill(pid, Signal::SIGKILL) {
        tracing::warn!(%pid, error = %e, "failed to kill half-started sandbox");
    }
    let _ = waitpid(pid, None);
    if let Err(e) = teardown_workspace(config, name, volume) {
        tracing::warn!(sandbox = name, error = %e, "workspace teardown failed");
    }
    if let Err(e) = store.delete(name) {
        tracing::warn!(sandbox = name, error = %e, "record cleanup failed");
    }
}

/// Moves a descriptor to the slot the exec'd child expects, clearing
/// close-on-exec either way.
///
/// `dup2(fd, fd)` is a no-op that leaves the flag set, so a descriptor
/// that already sits at its target (the read end lands on fd 3 whenever
/// only stdio was open at pipe time) has the flag cleared in place.
#[allow(unsafe_code)]
fn park_fd_at(fd: RawFd, target: RawFd) -> bool {
    if fd == target {
        unsafe { libc::fcntl(fd, libc::F_SETFD, 0) == 0 }
    } else {
        unsafe { libc::dup2(fd, target) >= 0 }
    }
}

fn open_log_file(config: &CaskConfig, name: &str) -> Result<File> {
    let dir = config.sandbox_dir(name);
    std::fs::create_dir_all(&dir).map_err(|e| CaskError::io(&dir, e))?;
    let path = dir.join(SANDBOX_LOG_FILE);
    std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .map_err(|e| CaskError::io(&path, e))
}

/// The payload environment: everything the host process carries plus the
/// requested extras, as `KEY=VALUE` C strings.
fn build_envp(extra: &[String]) -> Result<Vec<CString>> {
    let mut envp = Vec::new();
    for (key, value) in std::env::vars() {
        envp.push(cstring(format!("{key}={value}").into_bytes())?);
    }
    for entry in extra {
        if !entry.contains('=') {
            return Err(CaskError::Config {
                message: format!("invalid environment entry, expected KEY=VALUE: {entry}"),
            });
        }
        envp.push(cstring(entry.as_bytes())?);
    }
    Ok(envp)
}

fn cstring(bytes: impl Into<Vec<u8>>) -> Result<CString> {
    CString::new(bytes).map_err(|_| CaskError::Config {
        message: "interior NUL byte in bootstrap argument".to_string(),
    })
}
