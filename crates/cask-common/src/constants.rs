//! System-wide constants and well-known names.

/// Default directory for runtime state (sandbox records, networks, IPAM).
pub const DEFAULT_RUNTIME_DIR: &str = "/var/run/cask";

/// Default directory for durable data (images, layers, workspaces).
pub const DEFAULT_DATA_DIR: &str = "/var/lib/cask";

/// Environment variable overriding the runtime directory.
pub const ENV_RUNTIME_DIR: &str = "CASK_RUNTIME_DIR";

/// Environment variable overriding the data directory.
pub const ENV_DATA_DIR: &str = "CASK_DATA_DIR";

/// File name of the per-sandbox metadata record.
pub const SANDBOX_CONFIG_FILE: &str = "config.json";

/// File name of the per-sandbox combined stdout/stderr log.
pub const SANDBOX_LOG_FILE: &str = "sandbox.log";

/// File descriptor slot at which the init process inherits the command pipe.
pub const INIT_PIPE_FD: i32 = 3;

/// Environment variable carrying the target pid for the exec passthrough.
pub const ENV_EXEC_PID: &str = "CASK_EXEC_PID";

/// Environment variable carrying the command for the exec passthrough.
pub const ENV_EXEC_CMD: &str = "CASK_EXEC_CMD";

/// Interface-name prefix for the sandbox-side end of a veth pair.
pub const SANDBOX_IF_PREFIX: &str = "cif-";

/// Name of the only network driver currently registered.
pub const BRIDGE_DRIVER: &str = "bridge";

/// Application name used in CLI output and state files.
pub const APP_NAME: &str = "cask";
