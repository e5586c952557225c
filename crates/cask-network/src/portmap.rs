//! Host-to-sandbox port forwarding through DNAT rules.

use std::net::Ipv4Addr;

use cask_common::error::{CaskError, Result};

use crate::shell;

/// Splits a `host:sandbox` port mapping into its two port numbers.
///
/// # Errors
///
/// Returns a configuration error unless the spec has exactly two
/// non-empty fields, both valid port numbers.
pub fn parse_port_mapping(spec: &str) -> Result<(u16, u16)> {
    let invalid = || CaskError::Config {
        message: format!("invalid port mapping, expected host:sandbox ports: {spec}"),
    };

    let mut parts = spec.split(':');
    let host = parts.next().ok_or_else(invalid)?;
    let sandbox = parts.next().ok_or_else(invalid)?;
    if parts.next().is_some() || host.is_empty() || sandbox.is_empty() {
        return Err(invalid());
    }

    let host: u16 = host.parse().map_err(|_| invalid())?;
    let sandbox: u16 = sandbox.parse().map_err(|_| invalid())?;
    Ok((host, sandbox))
}

/// Installs a DNAT rule per mapping, forwarding host TCP ports to the
/// endpoint address. Failed rules are logged and skipped so one bad
/// mapping does not sink the whole attach.
pub fn install_port_mappings(mappings: &[String], ip: Ipv4Addr) {
    apply_port_mappings("-A", mappings, ip);
}

/// Removes previously installed DNAT rules. Best effort: rules that are
/// already gone only produce a warning.
pub fn remove_port_mappings(mappings: &[String], ip: Ipv4Addr) {
    apply_port_mappings("-D", mappings, ip);
}

fn apply_port_mappings(op: &str, mappings: &[String], ip: Ipv4Addr) {
    for spec in mappings {
        match parse_port_mapping(spec) {
            Ok((host, sandbox)) => {
                let args = dnat_args(op, host, sandbox, ip);
                shell::run_best_effort("port mapping rule", "iptables", &args);
            }
            Err(e) => {
                tracing::warn!(mapping = %spec, error = %e, "skipping malformed port mapping");
            }
        }
    }
}

fn dnat_args(op: &str, host_port: u16, sandbox_port: u16, ip: Ipv4Addr) -> [String; 14] {
    [
        "-t".to_string(),
        "nat".to_string(),
        op.to_string(),
        "PREROUTING".to_string(),
        "-p".to_string(),
        "tcp".to_string(),
        "-m".to_string(),
        "tcp".to_string(),
        "--dport".to_string(),
        host_port.to_string(),
        "-j".to_string(),
        "DNAT".to_string(),
        "--to-destination".to_string(),
        format!("{ip}:{sandbox_port}"),
    ]
}
