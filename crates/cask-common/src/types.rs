//! Domain primitive types used across the cask workspace.

use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{CaskError, Result};

/// Unique identifier for a sandbox instance.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SandboxId(String);

impl SandboxId {
    /// Creates a new sandbox ID from a string value.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generates a random sandbox ID.
    #[must_use]
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    /// Returns the inner string representation.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SandboxId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle state of a sandbox.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SandboxStatus {
    /// Sandbox process is running.
    Running,
    /// Sandbox was stopped by the user.
    Stopped,
    /// Sandbox process exited on its own.
    Exited,
}

impl fmt::Display for SandboxStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Running => write!(f, "running"),
            Self::Stopped => write!(f, "stopped"),
            Self::Exited => write!(f, "exited"),
        }
    }
}

/// An IPv4 address range in CIDR notation.
///
/// Keeps the address exactly as given (it may be a host address inside the
/// range, e.g. a network's gateway), while [`IpRange::network`] yields the
/// masked base used to key allocator state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IpRange {
    addr: Ipv4Addr,
    prefix_len: u8,
}

impl IpRange {
    /// Creates a range from an address and prefix length.
    ///
    /// # Errors
    ///
    /// Returns an error if the prefix length exceeds 32.
    pub fn new(addr: Ipv4Addr, prefix_len: u8) -> Result<Self> {
        if prefix_len > 32 {
            return Err(CaskError::Config {
                message: format!("invalid prefix length: /{prefix_len}"),
            });
        }
        Ok(Self { addr, prefix_len })
    }

    /// Returns the address carried by the range.
    #[must_use]
    pub const fn addr(&self) -> Ipv4Addr {
        self.addr
    }

    /// Returns the prefix length.
    #[must_use]
    pub const fn prefix_len(&self) -> u8 {
        self.prefix_len
    }

    /// Returns the masked network base address.
    #[must_use]
    pub fn network(&self) -> Ipv4Addr {
        Ipv4Addr::from(u32::from(self.addr) & self.mask())
    }

    /// Returns the canonical `base/len` form used as allocator key.
    #[must_use]
    pub fn network_key(&self) -> String {
        format!("{}/{}", self.network(), self.prefix_len)
    }

    /// Returns the total number of addresses covered by the range.
    #[must_use]
    pub const fn host_count(&self) -> u64 {
        1u64 << (32 - self.prefix_len)
    }

    /// Returns a copy of the range carrying a different address.
    #[must_use]
    pub const fn with_addr(self, addr: Ipv4Addr) -> Self {
        Self { addr, ..self }
    }

    /// Returns whether the address falls inside the range.
    #[must_use]
    pub fn contains(&self, addr: Ipv4Addr) -> bool {
        u32::from(addr) & self.mask() == u32::from(self.network())
    }

    const fn mask(&self) -> u32 {
        if self.prefix_len == 0 {
            0
        } else {
            u32::MAX << (32 - self.prefix_len)
        }
    }
}

impl FromStr for IpRange {
    type Err = CaskError;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || CaskError::Config {
            message: format!("invalid CIDR range: {s}"),
        };
        let (addr_part, len_part) = s.split_once('/').ok_or_else(invalid)?;
        let addr: Ipv4Addr = addr_part.parse().map_err(|_| invalid())?;
        let prefix_len: u8 = len_part.parse().map_err(|_| invalid())?;
        Self::new(addr, prefix_len)
    }
}

impl fmt::Display for IpRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.addr, self.prefix_len)
    }
}

impl Serialize for IpRange {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for IpRange {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        text.parse().map_err(serde::de::Error::custom)
    }
}
