//! Bitmap IP address allocation.
//!
//! Tracks which addresses of each subnet are issued, one `'0'`/`'1'`
//! character per address, persisted as a single JSON object mapping the
//! subnet's masked CIDR text to its bitmap string. Bit `offset` stands for
//! the address `base + offset + 1`; bit 0 is reserved for the subnet's
//! gateway at `base + 1`.
//!
//! No kernel interaction happens here — this is pure bookkeeping plus
//! persistence, shared across concurrent runtime invocations under an
//! advisory file lock.

use std::collections::BTreeMap;
use std::net::Ipv4Addr;
use std::path::PathBuf;

use cask_common::error::{CaskError, Result};
use cask_common::types::IpRange;

use crate::lock::StateLock;

/// Widest subnet the allocator accepts; the bitmap grows as `2^(32-len)`.
const MIN_PREFIX_LEN: u8 = 16;

/// Outcome of an allocation attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Allocation {
    /// A free address was found and marked as issued.
    Allocated(Ipv4Addr),
    /// Every address in the subnet is already issued.
    Exhausted,
}

/// The durable allocator state: one bitmap per subnet, in a single file.
#[derive(Debug, Clone)]
pub struct IpamStore {
    path: PathBuf,
}

impl IpamStore {
    /// Creates a store backed by the given state file.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Reserves the gateway address (`base + 1`) of a subnet.
    ///
    /// Initializes the subnet's bitmap on first use with bit 0 set, so
    /// subsequent [`IpamStore::allocate`] calls start at `base + 2`.
    /// Idempotent: reserving an already-reserved gateway succeeds.
    ///
    /// # Errors
    ///
    /// Returns an error if the subnet is too wide or persistence fails.
    pub fn reserve_gateway(&self, subnet: &IpRange) -> Result<Ipv4Addr> {
        let _lock = self.lock()?;
        let mut subnets = self.load()?;
        let bitmap = ensure_bitmap(&mut subnets, subnet)?;
        if bitmap.as_bytes().first() != Some(&b'1') {
            bitmap.replace_range(0..1, "1");
        }
        self.dump(&subnets)?;

        let gateway = Ipv4Addr::from(u32::from(subnet.network()) + 1);
        tracing::debug!(subnet = %subnet.network_key(), %gateway, "gateway reserved");
        Ok(gateway)
    }

    /// Issues the first free address of the subnet.
    ///
    /// Returns [`Allocation::Exhausted`] when every bit is set; the caller
    /// decides whether that is fatal.
    ///
    /// # Errors
    ///
    /// Returns an error if the subnet is too wide or persistence fails.
    pub fn allocate(&self, subnet: &IpRange) -> Result<Allocation> {
        let _lock = self.lock()?;
        let mut subnets = self.load()?;
        let bitmap = ensure_bitmap(&mut subnets, subnet)?;

        let Some(offset) = bitmap.bytes().position(|b| b == b'0') else {
            tracing::warn!(subnet = %subnet.network_key(), "subnet exhausted");
            return Ok(Allocation::Exhausted);
        };
        bitmap.replace_range(offset..=offset, "1");

        #[allow(clippy::cast_possible_truncation)]
        let addr = Ipv4Addr::from(u32::from(subnet.network()) + offset as u32 + 1);
        self.dump(&subnets)?;

        tracing::debug!(subnet = %subnet.network_key(), %addr, offset, "address allocated");
        Ok(Allocation::Allocated(addr))
    }

    /// Returns an address to the free pool.
    ///
    /// Idempotent: releasing an already-free address is a no-op. Offsets
    /// outside the subnet's bitmap are rejected.
    ///
    /// # Errors
    ///
    /// Returns an error for an unknown subnet, an address outside the
    /// subnet, or a persistence failure.
    pub fn release(&self, subnet: &IpRange, addr: Ipv4Addr) -> Result<()> {
        let _lock = self.lock()?;
        let mut subnets = self.load()?;
        let key = subnet.network_key();
        let bitmap = subnets.get_mut(&key).ok_or_else(|| CaskError::NotFound {
            kind: "subnet",
            id: key.clone(),
        })?;

        let base = u64::from(u32::from(subnet.network()));
        let addr_value = u64::from(u32::from(addr));
        let offset = addr_value
            .checked_sub(base + 1)
            .filter(|&o| o < bitmap.len() as u64)
            .ok_or_else(|| CaskError::Config {
                message: format!("address {addr} is outside subnet {key}"),
            })?;

        #[allow(clippy::cast_possible_truncation)]
        let offset = offset as usize;
        if bitmap.as_bytes()[offset] == b'1' {
            bitmap.replace_range(offset..=offset, "0");
            self.dump(&subnets)?;
            tracing::debug!(subnet = %key, %addr, offset, "address released");
        }
        Ok(())
    }

    fn lock(&self) -> Result<StateLock> {
        StateLock::acquire(&self.path.with_extension("lock"))
    }

    fn load(&self) -> Result<BTreeMap<String, String>> {
        match std::fs::read(&self.path) {
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(e) => Err(CaskError::io(&self.path, e)),
        }
    }

    fn dump(&self, subnets: &BTreeMap<String, String>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| CaskError::io(parent, e))?;
        }
        let json = serde_json::to_vec(subnets)?;
        std::fs::write(&self.path, json).map_err(|e| CaskError::io(&self.path, e))
    }
}

/// Fetches the subnet's bitmap, initializing it on first use.
///
/// A fresh bitmap has bit 0 set — the gateway slot is never handed out by
/// the general scan.
fn ensure_bitmap<'a>(
    subnets: &'a mut BTreeMap<String, String>,
    subnet: &IpRange,
) -> Result<&'a mut String> {
    if subnet.prefix_len() < MIN_PREFIX_LEN {
        return Err(CaskError::Config {
            message: format!(
                "subnet {} is too wide (narrowest supported prefix is /{MIN_PREFIX_LEN})",
                subnet.network_key()
            ),
        });
    }
    #[allow(clippy::cast_possible_truncation)]
    let size = subnet.host_count() as usize;
    Ok(subnets.entry(subnet.network_key()).or_insert_with(|| {
        let mut bitmap = String::with_capacity(size);
        bitmap.push('1');
        bitmap.extend(std::iter::repeat_n('0', size - 1));
        bitmap
    }))
}
