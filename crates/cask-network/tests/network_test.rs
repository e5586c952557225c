//! Integration tests for the network subsystem.
//!
//! Everything here runs against tempdir-backed state with a stub driver,
//! so no kernel access or privileges are needed: address allocation over
//! a shared state file, the network store lifecycle, and the attach
//! error paths that fail before any kernel work.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::net::Ipv4Addr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use cask_common::error::CaskError;
use cask_common::types::IpRange;
use cask_network::attach::attach_sandbox;
use cask_network::driver::{DriverRegistry, NetworkDriver};
use cask_network::endpoint::Endpoint;
use cask_network::ipam::{Allocation, IpamStore};
use cask_network::store::{Network, NetworkStore};

#[derive(Debug)]
struct StubDriver;

impl NetworkDriver for StubDriver {
    fn name(&self) -> &'static str {
        "stub"
    }

    fn create(&self, ip_range: &IpRange, name: &str) -> cask_common::error::Result<Network> {
        Ok(Network {
            name: name.to_string(),
            ip_range: *ip_range,
            driver: "stub".to_string(),
        })
    }

    fn delete(&self, _network: &Network) -> cask_common::error::Result<()> {
        Ok(())
    }

    fn connect(
        &self,
        _network: &Network,
        _endpoint: &mut Endpoint,
    ) -> cask_common::error::Result<()> {
        Ok(())
    }

    fn disconnect(
        &self,
        _network: &Network,
        _endpoint: &Endpoint,
    ) -> cask_common::error::Result<()> {
        Ok(())
    }
}

/// Like [`StubDriver`], but counts disconnects so tests can assert the
/// attach error path unwinds the endpoint.
#[derive(Debug)]
struct RecordingDriver {
    disconnects: Arc<AtomicUsize>,
}

impl NetworkDriver for RecordingDriver {
    fn name(&self) -> &'static str {
        "recording"
    }

    fn create(&self, ip_range: &IpRange, name: &str) -> cask_common::error::Result<Network> {
        Ok(Network {
            name: name.to_string(),
            ip_range: *ip_range,
            driver: "recording".to_string(),
        })
    }

    fn delete(&self, _network: &Network) -> cask_common::error::Result<()> {
        Ok(())
    }

    fn connect(
        &self,
        _network: &Network,
        _endpoint: &mut Endpoint,
    ) -> cask_common::error::Result<()> {
        Ok(())
    }

    fn disconnect(
        &self,
        _network: &Network,
        _endpoint: &Endpoint,
    ) -> cask_common::error::Result<()> {
        let _ = self.disconnects.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

fn stub_registry() -> DriverRegistry {
    let mut registry = DriverRegistry::default();
    registry.register(Box::new(StubDriver));
    registry
}

// ── Allocation over shared state ─────────────────────────────────────

#[test]
fn pipeline_gateway_then_sequential_endpoints() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let ipam = IpamStore::new(tmp.path().join("subnets.json"));
    let subnet: IpRange = "192.168.10.0/24".parse().expect("parse");

    let gateway = ipam.reserve_gateway(&subnet).expect("gateway");
    assert_eq!(gateway, Ipv4Addr::new(192, 168, 10, 1));

    // Separate store instances over the same file see each other's bits.
    let second = IpamStore::new(tmp.path().join("subnets.json"));
    let first = second.allocate(&subnet).expect("allocate");
    assert_eq!(first, Allocation::Allocated(Ipv4Addr::new(192, 168, 10, 2)));
    let next = ipam.allocate(&subnet).expect("allocate");
    assert_eq!(next, Allocation::Allocated(Ipv4Addr::new(192, 168, 10, 3)));

    second
        .release(&subnet, Ipv4Addr::new(192, 168, 10, 2))
        .expect("release");
    let reused = ipam.allocate(&subnet).expect("allocate");
    assert_eq!(reused, Allocation::Allocated(Ipv4Addr::new(192, 168, 10, 2)));
}

#[test]
fn pipeline_small_subnet_runs_dry() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let ipam = IpamStore::new(tmp.path().join("subnets.json"));
    let subnet: IpRange = "10.9.0.0/29".parse().expect("parse");

    let _ = ipam.reserve_gateway(&subnet).expect("gateway");
    // 8 addresses, one burned on the gateway.
    for _ in 0..7 {
        match ipam.allocate(&subnet).expect("allocate") {
            Allocation::Allocated(_) => {}
            Allocation::Exhausted => panic!("exhausted too early"),
        }
    }
    assert_eq!(ipam.allocate(&subnet).expect("allocate"), Allocation::Exhausted);
}

// ── Network store lifecycle ──────────────────────────────────────────

#[test]
fn pipeline_network_create_list_delete() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let registry = stub_registry();
    let ipam = IpamStore::new(tmp.path().join("subnets.json"));
    let dir = tmp.path().join("networks");

    let subnet: IpRange = "172.20.0.0/24".parse().expect("parse");
    {
        let mut store = NetworkStore::open(&dir).expect("open");
        let created = store
            .create(&registry, &ipam, "stub", subnet, "backend")
            .expect("create");
        assert_eq!(created.ip_range.addr(), Ipv4Addr::new(172, 20, 0, 1));
    }

    let mut store = NetworkStore::open(&dir).expect("reopen");
    assert_eq!(store.list().len(), 1);
    store.delete(&registry, &ipam, "backend").expect("delete");
    assert!(matches!(
        store.get("backend"),
        Err(CaskError::NotFound { kind: "network", .. })
    ));
    assert!(matches!(
        store.delete(&registry, &ipam, "backend"),
        Err(CaskError::NotFound { kind: "network", .. })
    ));
}

// ── Attach error paths ───────────────────────────────────────────────

#[test]
fn attach_to_unknown_network_fails_before_allocation() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let registry = stub_registry();
    let ipam = IpamStore::new(tmp.path().join("subnets.json"));
    let store = NetworkStore::open(tmp.path().join("networks")).expect("open");

    let err = attach_sandbox(&store, &ipam, &registry, "nope", "sb-1", 4242, &[])
        .expect_err("should fail");
    assert!(matches!(err, CaskError::NotFound { kind: "network", .. }));
    // Nothing was taken from the allocator.
    assert!(!tmp.path().join("subnets.json").exists());
}

#[test]
fn failed_namespace_setup_unwinds_the_endpoint_and_address() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let disconnects = Arc::new(AtomicUsize::new(0));
    let mut registry = DriverRegistry::default();
    registry.register(Box::new(RecordingDriver {
        disconnects: Arc::clone(&disconnects),
    }));
    let ipam = IpamStore::new(tmp.path().join("subnets.json"));
    let subnet: IpRange = "172.21.0.0/24".parse().expect("parse");

    let mut store = NetworkStore::open(tmp.path().join("networks")).expect("open");
    let _ = store
        .create(&registry, &ipam, "recording", subnet, "backend")
        .expect("create");

    // Connecting succeeds, but configuring the namespace of a process
    // that does not exist cannot.
    let err = attach_sandbox(&store, &ipam, &registry, "backend", "sb-1", u32::MAX, &[]);
    assert!(err.is_err());

    // The driver was asked to undo the connect, and the address went
    // back to the pool.
    assert_eq!(disconnects.load(Ordering::SeqCst), 1);
    let reused = ipam.allocate(&subnet).expect("allocate");
    assert_eq!(reused, Allocation::Allocated(Ipv4Addr::new(172, 21, 0, 2)));
}

// ── Endpoint naming ──────────────────────────────────────────────────

#[test]
fn endpoint_names_are_derived_and_short() {
    let endpoint = Endpoint::new("0a1b2c3d", "backend", Ipv4Addr::new(172, 20, 0, 2), vec![]);
    assert_eq!(endpoint.id, "0a1b2c3d-backend");
    assert_eq!(endpoint.host_ifname, "0a1b2");
    assert_eq!(endpoint.peer_ifname, "cif-0a1b2");
}
