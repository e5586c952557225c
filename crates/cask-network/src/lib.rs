//! # cask-network
//!
//! The virtual network subsystem: a bitmap IP address allocator, the named
//! network model and its on-disk store, the bridge driver that provisions
//! kernel devices and NAT rules, the namespace switcher that configures a
//! sandbox's interface from outside it, and the port-mapping configurer.
//!
//! Kernel state is driven through `ip`/`iptables` invocations; all durable
//! state lives in JSON files under the runtime directory and is serialized
//! across concurrent command invocations with advisory file locks.

pub mod attach;
pub mod driver;
pub mod endpoint;
pub mod ipam;
pub mod netns;
pub mod portmap;
pub mod store;

mod lock;
mod shell;
