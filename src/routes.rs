//! Bookkeeping for addresses this process has caused to be routed.
//!
//! One set per address family, guarded by its own lock since every hijacked
//! query handler may register concurrently. Sets only grow while serving;
//! they are read out once, at shutdown, to unwind the routing table.

use rustc_hash::FxHashSet;
use std::net::{Ipv4Addr, Ipv6Addr};
use std::sync::Mutex;

/// In-memory record of every rerouted address, partitioned by family.
///
/// The IPv6 set exists only when IPv6 rerouting is enabled.
pub struct RouteTable {
    v4: Mutex<FxHashSet<Ipv4Addr>>,
    v6: Option<Mutex<FxHashSet<Ipv6Addr>>>,
}

impl RouteTable {
    /// Create an empty table. `route_v6` allocates the IPv6 set.
    pub fn new(route_v6: bool) -> Self {
        Self {
            v4: Mutex::new(FxHashSet::default()),
            v6: route_v6.then(|| Mutex::new(FxHashSet::default())),
        }
    }

    pub fn v6_enabled(&self) -> bool {
        self.v6.is_some()
    }

    /// Record an IPv4 address as routed. Returns whether it was newly added.
    pub fn register_v4(&self, address: Ipv4Addr) -> bool {
        let Ok(mut set) = self.v4.lock() else {
            return false;
        };
        set.insert(address)
    }

    /// Record an IPv6 address as routed. Returns whether it was newly added.
    /// A no-op when IPv6 rerouting is disabled.
    pub fn register_v6(&self, address: Ipv6Addr) -> bool {
        let Some(set) = &self.v6 else {
            return false;
        };
        let Ok(mut set) = set.lock() else {
            return false;
        };
        set.insert(address)
    }

    /// Snapshot of all routed IPv4 addresses, for the shutdown drain.
    pub fn routed_v4(&self) -> Vec<Ipv4Addr> {
        self.v4
            .lock()
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Snapshot of all routed IPv6 addresses. Empty when disabled.
    pub fn routed_v6(&self) -> Vec<Ipv6Addr> {
        let Some(set) = &self.v6 else {
            return Vec::new();
        };
        set.lock()
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default()
    }
}
