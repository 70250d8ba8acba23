//! The live network view: connected switches, their ports, discovered
//! hosts, and inter-switch links.
//!
//! One `TopologyStore` is shared across every session task and the stats
//! poller. Mutations go through a single `tokio::sync::RwLock` rather than
//! per-entity locks — contention is low (a handful of switches, occasional
//! writes) and a single lock keeps the "remove switch also drops its
//! links" invariant trivial to maintain. The lock is the async variant
//! because the packet-in dispatcher can hold a read guard across a write
//! to the session's socket.
//!
//! The flow cache lives under this same write guard: a switch or link
//! removal invalidates the cache entries it affects before the guard is
//! released, so a concurrent dispatch can never observe the post-removal
//! link set next to a cache entry that still routes through it.

use crate::error::TopologyError;
use crate::path::FlowCache;
use sdn_datatypes::{Dpid, Host, Link, MacAddr, PortInfo, PortNo, PortSample, PortSampleHistory, Switch};
use std::collections::HashMap;
use std::net::Ipv4Addr;
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Debug, Default)]
struct Inner {
    switches: HashMap<Dpid, Switch>,
    hosts: HashMap<MacAddr, Host>,
    /// Keyed by the link's source endpoint; the reverse direction is its
    /// own entry keyed by what was the destination.
    links: HashMap<(Dpid, PortNo), Link>,
    port_samples: HashMap<(Dpid, PortNo), PortSampleHistory>,
}

#[derive(Debug, Default)]
pub struct TopologyStore {
    inner: RwLock<Inner>,
    flow_cache: Arc<FlowCache>,
}

impl TopologyStore {
    pub fn new() -> Self {
        TopologyStore::default()
    }

    /// The flow cache nested under this store's lock discipline (see the
    /// module doc comment). Every caller — the dispatcher included —
    /// shares this one instance rather than keeping a separately locked
    /// cache of its own.
    pub fn flow_cache(&self) -> &FlowCache {
        &self.flow_cache
    }

    /// Registers a newly handshaken switch. Idempotent: an existing
    /// switch's ports are left untouched.
    pub async fn add_switch(&self, dpid: Dpid) {
        let mut inner = self.inner.write().await;
        inner.switches.entry(dpid).or_insert_with(|| Switch::new(dpid));
    }

    /// Drops a switch, every link touching it, and its port-sample
    /// history. Hosts attached to it are left in place (the dispatcher
    /// will relearn or evict them lazily when traffic stops matching).
    /// Invalidates the flow cache's affected entries before releasing the
    /// write guard.
    pub async fn remove_switch(&self, dpid: Dpid) {
        let mut inner = self.inner.write().await;
        inner.switches.remove(&dpid);
        inner.links.retain(|(src_dpid, _), link| {
            *src_dpid != dpid && link.dst.0 != dpid
        });
        inner.port_samples.retain(|(port_dpid, _), _| *port_dpid != dpid);
        self.flow_cache.invalidate_switch(dpid);
    }

    /// Records a port's latest reported state. Per the link
    /// invariant ("removed when either endpoint port goes down"), a port
    /// reporting admin- or link-down takes its directed link (and that
    /// link's reverse) out of the topology, invalidating any cached flow
    /// that routed through them before the write guard is released.
    pub async fn set_port(&self, dpid: Dpid, port_no: PortNo, info: PortInfo) -> Vec<Link> {
        let mut inner = self.inner.write().await;
        if let Some(switch) = inner.switches.get_mut(&dpid) {
            switch.ports.insert(port_no, info);
        }
        let removed = if info.admin_up && info.link_up {
            Vec::new()
        } else {
            remove_links_at(&mut inner.links, (dpid, port_no))
        };
        for link in &removed {
            self.flow_cache.invalidate_link(link.src.0, link.dst.0);
        }
        removed
    }

    /// Adds a directed link and its reverse, both carrying the same
    /// nominal bandwidth (reverse links always mirror each other).
    pub async fn upsert_link(&self, src: (Dpid, PortNo), dst: (Dpid, PortNo)) {
        let mut inner = self.inner.write().await;
        inner.links.insert(src, Link::new(src, dst));
        inner.links.insert(dst, Link::new(dst, src));
    }

    pub async fn iter_links(&self) -> Vec<Link> {
        let inner = self.inner.read().await;
        inner.links.values().copied().collect()
    }

    pub async fn switch_ids(&self) -> Vec<Dpid> {
        let inner = self.inner.read().await;
        inner.switches.keys().copied().collect()
    }

    pub async fn has_switch(&self, dpid: Dpid) -> bool {
        self.inner.read().await.switches.contains_key(&dpid)
    }

    /// Records an end host's IP/attachment observation, creating the host
    /// record on first sight.
    pub async fn observe_host(&self, mac: MacAddr, ip: Option<Ipv4Addr>, attachment: (Dpid, PortNo)) {
        let mut inner = self.inner.write().await;
        inner
            .hosts
            .entry(mac)
            .and_modify(|h| h.observe(ip, attachment))
            .or_insert_with(|| {
                let mut h = Host::new(mac, attachment);
                h.observe(ip, attachment);
                h
            });
    }

    pub async fn find_host_by_mac(&self, mac: MacAddr) -> Option<Host> {
        self.inner.read().await.hosts.get(&mac).cloned()
    }

    pub async fn find_host_by_ip(&self, ip: Ipv4Addr) -> Option<Host> {
        let inner = self.inner.read().await;
        inner
            .hosts
            .values()
            .find(|h| h.ips.contains(&ip))
            .cloned()
    }

    pub async fn record_port_sample(&self, dpid: Dpid, port_no: PortNo, sample: PortSample) {
        let mut inner = self.inner.write().await;
        inner
            .port_samples
            .entry((dpid, port_no))
            .or_default()
            .push(sample);
    }

    /// The port's advertised link speed, as last reported by
    /// `PortDescStatsReply`.
    pub async fn nominal_bps(&self, dpid: Dpid, port_no: PortNo) -> Result<u64, TopologyError> {
        let inner = self.inner.read().await;
        let switch = inner.switches.get(&dpid).ok_or(TopologyError::UnknownSwitch)?;
        Ok(switch.ports.get(&port_no).map(|p| p.nominal_bps).unwrap_or(0))
    }

    /// Throughput derived from the last two `PortStatsReply` samples for
    /// this port. `None` until two samples have arrived.
    pub async fn measured_bps(&self, dpid: Dpid, port_no: PortNo) -> Option<u64> {
        let inner = self.inner.read().await;
        inner.port_samples.get(&(dpid, port_no))?.measured_bps()
    }
}

/// Removes the directed link keyed at `endpoint`, and its reverse if one
/// still points back to `endpoint`, returning whichever of the two were
/// actually present.
fn remove_links_at(links: &mut HashMap<(Dpid, PortNo), Link>, endpoint: (Dpid, PortNo)) -> Vec<Link> {
    let mut removed = Vec::new();
    if let Some(link) = links.remove(&endpoint) {
        if let Some(reverse) = links.get(&link.dst).copied() {
            if reverse.dst == endpoint {
                links.remove(&link.dst);
                removed.push(reverse);
            }
        }
        removed.push(link);
    }
    removed
}

#[cfg(test)]
mod tests {
    use super::*;
    use pnet::util::MacAddr;
    use std::time::Instant;

    fn dpid(n: u64) -> Dpid {
        Dpid(n)
    }

    #[tokio::test]
    async fn add_and_remove_switch() {
        let store = TopologyStore::new();
        store.add_switch(dpid(1)).await;
        assert!(store.has_switch(dpid(1)).await);
        store.remove_switch(dpid(1)).await;
        assert!(!store.has_switch(dpid(1)).await);
    }

    #[tokio::test]
    async fn removing_a_switch_drops_its_links() {
        let store = TopologyStore::new();
        store.add_switch(dpid(1)).await;
        store.add_switch(dpid(2)).await;
        store
            .upsert_link((dpid(1), PortNo(1)), (dpid(2), PortNo(1)))
            .await;
        assert_eq!(store.iter_links().await.len(), 2);
        store.remove_switch(dpid(1)).await;
        assert!(store.iter_links().await.is_empty());
    }

    #[tokio::test]
    async fn port_going_down_drops_its_link_both_directions() {
        let store = TopologyStore::new();
        store.add_switch(dpid(1)).await;
        store.add_switch(dpid(2)).await;
        store
            .upsert_link((dpid(1), PortNo(1)), (dpid(2), PortNo(1)))
            .await;
        assert_eq!(store.iter_links().await.len(), 2);

        let removed = store
            .set_port(
                dpid(1),
                PortNo(1),
                PortInfo::new(MacAddr::new(0, 0, 0, 0, 0, 1), 1_000_000_000, true, false),
            )
            .await;
        assert_eq!(removed.len(), 2);
        assert!(store.iter_links().await.is_empty());
    }

    #[tokio::test]
    async fn host_ip_set_accumulates_across_observations() {
        let store = TopologyStore::new();
        let mac = MacAddr::new(0, 0, 0, 0, 0, 1);
        store
            .observe_host(mac, Some("10.0.0.1".parse().unwrap()), (dpid(1), PortNo(1)))
            .await;
        store
            .observe_host(mac, Some("10.0.0.5".parse().unwrap()), (dpid(1), PortNo(2)))
            .await;
        let host = store.find_host_by_mac(mac).await.unwrap();
        assert_eq!(host.ips.len(), 2);
        assert_eq!(host.attachment, (dpid(1), PortNo(2)));
    }

    #[tokio::test]
    async fn measured_bps_requires_two_samples() {
        let store = TopologyStore::new();
        let port = (dpid(1), PortNo(1));
        assert!(store.measured_bps(port.0, port.1).await.is_none());
        store
            .record_port_sample(
                port.0,
                port.1,
                PortSample {
                    rx_bytes: 0,
                    tx_bytes: 0,
                    ts: Instant::now(),
                },
            )
            .await;
        assert!(store.measured_bps(port.0, port.1).await.is_none());
        store
            .record_port_sample(
                port.0,
                port.1,
                PortSample {
                    rx_bytes: 1000,
                    tx_bytes: 0,
                    ts: Instant::now(),
                },
            )
            .await;
        assert!(store.measured_bps(port.0, port.1).await.is_some());
    }
}
