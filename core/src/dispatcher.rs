//! Packet-in classification and forwarding decisions.
//!
//! Every `PacketIn` is handled one of four ways, in order:
//! 1. Unparseable Ethernet, or an ethertype that's neither ARP nor IPv4,
//!    is dropped silently (LLDP and the like never reach this far).
//! 2. ARP frames go to the proxy responder and are never forwarded.
//! 3. IPv4 traffic carrying a TCP or UDP segment is flow-classified: a
//!    cached path is reused if one exists for the 5-tuple (or its
//!    reverse), otherwise a fresh shortest path is computed, cached, and
//!    installed hop by hop.
//! 4. Everything else IPv4 (ICMP and so on) gets a single learned L2
//!    shortcut installed on the ingress switch only, the way a plain
//!    learning switch would.
//!
//! Unknown destinations (no host known for the target MAC/IP) are always
//! a silent drop — this controller never floods.

use crate::arp_proxy;
use crate::codec::ethernet::{Ethernet, ETHERTYPE_ARP, ETHERTYPE_IPV4};
use crate::codec::ipv4::{Ipv4, PROTO_TCP, PROTO_UDP};
use crate::codec::openflow::{Action, OfMessage, PacketIn, PacketOut, NO_BUFFER};
use crate::codec::tcp::Tcp;
use crate::codec::udp::Udp;
use crate::codec::{arp::Arp, ethernet};
use crate::flow_installer;
use crate::path::{CachedPath, FlowCache, PathEngine};
use crate::topology::TopologyStore;
use sdn_datatypes::port::reserved;
use sdn_datatypes::{Dpid, FiveTuple, PortNo};

/// A message this controller must send to some switch, possibly not the
/// one the triggering `PacketIn` arrived from — installing a routed path
/// touches every switch along it.
pub struct Outbound {
    pub dpid: Dpid,
    pub message: OfMessage,
}

pub struct Dispatcher<'a> {
    pub topology: &'a TopologyStore,
    pub paths: &'a PathEngine,
    pub flow_cache: &'a FlowCache,
}

impl<'a> Dispatcher<'a> {
    /// Processes one `PacketIn` from `dpid`, returning every message that
    /// needs to go out as a result (flow-mods and the immediate
    /// packet-out). An empty result means the frame was silently dropped.
    pub async fn handle_packet_in(&self, dpid: Dpid, pi: &PacketIn, next_xid: impl Fn() -> u32) -> Vec<Outbound> {
        let in_port = PortNo(pi.in_port);
        let eth = match Ethernet::parse(&pi.data) {
            Ok(eth) => eth,
            Err(_) => return Vec::new(),
        };

        match eth.ethertype {
            ETHERTYPE_ARP => self.handle_arp(dpid, in_port, pi, &eth, &next_xid).await,
            ETHERTYPE_IPV4 => self.handle_ipv4(dpid, in_port, pi, &eth, &next_xid).await,
            _ => Vec::new(),
        }
    }

    async fn handle_arp(
        &self,
        dpid: Dpid,
        in_port: PortNo,
        pi: &PacketIn,
        eth: &Ethernet,
        next_xid: &impl Fn() -> u32,
    ) -> Vec<Outbound> {
        let arp_pkt = match Arp::parse(&pi.data[ethernet::HDR_LEN..]) {
            Ok(a) => a,
            Err(_) => return Vec::new(),
        };
        let (mac, ip) = arp_proxy::sender_observation(&arp_pkt);
        self.topology.observe_host(mac, Some(ip), (dpid, in_port)).await;

        match arp_proxy::handle_arp(self.topology, dpid, in_port, eth, &arp_pkt).await {
            Some(reply) => vec![Outbound {
                dpid,
                message: OfMessage::PacketOut(PacketOut {
                    xid: next_xid(),
                    buffer_id: NO_BUFFER,
                    in_port: reserved::CONTROLLER,
                    actions: vec![Action::Output {
                        port: reply.out_port.0,
                        max_len: 0,
                    }],
                    data: reply.frame,
                }),
            }],
            // Unknown target, or a reply rather than a request: nothing to
            // send. ARP replies still update host-learning above; they're
            // never forwarded.
            None => Vec::new(),
        }
    }

    async fn handle_ipv4(
        &self,
        dpid: Dpid,
        in_port: PortNo,
        pi: &PacketIn,
        eth: &Ethernet,
        next_xid: &impl Fn() -> u32,
    ) -> Vec<Outbound> {
        let payload = eth_payload(pi);
        let ip = match Ipv4::parse(payload) {
            Ok(ip) => ip,
            Err(_) => return Vec::new(),
        };
        self.topology.observe_host(eth.src, Some(ip.src), (dpid, in_port)).await;

        match ip.proto {
            PROTO_TCP | PROTO_UDP => self.handle_flow_classified(dpid, pi, eth, &ip, payload, next_xid).await,
            _ => self.handle_l2(dpid, pi, eth, next_xid).await,
        }
    }

    /// The flow-classified branch for TCP/UDP traffic.
    async fn handle_flow_classified(
        &self,
        dpid: Dpid,
        pi: &PacketIn,
        eth: &Ethernet,
        ip: &Ipv4,
        payload: &[u8],
        next_xid: &impl Fn() -> u32,
    ) -> Vec<Outbound> {
        let l4 = &payload[ip.header_len()..];
        let (src_port, dst_port) = match ip.proto {
            PROTO_TCP => Tcp::parse(l4).map(|t| (t.src_port, t.dst_port)).unwrap_or((0, 0)),
            PROTO_UDP => Udp::parse(l4).map(|u| (u.src_port, u.dst_port)).unwrap_or((0, 0)),
            _ => (0, 0),
        };
        let flow = FiveTuple::new(ip.proto, ip.src, ip.dst, src_port, dst_port);
        let key = flow.canonical();

        let dst_host = match self.topology.find_host_by_mac(eth.dst).await {
            Some(h) => h,
            None => return Vec::new(),
        };
        let egress_switch = dst_host.attachment.0;
        let egress_port = dst_host.attachment.1;

        // Case A: ingress is egress. One flow-mod, one packet-out, no path
        // lookup or caching needed.
        if dpid == egress_switch {
            return self
                .install_flow_path(dpid, pi, &flow, &[dpid], egress_port, next_xid)
                .await;
        }

        // Case B: try the cache (hit on either the forward or the reverse
        // 5-tuple — `key` is already direction-agnostic).
        let mut hops = None;
        if let Some(cached) = self.flow_cache.get(&key) {
            hops = hops_towards(&cached, dpid, egress_switch);
            if hops.is_none() {
                // This switch isn't actually on the cached path (it moved,
                // or the cache is stale for some other reason): drop the
                // entry and fall through to Case C.
                self.flow_cache.remove(&key);
            }
        }

        // Case C: compute and cache a fresh shortest path.
        let hops = match hops {
            Some(h) => h,
            None => {
                let path = match self.paths.pick_path(self.topology, dpid, egress_switch).await {
                    Ok(p) => p,
                    Err(_) => return Vec::new(),
                };
                self.flow_cache.insert(key, path.clone());
                path
            }
        };

        self.install_flow_path(dpid, pi, &flow, &hops, egress_port, next_xid).await
    }

    /// Installs a priority-1000 flow-mod at every remaining hop starting
    /// from `dpid`, in order, and emits the immediate packet-out at the
    /// ingress switch. `hops` is ordered from `dpid` to the egress switch,
    /// inclusive of both.
    async fn install_flow_path(
        &self,
        dpid: Dpid,
        pi: &PacketIn,
        flow: &FiveTuple,
        hops: &[Dpid],
        egress_port: PortNo,
        next_xid: &impl Fn() -> u32,
    ) -> Vec<Outbound> {
        let mut out = Vec::new();
        for (i, &hop) in hops.iter().enumerate() {
            let out_port = if i + 1 < hops.len() {
                match self.egress_port_towards(hop, hops[i + 1]).await {
                    Some(p) => p,
                    // Link not yet learned for this hop: stop installing
                    // further out and let the next packet-in for this flow
                    // retry once the link is known.
                    None => break,
                }
            } else {
                egress_port
            };
            out.push(Outbound {
                dpid: hop,
                message: OfMessage::FlowMod(flow_installer::flow_forward(next_xid(), flow, out_port)),
            });
            if hop == dpid {
                out.push(Outbound {
                    dpid,
                    message: OfMessage::PacketOut(PacketOut {
                        xid: next_xid(),
                        buffer_id: pi.buffer_id,
                        in_port: reserved::CONTROLLER,
                        actions: vec![Action::Output {
                            port: out_port.0,
                            max_len: 0,
                        }],
                        data: if pi.buffer_id == NO_BUFFER { pi.data.clone() } else { Vec::new() },
                    }),
                });
            }
        }
        out
    }

    /// The L2 branch for IPv4 traffic that isn't TCP/UDP. No
    /// flow cache involved — every packet-in recomputes the next hop, and
    /// only the ingress switch gets a rule (each downstream switch learns
    /// its own shortcut the next time it sees a packet-in for this MAC).
    async fn handle_l2(
        &self,
        dpid: Dpid,
        pi: &PacketIn,
        eth: &Ethernet,
        next_xid: &impl Fn() -> u32,
    ) -> Vec<Outbound> {
        let dst_host = match self.topology.find_host_by_mac(eth.dst).await {
            Some(h) => h,
            None => return Vec::new(),
        };
        let egress_switch = dst_host.attachment.0;
        let egress_port = dst_host.attachment.1;

        let out_port = if dpid == egress_switch {
            Some(egress_port)
        } else {
            match self.paths.pick_path(self.topology, dpid, egress_switch).await {
                Ok(path) if path.len() >= 2 => self.egress_port_towards(dpid, path[1]).await,
                _ => None,
            }
        };
        let Some(out_port) = out_port else {
            return Vec::new();
        };

        vec![
            Outbound {
                dpid,
                message: OfMessage::FlowMod(flow_installer::l2_forward(next_xid(), eth.dst, out_port)),
            },
            Outbound {
                dpid,
                message: OfMessage::PacketOut(PacketOut {
                    xid: next_xid(),
                    buffer_id: pi.buffer_id,
                    in_port: reserved::CONTROLLER,
                    actions: vec![Action::Output {
                        port: out_port.0,
                        max_len: 0,
                    }],
                    data: if pi.buffer_id == NO_BUFFER { pi.data.clone() } else { Vec::new() },
                }),
            },
        ]
    }

    /// Finds the port on `dpid` whose link leads to `next_dpid`.
    async fn egress_port_towards(&self, dpid: Dpid, next_dpid: Dpid) -> Option<PortNo> {
        self.topology
            .iter_links()
            .await
            .into_iter()
            .find(|link| link.src.0 == dpid && link.dst.0 == next_dpid)
            .map(|link| link.src.1)
    }
}

/// The sub-sequence of `cached`'s path from `dpid` towards `egress_switch`,
/// in travel order. `egress_switch` may be either endpoint of the cached
/// path — a hit on the reverse 5-tuple resolves to the same cache entry,
/// so the path has to be walked back to front for that direction.
/// `None` if `dpid` isn't on the path at all, or if `egress_switch` is
/// neither endpoint (a stale entry).
fn hops_towards(cached: &CachedPath, dpid: Dpid, egress_switch: Dpid) -> Option<Vec<Dpid>> {
    let path = cached.path();
    let pos = path.iter().position(|&d| d == dpid)?;
    if path.last() == Some(&egress_switch) {
        Some(path[pos..].to_vec())
    } else if path.first() == Some(&egress_switch) {
        Some(path[..=pos].iter().rev().copied().collect())
    } else {
        None
    }
}

fn eth_payload(pi: &PacketIn) -> &[u8] {
    &pi.data[ethernet::HDR_LEN..]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::arp::{self, Arp};
    use crate::codec::ethernet::Ethernet;
    use crate::config::{CostProtocol, DEFAULT_REF_BW};
    use crate::path::FlowCache;
    use sdn_datatypes::{MacAddr, PortInfo};
    use std::sync::atomic::{AtomicU32, Ordering};

    fn xid_source() -> impl Fn() -> u32 {
        let counter = AtomicU32::new(1);
        move || counter.fetch_add(1, Ordering::Relaxed)
    }

    fn arp_request_frame(sha: MacAddr, spa: &str, tpa: &str) -> Vec<u8> {
        let eth = Ethernet {
            dst: MacAddr::new(0xff, 0xff, 0xff, 0xff, 0xff, 0xff),
            src: sha,
            ethertype: ETHERTYPE_ARP,
        };
        let arp_pkt = Arp {
            opcode: arp::OPCODE_REQUEST,
            sha,
            spa: spa.parse().unwrap(),
            tha: MacAddr::new(0, 0, 0, 0, 0, 0),
            tpa: tpa.parse().unwrap(),
        };
        let mut frame = Vec::new();
        eth.write(&mut frame);
        arp_pkt.write(&mut frame);
        frame
    }

    fn ipv4_udp_frame(src_mac: MacAddr, dst_mac: MacAddr, src_ip: &str, dst_ip: &str, src_port: u16, dst_port: u16) -> Vec<u8> {
        use crate::codec::ipv4::PROTO_UDP;
        use byteorder::{BigEndian, ByteOrder};

        let eth = Ethernet {
            dst: dst_mac,
            src: src_mac,
            ethertype: ETHERTYPE_IPV4,
        };
        let mut frame = Vec::new();
        eth.write(&mut frame);

        let payload = b"hello";
        let mut udp = vec![0u8; 8 + payload.len()];
        BigEndian::write_u16(&mut udp[0..2], src_port);
        BigEndian::write_u16(&mut udp[2..4], dst_port);
        BigEndian::write_u16(&mut udp[4..6], udp.len() as u16);
        udp[8..].copy_from_slice(payload);

        let mut ip = vec![0u8; 20];
        ip[0] = 0x45;
        BigEndian::write_u16(&mut ip[2..4], (20 + udp.len()) as u16);
        ip[9] = PROTO_UDP;
        let src: std::net::Ipv4Addr = src_ip.parse().unwrap();
        let dst: std::net::Ipv4Addr = dst_ip.parse().unwrap();
        ip[12..16].copy_from_slice(&src.octets());
        ip[16..20].copy_from_slice(&dst.octets());

        frame.extend_from_slice(&ip);
        frame.extend_from_slice(&udp);
        frame
    }

    #[tokio::test]
    async fn unknown_arp_target_is_dropped_not_flooded() {
        let topology = TopologyStore::new();
        let dpid = Dpid(1);
        topology.add_switch(dpid).await;
        let paths = PathEngine::new(CostProtocol::Hop, DEFAULT_REF_BW, Some(0));
        let flow_cache = FlowCache::new();
        let dispatcher = Dispatcher {
            topology: &topology,
            paths: &paths,
            flow_cache: &flow_cache,
        };

        let requester = MacAddr::new(0xaa, 0, 0, 0, 0, 1);
        let pi = PacketIn {
            xid: 1,
            buffer_id: NO_BUFFER,
            in_port: 1,
            data: arp_request_frame(requester, "10.0.0.1", "10.0.0.99"),
        };

        let out = dispatcher.handle_packet_in(dpid, &pi, xid_source()).await;
        assert!(out.is_empty());
    }

    #[tokio::test]
    async fn arp_request_for_known_host_gets_a_direct_reply() {
        let topology = TopologyStore::new();
        let dpid = Dpid(1);
        topology.add_switch(dpid).await;
        let target_mac = MacAddr::new(0xbb, 0, 0, 0, 0, 2);
        topology
            .observe_host(target_mac, Some("10.0.0.2".parse().unwrap()), (dpid, PortNo(2)))
            .await;
        let paths = PathEngine::new(CostProtocol::Hop, DEFAULT_REF_BW, Some(0));
        let flow_cache = FlowCache::new();
        let dispatcher = Dispatcher {
            topology: &topology,
            paths: &paths,
            flow_cache: &flow_cache,
        };

        let requester = MacAddr::new(0xaa, 0, 0, 0, 0, 1);
        let pi = PacketIn {
            xid: 1,
            buffer_id: NO_BUFFER,
            in_port: 1,
            data: arp_request_frame(requester, "10.0.0.1", "10.0.0.2"),
        };

        let out = dispatcher.handle_packet_in(dpid, &pi, xid_source()).await;
        assert_eq!(out.len(), 1);
        match &out[0].message {
            OfMessage::PacketOut(po) => {
                assert_eq!(po.actions, vec![Action::Output { port: 1, max_len: 0 }]);
            }
            other => panic!("expected a packet-out, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn single_hop_udp_installs_one_flow_mod_and_one_packet_out() {
        let topology = TopologyStore::new();
        let dpid = Dpid(1);
        topology.add_switch(dpid).await;
        let h1 = MacAddr::new(0xaa, 0, 0, 0, 0, 1);
        let h2 = MacAddr::new(0xaa, 0, 0, 0, 0, 2);
        topology
            .observe_host(h2, Some("10.0.0.2".parse().unwrap()), (dpid, PortNo(2)))
            .await;
        let paths = PathEngine::new(CostProtocol::Hop, DEFAULT_REF_BW, Some(0));
        let flow_cache = FlowCache::new();
        let dispatcher = Dispatcher {
            topology: &topology,
            paths: &paths,
            flow_cache: &flow_cache,
        };

        let pi = PacketIn {
            xid: 1,
            buffer_id: NO_BUFFER,
            in_port: 1,
            data: ipv4_udp_frame(h1, h2, "10.0.0.1", "10.0.0.2", 5000, 80),
        };

        let out = dispatcher.handle_packet_in(dpid, &pi, xid_source()).await;
        assert_eq!(out.len(), 2);
        assert!(matches!(out[0].message, OfMessage::FlowMod(_)));
        assert!(matches!(out[1].message, OfMessage::PacketOut(_)));
        // Ingress == egress switch is Case A: no path lookup, so nothing
        // is cached.
        assert!(flow_cache.is_empty());
    }

    #[tokio::test]
    async fn two_hop_flow_installs_at_both_switches_and_reuses_for_reverse() {
        let topology = TopologyStore::new();
        let s1 = Dpid(1);
        let s2 = Dpid(2);
        topology.add_switch(s1).await;
        topology.add_switch(s2).await;
        topology
            .set_port(s1, PortNo(2), PortInfo::new(MacAddr::new(0, 0, 0, 0, 0, 1), 1_000_000_000, true, true))
            .await;
        topology
            .set_port(s2, PortNo(2), PortInfo::new(MacAddr::new(0, 0, 0, 0, 0, 2), 1_000_000_000, true, true))
            .await;
        topology.upsert_link((s1, PortNo(2)), (s2, PortNo(2))).await;

        let h1 = MacAddr::new(0xaa, 0, 0, 0, 0, 1);
        let h2 = MacAddr::new(0xaa, 0, 0, 0, 0, 2);
        topology
            .observe_host(h1, Some("10.0.0.1".parse().unwrap()), (s1, PortNo(1)))
            .await;
        topology
            .observe_host(h2, Some("10.0.0.2".parse().unwrap()), (s2, PortNo(1)))
            .await;

        let paths = PathEngine::new(CostProtocol::Hop, DEFAULT_REF_BW, Some(0));
        let flow_cache = FlowCache::new();
        let dispatcher = Dispatcher {
            topology: &topology,
            paths: &paths,
            flow_cache: &flow_cache,
        };

        let fwd_pi = PacketIn {
            xid: 1,
            buffer_id: NO_BUFFER,
            in_port: 1,
            data: ipv4_udp_frame(h1, h2, "10.0.0.1", "10.0.0.2", 5000, 80),
        };
        let out = dispatcher.handle_packet_in(s1, &fwd_pi, xid_source()).await;
        // s1 installs its flow-mod + packet-out, s2 gets a flow-mod too.
        assert_eq!(out.len(), 3);
        assert_eq!(flow_cache.len(), 1);

        let rev_pi = PacketIn {
            xid: 2,
            buffer_id: NO_BUFFER,
            in_port: 1,
            data: ipv4_udp_frame(h2, h1, "10.0.0.2", "10.0.0.1", 80, 5000),
        };
        let out = dispatcher.handle_packet_in(s2, &rev_pi, xid_source()).await;
        // Reverse traffic hits s2 first: no fresh Dijkstra run, the cached
        // path is walked back to front. s2 (the ingress for this
        // direction) gets a flow-mod towards s1 plus the immediate
        // packet-out; s1 gets its flow-mod pre-installed towards h1.
        assert_eq!(flow_cache.len(), 1);
        assert_eq!(out.len(), 3);
        let s2_flow_mod = out
            .iter()
            .find(|o| o.dpid == s2 && matches!(o.message, OfMessage::FlowMod(_)))
            .unwrap();
        match &s2_flow_mod.message {
            OfMessage::FlowMod(fm) => assert_eq!(fm.actions, vec![Action::Output { port: 2, max_len: 0 }]),
            _ => unreachable!(),
        }
        let s1_flow_mod = out
            .iter()
            .find(|o| o.dpid == s1 && matches!(o.message, OfMessage::FlowMod(_)))
            .unwrap();
        match &s1_flow_mod.message {
            OfMessage::FlowMod(fm) => assert_eq!(fm.actions, vec![Action::Output { port: 1, max_len: 0 }]),
            _ => unreachable!(),
        }
        assert!(out.iter().any(|o| o.dpid == s2 && matches!(o.message, OfMessage::PacketOut(_))));
    }

    #[tokio::test]
    async fn unknown_destination_ip_traffic_is_dropped() {
        let topology = TopologyStore::new();
        let dpid = Dpid(1);
        topology.add_switch(dpid).await;
        let paths = PathEngine::new(CostProtocol::Hop, DEFAULT_REF_BW, Some(0));
        let flow_cache = FlowCache::new();
        let dispatcher = Dispatcher {
            topology: &topology,
            paths: &paths,
            flow_cache: &flow_cache,
        };

        let h1 = MacAddr::new(0xaa, 0, 0, 0, 0, 1);
        let unknown = MacAddr::new(0xaa, 0, 0, 0, 0, 99);
        let pi = PacketIn {
            xid: 1,
            buffer_id: NO_BUFFER,
            in_port: 1,
            data: ipv4_udp_frame(h1, unknown, "10.0.0.1", "10.0.0.99", 5000, 80),
        };

        let out = dispatcher.handle_packet_in(dpid, &pi, xid_source()).await;
        assert!(out.is_empty());
    }
}
