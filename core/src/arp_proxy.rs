//! Proxy ARP: answer ARP requests for known hosts out of the topology
//! store instead of flooding them.

use crate::codec::arp::{self, Arp};
use crate::codec::ethernet::{self, Ethernet};
use sdn_datatypes::{Dpid, MacAddr, PortNo};
use std::net::Ipv4Addr;

use crate::topology::TopologyStore;

/// A fully-formed Ethernet frame ready for `PacketOut`, and the switch
/// port the dispatcher should emit it on (always the port the request
/// arrived on).
pub struct ArpReply {
    pub frame: Vec<u8>,
    pub out_port: PortNo,
}

/// Builds a proxy ARP reply for `request`, arriving on `in_port` of
/// `dpid`, if the target IP resolves to a known host. Returns `None`
/// when the target is unknown (the caller drops the request silently —
/// this controller never floods) or the frame isn't an ARP request.
pub async fn handle_arp(
    topology: &TopologyStore,
    dpid: Dpid,
    in_port: PortNo,
    eth: &Ethernet,
    arp_pkt: &Arp,
) -> Option<ArpReply> {
    let _ = dpid;
    if arp_pkt.opcode != arp::OPCODE_REQUEST {
        return None;
    }
    let target = topology.find_host_by_ip(arp_pkt.tpa).await?;

    let reply_eth = Ethernet {
        dst: eth.src,
        src: target.mac,
        ethertype: ethernet::ETHERTYPE_ARP,
    };
    let reply_arp = Arp {
        opcode: arp::OPCODE_REPLY,
        sha: target.mac,
        spa: arp_pkt.tpa,
        tha: arp_pkt.sha,
        tpa: arp_pkt.spa,
    };

    let mut frame = Vec::with_capacity(ethernet::HDR_LEN + arp::HDR_LEN);
    reply_eth.write(&mut frame);
    reply_arp.write(&mut frame);

    Some(ArpReply {
        frame,
        out_port: in_port,
    })
}

/// Whatever IPv4 address and MAC the ARP packet lets us learn about its
/// sender, regardless of request/reply — used to feed host-learning in
/// the dispatcher: ARP updates the host table but is never itself
/// forwarded beyond the proxy reply.
pub fn sender_observation(arp_pkt: &Arp) -> (MacAddr, Ipv4Addr) {
    (arp_pkt.sha, arp_pkt.spa)
}
