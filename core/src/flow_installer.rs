//! Builds the `FlowMod` messages the controller installs, at the four
//! priorities named below: default table-miss (1), TCP/UDP-to-
//! controller defaults (100), L2 learning fallback (5), and per-flow
//! forwarding entries matched on the full 5-tuple (1000).

use crate::codec::ethernet::ETHERTYPE_IPV4;
use crate::codec::ipv4::{PROTO_TCP, PROTO_UDP};
use crate::codec::openflow::{Action, FlowMod, Match, FC_ADD, NO_BUFFER_MAX_LEN};
use sdn_datatypes::port::reserved;
use sdn_datatypes::{FiveTuple, PortNo};

pub const PRIORITY_TABLE_MISS: u16 = 1;
pub const PRIORITY_L2_LEARNED: u16 = 5;
pub const PRIORITY_DEFAULT_TO_CONTROLLER: u16 = 100;
pub const PRIORITY_FLOW: u16 = 1000;

/// Sends every unmatched packet to the controller. Installed once per
/// switch, right after the handshake completes. This is the `*` default
/// and also what catches ARP before it reaches any L2 entry.
pub fn table_miss(xid: u32) -> FlowMod {
    FlowMod {
        xid,
        priority: PRIORITY_TABLE_MISS,
        table_id: 0,
        command: FC_ADD,
        buffer_id: crate::codec::openflow::NO_BUFFER,
        r#match: Match::default(),
        actions: vec![Action::Output {
            port: reserved::CONTROLLER,
            max_len: NO_BUFFER_MAX_LEN,
        }],
    }
}

fn default_to_controller(xid: u32, ip_proto: u8) -> FlowMod {
    FlowMod {
        xid,
        priority: PRIORITY_DEFAULT_TO_CONTROLLER,
        table_id: 0,
        command: FC_ADD,
        buffer_id: crate::codec::openflow::NO_BUFFER,
        r#match: Match {
            eth_type: Some(ETHERTYPE_IPV4),
            ip_proto: Some(ip_proto),
            ..Default::default()
        },
        actions: vec![Action::Output {
            port: reserved::CONTROLLER,
            max_len: NO_BUFFER_MAX_LEN,
        }],
    }
}

/// `eth_type=IPv4, ip_proto=TCP -> CONTROLLER`, one of the three default
/// entries installed on every new switch.
pub fn tcp_to_controller(xid: u32) -> FlowMod {
    default_to_controller(xid, PROTO_TCP)
}

/// `eth_type=IPv4, ip_proto=UDP -> CONTROLLER`, the other TCP/UDP default.
pub fn udp_to_controller(xid: u32) -> FlowMod {
    default_to_controller(xid, PROTO_UDP)
}

/// A learned L2 forwarding shortcut: frames to `dst_mac` go straight out
/// `out_port` without consulting the controller again. Installed on the
/// Case-C (no flow classification available) branch of the dispatcher.
pub fn l2_forward(xid: u32, dst_mac: sdn_datatypes::MacAddr, out_port: PortNo) -> FlowMod {
    FlowMod {
        xid,
        priority: PRIORITY_L2_LEARNED,
        table_id: 0,
        command: FC_ADD,
        buffer_id: crate::codec::openflow::NO_BUFFER,
        r#match: Match {
            eth_dst: Some(dst_mac),
            ..Default::default()
        },
        actions: vec![Action::Output {
            port: out_port.0,
            max_len: 0,
        }],
    }
}

/// A per-flow forwarding entry matched on the full 5-tuple, installed at
/// every hop of a routed path once it's been computed.
pub fn flow_forward(xid: u32, flow: &FiveTuple, out_port: PortNo) -> FlowMod {
    let mut r#match = Match {
        eth_type: Some(crate::codec::ethernet::ETHERTYPE_IPV4),
        ip_proto: Some(flow.ip_proto),
        ipv4_src: Some(flow.src_ip),
        ipv4_dst: Some(flow.dst_ip),
        ..Default::default()
    };
    match flow.ip_proto {
        sdn_datatypes::flow::TCP_PROTOCOL => {
            r#match.tcp_src = Some(flow.src_port);
            r#match.tcp_dst = Some(flow.dst_port);
        }
        sdn_datatypes::flow::UDP_PROTOCOL => {
            r#match.udp_src = Some(flow.src_port);
            r#match.udp_dst = Some(flow.dst_port);
        }
        _ => {}
    }
    FlowMod {
        xid,
        priority: PRIORITY_FLOW,
        table_id: 0,
        command: FC_ADD,
        buffer_id: crate::codec::openflow::NO_BUFFER,
        r#match,
        actions: vec![Action::Output {
            port: out_port.0,
            max_len: 0,
        }],
    }
}
