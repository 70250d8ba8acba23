//! Host records held by the topology store.

use crate::{Dpid, MacAddr, PortNo};
use std::collections::HashSet;
use std::net::Ipv4Addr;

/// An end host discovered by packet-in or ARP traffic.
///
/// The host IP set accumulates every observation rather than replacing it: the
/// IP set is the union of every IPv4 address observed for this MAC, either
/// as an ARP sender/target or as an IPv4 packet-in source. The attachment
/// point always reflects the most recent observation.
#[derive(Debug, Clone)]
pub struct Host {
    pub mac: MacAddr,
    pub ips: HashSet<Ipv4Addr>,
    pub attachment: (Dpid, PortNo),
}

impl Host {
    pub fn new(mac: MacAddr, attachment: (Dpid, PortNo)) -> Self {
        Host {
            mac,
            ips: HashSet::new(),
            attachment,
        }
    }

    /// Records a newly observed attachment point and IP, per the
    /// "latest observation wins" resolution for attachment and the
    /// "union of observed IPs" resolution for addresses.
    pub fn observe(&mut self, ip: Option<Ipv4Addr>, attachment: (Dpid, PortNo)) {
        if let Some(ip) = ip {
            self.ips.insert(ip);
        }
        self.attachment = attachment;
    }
}
