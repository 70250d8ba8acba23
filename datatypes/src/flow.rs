//! Flow identifiers: the 5-tuple of a TCP/UDP conversation, and the
//! canonicalized cache key derived from it.
//!
//! Modeled on `retina-core`'s `FiveTuple`/`ConnId` split: `FiveTuple` keeps
//! the direction a particular packet traveled in, while the canonical key
//! collapses a tuple and its reverse onto the same cache slot in O(1)
//! without a linear scan over cached flows.

use std::cmp::Ordering;
use std::fmt;
use std::net::Ipv4Addr;

pub const TCP_PROTOCOL: u8 = 6;
pub const UDP_PROTOCOL: u8 = 17;

/// A TCP/UDP flow 5-tuple as observed on a particular packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FiveTuple {
    pub ip_proto: u8,
    pub src_ip: Ipv4Addr,
    pub dst_ip: Ipv4Addr,
    pub src_port: u16,
    pub dst_port: u16,
}

impl FiveTuple {
    pub fn new(ip_proto: u8, src_ip: Ipv4Addr, dst_ip: Ipv4Addr, src_port: u16, dst_port: u16) -> Self {
        FiveTuple {
            ip_proto,
            src_ip,
            dst_ip,
            src_port,
            dst_port,
        }
    }

    /// The tuple of the opposite-direction traffic for the same conversation.
    pub fn reversed(&self) -> FiveTuple {
        FiveTuple {
            ip_proto: self.ip_proto,
            src_ip: self.dst_ip,
            dst_ip: self.src_ip,
            src_port: self.dst_port,
            dst_port: self.src_port,
        }
    }

    /// Collapses this tuple and its reverse onto one cache key.
    pub fn canonical(&self) -> CanonicalFlowKey {
        CanonicalFlowKey::from_five_tuple(self)
    }
}

impl fmt::Display for FiveTuple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{} -> {}:{} (proto {})",
            self.src_ip, self.src_port, self.dst_ip, self.dst_port, self.ip_proto
        )
    }
}

/// Non-directional flow identifier: a 5-tuple and its reverse both hash to
/// the same `CanonicalFlowKey`, since the endpoint pair is ordered before
/// hashing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CanonicalFlowKey {
    lo: (Ipv4Addr, u16),
    hi: (Ipv4Addr, u16),
    ip_proto: u8,
}

impl CanonicalFlowKey {
    pub fn from_five_tuple(ft: &FiveTuple) -> Self {
        let a = (ft.src_ip, ft.src_port);
        let b = (ft.dst_ip, ft.dst_port);
        let (lo, hi) = if cmp_endpoint(&a, &b) == Ordering::Greater {
            (a, b)
        } else {
            (b, a)
        };
        CanonicalFlowKey {
            lo,
            hi,
            ip_proto: ft.ip_proto,
        }
    }
}

fn cmp_endpoint(a: &(Ipv4Addr, u16), b: &(Ipv4Addr, u16)) -> Ordering {
    a.0.octets().cmp(&b.0.octets()).then(a.1.cmp(&b.1))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tuple(src_ip: &str, src_port: u16, dst_ip: &str, dst_port: u16) -> FiveTuple {
        FiveTuple::new(
            TCP_PROTOCOL,
            src_ip.parse().unwrap(),
            dst_ip.parse().unwrap(),
            src_port,
            dst_port,
        )
    }

    #[test]
    fn forward_and_reverse_share_a_canonical_key() {
        let fwd = tuple("10.0.0.1", 5000, "10.0.0.2", 80);
        let rev = fwd.reversed();
        assert_eq!(fwd.canonical(), rev.canonical());
    }

    #[test]
    fn differing_flows_get_differing_keys() {
        let a = tuple("10.0.0.1", 5000, "10.0.0.2", 80);
        let b = tuple("10.0.0.1", 5001, "10.0.0.2", 80);
        assert_ne!(a.canonical(), b.canonical());
    }
}
