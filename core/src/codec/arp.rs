//! ARP packet header (RFC 826), restricted to the Ethernet/IPv4 case the
//! proxy-ARP responder needs.

use super::{need, CodecError};
use byteorder::{BigEndian, ByteOrder};
use pnet::util::MacAddr;
use std::net::Ipv4Addr;

pub const HDR_LEN: usize = 28;

pub const HTYPE_ETHERNET: u16 = 1;
pub const PTYPE_IPV4: u16 = 0x0800;

pub const OPCODE_REQUEST: u16 = 1;
pub const OPCODE_REPLY: u16 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Arp {
    pub opcode: u16,
    /// Sender hardware address.
    pub sha: MacAddr,
    /// Sender protocol (IPv4) address.
    pub spa: Ipv4Addr,
    /// Target hardware address.
    pub tha: MacAddr,
    /// Target protocol (IPv4) address.
    pub tpa: Ipv4Addr,
}

impl Arp {
    pub fn parse(buf: &[u8]) -> Result<Self, CodecError> {
        need(buf, HDR_LEN).map_err(|_| CodecError::MalformedArp)?;
        let htype = BigEndian::read_u16(&buf[0..2]);
        let ptype = BigEndian::read_u16(&buf[2..4]);
        let hlen = buf[4];
        let plen = buf[5];
        if htype != HTYPE_ETHERNET || ptype != PTYPE_IPV4 || hlen != 6 || plen != 4 {
            return Err(CodecError::MalformedArp);
        }
        Ok(Arp {
            opcode: BigEndian::read_u16(&buf[6..8]),
            sha: mac(&buf[8..14]),
            spa: ipv4(&buf[14..18]),
            tha: mac(&buf[18..24]),
            tpa: ipv4(&buf[24..28]),
        })
    }

    pub fn write(&self, out: &mut Vec<u8>) {
        let mut field = [0u8; 2];
        BigEndian::write_u16(&mut field, HTYPE_ETHERNET);
        out.extend_from_slice(&field);
        BigEndian::write_u16(&mut field, PTYPE_IPV4);
        out.extend_from_slice(&field);
        out.push(6);
        out.push(4);
        BigEndian::write_u16(&mut field, self.opcode);
        out.extend_from_slice(&field);
        out.extend_from_slice(&[
            self.sha.0, self.sha.1, self.sha.2, self.sha.3, self.sha.4, self.sha.5,
        ]);
        out.extend_from_slice(&self.spa.octets());
        out.extend_from_slice(&[
            self.tha.0, self.tha.1, self.tha.2, self.tha.3, self.tha.4, self.tha.5,
        ]);
        out.extend_from_slice(&self.tpa.octets());
    }
}

fn mac(b: &[u8]) -> MacAddr {
    MacAddr::new(b[0], b[1], b[2], b[3], b[4], b[5])
}

fn ipv4(b: &[u8]) -> Ipv4Addr {
    Ipv4Addr::new(b[0], b[1], b[2], b[3])
}
