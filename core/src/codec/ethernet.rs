//! Ethernet II frame header.

use super::{need, CodecError};
use byteorder::{BigEndian, ByteOrder};
use pnet::util::MacAddr;

pub const HDR_LEN: usize = 14;

pub const ETHERTYPE_IPV4: u16 = 0x0800;
pub const ETHERTYPE_ARP: u16 = 0x0806;

/// A parsed Ethernet II header. `payload_offset` is always [`HDR_LEN`];
/// VLAN tagging is not supported, so a tagged frame's ethertype reads as
/// the 0x8100 tag itself and the dispatcher drops it as unrecognized.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ethernet {
    pub dst: MacAddr,
    pub src: MacAddr,
    pub ethertype: u16,
}

impl Ethernet {
    pub fn parse(buf: &[u8]) -> Result<Self, CodecError> {
        need(buf, HDR_LEN).map_err(|_| CodecError::MalformedEthernet)?;
        Ok(Ethernet {
            dst: mac_from_bytes(&buf[0..6]),
            src: mac_from_bytes(&buf[6..12]),
            ethertype: BigEndian::read_u16(&buf[12..14]),
        })
    }

    pub fn write(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.dst.octets());
        out.extend_from_slice(&self.src.octets());
        let mut ty = [0u8; 2];
        BigEndian::write_u16(&mut ty, self.ethertype);
        out.extend_from_slice(&ty);
    }
}

fn mac_from_bytes(b: &[u8]) -> MacAddr {
    MacAddr::new(b[0], b[1], b[2], b[3], b[4], b[5])
}

trait MacAddrExt {
    fn octets(&self) -> [u8; 6];
}

impl MacAddrExt for MacAddr {
    fn octets(&self) -> [u8; 6] {
        [self.0, self.1, self.2, self.3, self.4, self.5]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips() {
        let eth = Ethernet {
            dst: MacAddr::new(0xaa, 0, 0, 0, 0, 1),
            src: MacAddr::new(0xaa, 0, 0, 0, 0, 2),
            ethertype: ETHERTYPE_IPV4,
        };
        let mut buf = vec![];
        eth.write(&mut buf);
        assert_eq!(buf.len(), HDR_LEN);
        assert_eq!(Ethernet::parse(&buf).unwrap(), eth);
    }

    #[test]
    fn rejects_truncated_frame() {
        let buf = [0u8; 10];
        assert_eq!(Ethernet::parse(&buf), Err(CodecError::MalformedEthernet));
    }
}
