//! IPv4 header, fixed 20-byte form (no options).

use super::{need, CodecError};
use byteorder::{BigEndian, ByteOrder};
use std::net::Ipv4Addr;

pub const MIN_HDR_LEN: usize = 20;

pub const PROTO_TCP: u8 = 6;
pub const PROTO_UDP: u8 = 17;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ipv4 {
    pub ihl: u8,
    pub total_length: u16,
    pub proto: u8,
    pub src: Ipv4Addr,
    pub dst: Ipv4Addr,
}

impl Ipv4 {
    pub fn parse(buf: &[u8]) -> Result<Self, CodecError> {
        need(buf, MIN_HDR_LEN).map_err(|_| CodecError::MalformedIpv4)?;
        let version = buf[0] >> 4;
        let ihl = buf[0] & 0x0f;
        if version != 4 || ihl < 5 {
            return Err(CodecError::MalformedIpv4);
        }
        need(buf, (ihl as usize) * 4).map_err(|_| CodecError::MalformedIpv4)?;
        Ok(Ipv4 {
            ihl,
            total_length: BigEndian::read_u16(&buf[2..4]),
            proto: buf[9],
            src: Ipv4Addr::new(buf[12], buf[13], buf[14], buf[15]),
            dst: Ipv4Addr::new(buf[16], buf[17], buf[18], buf[19]),
        })
    }

    /// Offset from the start of this header to the start of its payload.
    pub fn header_len(&self) -> usize {
        self.ihl as usize * 4
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build(proto: u8) -> Vec<u8> {
        let mut buf = vec![0u8; MIN_HDR_LEN];
        buf[0] = 0x45; // version 4, ihl 5
        BigEndian::write_u16(&mut buf[2..4], MIN_HDR_LEN as u16);
        buf[9] = proto;
        buf[12..16].copy_from_slice(&[10, 0, 0, 1]);
        buf[16..20].copy_from_slice(&[10, 0, 0, 2]);
        buf
    }

    #[test]
    fn parses_tcp_header() {
        let buf = build(PROTO_TCP);
        let ip = Ipv4::parse(&buf).unwrap();
        assert_eq!(ip.proto, PROTO_TCP);
        assert_eq!(ip.src, Ipv4Addr::new(10, 0, 0, 1));
        assert_eq!(ip.dst, Ipv4Addr::new(10, 0, 0, 2));
        assert_eq!(ip.header_len(), 20);
    }

    #[test]
    fn rejects_non_ipv4_version() {
        let mut buf = build(PROTO_TCP);
        buf[0] = 0x65;
        assert!(Ipv4::parse(&buf).is_err());
    }
}
