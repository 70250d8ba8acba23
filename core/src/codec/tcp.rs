//! TCP header, just the fields the controller matches on.

use super::{need, CodecError};
use byteorder::{BigEndian, ByteOrder};

pub const MIN_HDR_LEN: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tcp {
    pub src_port: u16,
    pub dst_port: u16,
}

impl Tcp {
    pub fn parse(buf: &[u8]) -> Result<Self, CodecError> {
        need(buf, MIN_HDR_LEN).map_err(|_| CodecError::MalformedTcp)?;
        Ok(Tcp {
            src_port: BigEndian::read_u16(&buf[0..2]),
            dst_port: BigEndian::read_u16(&buf[2..4]),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_ports() {
        let mut buf = vec![0u8; MIN_HDR_LEN];
        BigEndian::write_u16(&mut buf[0..2], 5000);
        BigEndian::write_u16(&mut buf[2..4], 80);
        let tcp = Tcp::parse(&buf).unwrap();
        assert_eq!(tcp.src_port, 5000);
        assert_eq!(tcp.dst_port, 80);
    }
}
