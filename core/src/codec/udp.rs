//! UDP header, just the fields the controller matches on.

use super::{need, CodecError};
use byteorder::{BigEndian, ByteOrder};

pub const HDR_LEN: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Udp {
    pub src_port: u16,
    pub dst_port: u16,
}

impl Udp {
    pub fn parse(buf: &[u8]) -> Result<Self, CodecError> {
        need(buf, HDR_LEN).map_err(|_| CodecError::MalformedUdp)?;
        Ok(Udp {
            src_port: BigEndian::read_u16(&buf[0..2]),
            dst_port: BigEndian::read_u16(&buf[2..4]),
        })
    }
}
