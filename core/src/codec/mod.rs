//! Wire encoding and decoding.
//!
//! Every parser here works directly off a borrowed `&[u8]` rather than a
//! zero-copy packet buffer abstraction: the controller reads whole
//! OpenFlow messages off a `TcpStream` into an owned buffer, so there's no
//! mbuf to parse in place. Big-endian field access goes through
//! `byteorder`.
//!
//! `openflow` implements the OpenFlow 1.3 message catalog this controller
//! needs. `ethernet`/`arp`/`ipv4`/`tcp`/`udp` implement just enough of
//! each header to extract match fields and synthesize ARP replies.

pub mod arp;
pub mod ethernet;
pub mod ipv4;
pub mod openflow;
pub mod tcp;
pub mod udp;

use thiserror::Error;

/// Errors raised while decoding a wire message or header.
///
/// A truncated OpenFlow message is fatal for that session only (the caller
/// closes the connection); an unrecognized message type is logged and
/// discarded; malformed L2/L3/L4 headers cause the packet-in to be
/// dropped. None of these propagate across a session boundary.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum CodecError {
    #[error("buffer too short: need {need} bytes, have {have}")]
    Truncated { need: usize, have: usize },

    #[error("unrecognized OpenFlow message type {0}")]
    UnknownMessageType(u8),

    #[error("unsupported OpenFlow version {0:#x}, expected 0x04")]
    UnsupportedVersion(u8),

    #[error("malformed ethernet frame")]
    MalformedEthernet,

    #[error("malformed ARP packet")]
    MalformedArp,

    #[error("malformed IPv4 header")]
    MalformedIpv4,

    #[error("malformed TCP header")]
    MalformedTcp,

    #[error("malformed UDP header")]
    MalformedUdp,
}

pub(crate) fn need(buf: &[u8], n: usize) -> Result<(), CodecError> {
    if buf.len() < n {
        Err(CodecError::Truncated {
            need: n,
            have: buf.len(),
        })
    } else {
        Ok(())
    }
}
