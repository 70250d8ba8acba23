//! OpenFlow 1.3 message codec.
//!
//! Implements the subset of the protocol this controller speaks: `Hello`,
//! `FeaturesRequest`/`FeaturesReply`, `PacketIn`, `PacketOut`, `FlowMod`,
//! `PortStatsRequest`/`PortStatsReply`, `PortDescStatsRequest`/
//! `PortDescStatsReply`, and `EchoRequest`/`EchoReply`. All numeric fields
//! are big-endian, matching the wire format.

use super::{need, CodecError};
use byteorder::{BigEndian, ByteOrder};
use pnet::util::MacAddr;
use sdn_datatypes::port::reserved;
use std::net::Ipv4Addr;

pub const OFP_VERSION: u8 = 0x04;
pub const HEADER_LEN: usize = 8;
pub const NO_BUFFER: u32 = 0xffff_ffff;
/// `OFPCML_NO_BUFFER`: an output-to-controller action's `max_len` sentinel
/// meaning "send the whole packet, don't buffer it at the switch."
pub const NO_BUFFER_MAX_LEN: u16 = 0xffff;

mod msg_type {
    pub const HELLO: u8 = 0;
    pub const ECHO_REQUEST: u8 = 2;
    pub const ECHO_REPLY: u8 = 3;
    pub const FEATURES_REQUEST: u8 = 5;
    pub const FEATURES_REPLY: u8 = 6;
    pub const PACKET_IN: u8 = 10;
    pub const FLOW_MOD: u8 = 14;
    pub const PACKET_OUT: u8 = 13;
    pub const MULTIPART_REQUEST: u8 = 18;
    pub const MULTIPART_REPLY: u8 = 19;
}

mod mp_type {
    pub const PORT_STATS: u16 = 4;
    pub const PORT_DESC: u16 = 13;
}

mod oxm_field {
    pub const IN_PORT: u8 = 0;
    pub const ETH_DST: u8 = 3;
    pub const ETH_TYPE: u8 = 5;
    pub const IP_PROTO: u8 = 10;
    pub const IPV4_SRC: u8 = 11;
    pub const IPV4_DST: u8 = 12;
    pub const TCP_SRC: u8 = 13;
    pub const TCP_DST: u8 = 14;
    pub const UDP_SRC: u8 = 15;
    pub const UDP_DST: u8 = 16;
}

const OXM_CLASS_OPENFLOW_BASIC: u16 = 0x8000;
const OFPMT_OXM: u16 = 1;
const OFPIT_APPLY_ACTIONS: u16 = 4;
const OFPAT_OUTPUT: u16 = 0;

/// `FlowMod` command: we only ever add entries — there is no delete/modify
/// traffic here, cache invalidation simply drops our own bookkeeping.
pub const FC_ADD: u8 = 0;

/// A decoded OpenFlow header followed by whatever else a full message
/// carries.
#[derive(Debug, Clone, PartialEq)]
pub enum OfMessage {
    Hello { version: u8 },
    EchoRequest { xid: u32, data: Vec<u8> },
    EchoReply { xid: u32, data: Vec<u8> },
    FeaturesRequest { xid: u32 },
    FeaturesReply(FeaturesReply),
    PacketIn(PacketIn),
    PacketOut(PacketOut),
    FlowMod(FlowMod),
    PortStatsRequest { xid: u32, port_no: u32 },
    PortStatsReply { xid: u32, entries: Vec<PortStatsEntry> },
    PortDescStatsRequest { xid: u32 },
    PortDescStatsReply { xid: u32, ports: Vec<PortDesc> },
    /// Anything else: logged and discarded.
    Unknown { msg_type: u8, xid: u32 },
}

impl OfMessage {
    pub fn xid(&self) -> u32 {
        match self {
            OfMessage::Hello { .. } => 0,
            OfMessage::EchoRequest { xid, .. }
            | OfMessage::EchoReply { xid, .. }
            | OfMessage::FeaturesRequest { xid }
            | OfMessage::PortStatsRequest { xid, .. }
            | OfMessage::PortStatsReply { xid, .. }
            | OfMessage::PortDescStatsRequest { xid }
            | OfMessage::PortDescStatsReply { xid, .. }
            | OfMessage::Unknown { xid, .. } => *xid,
            OfMessage::FeaturesReply(m) => m.xid,
            OfMessage::PacketIn(m) => m.xid,
            OfMessage::PacketOut(m) => m.xid,
            OfMessage::FlowMod(m) => m.xid,
        }
    }
}

/// Reads one complete OpenFlow message from the front of `buf`, returning
/// the parsed message and the number of bytes consumed. Returns
/// `CodecError::Truncated` if `buf` doesn't yet contain a full message —
/// the caller should read more bytes and retry, not treat it as fatal.
pub fn decode_message(buf: &[u8]) -> Result<(OfMessage, usize), CodecError> {
    need(buf, HEADER_LEN)?;
    let version = buf[0];
    let msg_type = buf[1];
    let length = BigEndian::read_u16(&buf[2..4]) as usize;
    let xid = BigEndian::read_u32(&buf[4..8]);
    need(buf, length)?;
    if msg_type != msg_type::HELLO && version != OFP_VERSION {
        return Err(CodecError::UnsupportedVersion(version));
    }
    let body = &buf[HEADER_LEN..length];

    let msg = match msg_type {
        msg_type::HELLO => OfMessage::Hello {
            version: hello_version(version, body),
        },
        msg_type::ECHO_REQUEST => OfMessage::EchoRequest {
            xid,
            data: body.to_vec(),
        },
        msg_type::ECHO_REPLY => OfMessage::EchoReply {
            xid,
            data: body.to_vec(),
        },
        msg_type::FEATURES_REQUEST => OfMessage::FeaturesRequest { xid },
        msg_type::FEATURES_REPLY => OfMessage::FeaturesReply(FeaturesReply::decode(xid, body)?),
        msg_type::PACKET_IN => OfMessage::PacketIn(PacketIn::decode(xid, body)?),
        msg_type::PACKET_OUT => OfMessage::PacketOut(PacketOut::decode(xid, body)?),
        msg_type::FLOW_MOD => OfMessage::FlowMod(FlowMod::decode(xid, body)?),
        msg_type::MULTIPART_REQUEST => decode_multipart_request(xid, body)?,
        msg_type::MULTIPART_REPLY => decode_multipart_reply(xid, body)?,
        other => OfMessage::Unknown {
            msg_type: other,
            xid,
        },
    };
    Ok((msg, length))
}

const HELLO_ELEM_VERSIONBITMAP: u16 = 1;

/// Picks the version to treat a `Hello` as declaring. Real-world OpenFlow
/// peers frequently carry a `OFPHET_VERSIONBITMAP` element in the `Hello`
/// body instead of relying solely on the header's version byte (which only
/// ever holds the *highest* version a multi-version peer speaks). When a
/// bitmap element is present its highest set bit wins; a switch that sends
/// a bare legacy `Hello` is taken at its header version.
fn hello_version(header_version: u8, body: &[u8]) -> u8 {
    let mut off = 0;
    let mut highest_bit: Option<u8> = None;
    while off + 4 <= body.len() {
        let ty = BigEndian::read_u16(&body[off..off + 2]);
        let len = BigEndian::read_u16(&body[off + 2..off + 4]) as usize;
        if len < 4 || off + len > body.len() {
            break;
        }
        if ty == HELLO_ELEM_VERSIONBITMAP {
            for (word_idx, chunk) in body[off + 4..off + len].chunks(4).enumerate() {
                let mut word = [0u8; 4];
                word[..chunk.len()].copy_from_slice(chunk);
                let bits = BigEndian::read_u32(&word);
                for bit in 0..32 {
                    if bits & (1 << bit) != 0 {
                        let v = (word_idx * 32 + bit) as u8;
                        highest_bit = Some(highest_bit.map_or(v, |h| h.max(v)));
                    }
                }
            }
        }
        off += len.div_ceil(8) * 8;
    }
    highest_bit.unwrap_or(header_version)
}

fn write_header(out: &mut Vec<u8>, msg_type: u8, xid: u32, body_len: usize) {
    out.push(OFP_VERSION);
    out.push(msg_type);
    let mut field = [0u8; 2];
    BigEndian::write_u16(&mut field, (HEADER_LEN + body_len) as u16);
    out.extend_from_slice(&field);
    let mut xid_field = [0u8; 4];
    BigEndian::write_u32(&mut xid_field, xid);
    out.extend_from_slice(&xid_field);
}

/// Encodes `msg` as a complete OpenFlow message.
pub fn encode_message(msg: &OfMessage) -> Vec<u8> {
    let mut out = Vec::new();
    match msg {
        OfMessage::Hello { .. } => write_header(&mut out, msg_type::HELLO, 0, 0),
        OfMessage::EchoRequest { xid, data } => {
            write_header(&mut out, msg_type::ECHO_REQUEST, *xid, data.len());
            out.extend_from_slice(data);
        }
        OfMessage::EchoReply { xid, data } => {
            write_header(&mut out, msg_type::ECHO_REPLY, *xid, data.len());
            out.extend_from_slice(data);
        }
        OfMessage::FeaturesRequest { xid } => {
            write_header(&mut out, msg_type::FEATURES_REQUEST, *xid, 0)
        }
        OfMessage::FeaturesReply(m) => {
            let body = m.encode_body();
            write_header(&mut out, msg_type::FEATURES_REPLY, m.xid, body.len());
            out.extend_from_slice(&body);
        }
        OfMessage::PacketIn(m) => {
            let body = m.encode_body();
            write_header(&mut out, msg_type::PACKET_IN, m.xid, body.len());
            out.extend_from_slice(&body);
        }
        OfMessage::PacketOut(m) => {
            let body = m.encode_body();
            write_header(&mut out, msg_type::PACKET_OUT, m.xid, body.len());
            out.extend_from_slice(&body);
        }
        OfMessage::FlowMod(m) => {
            let body = m.encode_body();
            write_header(&mut out, msg_type::FLOW_MOD, m.xid, body.len());
            out.extend_from_slice(&body);
        }
        OfMessage::PortStatsRequest { xid, port_no } => {
            let mut body = vec![0u8; 4];
            BigEndian::write_u32(&mut body[0..4], *port_no);
            body.extend_from_slice(&[0u8; 4]);
            let mut mp = Vec::new();
            write_multipart_header(&mut mp, mp_type::PORT_STATS);
            mp.extend_from_slice(&body);
            write_header(&mut out, msg_type::MULTIPART_REQUEST, *xid, mp.len());
            out.extend_from_slice(&mp);
        }
        OfMessage::PortStatsReply { xid, entries } => {
            let mut mp = Vec::new();
            write_multipart_header(&mut mp, mp_type::PORT_STATS);
            for e in entries {
                e.encode(&mut mp);
            }
            write_header(&mut out, msg_type::MULTIPART_REPLY, *xid, mp.len());
            out.extend_from_slice(&mp);
        }
        OfMessage::PortDescStatsRequest { xid } => {
            let mut mp = Vec::new();
            write_multipart_header(&mut mp, mp_type::PORT_DESC);
            write_header(&mut out, msg_type::MULTIPART_REQUEST, *xid, mp.len());
            out.extend_from_slice(&mp);
        }
        OfMessage::PortDescStatsReply { xid, ports } => {
            let mut mp = Vec::new();
            write_multipart_header(&mut mp, mp_type::PORT_DESC);
            for p in ports {
                p.encode(&mut mp);
            }
            write_header(&mut out, msg_type::MULTIPART_REPLY, *xid, mp.len());
            out.extend_from_slice(&mp);
        }
        OfMessage::Unknown { msg_type, xid } => write_header(&mut out, *msg_type, *xid, 0),
    }
    out
}

fn write_multipart_header(out: &mut Vec<u8>, ty: u16) {
    let mut field = [0u8; 2];
    BigEndian::write_u16(&mut field, ty);
    out.extend_from_slice(&field);
    out.extend_from_slice(&[0u8; 2]); // flags
    out.extend_from_slice(&[0u8; 4]); // pad
}

fn decode_multipart_request(xid: u32, body: &[u8]) -> Result<OfMessage, CodecError> {
    need(body, 8)?;
    let ty = BigEndian::read_u16(&body[0..2]);
    let payload = &body[8..];
    match ty {
        mp_type::PORT_STATS => {
            need(payload, 4)?;
            Ok(OfMessage::PortStatsRequest {
                xid,
                port_no: BigEndian::read_u32(&payload[0..4]),
            })
        }
        mp_type::PORT_DESC => Ok(OfMessage::PortDescStatsRequest { xid }),
        other => Ok(OfMessage::Unknown {
            msg_type: other as u8,
            xid,
        }),
    }
}

fn decode_multipart_reply(xid: u32, body: &[u8]) -> Result<OfMessage, CodecError> {
    need(body, 8)?;
    let ty = BigEndian::read_u16(&body[0..2]);
    let payload = &body[8..];
    match ty {
        mp_type::PORT_STATS => {
            let mut entries = Vec::new();
            let mut off = 0;
            while off + PortStatsEntry::WIRE_LEN <= payload.len() {
                entries.push(PortStatsEntry::decode(&payload[off..off + PortStatsEntry::WIRE_LEN])?);
                off += PortStatsEntry::WIRE_LEN;
            }
            Ok(OfMessage::PortStatsReply { xid, entries })
        }
        mp_type::PORT_DESC => {
            let mut ports = Vec::new();
            let mut off = 0;
            while off + PortDesc::WIRE_LEN <= payload.len() {
                ports.push(PortDesc::decode(&payload[off..off + PortDesc::WIRE_LEN])?);
                off += PortDesc::WIRE_LEN;
            }
            Ok(OfMessage::PortDescStatsReply { xid, ports })
        }
        other => Ok(OfMessage::Unknown {
            msg_type: other as u8,
            xid,
        }),
    }
}

/* --------------------------------------------------------------------------------- */

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeaturesReply {
    pub xid: u32,
    pub datapath_id: u64,
    pub n_buffers: u32,
    pub n_tables: u8,
}

impl FeaturesReply {
    const WIRE_LEN: usize = 24;

    fn decode(xid: u32, body: &[u8]) -> Result<Self, CodecError> {
        need(body, Self::WIRE_LEN)?;
        Ok(FeaturesReply {
            xid,
            datapath_id: BigEndian::read_u64(&body[0..8]),
            n_buffers: BigEndian::read_u32(&body[8..12]),
            n_tables: body[12],
        })
    }

    fn encode_body(&self) -> Vec<u8> {
        let mut body = vec![0u8; Self::WIRE_LEN];
        BigEndian::write_u64(&mut body[0..8], self.datapath_id);
        BigEndian::write_u32(&mut body[8..12], self.n_buffers);
        body[12] = self.n_tables;
        body
    }
}

/* --------------------------------------------------------------------------------- */

/// Match fields, a strict subset of OXM: only the fields this controller
/// ever matches on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Match {
    pub in_port: Option<u32>,
    pub eth_dst: Option<MacAddr>,
    pub eth_type: Option<u16>,
    pub ip_proto: Option<u8>,
    pub ipv4_src: Option<Ipv4Addr>,
    pub ipv4_dst: Option<Ipv4Addr>,
    pub tcp_src: Option<u16>,
    pub tcp_dst: Option<u16>,
    pub udp_src: Option<u16>,
    pub udp_dst: Option<u16>,
}

impl Match {
    fn encode_oxm(&self) -> Vec<u8> {
        let mut oxm = Vec::new();
        if let Some(v) = self.in_port {
            push_tlv(&mut oxm, oxm_field::IN_PORT, &v.to_be_bytes());
        }
        if let Some(v) = self.eth_dst {
            push_tlv(
                &mut oxm,
                oxm_field::ETH_DST,
                &[v.0, v.1, v.2, v.3, v.4, v.5],
            );
        }
        if let Some(v) = self.eth_type {
            push_tlv(&mut oxm, oxm_field::ETH_TYPE, &v.to_be_bytes());
        }
        if let Some(v) = self.ip_proto {
            push_tlv(&mut oxm, oxm_field::IP_PROTO, &[v]);
        }
        if let Some(v) = self.ipv4_src {
            push_tlv(&mut oxm, oxm_field::IPV4_SRC, &v.octets());
        }
        if let Some(v) = self.ipv4_dst {
            push_tlv(&mut oxm, oxm_field::IPV4_DST, &v.octets());
        }
        if let Some(v) = self.tcp_src {
            push_tlv(&mut oxm, oxm_field::TCP_SRC, &v.to_be_bytes());
        }
        if let Some(v) = self.tcp_dst {
            push_tlv(&mut oxm, oxm_field::TCP_DST, &v.to_be_bytes());
        }
        if let Some(v) = self.udp_src {
            push_tlv(&mut oxm, oxm_field::UDP_SRC, &v.to_be_bytes());
        }
        if let Some(v) = self.udp_dst {
            push_tlv(&mut oxm, oxm_field::UDP_DST, &v.to_be_bytes());
        }
        oxm
    }

    /// Encodes the full padded `ofp_match` TLV (header + OXM fields +
    /// padding to a multiple of 8 bytes).
    fn encode(&self) -> Vec<u8> {
        let oxm = self.encode_oxm();
        let unpadded_len = 4 + oxm.len();
        let mut out = Vec::with_capacity(unpadded_len.div_ceil(8) * 8);
        let mut field = [0u8; 2];
        BigEndian::write_u16(&mut field, OFPMT_OXM);
        out.extend_from_slice(&field);
        BigEndian::write_u16(&mut field, unpadded_len as u16);
        out.extend_from_slice(&field);
        out.extend_from_slice(&oxm);
        while out.len() % 8 != 0 {
            out.push(0);
        }
        out
    }

    /// Decodes an `ofp_match` TLV, returning the match and the padded
    /// number of bytes consumed.
    fn decode(buf: &[u8]) -> Result<(Match, usize), CodecError> {
        need(buf, 4).map_err(|_| CodecError::Truncated {
            need: 4,
            have: buf.len(),
        })?;
        let unpadded_len = BigEndian::read_u16(&buf[2..4]) as usize;
        need(buf, unpadded_len)?;
        let mut m = Match::default();
        let mut off = 4;
        while off < unpadded_len {
            need(buf, off + 4)?;
            let class = BigEndian::read_u16(&buf[off..off + 2]);
            let field_and_mask = buf[off + 2];
            let field = field_and_mask >> 1;
            let len = buf[off + 3] as usize;
            let payload = &buf[off + 4..off + 4 + len];
            if class == OXM_CLASS_OPENFLOW_BASIC {
                apply_oxm(&mut m, field, payload);
            }
            off += 4 + len;
        }
        let padded = unpadded_len.div_ceil(8) * 8;
        Ok((m, padded))
    }
}

fn push_tlv(out: &mut Vec<u8>, field: u8, payload: &[u8]) {
    let mut class = [0u8; 2];
    BigEndian::write_u16(&mut class, OXM_CLASS_OPENFLOW_BASIC);
    out.extend_from_slice(&class);
    out.push(field << 1);
    out.push(payload.len() as u8);
    out.extend_from_slice(payload);
}

fn apply_oxm(m: &mut Match, field: u8, payload: &[u8]) {
    match field {
        oxm_field::IN_PORT if payload.len() == 4 => m.in_port = Some(BigEndian::read_u32(payload)),
        oxm_field::ETH_DST if payload.len() == 6 => {
            m.eth_dst = Some(MacAddr::new(
                payload[0], payload[1], payload[2], payload[3], payload[4], payload[5],
            ))
        }
        oxm_field::ETH_TYPE if payload.len() == 2 => {
            m.eth_type = Some(BigEndian::read_u16(payload))
        }
        oxm_field::IP_PROTO if payload.len() == 1 => m.ip_proto = Some(payload[0]),
        oxm_field::IPV4_SRC if payload.len() == 4 => {
            m.ipv4_src = Some(Ipv4Addr::new(payload[0], payload[1], payload[2], payload[3]))
        }
        oxm_field::IPV4_DST if payload.len() == 4 => {
            m.ipv4_dst = Some(Ipv4Addr::new(payload[0], payload[1], payload[2], payload[3]))
        }
        oxm_field::TCP_SRC if payload.len() == 2 => m.tcp_src = Some(BigEndian::read_u16(payload)),
        oxm_field::TCP_DST if payload.len() == 2 => m.tcp_dst = Some(BigEndian::read_u16(payload)),
        oxm_field::UDP_SRC if payload.len() == 2 => m.udp_src = Some(BigEndian::read_u16(payload)),
        oxm_field::UDP_DST if payload.len() == 2 => m.udp_dst = Some(BigEndian::read_u16(payload)),
        _ => {}
    }
}

/* --------------------------------------------------------------------------------- */

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Output { port: u32, max_len: u16 },
}

impl Action {
    const WIRE_LEN: usize = 16;

    fn encode(&self, out: &mut Vec<u8>) {
        match self {
            Action::Output { port, max_len } => {
                let mut field = [0u8; 2];
                BigEndian::write_u16(&mut field, OFPAT_OUTPUT);
                out.extend_from_slice(&field);
                BigEndian::write_u16(&mut field, Self::WIRE_LEN as u16);
                out.extend_from_slice(&field);
                let mut port_field = [0u8; 4];
                BigEndian::write_u32(&mut port_field, *port);
                out.extend_from_slice(&port_field);
                BigEndian::write_u16(&mut field, *max_len);
                out.extend_from_slice(&field);
                out.extend_from_slice(&[0u8; 6]);
            }
        }
    }

    fn decode(buf: &[u8]) -> Result<(Action, usize), CodecError> {
        need(buf, 4)?;
        let ty = BigEndian::read_u16(&buf[0..2]);
        let len = BigEndian::read_u16(&buf[2..4]) as usize;
        need(buf, len)?;
        match ty {
            t if t == OFPAT_OUTPUT => {
                let port = BigEndian::read_u32(&buf[4..8]);
                let max_len = BigEndian::read_u16(&buf[8..10]);
                Ok((Action::Output { port, max_len }, len))
            }
            _ => Ok((
                Action::Output {
                    port: reserved::CONTROLLER,
                    max_len: 0,
                },
                len,
            )),
        }
    }
}

fn encode_actions(actions: &[Action]) -> Vec<u8> {
    let mut out = Vec::new();
    for a in actions {
        a.encode(&mut out);
    }
    out
}

fn decode_actions(buf: &[u8]) -> Result<Vec<Action>, CodecError> {
    let mut actions = Vec::new();
    let mut off = 0;
    while off < buf.len() {
        let (action, len) = Action::decode(&buf[off..])?;
        actions.push(action);
        off += len;
    }
    Ok(actions)
}

/* --------------------------------------------------------------------------------- */

#[derive(Debug, Clone, PartialEq)]
pub struct PacketIn {
    pub xid: u32,
    pub buffer_id: u32,
    pub in_port: u32,
    pub data: Vec<u8>,
}

impl PacketIn {
    fn decode(xid: u32, body: &[u8]) -> Result<Self, CodecError> {
        need(body, 16)?;
        let buffer_id = BigEndian::read_u32(&body[0..4]);
        let (m, match_len) = Match::decode(&body[16..])?;
        let data_off = 16 + match_len + 2; // 2 bytes padding after match
        need(body, data_off)?;
        Ok(PacketIn {
            xid,
            buffer_id,
            in_port: m.in_port.unwrap_or(0),
            data: body[data_off..].to_vec(),
        })
    }

    fn encode_body(&self) -> Vec<u8> {
        let mut body = vec![0u8; 16];
        BigEndian::write_u32(&mut body[0..4], self.buffer_id);
        BigEndian::write_u16(&mut body[4..6], self.data.len() as u16);
        body[6] = 0; // reason
        body[7] = 0; // table_id
        let m = Match {
            in_port: Some(self.in_port),
            ..Default::default()
        };
        body.extend_from_slice(&m.encode());
        body.extend_from_slice(&[0u8; 2]);
        body.extend_from_slice(&self.data);
        body
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PacketOut {
    pub xid: u32,
    pub buffer_id: u32,
    pub in_port: u32,
    pub actions: Vec<Action>,
    pub data: Vec<u8>,
}

impl PacketOut {
    fn decode(xid: u32, body: &[u8]) -> Result<Self, CodecError> {
        need(body, 16)?;
        let buffer_id = BigEndian::read_u32(&body[0..4]);
        let in_port = BigEndian::read_u32(&body[4..8]);
        let actions_len = BigEndian::read_u16(&body[8..10]) as usize;
        need(body, 16 + actions_len)?;
        let actions = decode_actions(&body[16..16 + actions_len])?;
        Ok(PacketOut {
            xid,
            buffer_id,
            in_port,
            actions,
            data: body[16 + actions_len..].to_vec(),
        })
    }

    fn encode_body(&self) -> Vec<u8> {
        let action_bytes = encode_actions(&self.actions);
        let mut body = vec![0u8; 16];
        BigEndian::write_u32(&mut body[0..4], self.buffer_id);
        BigEndian::write_u32(&mut body[4..8], self.in_port);
        BigEndian::write_u16(&mut body[8..10], action_bytes.len() as u16);
        body.extend_from_slice(&action_bytes);
        body.extend_from_slice(&self.data);
        body
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FlowMod {
    pub xid: u32,
    pub priority: u16,
    pub table_id: u8,
    pub command: u8,
    pub buffer_id: u32,
    pub r#match: Match,
    pub actions: Vec<Action>,
}

impl FlowMod {
    fn decode(xid: u32, body: &[u8]) -> Result<Self, CodecError> {
        need(body, 40)?;
        let table_id = body[16];
        let command = body[17];
        let priority = BigEndian::read_u16(&body[22..24]);
        let buffer_id = BigEndian::read_u32(&body[24..28]);
        let (m, match_len) = Match::decode(&body[40..])?;
        let inst_off = 40 + match_len;
        let actions = if body.len() >= inst_off + 8 {
            let inst_len = BigEndian::read_u16(&body[inst_off + 2..inst_off + 4]) as usize;
            decode_actions(&body[inst_off + 8..inst_off + inst_len])?
        } else {
            Vec::new()
        };
        Ok(FlowMod {
            xid,
            priority,
            table_id,
            command,
            buffer_id,
            r#match: m,
            actions,
        })
    }

    fn encode_body(&self) -> Vec<u8> {
        let mut body = vec![0u8; 40];
        // cookie/cookie_mask left zero
        body[16] = self.table_id;
        body[17] = self.command;
        BigEndian::write_u16(&mut body[22..24], self.priority);
        BigEndian::write_u32(&mut body[24..28], self.buffer_id);
        BigEndian::write_u32(&mut body[28..32], reserved::ANY); // out_port: no restriction
        BigEndian::write_u32(&mut body[32..36], 0xffff_ffff); // out_group: OFPG_ANY
        body.extend_from_slice(&self.r#match.encode());

        let action_bytes = encode_actions(&self.actions);
        let inst_len = 8 + action_bytes.len();
        let mut field = [0u8; 2];
        BigEndian::write_u16(&mut field, OFPIT_APPLY_ACTIONS);
        body.extend_from_slice(&field);
        BigEndian::write_u16(&mut field, inst_len as u16);
        body.extend_from_slice(&field);
        body.extend_from_slice(&[0u8; 4]);
        body.extend_from_slice(&action_bytes);
        body
    }
}

/* --------------------------------------------------------------------------------- */

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PortStatsEntry {
    pub port_no: u32,
    pub rx_bytes: u64,
    pub tx_bytes: u64,
}

impl PortStatsEntry {
    const WIRE_LEN: usize = 112;

    fn decode(buf: &[u8]) -> Result<Self, CodecError> {
        need(buf, Self::WIRE_LEN)?;
        Ok(PortStatsEntry {
            port_no: BigEndian::read_u32(&buf[0..4]),
            rx_bytes: BigEndian::read_u64(&buf[24..32]),
            tx_bytes: BigEndian::read_u64(&buf[32..40]),
        })
    }

    fn encode(&self, out: &mut Vec<u8>) {
        let mut buf = vec![0u8; Self::WIRE_LEN];
        BigEndian::write_u32(&mut buf[0..4], self.port_no);
        for i in 8..104 {
            // rx/tx packet & error counters we don't track: OF allows
            // 0xff...ff "unsupported" sentinels, but plain zero is valid too.
            buf[i] = 0;
        }
        BigEndian::write_u64(&mut buf[24..32], self.rx_bytes);
        BigEndian::write_u64(&mut buf[32..40], self.tx_bytes);
        out.extend_from_slice(&buf);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PortDesc {
    pub port_no: u32,
    pub hw_addr: MacAddr,
    pub curr_speed_kbps: u32,
    pub link_down: bool,
    pub admin_down: bool,
}

impl PortDesc {
    const WIRE_LEN: usize = 64;
    const OFPPS_LINK_DOWN: u32 = 1 << 0;
    const OFPPC_PORT_DOWN: u32 = 1 << 0;

    fn decode(buf: &[u8]) -> Result<Self, CodecError> {
        need(buf, Self::WIRE_LEN)?;
        let config = BigEndian::read_u32(&buf[32..36]);
        let state = BigEndian::read_u32(&buf[36..40]);
        Ok(PortDesc {
            port_no: BigEndian::read_u32(&buf[0..4]),
            hw_addr: MacAddr::new(buf[8], buf[9], buf[10], buf[11], buf[12], buf[13]),
            curr_speed_kbps: BigEndian::read_u32(&buf[56..60]),
            link_down: state & Self::OFPPS_LINK_DOWN != 0,
            admin_down: config & Self::OFPPC_PORT_DOWN != 0,
        })
    }

    fn encode(&self, out: &mut Vec<u8>) {
        let mut buf = vec![0u8; Self::WIRE_LEN];
        BigEndian::write_u32(&mut buf[0..4], self.port_no);
        buf[8] = self.hw_addr.0;
        buf[9] = self.hw_addr.1;
        buf[10] = self.hw_addr.2;
        buf[11] = self.hw_addr.3;
        buf[12] = self.hw_addr.4;
        buf[13] = self.hw_addr.5;
        let config = if self.admin_down {
            Self::OFPPC_PORT_DOWN
        } else {
            0
        };
        let state = if self.link_down {
            Self::OFPPS_LINK_DOWN
        } else {
            0
        };
        BigEndian::write_u32(&mut buf[32..36], config);
        BigEndian::write_u32(&mut buf[36..40], state);
        BigEndian::write_u32(&mut buf[56..60], self.curr_speed_kbps);
        out.extend_from_slice(&buf);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(msg: OfMessage) -> OfMessage {
        let bytes = encode_message(&msg);
        let (decoded, consumed) = decode_message(&bytes).unwrap();
        assert_eq!(consumed, bytes.len());
        decoded
    }

    #[test]
    fn hello_round_trips() {
        let msg = OfMessage::Hello { version: OFP_VERSION };
        assert_eq!(roundtrip(msg.clone()), msg);
    }

    #[test]
    fn echo_round_trips() {
        let msg = OfMessage::EchoRequest {
            xid: 7,
            data: vec![1, 2, 3],
        };
        assert_eq!(roundtrip(msg.clone()), msg);
    }

    #[test]
    fn features_reply_round_trips() {
        let msg = OfMessage::FeaturesReply(FeaturesReply {
            xid: 1,
            datapath_id: 0x1,
            n_buffers: 256,
            n_tables: 1,
        });
        assert_eq!(roundtrip(msg.clone()), msg);
    }

    #[test]
    fn packet_in_round_trips() {
        let msg = OfMessage::PacketIn(PacketIn {
            xid: 2,
            buffer_id: NO_BUFFER,
            in_port: 1,
            data: vec![0xde, 0xad, 0xbe, 0xef],
        });
        assert_eq!(roundtrip(msg.clone()), msg);
    }

    #[test]
    fn packet_out_round_trips() {
        let msg = OfMessage::PacketOut(PacketOut {
            xid: 3,
            buffer_id: NO_BUFFER,
            in_port: reserved::CONTROLLER,
            actions: vec![Action::Output {
                port: 2,
                max_len: 0,
            }],
            data: vec![1, 2, 3, 4],
        });
        assert_eq!(roundtrip(msg.clone()), msg);
    }

    #[test]
    fn flow_mod_full_five_tuple_round_trips() {
        let m = Match {
            eth_type: Some(super::super::ethernet::ETHERTYPE_IPV4),
            ip_proto: Some(6),
            ipv4_src: Some(Ipv4Addr::new(10, 0, 0, 1)),
            ipv4_dst: Some(Ipv4Addr::new(10, 0, 0, 2)),
            tcp_src: Some(5000),
            tcp_dst: Some(80),
            ..Default::default()
        };
        let msg = OfMessage::FlowMod(FlowMod {
            xid: 4,
            priority: 1000,
            table_id: 0,
            command: FC_ADD,
            buffer_id: NO_BUFFER,
            r#match: m,
            actions: vec![Action::Output {
                port: 2,
                max_len: 0,
            }],
        });
        assert_eq!(roundtrip(msg.clone()), msg);
    }

    #[test]
    fn port_stats_reply_round_trips() {
        let msg = OfMessage::PortStatsReply {
            xid: 5,
            entries: vec![
                PortStatsEntry {
                    port_no: 1,
                    rx_bytes: 1000,
                    tx_bytes: 2000,
                },
                PortStatsEntry {
                    port_no: 2,
                    rx_bytes: 500,
                    tx_bytes: 700,
                },
            ],
        };
        assert_eq!(roundtrip(msg.clone()), msg);
    }

    #[test]
    fn port_desc_stats_reply_round_trips() {
        let msg = OfMessage::PortDescStatsReply {
            xid: 6,
            ports: vec![PortDesc {
                port_no: 1,
                hw_addr: MacAddr::new(0, 1, 2, 3, 4, 5),
                curr_speed_kbps: 1_000_000,
                link_down: false,
                admin_down: false,
            }],
        };
        assert_eq!(roundtrip(msg.clone()), msg);
    }

    #[test]
    fn hello_with_version_bitmap_element_reads_the_highest_declared_version() {
        // ofp_hello_elem_versionbitmap { type=1, length=8, bitmaps=[0b11010] }
        // bit 1 (0x01) and bit 3 (0x04) and bit 4 (0x04) set -> versions 1,3,4 advertised.
        let mut elem = vec![0u8; 8];
        BigEndian::write_u16(&mut elem[0..2], HELLO_ELEM_VERSIONBITMAP);
        BigEndian::write_u16(&mut elem[2..4], 8);
        BigEndian::write_u32(&mut elem[4..8], 0b0001_1010);
        let mut raw = vec![0u8; HEADER_LEN];
        raw[0] = 0x05; // header version byte deliberately stale/higher
        raw[1] = msg_type::HELLO;
        BigEndian::write_u16(&mut raw[2..4], (HEADER_LEN + elem.len()) as u16);
        raw.extend_from_slice(&elem);

        let (msg, consumed) = decode_message(&raw).unwrap();
        assert_eq!(consumed, raw.len());
        assert_eq!(msg, OfMessage::Hello { version: 4 });
    }

    #[test]
    fn legacy_hello_without_elements_falls_back_to_header_version() {
        let msg = OfMessage::Hello { version: OFP_VERSION };
        let bytes = encode_message(&msg);
        assert_eq!(roundtrip(msg.clone()), msg);
        // No body at all: nothing to scan for a bitmap element.
        assert_eq!(bytes.len(), HEADER_LEN);
    }

    #[test]
    fn truncated_message_is_reported_not_panicked() {
        let buf = [0x04, 0x00, 0x00, 0xff, 0, 0, 0, 0];
        assert!(matches!(
            decode_message(&buf),
            Err(CodecError::Truncated { .. })
        ));
    }
}
