//! One task per switch connection: handshake, message demux, echo
//! keepalive, and idle-timeout close.
//!
//! Outbound traffic a session needs to send on another switch's socket
//! (installing a flow-mod at a downstream hop of a routed path) goes
//! through that switch's [`SessionHandle`] in the shared registry rather
//! than this session's own stream.

use crate::codec::openflow::{decode_message, encode_message, FeaturesReply, OfMessage, HEADER_LEN, OFP_VERSION};
use crate::config::RuntimeConfig;
use crate::dispatcher::{Dispatcher, Outbound};
use crate::flow_installer;
use crate::path::PathEngine;
use crate::topology::TopologyStore;
use anyhow::{bail, Context, Result};
use sdn_datatypes::{Dpid, PortInfo, PortNo};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, RwLock};
use tokio::time::Instant;

pub type SessionRegistry = Arc<RwLock<HashMap<Dpid, mpsc::UnboundedSender<OfMessage>>>>;

/// State shared by every session task and the stats poller. The flow
/// cache is reached through `topology.flow_cache()` rather than kept
/// here, so its invalidation stays under the topology store's write
/// guard.
pub struct SharedState {
    pub topology: Arc<TopologyStore>,
    pub paths: Arc<PathEngine>,
    pub sessions: SessionRegistry,
    pub config: Arc<RuntimeConfig>,
}

/// Drives one switch connection until it closes or misses too many
/// echo replies.
pub async fn run_session(stream: TcpStream, shared: Arc<SharedState>) -> Result<()> {
    stream.set_nodelay(true).ok();
    let (mut read_half, mut write_half) = stream.into_split();
    let xid = Arc::new(AtomicU32::new(1));
    let next_xid = {
        let xid = xid.clone();
        move || xid.fetch_add(1, Ordering::Relaxed)
    };

    send(&mut write_half, &OfMessage::Hello { version: OFP_VERSION }).await?;

    let mut buf = Vec::new();
    let peer_version = read_hello(&mut read_half, &mut buf).await?;
    if peer_version < OFP_VERSION {
        bail!("peer declared OpenFlow version {:#x}, need at least {:#x}", peer_version, OFP_VERSION);
    }

    send(&mut write_half, &OfMessage::FeaturesRequest { xid: next_xid() }).await?;
    let features = read_features_reply(&mut read_half, &mut buf).await?;
    let dpid = Dpid(features.datapath_id);
    log::info!("switch {dpid} connected ({} buffers, {} tables)", features.n_buffers, features.n_tables);

    shared.topology.add_switch(dpid).await;
    send(
        &mut write_half,
        &OfMessage::PortDescStatsRequest { xid: next_xid() },
    )
    .await?;
    send(
        &mut write_half,
        &OfMessage::FlowMod(flow_installer::tcp_to_controller(next_xid())),
    )
    .await?;
    send(
        &mut write_half,
        &OfMessage::FlowMod(flow_installer::udp_to_controller(next_xid())),
    )
    .await?;
    send(
        &mut write_half,
        &OfMessage::FlowMod(flow_installer::table_miss(next_xid())),
    )
    .await?;

    let (tx, mut rx) = mpsc::unbounded_channel();
    shared.sessions.write().await.insert(dpid, tx);

    let echo_timeout = Duration::from_secs(shared.config.echo_timeout_sec);
    let mut echo_interval = tokio::time::interval(echo_timeout / 2);
    let mut awaiting_echo_since: Option<Instant> = None;

    let result = async {
        loop {
            tokio::select! {
                read = read_half.read_buf(&mut buf) => {
                    let n = read.context("reading from switch socket")?;
                    if n == 0 {
                        bail!("switch {dpid} closed the connection");
                    }
                    loop {
                        match decode_message(&buf) {
                            Ok((msg, consumed)) => {
                                handle_message(dpid, &msg, &shared, &mut write_half, &next_xid, &mut awaiting_echo_since).await?;
                                buf.drain(0..consumed);
                            }
                            Err(crate::codec::CodecError::Truncated { .. }) => break,
                            Err(e) => bail!("switch {dpid} sent a malformed message: {e}"),
                        }
                    }
                }
                forwarded = rx.recv() => {
                    match forwarded {
                        Some(msg) => send(&mut write_half, &msg).await?,
                        None => bail!("session registry channel for {dpid} closed"),
                    }
                }
                _ = echo_interval.tick() => {
                    if let Some(since) = awaiting_echo_since {
                        if since.elapsed() > echo_timeout {
                            bail!("switch {dpid} missed its echo reply, closing");
                        }
                    }
                    send(&mut write_half, &OfMessage::EchoRequest { xid: next_xid(), data: Vec::new() }).await?;
                    awaiting_echo_since = Some(Instant::now());
                }
            }
        }
    }
    .await;

    shared.sessions.write().await.remove(&dpid);
    shared.topology.remove_switch(dpid).await;
    log::info!("switch {dpid} disconnected");

    result
}

async fn handle_message(
    dpid: Dpid,
    msg: &OfMessage,
    shared: &Arc<SharedState>,
    write_half: &mut tokio::net::tcp::OwnedWriteHalf,
    next_xid: &impl Fn() -> u32,
    awaiting_echo_since: &mut Option<Instant>,
) -> Result<()> {
    match msg {
        OfMessage::EchoRequest { xid, data } => {
            send(
                write_half,
                &OfMessage::EchoReply {
                    xid: *xid,
                    data: data.clone(),
                },
            )
            .await?;
        }
        OfMessage::EchoReply { .. } => {
            *awaiting_echo_since = None;
        }
        OfMessage::PortDescStatsReply { ports, .. } => {
            for p in ports {
                // The reserved local port never carries a real link.
                if p.port_no == sdn_datatypes::port::reserved::LOCAL {
                    continue;
                }
                shared
                    .topology
                    .set_port(
                        dpid,
                        PortNo(p.port_no),
                        PortInfo::new(p.hw_addr, p.curr_speed_kbps as u64 * 1000, !p.admin_down, !p.link_down),
                    )
                    .await;
            }
        }
        OfMessage::PortStatsReply { entries, .. } => {
            for e in entries {
                shared
                    .topology
                    .record_port_sample(
                        dpid,
                        PortNo(e.port_no),
                        sdn_datatypes::PortSample {
                            rx_bytes: e.rx_bytes,
                            tx_bytes: e.tx_bytes,
                            ts: std::time::Instant::now(),
                        },
                    )
                    .await;
            }
        }
        OfMessage::PacketIn(pi) => {
            let dispatcher = Dispatcher {
                topology: &shared.topology,
                paths: &shared.paths,
                flow_cache: shared.topology.flow_cache(),
            };
            let outbound = dispatcher.handle_packet_in(dpid, pi, next_xid).await;
            route_outbound(dpid, outbound, shared, write_half).await?;
        }
        OfMessage::Hello { .. } | OfMessage::FeaturesReply(_) => {
            // Already consumed during the handshake; a peer re-sending
            // these mid-session is protocol noise, not an error.
        }
        OfMessage::Unknown { msg_type, xid } => {
            log::debug!("switch {dpid} sent unhandled message type {msg_type} (xid {xid})");
        }
        _ => {}
    }
    Ok(())
}

/// Sends every message in `outbound` to wherever it belongs: straight to
/// this session's own socket if it targets `dpid`, or through the
/// registry to the owning session's channel otherwise.
async fn route_outbound(
    dpid: Dpid,
    outbound: Vec<Outbound>,
    shared: &Arc<SharedState>,
    write_half: &mut tokio::net::tcp::OwnedWriteHalf,
) -> Result<()> {
    for item in outbound {
        if item.dpid == dpid {
            send(write_half, &item.message).await?;
        } else {
            let sessions = shared.sessions.read().await;
            if let Some(sender) = sessions.get(&item.dpid) {
                let _ = sender.send(item.message);
            }
        }
    }
    Ok(())
}

async fn send(write_half: &mut tokio::net::tcp::OwnedWriteHalf, msg: &OfMessage) -> Result<()> {
    write_half
        .write_all(&encode_message(msg))
        .await
        .context("writing to switch socket")?;
    Ok(())
}

async fn read_hello(read_half: &mut tokio::net::tcp::OwnedReadHalf, buf: &mut Vec<u8>) -> Result<u8> {
    loop {
        if let Ok((OfMessage::Hello { version }, consumed)) = decode_message(buf) {
            buf.drain(0..consumed);
            return Ok(version);
        }
        let n = read_half.read_buf(buf).await.context("reading Hello")?;
        if n == 0 {
            bail!("connection closed before Hello");
        }
    }
}

async fn read_features_reply(
    read_half: &mut tokio::net::tcp::OwnedReadHalf,
    buf: &mut Vec<u8>,
) -> Result<FeaturesReply> {
    loop {
        if buf.len() >= HEADER_LEN {
            if let Ok((msg, consumed)) = decode_message(buf) {
                if let OfMessage::FeaturesReply(reply) = msg {
                    buf.drain(0..consumed);
                    return Ok(reply);
                }
                buf.drain(0..consumed);
                continue;
            }
        }
        let n = read_half.read_buf(buf).await.context("reading FeaturesReply")?;
        if n == 0 {
            bail!("connection closed before FeaturesReply");
        }
    }
}
