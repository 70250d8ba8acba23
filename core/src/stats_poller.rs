//! Periodic `PortStats`/`PortDescStats` polling.
//!
//! Runs as its own task, on `poll_interval_sec`, rather than inside each
//! session: port descriptions rarely change, and a single timer shared
//! across every connected switch is simpler than N per-session timers
//! drifting independently.

use crate::codec::openflow::OfMessage;
use crate::session::SharedState;
use sdn_datatypes::port::reserved;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Polls every connected switch for port stats and port descriptions
/// until `shared`'s session registry is dropped (i.e. forever, in
/// practice — the controller binary holds it for the process lifetime).
pub async fn run(shared: Arc<SharedState>) {
    let interval = Duration::from_secs(shared.config.poll_interval_sec.max(1));
    let xid = AtomicU32::new(1);
    let mut ticker = tokio::time::interval(interval);

    loop {
        ticker.tick().await;
        let sessions = shared.sessions.read().await;
        for (dpid, sender) in sessions.iter() {
            let stats_xid = xid.fetch_add(1, Ordering::Relaxed);
            let desc_xid = xid.fetch_add(1, Ordering::Relaxed);
            let mut dropped = sender
                .send(OfMessage::PortStatsRequest {
                    xid: stats_xid,
                    port_no: reserved::ANY,
                })
                .is_err();
            dropped |= sender
                .send(OfMessage::PortDescStatsRequest { xid: desc_xid })
                .is_err();
            if dropped {
                log::debug!("stats poll for switch {dpid} dropped: session already closing");
            }
        }
        if shared.config.debug {
            log::debug!("polled {} switches for port stats", sessions.len());
        }
    }
}
