//! Controller binary: reads its configuration, opens the OpenFlow
//! listening socket, and runs every switch session plus the stats
//! poller until told to stop.

use anyhow::{Context, Result};
use sdn_controller_core::config;
use sdn_controller_core::path::PathEngine;
use sdn_controller_core::session::{self, SharedState};
use sdn_controller_core::stats_poller;
use sdn_controller_core::topology::TopologyStore;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::RwLock;

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        log::error!("{err:#}");
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let config_path = std::env::args().nth(1).unwrap_or_else(|| "./config.json".to_string());
    let config = config::load_config(&config_path).with_context(|| format!("loading {config_path}"))?;

    init_logging(config.debug);

    if let Some(topology_path) = &config.topology_file {
        match config::load_topology_file(topology_path) {
            Ok(topo) => log::info!(
                "topology seed file {topology_path} validated: {} switches described (applied lazily as switches connect)",
                topo.switches.len()
            ),
            Err(err) => return Err(err.into()),
        }
    }

    let shared = Arc::new(SharedState {
        topology: Arc::new(TopologyStore::new()),
        paths: Arc::new(PathEngine::new(config.cost_protocol, config.ospf_reference_bandwidth, config.rng_seed)),
        sessions: Arc::new(RwLock::new(HashMap::new())),
        config: Arc::new(config.clone()),
    });

    let listener = TcpListener::bind(config.listen_addr())
        .await
        .with_context(|| format!("binding {}", config.listen_addr()))?;
    log::info!("listening on {}", config.listen_addr());

    let poller = tokio::spawn(stats_poller::run(shared.clone()));

    let (shutdown_tx, mut shutdown_rx) = tokio::sync::mpsc::channel::<()>(1);
    ctrlc::set_handler(move || {
        let _ = shutdown_tx.try_send(());
    })
    .context("installing Ctrl-C handler")?;

    loop {
        tokio::select! {
            accepted = listener.accept() => {
                let (stream, peer) = accepted.context("accepting switch connection")?;
                log::info!("accepted connection from {peer}");
                let shared = shared.clone();
                tokio::spawn(async move {
                    if let Err(err) = session::run_session(stream, shared).await {
                        log::warn!("session ended: {err:#}");
                    }
                });
            }
            _ = shutdown_rx.recv() => {
                log::info!("shutdown requested, stopping");
                break;
            }
        }
    }

    poller.abort();
    Ok(())
}

fn init_logging(debug: bool) {
    let default_level = if debug { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level)).init();
}
