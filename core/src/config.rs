//! Runtime configuration.
//!
//! The controller requires a JSON configuration file that defines the
//! listen endpoint, the path-cost protocol, and polling/debug options. The
//! path to the file is a command-line argument to the controller binary.
//!
//! An optional second JSON file (the "topology file") can seed nominal
//! link bandwidths and host attachment points at startup, for use in
//! debug/test deployments where `PortDescStatsReply` alone isn't enough to
//! bootstrap OSPF/DYNAMIC_BANDWIDTH weights. See [`TopologyFile`].

use crate::error::ConfigError;
use std::fs;
use std::net::Ipv4Addr;
use std::path::Path;

use serde::{Deserialize, Serialize};

/// Reference bandwidth used to normalize OSPF-style weights, in bits/sec.
pub const DEFAULT_REF_BW: u64 = 100_000_000;
/// Floor for the denominator of the dynamic-bandwidth cost function.
pub const MIN_BW: u64 = 1_000;

/// The path-weighting function the path engine uses when it builds its
/// graph snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CostProtocol {
    Hop,
    Ospf,
    DynamicBandwidth,
}

impl std::str::FromStr for CostProtocol {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "HOP" => Ok(CostProtocol::Hop),
            "OSPF" => Ok(CostProtocol::Ospf),
            "DYNAMIC_BANDWIDTH" => Ok(CostProtocol::DynamicBandwidth),
            other => Err(ConfigError::UnknownCostProtocol(other.to_string())),
        }
    }
}

/// Runtime configuration options.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeConfig {
    /// IP address the controller listens on.
    pub controller_host: String,

    /// TCP port the controller listens on.
    #[serde(default = "default_port")]
    pub controller_port: u16,

    /// Path cost function used when building the topology graph.
    pub cost_protocol: CostProtocol,

    /// Reference bandwidth for the OSPF and dynamic-bandwidth cost
    /// functions, in bits/sec. Defaults to [`DEFAULT_REF_BW`].
    #[serde(default = "default_ref_bw")]
    #[serde(rename = "OSPF_reference_bandwidth")]
    pub ospf_reference_bandwidth: u64,

    /// Period between `PortStats`/`PortDescStats` polling rounds, in
    /// seconds. Defaults to `5`.
    #[serde(default = "default_poll_interval")]
    pub poll_interval_sec: u64,

    /// Enables debug-level logging: per-port stats samples and every path
    /// decision.
    #[serde(default)]
    pub debug: bool,

    /// Idle timeout before a session with no echo reply is closed, in
    /// seconds. Not part of the distilled config schema; defaulted the
    /// same way every other optional field here is.
    #[serde(default = "default_echo_timeout")]
    pub echo_timeout_sec: u64,

    /// Seeds the ECMP tie-break RNG. `None` draws from OS entropy.
    /// Set for deterministic tests.
    #[serde(default)]
    pub rng_seed: Option<u64>,

    /// Optional path to a topology file (see [`TopologyFile`]) to load at
    /// startup.
    #[serde(default)]
    pub topology_file: Option<String>,
}

fn default_port() -> u16 {
    6653
}

fn default_ref_bw() -> u64 {
    DEFAULT_REF_BW
}

fn default_poll_interval() -> u64 {
    5
}

fn default_echo_timeout() -> u64 {
    30
}

impl RuntimeConfig {
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.controller_host, self.controller_port)
    }
}

/// Loads and validates a runtime configuration file from `path`.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<RuntimeConfig, ConfigError> {
    let path_str = path.as_ref().display().to_string();
    let raw = fs::read_to_string(&path).map_err(|source| ConfigError::Read {
        path: path_str.clone(),
        source,
    })?;
    let config: RuntimeConfig =
        serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path_str,
            source,
        })?;
    Ok(config)
}

/* --------------------------------------------------------------------------------- */

/// Admin-plane topology seed file ("Topology-describing JSON").
///
/// Used only to bootstrap nominal link bandwidth (and, for test fixtures,
/// host attachment) when live port descriptions are unavailable. It never
/// creates a switch the controller hasn't actually handshaken with; the
/// topology store ignores entries for switches it doesn't know about yet.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopologyFile {
    pub switches: Vec<TopologySwitch>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TopologySwitch {
    pub id: u64,
    #[serde(default)]
    pub hosts: Vec<TopologyHost>,
    #[serde(default)]
    pub links: Vec<TopologyLink>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TopologyHost {
    pub hostid: String,
    pub ip: Ipv4Addr,
    pub bw: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TopologyLink {
    pub switchid: u64,
    pub bw: u64,
}

/// Loads and validates a topology seed file.
///
/// Validation rules: switch ids are unique; every undirected
/// inter-switch link appears exactly once (its reverse is implied); every
/// bandwidth is positive; no unexpected keys (enforced structurally, since
/// `TopologySwitch`/`TopologyHost`/`TopologyLink` derive `Deserialize` with
/// no `#[serde(flatten)]` catch-all).
pub fn load_topology_file<P: AsRef<Path>>(path: P) -> Result<TopologyFile, ConfigError> {
    let path_str = path.as_ref().display().to_string();
    let raw = fs::read_to_string(&path).map_err(|source| ConfigError::TopologyRead {
        path: path_str.clone(),
        source,
    })?;
    let topo: TopologyFile =
        serde_json::from_str(&raw).map_err(|source| ConfigError::TopologyParse {
            path: path_str,
            source,
        })?;
    validate_topology(&topo)?;
    Ok(topo)
}

fn validate_topology(topo: &TopologyFile) -> Result<(), ConfigError> {
    let mut seen_ids = std::collections::HashSet::new();
    let mut seen_links = std::collections::HashSet::new();

    for switch in &topo.switches {
        if !seen_ids.insert(switch.id) {
            return Err(ConfigError::DuplicateSwitchId(switch.id));
        }
        for host in &switch.hosts {
            if host.bw == 0 {
                return Err(ConfigError::NonPositiveBandwidth(switch.id));
            }
        }
        for link in &switch.links {
            if link.bw == 0 {
                return Err(ConfigError::NonPositiveBandwidth(switch.id));
            }
            let key = (switch.id.min(link.switchid), switch.id.max(link.switchid));
            if !seen_links.insert(key) {
                return Err(ConfigError::RedundantLink(switch.id, link.switchid));
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_minimal_config() {
        let raw = r#"{
            "controller_host": "0.0.0.0",
            "controller_port": 6653,
            "cost_protocol": "HOP",
            "OSPF_reference_bandwidth": 100000000,
            "poll_interval_sec": 5,
            "debug": false
        }"#;
        let cfg: RuntimeConfig = serde_json::from_str(raw).unwrap();
        assert_eq!(cfg.cost_protocol, CostProtocol::Hop);
        assert_eq!(cfg.listen_addr(), "0.0.0.0:6653");
        assert_eq!(cfg.echo_timeout_sec, 30);
        assert!(cfg.rng_seed.is_none());
    }

    #[test]
    fn rejects_duplicate_switch_ids() {
        let topo = TopologyFile {
            switches: vec![
                TopologySwitch {
                    id: 1,
                    hosts: vec![],
                    links: vec![],
                },
                TopologySwitch {
                    id: 1,
                    hosts: vec![],
                    links: vec![],
                },
            ],
        };
        assert!(matches!(
            validate_topology(&topo),
            Err(ConfigError::DuplicateSwitchId(1))
        ));
    }

    #[test]
    fn rejects_redundant_reverse_link() {
        let topo = TopologyFile {
            switches: vec![
                TopologySwitch {
                    id: 1,
                    hosts: vec![],
                    links: vec![TopologyLink {
                        switchid: 2,
                        bw: 1_000_000_000,
                    }],
                },
                TopologySwitch {
                    id: 2,
                    hosts: vec![],
                    links: vec![TopologyLink {
                        switchid: 1,
                        bw: 1_000_000_000,
                    }],
                },
            ],
        };
        assert!(matches!(
            validate_topology(&topo),
            Err(ConfigError::RedundantLink(..))
        ));
    }

    #[test]
    fn rejects_non_positive_bandwidth() {
        let topo = TopologyFile {
            switches: vec![TopologySwitch {
                id: 1,
                hosts: vec![TopologyHost {
                    hostid: "h1".into(),
                    ip: "10.0.0.1".parse().unwrap(),
                    bw: 0,
                }],
                links: vec![],
            }],
        };
        assert!(matches!(
            validate_topology(&topo),
            Err(ConfigError::NonPositiveBandwidth(1))
        ));
    }
}
