//! Typed error surfaces for the modules that need one.
//!
//! Wire-format errors live next to the codec that raises them
//! ([`crate::codec::CodecError`]); these are the remaining error kinds
//! named in the controller's error-handling design: configuration load
//! failures (fatal before serving) and topology-consistency violations
//! (logged, never fatal).

use thiserror::Error;

/// Errors raised while loading or validating the runtime configuration.
/// These are fatal: the process exits with code 1 before it starts serving.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("unknown cost_protocol {0:?}, expected HOP, OSPF, or DYNAMIC_BANDWIDTH")]
    UnknownCostProtocol(String),

    #[error("failed to read topology file {path}: {source}")]
    TopologyRead {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse topology file {path}: {source}")]
    TopologyParse {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("duplicate switch id {0} in topology file")]
    DuplicateSwitchId(u64),

    #[error("duplicate link between switch {0} and switch {1} in topology file")]
    RedundantLink(u64, u64),

    #[error("non-positive bandwidth for switch {0}")]
    NonPositiveBandwidth(u64),
}

/// Errors raised by the topology store that the caller should treat as a
/// drop-and-continue condition rather than propagate.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum TopologyError {
    #[error("packet-in referenced unknown switch")]
    UnknownSwitch,

    #[error("no host known for the requested MAC")]
    UnknownHost,

    #[error("no path exists between the requested switches")]
    NoPath,
}
