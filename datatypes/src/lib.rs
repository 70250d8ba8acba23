//! Shared data types for the SDN controller.
//!
//! These are the identifiers and records the topology store, path engine,
//! and packet-in dispatcher all agree on: datapath ids, port numbers,
//! switches, hosts, links, and flow keys. Keeping them in their own crate
//! mirrors how the wire/engine crate and its data schema are split upstream.

pub mod dpid;
pub mod flow;
pub mod host;
pub mod link;
pub mod port;
pub mod stats;
pub mod switch;

pub use dpid::Dpid;
pub use flow::{CanonicalFlowKey, FiveTuple};
pub use host::Host;
pub use link::Link;
pub use port::{PortInfo, PortNo};
pub use stats::{PortSample, PortSampleHistory};
pub use switch::Switch;

/// Re-exported so downstream crates don't need a direct `pnet` dependency
/// just to name a MAC address.
pub use pnet::util::MacAddr;
