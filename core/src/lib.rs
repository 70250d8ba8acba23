//! Engine crate for the OpenFlow 1.3 SDN controller: wire codec, live
//! topology store, shortest-path routing, proxy ARP, flow installation,
//! packet-in dispatch, and the per-switch session runtime.
//!
//! The controller binary crate wires these together; everything here is
//! usable independently of any particular transport, which is what makes
//! the dispatcher and path engine straightforward to exercise in tests
//! without a real socket.

pub mod arp_proxy;
pub mod codec;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod flow_installer;
pub mod path;
pub mod session;
pub mod stats_poller;
pub mod topology;
