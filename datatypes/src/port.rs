//! Port identifiers and per-port state as last reported by a switch.

use crate::MacAddr;
use std::fmt;

/// Reserved OpenFlow 1.3 port numbers relevant to this controller.
pub mod reserved {
    /// Send to/from the controller itself.
    pub const CONTROLLER: u32 = 0xffff_fffd;
    /// Wildcard used in `PortStatsRequest` to mean "every port".
    pub const ANY: u32 = 0xffff_ffff;
    /// Local, switch-internal port. Never an inter-switch or host-facing link.
    pub const LOCAL: u32 = 0xffff_fffe;
    /// Flood out every port except the one the packet arrived on.
    pub const FLOOD: u32 = 0xffff_fffb;
}

/// An OpenFlow port number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize)]
pub struct PortNo(pub u32);

impl PortNo {
    pub fn is_reserved(&self) -> bool {
        self.0 == reserved::CONTROLLER || self.0 == reserved::ANY || self.0 == reserved::LOCAL
    }
}

impl fmt::Display for PortNo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for PortNo {
    fn from(no: u32) -> Self {
        PortNo(no)
    }
}

/// Last-known state of one switch port, as reported by `PortDescStatsReply`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PortInfo {
    pub hw_addr: MacAddr,
    /// Nominal link speed in bits/sec, taken from `curr_speed` (kbps) * 1000.
    pub nominal_bps: u64,
    pub admin_up: bool,
    pub link_up: bool,
}

impl PortInfo {
    pub fn new(hw_addr: MacAddr, nominal_bps: u64, admin_up: bool, link_up: bool) -> Self {
        PortInfo {
            hw_addr,
            nominal_bps,
            admin_up,
            link_up,
        }
    }
}
