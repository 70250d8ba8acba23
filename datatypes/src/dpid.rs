//! Datapath identifiers.

use std::fmt;

/// The 64-bit unique id an OpenFlow switch reports in its `FeaturesReply`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize)]
pub struct Dpid(pub u64);

impl Dpid {
    pub fn new(id: u64) -> Self {
        Dpid(id)
    }

    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for Dpid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

impl From<u64> for Dpid {
    fn from(id: u64) -> Self {
        Dpid(id)
    }
}
