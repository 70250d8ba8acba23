//! Directed link records held by the topology store.

use crate::{Dpid, PortNo};

/// One directed edge of a physical inter-switch link.
///
/// The undirected physical link is represented as two opposing `Link`
/// entries that must carry the same `nominal_bps` (see the topology
/// invariants). Measured throughput is not stored here: it is
/// derived on demand from the source port's sample history in the topology
/// store, since several links can in principle share a source port's
/// counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Link {
    pub src: (Dpid, PortNo),
    pub dst: (Dpid, PortNo),
}

impl Link {
    pub fn new(src: (Dpid, PortNo), dst: (Dpid, PortNo)) -> Self {
        Link { src, dst }
    }

    pub fn reverse(&self) -> Link {
        Link {
            src: self.dst,
            dst: self.src,
        }
    }
}
