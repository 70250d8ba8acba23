//! Switch records held by the topology store.

use crate::port::PortInfo;
use crate::{Dpid, PortNo};
use std::collections::HashMap;

/// An OpenFlow switch the controller has an active session with.
///
/// Created when a session completes its handshake; destroyed on disconnect.
/// Never shared outside the topology store — the store is the only owner.
#[derive(Debug, Clone)]
pub struct Switch {
    pub dpid: Dpid,
    pub ports: HashMap<PortNo, PortInfo>,
}

impl Switch {
    pub fn new(dpid: Dpid) -> Self {
        Switch {
            dpid,
            ports: HashMap::new(),
        }
    }
}
