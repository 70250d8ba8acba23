//! Shortest-path routing over the live topology.
//!
//! The graph is rebuilt from [`crate::topology::TopologyStore`] on every
//! lookup rather than kept incrementally in sync — topologies in scope for
//! this controller are small enough that a fresh Dijkstra run per
//! uncached flow is cheap, and it sidesteps an entire class of
//! incremental-update bugs. [`FlowCache`] is what makes repeat lookups
//! for the same flow cheap.

use crate::config::{CostProtocol, MIN_BW};
use crate::error::TopologyError;
use crate::topology::TopologyStore;
use petgraph::graphmap::DiGraphMap;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use sdn_datatypes::{CanonicalFlowKey, Dpid};
use std::collections::{BinaryHeap, HashMap};
use std::sync::Mutex;

/// Builds a weighted digraph from the topology and picks among
/// equal-cost shortest paths.
pub struct PathEngine {
    cost_protocol: CostProtocol,
    ref_bw: u64,
    rng: Mutex<StdRng>,
}

impl PathEngine {
    pub fn new(cost_protocol: CostProtocol, ref_bw: u64, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(s) => StdRng::seed_from_u64(s),
            None => StdRng::from_entropy(),
        };
        PathEngine {
            cost_protocol,
            ref_bw,
            rng: Mutex::new(rng),
        }
    }

    async fn edge_weight(&self, topology: &TopologyStore, src: Dpid, src_port: sdn_datatypes::PortNo) -> u64 {
        match self.cost_protocol {
            CostProtocol::Hop => 1,
            CostProtocol::Ospf => self.ospf_weight(topology, src, src_port).await,
            CostProtocol::DynamicBandwidth => {
                let nominal = topology.nominal_bps(src, src_port).await.unwrap_or(0);
                if nominal == 0 {
                    // Missing nominal bandwidth: fall back to OSPF.
                    return self.ospf_weight(topology, src, src_port).await;
                }
                let measured = topology.measured_bps(src, src_port).await.unwrap_or(0);
                let available = nominal.saturating_sub(measured).max(MIN_BW);
                (self.ref_bw / available).max(1)
            }
        }
    }

    /// `w = REF_BW / nominal_bps`. A missing nominal substitutes `REF_BW`
    /// itself, so the weight comes out to exactly `1`, the
    /// equivalent of treating the edge as unweighted hop cost.
    async fn ospf_weight(&self, topology: &TopologyStore, src: Dpid, src_port: sdn_datatypes::PortNo) -> u64 {
        let nominal = topology.nominal_bps(src, src_port).await.unwrap_or(0);
        let nominal = if nominal == 0 { self.ref_bw } else { nominal };
        (self.ref_bw / nominal).max(1)
    }

    async fn build_graph(&self, topology: &TopologyStore) -> DiGraphMap<Dpid, u64> {
        let mut graph = DiGraphMap::new();
        for dpid in topology.switch_ids().await {
            graph.add_node(dpid);
        }
        for link in topology.iter_links().await {
            let weight = self.edge_weight(topology, link.src.0, link.src.1).await;
            graph.add_edge(link.src.0, link.dst.0, weight);
        }
        graph
    }

    /// All shortest (minimum total weight) paths from `src` to `dst`,
    /// inclusive of both endpoints. Empty when no path exists.
    pub async fn all_shortest_paths(
        &self,
        topology: &TopologyStore,
        src: Dpid,
        dst: Dpid,
    ) -> Vec<Vec<Dpid>> {
        if src == dst {
            return vec![vec![src]];
        }
        let graph = self.build_graph(topology).await;
        if !graph.contains_node(src) || !graph.contains_node(dst) {
            return Vec::new();
        }
        let (dist, preds) = multi_predecessor_dijkstra(&graph, src);
        if !dist.contains_key(&dst) {
            return Vec::new();
        }
        reconstruct_paths(&preds, dst, src)
    }

    /// Picks one shortest path uniformly at random among the ECMP
    /// candidates, using the engine's seeded RNG.
    pub async fn pick_path(
        &self,
        topology: &TopologyStore,
        src: Dpid,
        dst: Dpid,
    ) -> Result<Vec<Dpid>, TopologyError> {
        let paths = self.all_shortest_paths(topology, src, dst).await;
        if paths.is_empty() {
            return Err(TopologyError::NoPath);
        }
        let idx = {
            let mut rng = self.rng.lock().expect("rng mutex poisoned");
            rng.gen_range(0..paths.len())
        };
        Ok(paths[idx].clone())
    }
}

fn multi_predecessor_dijkstra(
    graph: &DiGraphMap<Dpid, u64>,
    src: Dpid,
) -> (HashMap<Dpid, u64>, HashMap<Dpid, Vec<Dpid>>) {
    use std::cmp::Reverse;

    let mut dist: HashMap<Dpid, u64> = HashMap::new();
    let mut preds: HashMap<Dpid, Vec<Dpid>> = HashMap::new();
    let mut heap = BinaryHeap::new();

    dist.insert(src, 0);
    heap.push(Reverse((0u64, src)));

    while let Some(Reverse((d, node))) = heap.pop() {
        if d > *dist.get(&node).unwrap_or(&u64::MAX) {
            continue;
        }
        for (_, next, weight) in graph.edges(node) {
            let nd = d.saturating_add(*weight);
            let best = dist.get(&next).copied().unwrap_or(u64::MAX);
            if nd < best {
                dist.insert(next, nd);
                preds.insert(next, vec![node]);
                heap.push(Reverse((nd, next)));
            } else if nd == best {
                preds.entry(next).or_default().push(node);
            }
        }
    }
    (dist, preds)
}

fn reconstruct_paths(preds: &HashMap<Dpid, Vec<Dpid>>, node: Dpid, src: Dpid) -> Vec<Vec<Dpid>> {
    if node == src {
        return vec![vec![src]];
    }
    let mut out = Vec::new();
    if let Some(parents) = preds.get(&node) {
        for &p in parents {
            for mut path in reconstruct_paths(preds, p, src) {
                path.push(node);
                out.push(path);
            }
        }
    }
    out
}

/* --------------------------------------------------------------------------------- */

/// A cached path with an O(1) "what's my next hop from here" lookup,
/// since a switch partway through the path only needs to know the next
/// datapath id, not the whole route.
#[derive(Debug, Clone)]
pub struct CachedPath {
    path: Vec<Dpid>,
    positions: HashMap<Dpid, usize>,
}

impl CachedPath {
    pub fn new(path: Vec<Dpid>) -> Self {
        let positions = path.iter().enumerate().map(|(i, d)| (*d, i)).collect();
        CachedPath { path, positions }
    }

    pub fn path(&self) -> &[Dpid] {
        &self.path
    }

    pub fn contains(&self, dpid: Dpid) -> bool {
        self.positions.contains_key(&dpid)
    }

    pub fn next_hop(&self, at: Dpid) -> Option<Dpid> {
        let idx = *self.positions.get(&at)?;
        self.path.get(idx + 1).copied()
    }

    pub fn prev_hop(&self, at: Dpid) -> Option<Dpid> {
        let idx = *self.positions.get(&at)?;
        idx.checked_sub(1).and_then(|i| self.path.get(i).copied())
    }
}

/// Caches the path chosen for a flow, keyed by its canonical (directionless)
/// identity, so reverse-direction traffic for the same conversation reuses
/// the forward lookup instead of re-running Dijkstra.
#[derive(Debug, Default)]
pub struct FlowCache {
    entries: Mutex<HashMap<CanonicalFlowKey, CachedPath>>,
}

impl FlowCache {
    pub fn new() -> Self {
        FlowCache::default()
    }

    pub fn get(&self, key: &CanonicalFlowKey) -> Option<CachedPath> {
        self.entries.lock().expect("flow cache mutex poisoned").get(key).cloned()
    }

    pub fn insert(&self, key: CanonicalFlowKey, path: Vec<Dpid>) {
        self.entries
            .lock()
            .expect("flow cache mutex poisoned")
            .insert(key, CachedPath::new(path));
    }

    /// Drops every cached path that routes through `dpid`, forcing a
    /// fresh Dijkstra run the next time those flows are seen.
    pub fn invalidate_switch(&self, dpid: Dpid) {
        self.entries
            .lock()
            .expect("flow cache mutex poisoned")
            .retain(|_, cached| !cached.contains(dpid));
    }

    /// Drops every cached path that steps directly between `a` and `b`
    /// (in either direction), because the link between them just
    /// disappeared. Coarser invalidation than per-path link tracking
    /// would allow, but cheap and correct: a path that doesn't use this
    /// hop is untouched.
    pub fn invalidate_link(&self, a: Dpid, b: Dpid) {
        self.entries.lock().expect("flow cache mutex poisoned").retain(|_, cached| {
            !cached
                .path()
                .windows(2)
                .any(|hop| (hop[0] == a && hop[1] == b) || (hop[0] == b && hop[1] == a))
        });
    }

    /// Drops one specific entry, e.g. because the dispatcher found the
    /// requesting switch isn't actually on the cached path anymore.
    pub fn remove(&self, key: &CanonicalFlowKey) {
        self.entries.lock().expect("flow cache mutex poisoned").remove(key);
    }

    pub fn len(&self) -> usize {
        self.entries.lock().expect("flow cache mutex poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
