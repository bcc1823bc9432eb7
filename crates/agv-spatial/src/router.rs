//! Routing trait plus A* and Dijkstra implementations.
//!
//! # Pluggability
//!
//! Agents and optimizers route through the [`Router`] trait.  [`AStarRouter`]
//! is the default; [`DijkstraRouter`] runs the same search with a zero
//! heuristic and serves as a reference in tests.
//!
//! # Determinism
//!
//! The open set is a min-heap on `(f, NodeId)`, so nodes with equal
//! `f = g + h` are expanded in insertion order.  Identical queries always
//! return identical paths.

use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;

use agv_core::{EdgeId, NodeId};

use crate::graph::Graph;
use crate::{SpatialError, SpatialResult};

// ── Path ──────────────────────────────────────────────────────────────────────

/// The result of a routing query.
#[derive(Debug, Clone, PartialEq)]
pub struct Path {
    /// Nodes from start to end, both inclusive.
    pub nodes: Vec<NodeId>,
    /// Sum of the traversed edge lengths, in metres.
    pub distance: f64,
}

impl Path {
    /// `true` if start and end are the same node.
    pub fn is_trivial(&self) -> bool {
        self.nodes.len() <= 1
    }

    /// Number of edges traversed.
    pub fn hops(&self) -> usize {
        self.nodes.len().saturating_sub(1)
    }
}

// ── Router trait ──────────────────────────────────────────────────────────────

/// Pluggable shortest-path engine.
pub trait Router {
    /// Compute the shortest path from `from` to `to`.
    ///
    /// `from == to` yields a single-node path of length zero; disconnected
    /// endpoints yield [`SpatialError::NoPathFound`].
    fn route(&self, graph: &Graph, from: NodeId, to: NodeId) -> SpatialResult<Path>;
}

/// A* with the straight-line distance to the goal as heuristic.
///
/// Admissible as long as no edge is shorter than the distance between its
/// endpoints, which holds for every edge built by `GraphBuilder::add_edge`.
#[derive(Copy, Clone, Debug, Default)]
pub struct AStarRouter;

impl Router for AStarRouter {
    fn route(&self, graph: &Graph, from: NodeId, to: NodeId) -> SpatialResult<Path> {
        let goal = graph.position(to);
        search(graph, from, to, |n| graph.position(n).distance(goal))
    }
}

/// Plain Dijkstra (A* with a zero heuristic).
#[derive(Copy, Clone, Debug, Default)]
pub struct DijkstraRouter;

impl Router for DijkstraRouter {
    fn route(&self, graph: &Graph, from: NodeId, to: NodeId) -> SpatialResult<Path> {
        search(graph, from, to, |_| 0.0)
    }
}

// ── Search internals ──────────────────────────────────────────────────────────

/// Heap key: estimated total cost, tie-broken by node id.
#[derive(Copy, Clone, Debug)]
struct Key {
    f:    f64,
    node: NodeId,
}

impl PartialEq for Key {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Key {}

impl PartialOrd for Key {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Key {
    fn cmp(&self, other: &Self) -> Ordering {
        self.f.total_cmp(&other.f).then(self.node.cmp(&other.node))
    }
}

fn search(
    graph: &Graph,
    from: NodeId,
    to: NodeId,
    heuristic: impl Fn(NodeId) -> f64,
) -> SpatialResult<Path> {
    for node in [from, to] {
        if !graph.contains(node) {
            return Err(SpatialError::NodeNotFound(node));
        }
    }
    if from == to {
        return Ok(Path { nodes: vec![from], distance: 0.0 });
    }

    let n = graph.node_count();
    // g[v] = best known distance from `from` to v.
    let mut g         = vec![f64::INFINITY; n];
    let mut prev_edge = vec![EdgeId::INVALID; n];
    let mut closed    = vec![false; n];

    g[from.index()] = 0.0;
    let mut open: BinaryHeap<Reverse<Key>> = BinaryHeap::new();
    open.push(Reverse(Key { f: heuristic(from), node: from }));

    while let Some(Reverse(Key { node, .. })) = open.pop() {
        if node == to {
            return Ok(reconstruct(graph, &prev_edge, from, to, g[to.index()]));
        }
        if closed[node.index()] {
            continue;
        }
        closed[node.index()] = true;

        let g_node = g[node.index()];
        for edge in graph.out_edges(node) {
            let next = graph.edge_to[edge.index()];
            let tentative = g_node + graph.edge_length[edge.index()];
            if tentative < g[next.index()] {
                g[next.index()] = tentative;
                prev_edge[next.index()] = edge;
                closed[next.index()] = false;
                open.push(Reverse(Key { f: tentative + heuristic(next), node: next }));
            }
        }
    }

    Err(SpatialError::NoPathFound { from, to })
}

fn reconstruct(graph: &Graph, prev_edge: &[EdgeId], from: NodeId, to: NodeId, distance: f64) -> Path {
    let mut nodes = vec![to];
    let mut cur = to;
    while cur != from {
        let e = prev_edge[cur.index()];
        if e == EdgeId::INVALID {
            break;
        }
        cur = graph.edge_from[e.index()];
        nodes.push(cur);
    }
    nodes.reverse();
    Path { nodes, distance }
}
