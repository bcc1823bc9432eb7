//! Warehouse graph representation and builder.
//!
//! # Data layout
//!
//! The graph uses **Compressed Sparse Row (CSR)** format for outgoing edges.
//! Given a `NodeId n`, its outgoing edges are the `EdgeId`s
//!
//! ```text
//! node_out_start[n] .. node_out_start[n+1]
//! ```
//!
//! All edge arrays (`edge_from`, `edge_to`, `edge_length`) are sorted by
//! source node and indexed by `EdgeId`, so expanding a node during search is
//! a contiguous scan.
//!
//! # Spatial index
//!
//! An R-tree (via `rstar`) maps floor coordinates to the nearest `NodeId`.
//! Used to snap order pickup/dropoff coordinates and robot positions that do
//! not coincide with a node.

use std::collections::HashMap;

use rstar::{PointDistance, RTree, RTreeObject, AABB};

use agv_core::{EdgeId, NodeId, Point};

use crate::{SpatialError, SpatialResult};

// ── R-tree node entry ─────────────────────────────────────────────────────────

#[derive(Clone)]
struct NodeEntry {
    point: [f64; 2],
    id:    NodeId,
}

impl RTreeObject for NodeEntry {
    type Envelope = AABB<[f64; 2]>;
    fn envelope(&self) -> Self::Envelope {
        AABB::from_point(self.point)
    }
}

impl PointDistance for NodeEntry {
    fn distance_2(&self, point: &[f64; 2]) -> f64 {
        let dx = self.point[0] - point[0];
        let dy = self.point[1] - point[1];
        dx * dx + dy * dy
    }
}

// ── Graph ─────────────────────────────────────────────────────────────────────

/// Directed warehouse graph in CSR format plus a spatial index for snapping.
///
/// Undirected aisles are stored as two directed edges.  Do not construct
/// directly; use [`GraphBuilder`].
pub struct Graph {
    // ── Node data ─────────────────────────────────────────────────────────
    /// Floor position of each node.  Indexed by `NodeId`.
    pub node_pos: Vec<Point>,

    /// Human-readable name of each node (e.g. `"A3"`, `"depot"`).
    pub node_name: Vec<String>,

    // ── CSR edge adjacency ────────────────────────────────────────────────
    /// CSR row pointer.  Length = `node_count + 1`.
    pub node_out_start: Vec<u32>,

    // ── Edge data (indexed by EdgeId) ─────────────────────────────────────
    pub edge_from: Vec<NodeId>,
    pub edge_to: Vec<NodeId>,

    /// Length of each edge in metres.
    pub edge_length: Vec<f64>,

    by_name:     HashMap<String, NodeId>,
    spatial_idx: RTree<NodeEntry>,
}

impl Graph {
    pub fn node_count(&self) -> usize {
        self.node_pos.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edge_to.len()
    }

    pub fn is_empty(&self) -> bool {
        self.node_pos.is_empty()
    }

    pub fn contains(&self, node: NodeId) -> bool {
        node.index() < self.node_count()
    }

    // ── Lookups ───────────────────────────────────────────────────────────

    #[inline]
    pub fn position(&self, node: NodeId) -> Point {
        self.node_pos[node.index()]
    }

    pub fn name(&self, node: NodeId) -> &str {
        &self.node_name[node.index()]
    }

    pub fn node_named(&self, name: &str) -> Option<NodeId> {
        self.by_name.get(name).copied()
    }

    // ── Graph traversal ───────────────────────────────────────────────────

    /// Iterator over the `EdgeId`s of all outgoing edges from `node`.
    #[inline]
    pub fn out_edges(&self, node: NodeId) -> impl Iterator<Item = EdgeId> + '_ {
        let start = self.node_out_start[node.index()] as usize;
        let end   = self.node_out_start[node.index() + 1] as usize;
        (start..end).map(|i| EdgeId(i as u32))
    }

    pub fn out_degree(&self, node: NodeId) -> usize {
        let start = self.node_out_start[node.index()] as usize;
        let end   = self.node_out_start[node.index() + 1] as usize;
        end - start
    }

    pub fn neighbors(&self, node: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self.out_edges(node).map(|e| self.edge_to[e.index()])
    }

    /// Length of the edge `from → to`, if one exists.
    pub fn edge_between(&self, from: NodeId, to: NodeId) -> Option<f64> {
        self.out_edges(from)
            .find(|e| self.edge_to[e.index()] == to)
            .map(|e| self.edge_length[e.index()])
    }

    // ── Spatial queries ───────────────────────────────────────────────────

    /// Resolve a floor coordinate to a node: the node at exactly `pos` if
    /// there is one, otherwise the Euclidean-closest node.  Equidistant
    /// candidates resolve to the lowest `NodeId`.
    ///
    /// Returns `None` only if the graph has no nodes.
    pub fn locate(&self, pos: Point) -> Option<NodeId> {
        let query = [pos.x, pos.y];
        let mut iter = self.spatial_idx.nearest_neighbor_iter_with_distance_2(&query);
        let (first, best_d2) = iter.next()?;
        let mut best = first.id;
        for (entry, d2) in iter {
            if d2 > best_d2 {
                break;
            }
            best = best.min(entry.id);
        }
        Some(best)
    }
}

// ── GraphBuilder ──────────────────────────────────────────────────────────────

/// Construct a [`Graph`] incrementally, then call [`build`](Self::build).
///
/// # Example
///
/// ```
/// use agv_core::Point;
/// use agv_spatial::GraphBuilder;
///
/// let mut b = GraphBuilder::new();
/// let a = b.add_node("A", Point::new(10.0, 20.0)).unwrap();
/// let c = b.add_node("B", Point::new(20.0, 40.0)).unwrap();
/// b.add_road(a, c);
/// let graph = b.build();
/// assert_eq!(graph.node_count(), 2);
/// assert_eq!(graph.edge_count(), 2); // both directions
/// ```
#[derive(Default)]
pub struct GraphBuilder {
    nodes:     Vec<Point>,
    names:     Vec<String>,
    by_name:   HashMap<String, NodeId>,
    raw_edges: Vec<RawEdge>,
}

struct RawEdge {
    from:   NodeId,
    to:     NodeId,
    length: f64,
}

impl GraphBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a named node and return its `NodeId` (sequential from 0).
    pub fn add_node(&mut self, name: &str, pos: Point) -> SpatialResult<NodeId> {
        if self.by_name.contains_key(name) {
            return Err(SpatialError::DuplicateNode(name.to_string()));
        }
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(pos);
        self.names.push(name.to_string());
        self.by_name.insert(name.to_string(), id);
        Ok(id)
    }

    /// Add a **directed** edge whose length is the straight-line distance
    /// between its endpoints.
    pub fn add_edge(&mut self, from: NodeId, to: NodeId) {
        let length = self.nodes[from.index()].distance(self.nodes[to.index()]);
        self.add_edge_with_length(from, to, length);
    }

    /// Add a directed edge with an explicit length.  Lengths shorter than the
    /// straight-line distance make the A* heuristic inadmissible.
    pub fn add_edge_with_length(&mut self, from: NodeId, to: NodeId, length: f64) {
        self.raw_edges.push(RawEdge { from, to, length });
    }

    /// Add edges in **both directions** (an aisle drivable either way).
    pub fn add_road(&mut self, a: NodeId, b: NodeId) {
        self.add_edge(a, b);
        self.add_edge(b, a);
    }

    /// Connect `name` to every node in `neighbors` with undirected roads.
    pub fn connect_by_name<S: AsRef<str>>(&mut self, name: &str, neighbors: &[S]) -> SpatialResult<()> {
        let from = self.node_named(name)?;
        for n in neighbors {
            let to = self.node_named(n.as_ref())?;
            self.add_road(from, to);
        }
        Ok(())
    }

    pub fn node_named(&self, name: &str) -> SpatialResult<NodeId> {
        self.by_name
            .get(name)
            .copied()
            .ok_or_else(|| SpatialError::UnknownNode(name.to_string()))
    }

    pub fn node_count(&self) -> usize { self.nodes.len() }
    pub fn edge_count(&self) -> usize { self.raw_edges.len() }

    /// Consume the builder and produce a [`Graph`].
    ///
    /// Parallel edges between the same ordered pair collapse to the shortest.
    pub fn build(self) -> Graph {
        let node_count = self.nodes.len();

        let mut raw = self.raw_edges;
        raw.sort_by(|a, b| {
            (a.from, a.to)
                .cmp(&(b.from, b.to))
                .then(a.length.total_cmp(&b.length))
        });
        raw.dedup_by_key(|e| (e.from, e.to));

        let edge_from:   Vec<NodeId> = raw.iter().map(|e| e.from).collect();
        let edge_to:     Vec<NodeId> = raw.iter().map(|e| e.to).collect();
        let edge_length: Vec<f64>    = raw.iter().map(|e| e.length).collect();

        let mut node_out_start = vec![0u32; node_count + 1];
        for e in &raw {
            node_out_start[e.from.index() + 1] += 1;
        }
        for i in 1..=node_count {
            node_out_start[i] += node_out_start[i - 1];
        }
        debug_assert_eq!(node_out_start[node_count] as usize, raw.len());

        let entries: Vec<NodeEntry> = self
            .nodes
            .iter()
            .enumerate()
            .map(|(i, p)| NodeEntry { point: [p.x, p.y], id: NodeId(i as u32) })
            .collect();
        let spatial_idx = RTree::bulk_load(entries);

        Graph {
            node_pos: self.nodes,
            node_name: self.names,
            node_out_start,
            edge_from,
            edge_to,
            edge_length,
            by_name: self.by_name,
            spatial_idx,
        }
    }
}
