//! `PathPlanner`: the shared routing and cost oracle.
//!
//! Every agent and optimizer holds a clone; clones share the same immutable
//! graph and router.

use std::fmt;
use std::rc::Rc;

use agv_core::{NodeId, Point};

use crate::{AStarRouter, Graph, Path, Router, SpatialError, SpatialResult};

#[derive(Clone)]
pub struct PathPlanner {
    graph:  Rc<Graph>,
    router: Rc<dyn Router>,
}

impl PathPlanner {
    pub fn new(graph: Rc<Graph>, router: impl Router + 'static) -> Self {
        Self { graph, router: Rc::new(router) }
    }

    /// Planner over `graph` using [`AStarRouter`].
    pub fn astar(graph: Rc<Graph>) -> Self {
        Self::new(graph, AStarRouter)
    }

    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    /// Shortest path between two nodes.
    pub fn find_shortest_path(&self, from: NodeId, to: NodeId) -> SpatialResult<Path> {
        self.router.route(&self.graph, from, to)
    }

    /// Shortest path between two floor coordinates, each resolved with
    /// [`locate`](Self::locate).
    pub fn find_path_between(&self, from: Point, to: Point) -> SpatialResult<Path> {
        let a = self.locate(from)?;
        let b = self.locate(to)?;
        self.find_shortest_path(a, b)
    }

    /// Shortest-path distance between two nodes.
    pub fn distance(&self, from: NodeId, to: NodeId) -> SpatialResult<f64> {
        Ok(self.find_shortest_path(from, to)?.distance)
    }

    /// The node at `pos`, or the closest node if none is exactly there.
    pub fn locate(&self, pos: Point) -> SpatialResult<NodeId> {
        self.graph.locate(pos).ok_or(SpatialError::EmptyGraph)
    }

    pub fn node_named(&self, name: &str) -> SpatialResult<NodeId> {
        self.graph
            .node_named(name)
            .ok_or_else(|| SpatialError::UnknownNode(name.to_string()))
    }

    pub fn position(&self, node: NodeId) -> Point {
        self.graph.position(node)
    }

    /// Among `candidates`, the node with the shortest path from `from`.
    /// Unreachable candidates are skipped; ties go to the earlier candidate.
    pub fn nearest_of(&self, from: NodeId, candidates: &[NodeId]) -> SpatialResult<(NodeId, Path)> {
        let mut best: Option<(NodeId, Path)> = None;
        for &c in candidates {
            let path = match self.find_shortest_path(from, c) {
                Ok(p) => p,
                Err(SpatialError::NoPathFound { .. }) => continue,
                Err(e) => return Err(e),
            };
            if best.as_ref().is_none_or(|(_, b)| path.distance < b.distance) {
                best = Some((c, path));
            }
        }
        match (best, candidates.first()) {
            (Some(found), _) => Ok(found),
            (None, Some(&first)) => Err(SpatialError::NoPathFound { from, to: first }),
            (None, None) => Err(SpatialError::EmptyGraph),
        }
    }
}

impl fmt::Debug for PathPlanner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PathPlanner")
            .field("nodes", &self.graph.node_count())
            .field("edges", &self.graph.edge_count())
            .finish()
    }
}
