//! `agv-spatial`: warehouse graph, spatial indexing, and routing.
//!
//! # Crate layout
//!
//! | Module      | Contents                                                     |
//! |-------------|--------------------------------------------------------------|
//! | [`graph`]   | `Graph` (CSR + R-tree), `GraphBuilder`                       |
//! | [`router`]  | `Router` trait, `Path`, `AStarRouter`, `DijkstraRouter`     |
//! | [`planner`] | `PathPlanner`: shared graph + router, the cost oracle       |
//! | [`error`]   | `SpatialError`, `SpatialResult<T>`                           |
//!
//! The graph is built once at setup and never mutated afterwards.  Search
//! scratch (`g`, parent links, closed set) lives in vectors local to each
//! query, so any number of agents can share one `Rc<Graph>`.

pub mod error;
pub mod graph;
pub mod planner;
pub mod router;


pub use error::{SpatialError, SpatialResult};
pub use graph::{Graph, GraphBuilder};
pub use planner::PathPlanner;
pub use router::{AStarRouter, DijkstraRouter, Path, Router};
