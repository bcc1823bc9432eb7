//! `agv-core`: foundational types for the AGV fleet simulator.
//!
//! Every other `agv-*` crate depends on this one.  It has no `agv-*`
//! dependencies and a single external one (`rand`), plus optional `serde`.
//!
//! # What lives here
//!
//! | Module    | Contents                                                   |
//! |-----------|------------------------------------------------------------|
//! | [`ids`]   | `RobotId`, `NodeId`, `EdgeId`, `ProcessId`, `OrderNumber`  |
//! | [`geo`]   | `Point` (planar warehouse coordinates, metres)             |
//! | [`time`]  | `SimTime`, `SimClock`                                      |
//! | [`rng`]   | `SimRng` (seeded, the only randomness source)              |
//!
//! # Feature flags
//!
//! | Flag    | Effect                                                     |
//! |---------|------------------------------------------------------------|
//! | `serde` | Adds `Serialize`/`Deserialize` to all public types.        |

pub mod geo;
pub mod ids;
pub mod rng;
pub mod time;


// ── Re-exports ────────────────────────────────────────────────────────────────

pub use geo::{angle_between, Point};
pub use ids::{EdgeId, NodeId, OrderNumber, ProcessId, RobotId};
pub use rng::SimRng;
pub use time::{SimClock, SimTime};
