//! `agv-optimize`: assignment and tour optimizers.
//!
//! # Crate layout
//!
//! | Module     | Contents                                                       |
//! |------------|----------------------------------------------------------------|
//! | [`matrix`] | `CostMatrix` (robots × tasks), `Assignment`                    |
//! | [`assign`] | `Assigner` trait, `ExactAssigner`, `RandomSearchAssigner`      |
//! | [`tour`]   | `TravelCost` trait, `Stop`, `Tour`, `TourPlanner`              |
//! | [`error`]  | `OptimizeError`, `OptimizeResult<T>`                           |
//!
//! Assigners are interchangeable behind [`Assigner`]; the fleet manager picks
//! one from configuration.  Non-finite costs mark forbidden pairs (a robot
//! that cannot reach a pickup).

pub mod assign;
pub mod error;
pub mod matrix;
pub mod tour;


pub use assign::{Assigner, ExactAssigner, RandomSearchAssigner};
pub use error::{OptimizeError, OptimizeResult};
pub use matrix::{Assignment, CostMatrix};
pub use tour::{Stop, Tour, TourPlanner, TravelCost};
