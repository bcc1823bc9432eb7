//! `agv-sim`: configuration, assembly, and run loop.
//!
//! # Run loop
//!
//! ```text
//! until the task generator finishes:
//!   ① Peek:   due time of the next kernel event.
//!   ② Sample: emit status tables for every sample instant before it.
//!   ③ Step:   resume one process.
//! ```
//!
//! # Crate layout
//!
//! | Module       | Contents                                               |
//! |--------------|--------------------------------------------------------|
//! | [`config`]   | `SimConfig` and its sections, `load_config`, `validate` |
//! | [`orders`]   | `load_orders`, `load_orders_reader`                    |
//! | [`builder`]  | `SimBuilder`                                           |
//! | [`sim`]      | `Simulation`, `StatusTables`, `RunSummary`             |
//! | [`observer`] | `SimObserver`, `NoopObserver`                          |
//! | [`error`]    | `SimError`, `SimResult<T>`                             |
//!
//! # Quick-start
//!
//! ```rust,ignore
//! use agv_sim::{load_config, load_orders, NoopObserver, SimBuilder};
//!
//! let config = load_config("config.toml")?;
//! let mut sim = SimBuilder::new(config)
//!     .orders(load_orders("orders.csv")?)
//!     .build()?;
//! let summary = sim.run(&mut NoopObserver)?;
//! println!("{} tasks in {:.1} s", summary.completed, summary.duration);
//! ```

pub mod builder;
pub mod config;
pub mod error;
pub mod observer;
pub mod orders;
pub mod sim;

#[cfg(test)]
mod tests;

pub use builder::SimBuilder;
pub use config::{
    load_config, load_config_str, validate, AllocationSection, ConfigError, FleetSection, LayoutSection,
    NodeSpec, Optimizer, Policy, RunSection, SimConfig,
};
pub use error::{SimError, SimResult};
pub use observer::{NoopObserver, SimObserver};
pub use orders::{load_orders, load_orders_reader};
pub use sim::{RunSummary, Simulation, StatusTables};
