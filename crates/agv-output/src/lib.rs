//! `agv-output`: status-table and summary writers.
//!
//! | Backend | Files created                                                   |
//! |---------|-----------------------------------------------------------------|
//! | CSV     | `global_tasks.csv`, `local_tasks.csv`, `executing_tasks.csv`,   |
//! |         | `robots.csv`, `summary.csv`                                     |
//!
//! Backends implement [`OutputWriter`] and are driven by
//! [`SimOutputObserver`], which implements `agv_sim::SimObserver`.
//!
//! # Usage
//!
//! ```rust,ignore
//! use agv_output::{CsvWriter, SimOutputObserver};
//!
//! let writer = CsvWriter::new(Path::new("./output"))?;
//! let mut obs = SimOutputObserver::new(writer);
//! sim.run(&mut obs)?;
//! if let Some(e) = obs.take_error() {
//!     eprintln!("output error: {e}");
//! }
//! ```

pub mod csv;
pub mod error;
pub mod observer;
pub mod row;
pub mod writer;


pub use csv::CsvWriter;
pub use error::{OutputError, OutputResult};
pub use observer::SimOutputObserver;
pub use row::{RobotRow, SummaryRow, TaskRow, TaskTable};
pub use writer::OutputWriter;
