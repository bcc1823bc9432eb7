//! Simulation observer trait for status sampling and data collection.

use agv_core::SimTime;

use crate::{RunSummary, StatusTables};

/// Callbacks invoked by [`Simulation::run`][crate::Simulation::run].
///
/// All methods have default no-op implementations so implementors only need
/// to override what they care about.
///
/// # Example: queue-length printer
///
/// ```rust,ignore
/// struct QueueLength;
///
/// impl SimObserver for QueueLength {
///     fn on_sample(&mut self, time: SimTime, tables: &StatusTables) {
///         println!("{time}: {} pending", tables.global.len());
///     }
/// }
/// ```
pub trait SimObserver {
    /// Called every `run.sample_interval` simulated seconds, starting at 0.
    ///
    /// `tables` reflect the state once every event due at or before `time`
    /// has been processed.
    fn on_sample(&mut self, _time: SimTime, _tables: &StatusTables) {}

    /// Called once after the task generator has finished.
    fn on_finish(&mut self, _summary: &RunSummary) {}
}

/// A [`SimObserver`] that does nothing.
pub struct NoopObserver;

impl SimObserver for NoopObserver {}
