//! `SimOutputObserver<W>`: bridges `SimObserver` to an `OutputWriter`.

use agv_core::SimTime;
use agv_sim::{RunSummary, SimObserver, StatusTables};

use crate::row::{RobotRow, SummaryRow, TaskRow, TaskTable};
use crate::writer::OutputWriter;
use crate::{OutputError, OutputResult};

/// A [`SimObserver`] that writes every sampled table and the run summary to
/// an [`OutputWriter`] backend.
///
/// Errors from the writer are stored internally because `SimObserver` methods
/// have no return value.  After `sim.run()` returns, check for errors with
/// [`take_error`][Self::take_error].
pub struct SimOutputObserver<W: OutputWriter> {
    writer:     W,
    samples:    u64,
    last_error: Option<OutputError>,
}

impl<W: OutputWriter> SimOutputObserver<W> {
    pub fn new(writer: W) -> Self {
        Self { writer, samples: 0, last_error: None }
    }

    /// Take the stored write error (if any) after `sim.run()` returns.
    ///
    /// Returns `None` if all writes succeeded.
    pub fn take_error(&mut self) -> Option<OutputError> {
        self.last_error.take()
    }

    /// Samples handed to the writer so far.
    pub fn samples(&self) -> u64 {
        self.samples
    }

    /// Unwrap the inner writer (e.g. to inspect files after the sim).
    pub fn into_writer(self) -> W {
        self.writer
    }

    fn store_err(&mut self, result: OutputResult<()>) {
        if let Err(e) = result {
            // Keep only the first error.
            if self.last_error.is_none() {
                self.last_error = Some(e);
            }
        }
    }

    fn write_sample(&mut self, time: SimTime, tables: &StatusTables) -> OutputResult<()> {
        let global: Vec<TaskRow> =
            tables.global.iter().chain(&tables.auction).map(|t| TaskRow::new(time, t, None)).collect();
        self.writer.write_tasks(TaskTable::Global, &global)?;

        let local: Vec<TaskRow> = tables
            .local
            .iter()
            .flat_map(|(owner, queue)| queue.iter().map(|t| TaskRow::new(time, t, Some(*owner))))
            .collect();
        self.writer.write_tasks(TaskTable::Local, &local)?;

        let executing: Vec<TaskRow> = tables.executing.iter().map(|t| TaskRow::new(time, t, None)).collect();
        self.writer.write_tasks(TaskTable::Executing, &executing)?;

        let robots: Vec<RobotRow> = tables.robots.iter().map(|r| RobotRow::new(time, r)).collect();
        self.writer.write_robots(&robots)
    }
}

impl<W: OutputWriter> SimObserver for SimOutputObserver<W> {
    fn on_sample(&mut self, time: SimTime, tables: &StatusTables) {
        self.samples += 1;
        let result = self.write_sample(time, tables);
        self.store_err(result);
    }

    fn on_finish(&mut self, summary: &RunSummary) {
        let result = self.writer.write_summary(&SummaryRow::from(summary));
        self.store_err(result);
        let result = self.writer.finish();
        self.store_err(result);
    }
}
