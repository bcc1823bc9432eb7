//! The `OutputWriter` trait implemented by backend writers.

use crate::{OutputResult, RobotRow, SummaryRow, TaskRow, TaskTable};

/// Sink for sampled status tables and the final run summary.
///
/// Errors are stored by the observer, not raised; retrieve them with
/// [`SimOutputObserver::take_error`](crate::SimOutputObserver::take_error).
pub trait OutputWriter {
    /// Write one sample of one task table.
    fn write_tasks(&mut self, table: TaskTable, rows: &[TaskRow]) -> OutputResult<()>;

    /// Write one sample of the robot list.
    fn write_robots(&mut self, rows: &[RobotRow]) -> OutputResult<()>;

    fn write_summary(&mut self, row: &SummaryRow) -> OutputResult<()>;

    /// Flush and close all underlying file handles.
    ///
    /// Idempotent: safe to call more than once.
    fn finish(&mut self) -> OutputResult<()>;
}
