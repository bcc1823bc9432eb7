//! CSV output backend.
//!
//! Creates five files in the configured output directory:
//!
//! | File                  | One row per                         |
//! |-----------------------|-------------------------------------|
//! | `global_tasks.csv`    | unassigned task per sample          |
//! | `local_tasks.csv`     | queued task per sample              |
//! | `executing_tasks.csv` | started task per sample             |
//! | `robots.csv`          | robot per sample                    |
//! | `summary.csv`         | run (written once, at the end)      |

use std::fs::File;
use std::path::Path;

use csv::Writer;

use crate::writer::OutputWriter;
use crate::{OutputResult, RobotRow, SummaryRow, TaskRow, TaskTable};

const TASK_HEADER: [&str; 8] =
    ["time", "robot", "order_number", "kind", "pickup", "dropoff", "priority", "picked"];

fn opt<T: ToString>(v: Option<T>) -> String {
    v.map(|v| v.to_string()).unwrap_or_default()
}

/// Writes simulation output to five CSV files.
pub struct CsvWriter {
    global:    Writer<File>,
    local:     Writer<File>,
    executing: Writer<File>,
    robots:    Writer<File>,
    summary:   Writer<File>,
    finished:  bool,
}

impl CsvWriter {
    /// Create the CSV files in `dir` and write the header rows.
    pub fn new(dir: &Path) -> OutputResult<Self> {
        let tasks = |name: &str| -> OutputResult<Writer<File>> {
            let mut w = Writer::from_path(dir.join(name))?;
            w.write_record(TASK_HEADER)?;
            Ok(w)
        };
        let global = tasks("global_tasks.csv")?;
        let local = tasks("local_tasks.csv")?;
        let executing = tasks("executing_tasks.csv")?;

        let mut robots = Writer::from_path(dir.join("robots.csv"))?;
        robots.write_record([
            "time",
            "robot",
            "x",
            "y",
            "node",
            "heading",
            "status",
            "battery",
            "travelled_time",
            "charged_time",
            "congestions",
            "task",
            "path",
        ])?;

        let mut summary = Writer::from_path(dir.join("summary.csv"))?;
        summary.write_record([
            "duration",
            "makespan",
            "travel_time",
            "charging_time",
            "congestions",
            "completed",
            "charges",
            "dropped",
            "faults",
        ])?;

        Ok(Self { global, local, executing, robots, summary, finished: false })
    }
}

impl OutputWriter for CsvWriter {
    fn write_tasks(&mut self, table: TaskTable, rows: &[TaskRow]) -> OutputResult<()> {
        let w = match table {
            TaskTable::Global => &mut self.global,
            TaskTable::Local => &mut self.local,
            TaskTable::Executing => &mut self.executing,
        };
        for row in rows {
            w.write_record(&[
                row.time.to_string(),
                opt(row.robot),
                row.order_number.to_string(),
                row.kind.to_string(),
                row.pickup.to_string(),
                opt(row.dropoff),
                row.priority.to_string(),
                (row.picked as u8).to_string(),
            ])?;
        }
        Ok(())
    }

    fn write_robots(&mut self, rows: &[RobotRow]) -> OutputResult<()> {
        for row in rows {
            self.robots.write_record(&[
                row.time.to_string(),
                row.robot.to_string(),
                row.x.to_string(),
                row.y.to_string(),
                row.node.to_string(),
                row.heading.to_string(),
                row.status.to_string(),
                row.battery.to_string(),
                row.travelled_time.to_string(),
                row.charged_time.to_string(),
                row.congestions.to_string(),
                opt(row.task),
                row.path.clone(),
            ])?;
        }
        Ok(())
    }

    fn write_summary(&mut self, row: &SummaryRow) -> OutputResult<()> {
        self.summary.write_record(&[
            row.duration.to_string(),
            row.makespan.to_string(),
            row.travel_time.to_string(),
            row.charging_time.to_string(),
            row.congestions.to_string(),
            row.completed.to_string(),
            row.charges.to_string(),
            row.dropped.to_string(),
            row.faults.to_string(),
        ])?;
        Ok(())
    }

    fn finish(&mut self) -> OutputResult<()> {
        if self.finished {
            return Ok(());
        }
        self.finished = true;
        for w in [&mut self.global, &mut self.local, &mut self.executing, &mut self.robots, &mut self.summary] {
            w.flush()?;
        }
        Ok(())
    }
}
