//! Plain data row types written by output backends.

use agv_core::{RobotId, SimTime};
use agv_fleet::{Robot, Task, TaskKind};
use agv_sim::RunSummary;

/// Which task table a batch of [`TaskRow`]s belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskTable {
    /// Unassigned tasks, including one held for auction.
    Global,
    /// Robot-owned queues, not yet started.
    Local,
    Executing,
}

/// One task as listed in a sampled table.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskRow {
    pub time:         f64,
    /// Queue owner for local rows, assignee otherwise.
    pub robot:        Option<u32>,
    pub order_number: u64,
    pub kind:         &'static str,
    pub pickup:       u32,
    pub dropoff:      Option<u32>,
    pub priority:     u32,
    pub picked:       bool,
}

impl TaskRow {
    pub fn new(time: SimTime, task: &Task, robot: Option<RobotId>) -> Self {
        Self {
            time:         time.secs(),
            robot:        robot.or(task.robot).map(|r| r.0),
            order_number: task.order_number.0,
            kind:         match task.kind {
                TaskKind::Transport => "transport",
                TaskKind::Charging => "charging",
            },
            pickup:       task.pickup.0,
            dropoff:      task.dropoff.map(|n| n.0),
            priority:     task.priority,
            picked:       task.picked,
        }
    }
}

/// One robot's published state at a sample.
#[derive(Debug, Clone, PartialEq)]
pub struct RobotRow {
    pub time:           f64,
    pub robot:          u32,
    pub x:              f64,
    pub y:              f64,
    pub node:           u32,
    pub heading:        f64,
    pub status:         &'static str,
    pub battery:        f64,
    pub travelled_time: f64,
    pub charged_time:   f64,
    pub congestions:    u32,
    pub task:           Option<u64>,
    /// Remaining route as node ids joined by `;`, empty when parked.
    pub path:           String,
}

impl RobotRow {
    pub fn new(time: SimTime, robot: &Robot) -> Self {
        Self {
            time:           time.secs(),
            robot:          robot.id.0,
            x:              robot.position.x,
            y:              robot.position.y,
            node:           robot.node.0,
            heading:        robot.heading,
            status:         robot.status.as_str(),
            battery:        robot.battery,
            travelled_time: robot.travelled_time,
            charged_time:   robot.charged_time,
            congestions:    robot.congestions,
            task:           robot.task.map(|o| o.0),
            path:           robot.path.iter().map(|n| n.0.to_string()).collect::<Vec<_>>().join(";"),
        }
    }
}

/// Totals for a finished run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SummaryRow {
    pub duration:      f64,
    pub makespan:      f64,
    pub travel_time:   f64,
    pub charging_time: f64,
    pub congestions:   u32,
    pub completed:     u64,
    pub charges:       u64,
    pub dropped:       u64,
    pub faults:        u64,
}

impl From<&RunSummary> for SummaryRow {
    fn from(s: &RunSummary) -> Self {
        Self {
            duration:      s.duration,
            makespan:      s.makespan,
            travel_time:   s.travel_time,
            charging_time: s.charging_time,
            congestions:   s.congestions,
            completed:     s.completed as u64,
            charges:       s.charges as u64,
            dropped:       s.dropped as u64,
            faults:        s.faults as u64,
        }
    }
}
