//! Value types exchanged through the knowledge base.
//!
//! All of these are plain data: stores hold copies, and a reader can never
//! observe a half-updated robot or task.

use std::fmt;

use agv_core::{NodeId, OrderNumber, Point, RobotId};
use agv_optimize::Stop;

// ── Task ──────────────────────────────────────────────────────────────────────

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum TaskKind {
    /// Pick up at `pickup`, deliver to `dropoff` (if any).
    Transport,
    /// Drive to the station at `pickup` and recharge.  Created by robots.
    Charging,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Task {
    pub order_number: OrderNumber,
    pub kind:         TaskKind,
    pub pickup:       NodeId,
    pub dropoff:      Option<NodeId>,
    pub priority:     u32,
    /// Set once a robot owns the task.
    pub robot:        Option<RobotId>,
    /// Set after the pickup dwell completes.
    pub picked:       bool,
}

impl Task {
    pub fn transport(order_number: OrderNumber, pickup: NodeId, dropoff: Option<NodeId>, priority: u32) -> Self {
        Self {
            order_number,
            kind: TaskKind::Transport,
            pickup,
            dropoff,
            priority,
            robot: None,
            picked: false,
        }
    }

    /// A zero-priority charging task owned by `robot` from the start.
    pub fn charging(robot: RobotId, station: NodeId) -> Self {
        Self {
            order_number: OrderNumber::CHARGING,
            kind:         TaskKind::Charging,
            pickup:       station,
            dropoff:      None,
            priority:     0,
            robot:        Some(robot),
            picked:       false,
        }
    }

    pub fn is_transport(&self) -> bool {
        self.kind == TaskKind::Transport
    }

    /// Same logical task.  Charging tasks share an order number, so the
    /// owning robot disambiguates them.
    pub fn same_as(&self, other: &Task) -> bool {
        self.order_number == other.order_number
            && self.kind == other.kind
            && (self.is_transport() || self.robot == other.robot)
    }

    /// Where the robot stands once this task is done.
    pub fn end_node(&self) -> NodeId {
        self.dropoff.unwrap_or(self.pickup)
    }

    pub fn stop(&self) -> Stop {
        Stop::new(self.pickup, self.dropoff)
    }
}

impl fmt::Display for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            TaskKind::Transport => write!(f, "task {}", self.order_number),
            TaskKind::Charging => write!(f, "charging at {}", self.pickup),
        }
    }
}

// ── Messages ──────────────────────────────────────────────────────────────────

/// Fleet manager → robot messages, delivered to the robot's inbox.
#[derive(Clone, Debug, PartialEq)]
pub enum Message {
    /// Auction call for bids.  Carries a copy; the auction store keeps the
    /// task itself.
    Announce(Task),
    /// Auction award.  Only the winner receives it.
    Assign(Task, RobotId),
    /// Direct dispatch by the greedy policy.
    Push(Task),
}

impl Message {
    /// The task this message transfers ownership of, if any.
    pub fn owned_task(&self) -> Option<&Task> {
        match self {
            Message::Announce(_) => None,
            Message::Assign(t, _) | Message::Push(t) => Some(t),
        }
    }
}

/// Robot → auctioneer reply to an [`Message::Announce`].
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Bid {
    pub order_number: OrderNumber,
    /// Marginal tour cost in metres; `INFINITY` if the robot cannot reach
    /// the task.
    pub value: f64,
    pub robot: RobotId,
}

// ── Robot snapshot ────────────────────────────────────────────────────────────

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum RobotStatus {
    Idle,
    Busy,
    Charging,
    /// Battery under threshold; no new work until charged.
    Empty,
}

impl RobotStatus {
    /// May the fleet manager give this robot more work?
    pub fn is_available(self) -> bool {
        matches!(self, RobotStatus::Idle | RobotStatus::Busy)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RobotStatus::Idle => "IDLE",
            RobotStatus::Busy => "BUSY",
            RobotStatus::Charging => "CHARGING",
            RobotStatus::Empty => "EMPTY",
        }
    }
}

impl fmt::Display for RobotStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Published state of one robot.  Republished after every change.
#[derive(Clone, Debug, PartialEq)]
pub struct Robot {
    pub id:             RobotId,
    pub position:       Point,
    /// Last node reached.
    pub node:           NodeId,
    /// Radians, `atan2` convention.
    pub heading:        f64,
    /// Remaining route, current node first.  Empty when parked.
    pub path:           Vec<NodeId>,
    pub status:         RobotStatus,
    /// Percent, `[0, 100]`.
    pub battery:        f64,
    pub travelled_time: f64,
    pub charged_time:   f64,
    pub congestions:    u32,
    /// Order number of the task being executed.
    pub task:           Option<OrderNumber>,
}

impl Robot {
    pub fn new(id: RobotId, node: NodeId, position: Point, battery: f64) -> Self {
        Self {
            id,
            position,
            node,
            heading: 0.0,
            path: Vec::new(),
            status: RobotStatus::Idle,
            battery,
            travelled_time: 0.0,
            charged_time: 0.0,
            congestions: 0,
            task: None,
        }
    }

    pub fn is_moving(&self) -> bool {
        !self.path.is_empty()
    }

    /// Does this robot hold its spot on the floor?  True while travelling,
    /// dwelling on a task, or charging.  An idle robot with no task is
    /// passable.
    pub fn obstructs(&self) -> bool {
        self.is_moving() || self.task.is_some() || self.status == RobotStatus::Charging
    }
}
