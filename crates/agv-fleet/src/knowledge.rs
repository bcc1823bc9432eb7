//! The knowledge base: every store the processes communicate through.
//!
//! Built once per run and handed (cloned) to each component's constructor.
//! Clones share the same stores.

use agv_core::{NodeId, OrderNumber, RobotId, SimTime};
use agv_kernel::{SimHandle, Store};

use crate::{Bid, Message, Robot, Task, TaskKind};

/// A finished task, logged for the run summary.
#[derive(Clone, Debug, PartialEq)]
pub struct Completion {
    pub order_number: OrderNumber,
    pub kind:         TaskKind,
    pub robot:        RobotId,
    pub time:         SimTime,
}

/// An order that never became (or stopped being) a live task.
#[derive(Clone, Debug, PartialEq)]
pub struct Rejection {
    pub order_number: OrderNumber,
    pub reason:       String,
    pub time:         SimTime,
}

#[derive(Clone)]
pub struct KnowledgeBase {
    /// Unassigned transport tasks, in arrival order.
    pub global_tasks: Store<Task>,
    /// Tasks a robot has started, one per busy robot.
    pub executing:    Store<Task>,
    /// Latest snapshot of every robot, in robot order.
    pub robots:       Store<Robot>,
    /// The task currently up for auction.
    pub auction:      Store<Task>,
    pub bids:         Store<Bid>,
    pub completions:  Store<Completion>,
    pub rejections:   Store<Rejection>,
    local_queues:     Vec<Store<Task>>,
    inboxes:          Vec<Store<Message>>,
}

impl KnowledgeBase {
    pub fn new(handle: &SimHandle, robot_count: usize) -> Self {
        Self {
            global_tasks: handle.store("global_tasks"),
            executing:    handle.store("executing"),
            robots:       handle.store("robots"),
            auction:      handle.store("auction"),
            bids:         handle.store("bids"),
            completions:  handle.store("completions"),
            rejections:   handle.store("rejections"),
            local_queues: (0..robot_count).map(|i| handle.store(&format!("local_{i}"))).collect(),
            inboxes:      (0..robot_count).map(|i| handle.store(&format!("inbox_{i}"))).collect(),
        }
    }

    pub fn robot_count(&self) -> usize {
        self.local_queues.len()
    }

    pub fn local(&self, robot: RobotId) -> &Store<Task> {
        &self.local_queues[robot.index()]
    }

    pub fn inbox(&self, robot: RobotId) -> &Store<Message> {
        &self.inboxes[robot.index()]
    }

    pub fn local_queues(&self) -> impl Iterator<Item = (RobotId, &Store<Task>)> {
        self.local_queues.iter().enumerate().map(|(i, s)| (RobotId(i as u32), s))
    }

    pub fn robot(&self, id: RobotId) -> Option<Robot> {
        self.robots.find(|r| r.id == id)
    }

    /// Robots the allocator may give work to, in ID order.
    pub fn available_robots(&self) -> Vec<Robot> {
        let mut robots: Vec<Robot> = self
            .robots
            .snapshot()
            .into_iter()
            .filter(|r| r.status.is_available())
            .collect();
        robots.sort_by_key(|r| r.id);
        robots
    }

    /// Node a robot will plan new work from: the end of the task it is
    /// executing, or where it stands.
    pub fn planning_origin(&self, robot: &Robot) -> NodeId {
        self.executing
            .find(|t| t.robot == Some(robot.id))
            .map_or(robot.node, |t| t.end_node())
    }

    /// The end-of-run condition: nothing queued, in flight, or executing.
    pub fn is_drained(&self) -> bool {
        self.global_tasks.is_settled()
            && self.auction.is_settled()
            && self.executing.is_settled()
            && self.local_queues.iter().all(Store::is_settled)
            && self.inboxes.iter().all(Store::is_settled)
    }

    /// How many stores currently own transport task `order`.  Zero once it
    /// is complete (or before it arrives); never more than one.
    pub fn owner_count(&self, order: OrderNumber) -> usize {
        let is_it = move |t: &Task| t.is_transport() && t.order_number == order;
        let carries = move |m: &Message| m.owned_task().is_some_and(is_it);
        self.global_tasks.count(is_it)
            + self.auction.count(is_it)
            + self.executing.count(is_it)
            + self.local_queues.iter().map(|s| s.count(is_it)).sum::<usize>()
            + self.inboxes.iter().map(|s| s.count(carries)).sum::<usize>()
    }
}
