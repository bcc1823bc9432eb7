//! Periodic task allocation.
//!
//! [`FleetManager`] wakes every `interval` seconds and hands the knowledge
//! base to a [`PeriodicAllocator`]:
//!
//! | Allocator                     | Tick                                              |
//! |-------------------------------|---------------------------------------------------|
//! | [`OptimalAllocator`]          | pool all unstarted work, solve, rewrite local queues |
//! | [`NearestAvailableAllocator`] | each idle robot takes its nearest pending task    |
//!
//! The auction policy is event-driven instead; see [`Auctioneer`](crate::Auctioneer).

use agv_core::NodeId;
use agv_kernel::SimHandle;
use agv_optimize::{Assigner, CostMatrix, OptimizeError};
use agv_spatial::{PathPlanner, SpatialError, SpatialResult};
use tracing::{debug, info, warn};

use crate::{FleetResult, KnowledgeBase, Message, Robot, RobotStatus, Task};

/// What one allocation tick did.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct AllocationReport {
    /// Tasks considered.
    pub pool:      usize,
    pub assigned:  usize,
    /// Tasks put back into the global queue.
    pub returned:  usize,
    /// Sum of assigned costs (metres).
    pub objective: f64,
}

/// Allocation policy run once per fleet-manager tick.
pub trait PeriodicAllocator {
    fn allocate(&mut self, kb: &KnowledgeBase, planner: &PathPlanner) -> FleetResult<AllocationReport>;

    fn name(&self) -> &'static str;
}

/// Shortest-path distance, with "unreachable" mapped to infinity.
fn reach(planner: &PathPlanner, from: NodeId, to: NodeId) -> SpatialResult<f64> {
    match planner.distance(from, to) {
        Ok(d) => Ok(d),
        Err(SpatialError::NoPathFound { .. }) => Ok(f64::INFINITY),
        Err(e) => Err(e),
    }
}

// ── OptimalAllocator ──────────────────────────────────────────────────────────

/// Centralized re-plan.  Every tick withdraws all unassigned tasks and every
/// transport task still waiting in a local queue, then solves
/// `cost[r][t] = d(origin_r, pickup_t) + d(pickup_t, dropoff_t)` with the
/// configured [`Assigner`] and rewrites the local queues.
///
/// Tasks a robot has already started live in `executing` and are never
/// touched.  A robot's origin is the end of the task it is executing, or
/// its current node.
///
/// With a per-robot capacity only the first `robots × capacity` reachable
/// tasks, by order number, are solved; the rest wait in the global queue
/// for a later tick.
pub struct OptimalAllocator<A: Assigner> {
    assigner: A,
}

impl<A: Assigner> OptimalAllocator<A> {
    pub fn new(assigner: A) -> Self {
        Self { assigner }
    }

    fn costs(
        kb: &KnowledgeBase,
        planner: &PathPlanner,
        robots: &[Robot],
        pool: &[Task],
    ) -> SpatialResult<CostMatrix> {
        // Service legs do not depend on the robot.
        let mut service = Vec::with_capacity(pool.len());
        for t in pool {
            service.push(match t.dropoff {
                Some(d) => reach(planner, t.pickup, d)?,
                None => 0.0,
            });
        }
        let mut costs = CostMatrix::new(robots.len(), pool.len(), f64::INFINITY);
        for (r, robot) in robots.iter().enumerate() {
            let origin = kb.planning_origin(robot);
            for (j, t) in pool.iter().enumerate() {
                costs.set(r, j, reach(planner, origin, t.pickup)? + service[j]);
            }
        }
        Ok(costs)
    }

    fn give_back(kb: &KnowledgeBase, tasks: Vec<Task>) -> usize {
        let n = tasks.len();
        for mut t in tasks {
            t.robot = None;
            kb.global_tasks.put(t);
        }
        n
    }
}

impl<A: Assigner> PeriodicAllocator for OptimalAllocator<A> {
    fn allocate(&mut self, kb: &KnowledgeBase, planner: &PathPlanner) -> FleetResult<AllocationReport> {
        let mut pool = kb.global_tasks.remove_all(|_| true);
        for (_, local) in kb.local_queues() {
            pool.extend(local.remove_all(Task::is_transport));
        }
        if pool.is_empty() {
            return Ok(AllocationReport::default());
        }
        pool.sort_by_key(|t| t.order_number);
        let mut report = AllocationReport { pool: pool.len(), ..Default::default() };

        let robots = kb.available_robots();
        if robots.is_empty() {
            debug!(tasks = pool.len(), "no available robots");
            report.returned = Self::give_back(kb, pool);
            return Ok(report);
        }

        let costs = match Self::costs(kb, planner, &robots, &pool) {
            Ok(c) => c,
            Err(e) => {
                Self::give_back(kb, pool);
                return Err(e.into());
            }
        };

        // Tasks nobody can reach wait in the global queue.
        let mut live = Vec::new();
        let mut columns = Vec::new();
        let mut stranded = Vec::new();
        for (j, t) in pool.into_iter().enumerate() {
            if (0..robots.len()).any(|r| costs.get(r, j).is_finite()) {
                live.push(t);
                columns.push(j);
            } else {
                warn!(%t, "no available robot can reach task");
                stranded.push(t);
            }
        }
        report.returned = Self::give_back(kb, stranded);
        if let Some(cap) = self.assigner.capacity() {
            let slots = robots.len() * cap;
            if live.len() > slots {
                let overflow = live.split_off(slots);
                columns.truncate(slots);
                debug!(slots, waiting = overflow.len(), "pool exceeds robot capacity");
                report.returned += Self::give_back(kb, overflow);
            }
        }
        if live.is_empty() {
            return Ok(report);
        }
        let mut sub = CostMatrix::new(robots.len(), live.len(), f64::INFINITY);
        for r in 0..robots.len() {
            for (k, &j) in columns.iter().enumerate() {
                sub.set(r, k, costs.get(r, j));
            }
        }

        let assignment = match self.assigner.assign(&sub) {
            Ok(a) => a,
            Err(OptimizeError::Infeasible(reason)) => {
                warn!(assigner = self.assigner.name(), %reason, "assignment infeasible; tasks stay unassigned");
                report.returned += Self::give_back(kb, live);
                return Ok(report);
            }
            Err(e) => {
                Self::give_back(kb, live);
                return Err(e.into());
            }
        };

        for (mut task, &r) in live.into_iter().zip(&assignment.task_to_robot) {
            let id = robots[r].id;
            task.robot = Some(id);
            kb.local(id).put(task);
            report.assigned += 1;
        }
        report.objective = assignment.objective;
        debug!(
            assigner = self.assigner.name(),
            robots = robots.len(),
            assigned = report.assigned,
            objective = report.objective,
            "re-plan"
        );
        Ok(report)
    }

    fn name(&self) -> &'static str {
        "centralized"
    }
}

// ── NearestAvailableAllocator ─────────────────────────────────────────────────

/// Greedy dispatch.  In robot ID order, every IDLE robot with nothing queued
/// receives the pending task whose pickup is nearest by path, as a
/// [`Message::Push`].  Ties go to the task that arrived first.
#[derive(Clone, Debug, Default)]
pub struct NearestAvailableAllocator;

impl NearestAvailableAllocator {
    pub fn new() -> Self {
        Self
    }
}

impl PeriodicAllocator for NearestAvailableAllocator {
    fn allocate(&mut self, kb: &KnowledgeBase, planner: &PathPlanner) -> FleetResult<AllocationReport> {
        let mut report = AllocationReport { pool: kb.global_tasks.len(), ..Default::default() };
        for robot in kb.available_robots() {
            if robot.status != RobotStatus::Idle
                || !kb.local(robot.id).is_settled()
                || !kb.inbox(robot.id).is_settled()
            {
                continue;
            }
            let mut best: Option<(Task, f64)> = None;
            for t in kb.global_tasks.snapshot() {
                let d = reach(planner, robot.node, t.pickup)?;
                if d.is_finite() && best.as_ref().is_none_or(|(_, b)| d < *b) {
                    best = Some((t, d));
                }
            }
            let Some((task, d)) = best else { continue };
            let Some(mut task) = kb.global_tasks.remove(|t| t.same_as(&task)) else { continue };
            task.robot = Some(robot.id);
            info!(robot = %robot.id, %task, distance = d, "pushed nearest task");
            kb.inbox(robot.id).put(Message::Push(task));
            report.assigned += 1;
            report.objective += d;
        }
        Ok(report)
    }

    fn name(&self) -> &'static str {
        "greedy"
    }
}

// ── FleetManager ──────────────────────────────────────────────────────────────

/// The periodic allocation process.
pub struct FleetManager {
    handle:    SimHandle,
    kb:        KnowledgeBase,
    planner:   PathPlanner,
    allocator: Box<dyn PeriodicAllocator>,
    interval:  f64,
}

impl FleetManager {
    pub fn new(
        handle: SimHandle,
        kb: KnowledgeBase,
        planner: PathPlanner,
        allocator: Box<dyn PeriodicAllocator>,
        interval: f64,
    ) -> Self {
        Self { handle, kb, planner, allocator, interval }
    }

    /// Run one allocation immediately.
    pub fn tick(&mut self) -> FleetResult<AllocationReport> {
        self.allocator.allocate(&self.kb, &self.planner)
    }

    pub async fn run(mut self) -> FleetResult<()> {
        info!(policy = self.allocator.name(), interval = self.interval, "fleet manager started");
        loop {
            let report = self.tick()?;
            if report.assigned > 0 {
                debug!(time = %self.handle.now(), ?report, "allocation tick");
            }
            self.handle.timeout(self.interval).await;
        }
    }
}
