//! The AGV agent.
//!
//! One `Agv` runs as three kernel processes that share its private state:
//!
//! | Process            | Loop                                                |
//! |--------------------|-----------------------------------------------------|
//! | `run`              | battery check → `local.get()` → execute task        |
//! | `monitor_status`   | every `status_interval`: BUSY under threshold → EMPTY |
//! | `collect_messages` | `inbox.get()` → bid, or accept into the local queue |
//!
//! State machine: `IDLE → BUSY → (IDLE | EMPTY) → CHARGING → IDLE`.
//!
//! Every mutation of the robot goes through [`Agv::update`], which republishes
//! a complete snapshot into `kb.robots` in one `replace`.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use agv_core::{angle_between, NodeId, ProcessId, RobotId};
use agv_kernel::{Kernel, SimHandle};
use agv_optimize::{OptimizeError, Stop, TourPlanner};
use agv_spatial::{PathPlanner, SpatialError};
use tracing::{debug, info, warn};

use crate::{
    AgvParams, Bid, ChargePolicy, Completion, FleetError, FleetResult, InsertionPolicy,
    KnowledgeBase, Message, Robot, RobotStatus, Task, TaskKind,
};

/// Positions closer than this are treated as coincident, not as a blockage.
const COINCIDENT: f64 = 1e-6;

#[derive(Clone)]
pub struct Agv {
    id:               RobotId,
    handle:           SimHandle,
    kb:               KnowledgeBase,
    planner:          PathPlanner,
    params:           Rc<AgvParams>,
    stations:         Rc<[NodeId]>,
    state:            Rc<RefCell<Robot>>,
    /// A charging task is queued or a divert is under way.
    charge_requested: Rc<Cell<bool>>,
}

impl Agv {
    /// Create the agent parked at `start` and publish its first snapshot.
    pub fn new(
        id: RobotId,
        start: NodeId,
        handle: SimHandle,
        kb: KnowledgeBase,
        planner: PathPlanner,
        params: Rc<AgvParams>,
        stations: Rc<[NodeId]>,
    ) -> Self {
        let battery = params.initial_battery.clamp(0.0, 100.0);
        let robot = Robot::new(id, start, planner.position(start), battery);
        kb.robots.put(robot.clone());
        Self {
            id,
            handle,
            kb,
            planner,
            params,
            stations,
            state: Rc::new(RefCell::new(robot)),
            charge_requested: Rc::new(Cell::new(false)),
        }
    }

    pub fn id(&self) -> RobotId {
        self.id
    }

    /// Copy of the live state.
    pub fn snapshot(&self) -> Robot {
        self.state.borrow().clone()
    }

    /// Spawn the three processes: main loop, status monitor, collector.
    pub fn spawn(&self, kernel: &mut Kernel) -> [ProcessId; 3] {
        let name = |part: &str| format!("agv-{}-{part}", self.id.0);
        [
            kernel.spawn(name("main"), self.clone().run()),
            kernel.spawn(name("monitor"), self.clone().monitor_status()),
            kernel.spawn(name("collector"), self.clone().collect_messages()),
        ]
    }

    /// Mutate the live state and republish it.
    fn update(&self, f: impl FnOnce(&mut Robot)) {
        let snapshot = {
            let mut robot = self.state.borrow_mut();
            f(&mut robot);
            robot.clone()
        };
        let id = self.id;
        self.kb.robots.replace(|r| r.id == id, snapshot);
    }

    // ── Main loop ─────────────────────────────────────────────────────────────

    pub async fn run(self) -> FleetResult<()> {
        debug!(robot = %self.id, "main loop started");
        loop {
            self.check_battery().await?;
            let task = self.kb.local(self.id).get().await;
            self.execute(task).await?;
        }
    }

    /// Between tasks: a battery under threshold turns the robot EMPTY and
    /// starts the configured charging behaviour.
    async fn check_battery(&self) -> FleetResult<()> {
        let (battery, status) = {
            let r = self.state.borrow();
            (r.battery, r.status)
        };
        if battery >= self.params.battery_threshold || status == RobotStatus::Charging {
            return Ok(());
        }
        if status != RobotStatus::Empty {
            info!(robot = %self.id, battery, "battery under threshold");
            self.update(|r| r.status = RobotStatus::Empty);
        }
        match self.params.charging {
            ChargePolicy::QueueTask => self.request_charging(),
            ChargePolicy::Divert => self.divert_to_charge().await,
        }
    }

    async fn execute(&self, mut task: Task) -> FleetResult<()> {
        let order = task.order_number;
        self.kb.global_tasks.remove(|t| t.same_as(&task));
        task.robot = Some(self.id);
        self.kb.executing.put(task.clone());
        self.update(|r| {
            r.task = Some(order);
            if r.status == RobotStatus::Idle {
                r.status = RobotStatus::Busy;
            }
        });
        info!(robot = %self.id, %task, time = %self.handle.now(), "task started");

        self.move_to(task.pickup).await?;
        match task.kind {
            TaskKind::Charging => self.charge().await,
            TaskKind::Transport => {
                self.handle.timeout(self.params.dwell_time).await;
                task.picked = true;
                let key = task.clone();
                self.kb.executing.replace(|t| t.same_as(&key), task.clone());
                debug!(robot = %self.id, %task, "picked");
                if let Some(dropoff) = task.dropoff {
                    self.move_to(dropoff).await?;
                    self.handle.timeout(self.params.dwell_time).await;
                }
            }
        }

        self.kb.executing.remove(|t| t.same_as(&task));
        self.kb.completions.put(Completion {
            order_number: order,
            kind:         task.kind,
            robot:        self.id,
            time:         self.handle.now(),
        });
        self.update(|r| {
            r.task = None;
            if r.status == RobotStatus::Busy {
                r.status = RobotStatus::Idle;
            }
        });
        info!(robot = %self.id, %task, time = %self.handle.now(), "task complete");
        Ok(())
    }

    // ── Motion ────────────────────────────────────────────────────────────────

    /// Drive to `target` hop by hop.  Each hop is split into `substeps`
    /// equal slices; every slice waits for clearance, then consumes time and
    /// battery and moves the published position.
    async fn move_to(&self, target: NodeId) -> FleetResult<()> {
        let from = self.state.borrow().node;
        let path = self.planner.find_shortest_path(from, target)?;
        if path.is_trivial() {
            return Ok(());
        }
        debug!(robot = %self.id, %from, %target, distance = path.distance, "moving");
        self.update(|r| r.path = path.nodes.clone());

        let graph = self.planner.graph();
        let substeps = self.params.substeps.max(1);
        for hop in path.nodes.windows(2) {
            let (a, b) = (hop[0], hop[1]);
            let (start, end) = (graph.position(a), graph.position(b));
            let length = graph.edge_between(a, b).unwrap_or_else(|| start.distance(end));
            let dt = length / self.params.speed / f64::from(substeps);
            let heading = start.heading_to(end);
            self.update(|r| r.heading = heading);

            for k in 1..=substeps {
                self.wait_for_clearance().await;
                self.handle.timeout(dt).await;
                let position = start.lerp(end, f64::from(k) / f64::from(substeps));
                let drain = self.params.drain_per_second * dt;
                self.update(|r| {
                    r.position = position;
                    r.battery = (r.battery - drain).max(0.0);
                    r.travelled_time += dt;
                });
            }
            self.update(|r| {
                r.node = b;
                r.position = end;
                if !r.path.is_empty() {
                    r.path.remove(0);
                }
            });
        }
        self.update(|r| r.path.clear());
        Ok(())
    }

    /// Poll until no robot blocks the way.  One pause counts as one
    /// congestion, however many polls it lasts.
    async fn wait_for_clearance(&self) {
        let mut paused = false;
        while self.obstructed() {
            if !paused {
                paused = true;
                self.update(|r| r.congestions += 1);
                debug!(robot = %self.id, time = %self.handle.now(), "congestion");
            }
            self.handle.timeout(self.params.collision_poll).await;
        }
    }

    fn obstructed(&self) -> bool {
        let me = self.state.borrow().clone();
        let params = &self.params;
        self.kb.robots.with_items(|robots| {
            robots
                .iter()
                .any(|other| other.id != me.id && blocks(&me, other, params))
        })
    }

    // ── Charging ──────────────────────────────────────────────────────────────

    /// Queue-based charging: put a charging task for the nearest station at
    /// the front of the local queue, once per low-battery episode.
    fn request_charging(&self) -> FleetResult<()> {
        if self.charge_requested.get() {
            return Ok(());
        }
        let origin = self.kb.planning_origin(&self.state.borrow());
        let station = self.nearest_station(origin)?;
        self.charge_requested.set(true);
        self.kb.local(self.id).put_front(Task::charging(self.id, station));
        info!(robot = %self.id, %station, "charging task queued");
        Ok(())
    }

    /// Divert charging: drive straight to the nearest station and charge.
    async fn divert_to_charge(&self) -> FleetResult<()> {
        let origin = self.state.borrow().node;
        let station = self.nearest_station(origin)?;
        self.charge_requested.set(true);
        info!(robot = %self.id, %station, "diverting to charge");
        self.move_to(station).await?;
        self.charge().await;
        Ok(())
    }

    fn nearest_station(&self, from: NodeId) -> FleetResult<NodeId> {
        match self.planner.nearest_of(from, &self.stations) {
            Ok((station, _)) => Ok(station),
            Err(SpatialError::NoPathFound { .. } | SpatialError::EmptyGraph) => {
                Err(FleetError::NoChargingStation(self.id))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Charge to 100 in `charge_steps` equal increments over
    /// [`AgvParams::charge_duration`].
    async fn charge(&self) {
        let start = self.state.borrow().battery;
        let duration = self.params.charge_duration(start);
        let steps = self.params.charge_steps.max(1);
        let dt = duration / f64::from(steps);
        let gain = (100.0 - start).max(0.0) / f64::from(steps);
        self.update(|r| r.status = RobotStatus::Charging);
        info!(robot = %self.id, battery = start, duration, "charging");

        for step in 1..=steps {
            self.handle.timeout(dt).await;
            let level = if step == steps { 100.0 } else { (start + gain * f64::from(step)).min(100.0) };
            self.update(|r| {
                r.battery = level;
                r.charged_time += dt;
            });
        }
        self.charge_requested.set(false);
        self.update(|r| r.status = RobotStatus::Idle);
        info!(robot = %self.id, time = %self.handle.now(), "charged");
    }

    // ── Status monitor ────────────────────────────────────────────────────────

    pub async fn monitor_status(self) -> FleetResult<()> {
        loop {
            self.handle.timeout(self.params.status_interval).await;
            let (battery, status) = {
                let r = self.state.borrow();
                (r.battery, r.status)
            };
            if status == RobotStatus::Busy && battery < self.params.battery_threshold {
                info!(robot = %self.id, battery, "battery under threshold while busy");
                self.update(|r| r.status = RobotStatus::Empty);
                if self.params.charging == ChargePolicy::QueueTask {
                    self.request_charging()?;
                }
            }
        }
    }

    // ── Message collector ─────────────────────────────────────────────────────

    pub async fn collect_messages(self) -> FleetResult<()> {
        let inbox = self.kb.inbox(self.id).clone();
        loop {
            match inbox.get().await {
                Message::Announce(task) => {
                    let value = self.bid_for(&task)?;
                    debug!(robot = %self.id, %task, value, "bid");
                    self.kb.bids.put(Bid { order_number: task.order_number, value, robot: self.id });
                }
                Message::Assign(task, _) | Message::Push(task) => self.accept(task),
            }
        }
    }

    /// Transport work already queued, as tour stops.
    fn queued_stops(&self) -> Vec<Stop> {
        self.kb
            .local(self.id)
            .with_items(|q| q.iter().filter(|t| t.is_transport()).map(Task::stop).collect())
    }

    /// Marginal tour cost of adding `task`.  Unreachable work bids infinity.
    fn bid_for(&self, task: &Task) -> FleetResult<f64> {
        let origin = self.kb.planning_origin(&self.state.borrow());
        let current = self.queued_stops();
        match TourPlanner::new(&self.planner).marginal_cost(origin, &current, task.stop()) {
            Ok(value) => Ok(value),
            Err(OptimizeError::Spatial(SpatialError::NoPathFound { .. })) => Ok(f64::INFINITY),
            Err(e) => Err(e.into()),
        }
    }

    fn accept(&self, mut task: Task) {
        task.robot = Some(self.id);
        info!(robot = %self.id, %task, "task accepted");
        let local = self.kb.local(self.id);
        if self.params.insertion == InsertionPolicy::Tail {
            local.put(task);
            return;
        }

        // Re-solve the order of every queued transport task.  Charging tasks
        // stay in front.
        let mut pending = local.remove_all(Task::is_transport);
        pending.push(task);
        let origin = self.kb.planning_origin(&self.state.borrow());
        let stops: Vec<Stop> = pending.iter().map(Task::stop).collect();
        match TourPlanner::new(&self.planner).plan(origin, &stops) {
            Ok(tour) => {
                let mut slots: Vec<Option<Task>> = pending.into_iter().map(Some).collect();
                for i in tour.order {
                    if let Some(t) = slots[i].take() {
                        local.put(t);
                    }
                }
            }
            Err(e) => {
                warn!(robot = %self.id, error = %e, "tour re-optimisation failed; keeping arrival order");
                pending.into_iter().for_each(|t| local.put(t));
            }
        }
    }
}

/// Does `other` block `me`?  It must hold its spot (see
/// [`Robot::obstructs`]), be closer than the threshold, and sit inside the
/// cone around `me`'s heading.  A robot standing still always blocks; for
/// two travelling robots that each lie in the other's cone the lower ID
/// proceeds.  Idle robots without a task never block, so a robot parked for
/// good cannot stall the fleet.
pub(crate) fn blocks(me: &Robot, other: &Robot, params: &AgvParams) -> bool {
    if !other.obstructs() {
        return false;
    }
    let d = me.position.distance(other.position);
    if d <= COINCIDENT || d >= params.collision_threshold {
        return false;
    }
    let ahead = angle_between(me.position.heading_to(other.position), me.heading);
    if ahead > params.collision_tolerance {
        return false;
    }
    if !other.is_moving() {
        return true;
    }
    let facing_me = angle_between(other.position.heading_to(me.position), other.heading);
    facing_me > params.collision_tolerance || other.id < me.id
}
