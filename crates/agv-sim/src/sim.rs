//! The assembled run: kernel, knowledge base, and agents.

use agv_core::{OrderNumber, ProcessId, RobotId, SimTime};
use agv_fleet::{Agv, KnowledgeBase, Robot, Task, TaskKind};
use agv_kernel::{Kernel, ProcessFault};
use tracing::{error, info, warn};

use crate::{Policy, SimObserver, SimResult};

// ── StatusTables ──────────────────────────────────────────────────────────────

/// A copy of every task list and the robot list at one instant.
#[derive(Clone, Debug, PartialEq)]
pub struct StatusTables {
    pub time:      SimTime,
    pub global:    Vec<Task>,
    /// The task up for auction, if any.
    pub auction:   Vec<Task>,
    /// One entry per robot, in robot order.
    pub local:     Vec<(RobotId, Vec<Task>)>,
    pub executing: Vec<Task>,
    /// In robot order.
    pub robots:    Vec<Robot>,
}

impl StatusTables {
    pub fn capture(kb: &KnowledgeBase, time: SimTime) -> Self {
        let mut robots = kb.robots.snapshot();
        robots.sort_by_key(|r| r.id);
        Self {
            time,
            global:    kb.global_tasks.snapshot(),
            auction:   kb.auction.snapshot(),
            local:     kb.local_queues().map(|(id, s)| (id, s.snapshot())).collect(),
            executing: kb.executing.snapshot(),
            robots,
        }
    }

    /// How many of the tables list transport task `order`.
    pub fn holders(&self, order: OrderNumber) -> usize {
        let is_it = |t: &&Task| t.is_transport() && t.order_number == order;
        self.global.iter().filter(is_it).count()
            + self.auction.iter().filter(is_it).count()
            + self.executing.iter().filter(is_it).count()
            + self.local.iter().map(|(_, q)| q.iter().filter(is_it).count()).sum::<usize>()
    }
}

// ── RunSummary ────────────────────────────────────────────────────────────────

/// Aggregate results of a run.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RunSummary {
    /// Simulated seconds until the generator finished.
    pub duration:      f64,
    /// Time of the last transport completion.
    pub makespan:      f64,
    /// Seconds spent driving, summed over robots.
    pub travel_time:   f64,
    /// Seconds spent on chargers, summed over robots.
    pub charging_time: f64,
    pub congestions:   u32,
    /// Transport tasks delivered.
    pub completed:     usize,
    /// Charging sessions finished.
    pub charges:       usize,
    /// Orders rejected before or during allocation.
    pub dropped:       usize,
    /// Processes that ended with an error.
    pub faults:        usize,
}

impl RunSummary {
    pub fn collect(kb: &KnowledgeBase, now: SimTime, faults: &[ProcessFault]) -> Self {
        let mut summary = Self { duration: now.secs(), faults: faults.len(), ..Default::default() };
        for c in kb.completions.snapshot() {
            match c.kind {
                TaskKind::Transport => {
                    summary.completed += 1;
                    summary.makespan = summary.makespan.max(c.time.secs());
                }
                TaskKind::Charging => summary.charges += 1,
            }
        }
        for r in kb.robots.snapshot() {
            summary.travel_time += r.travelled_time;
            summary.charging_time += r.charged_time;
            summary.congestions += r.congestions;
        }
        summary.dropped = kb.rejections.len();
        summary
    }
}

// ── Simulation ────────────────────────────────────────────────────────────────

/// A ready-to-run simulation.  Build with [`SimBuilder`](crate::SimBuilder).
pub struct Simulation {
    pub(crate) kernel:          Kernel,
    pub(crate) kb:              KnowledgeBase,
    pub(crate) agents:          Vec<Agv>,
    pub(crate) generator:       ProcessId,
    pub(crate) policy:          Policy,
    pub(crate) sample_interval: f64,
}

impl Simulation {
    pub fn kernel(&self) -> &Kernel {
        &self.kernel
    }

    pub fn knowledge(&self) -> &KnowledgeBase {
        &self.kb
    }

    pub fn agents(&self) -> &[Agv] {
        &self.agents
    }

    pub fn now(&self) -> SimTime {
        self.kernel.now()
    }

    pub fn tables(&self) -> StatusTables {
        StatusTables::capture(&self.kb, self.kernel.now())
    }

    pub fn summary(&self) -> RunSummary {
        RunSummary::collect(&self.kb, self.kernel.now(), self.kernel.faults())
    }

    /// Step the kernel until the task generator has finished, sampling the
    /// status tables on the way.
    ///
    /// A sample at `t` is taken once the next event lies strictly after `t`,
    /// so it never shows an instant half-processed.  Process faults do not
    /// abort the run; they are counted in the summary.  The watchdog does.
    pub fn run<O: SimObserver>(&mut self, observer: &mut O) -> SimResult<RunSummary> {
        info!(agvs = self.agents.len(), policy = %self.policy, "simulation started");
        let mut next_sample = self.kernel.now();
        loop {
            if self.kernel.is_finished(self.generator) {
                break;
            }
            let Some(next) = self.kernel.peek_next_time() else {
                warn!(time = %self.kernel.now(), "event queue exhausted before the generator finished");
                break;
            };
            while next_sample < next {
                observer.on_sample(next_sample, &StatusTables::capture(&self.kb, next_sample));
                next_sample = SimTime(next_sample.secs() + self.sample_interval);
            }
            if let Err(e) = self.kernel.step() {
                error!(time = %self.kernel.now(), error = %e, "simulation aborted");
                return Err(e.into());
            }
        }

        let summary = self.summary();
        for fault in self.kernel.faults() {
            warn!(%fault, "process fault during run");
        }
        info!(
            duration = summary.duration,
            completed = summary.completed,
            dropped = summary.dropped,
            faults = summary.faults,
            "simulation finished"
        );
        observer.on_finish(&summary);
        Ok(summary)
    }
}
