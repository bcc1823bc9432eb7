//! Fluent builder for constructing a [`Simulation`].

use std::rc::Rc;

use agv_core::{NodeId, RobotId, SimTime};
use agv_fleet::{
    Agv, Auctioneer, FleetManager, KnowledgeBase, NearestAvailableAllocator, OptimalAllocator,
    PeriodicAllocator, TaskGenerator,
};
use agv_kernel::Kernel;
use agv_optimize::{ExactAssigner, RandomSearchAssigner};
use agv_spatial::PathPlanner;
use csv::StringRecord;
use tracing::info;

use crate::config::{check, AllocationSection};
use crate::{Optimizer, Policy, SimConfig, SimError, SimResult, Simulation};

/// Fluent builder for [`Simulation`].
///
/// # Optional inputs (have defaults)
///
/// | Method         | Default                              |
/// |----------------|--------------------------------------|
/// | `.orders(v)`   | No orders: the run ends immediately |
/// | `.trace(b)`    | Off                                  |
///
/// # Example
///
/// ```rust,ignore
/// let config = load_config("config.toml")?;
/// let mut sim = SimBuilder::new(config)
///     .orders(load_orders("orders.csv")?)
///     .build()?;
/// let summary = sim.run(&mut NoopObserver)?;
/// ```
pub struct SimBuilder {
    config: SimConfig,
    orders: Vec<StringRecord>,
    trace:  bool,
}

impl SimBuilder {
    pub fn new(config: SimConfig) -> Self {
        Self { config, orders: Vec::new(), trace: false }
    }

    /// Raw order lines, e.g. from [`load_orders`](crate::load_orders).
    pub fn orders(mut self, orders: Vec<StringRecord>) -> Self {
        self.orders = orders;
        self
    }

    /// Record every kernel resumption (see [`Kernel::trace`]).
    pub fn trace(mut self, on: bool) -> Self {
        self.trace = on;
        self
    }

    /// Validate the config, build the layout, and spawn every process.
    ///
    /// Spawn order fixes the order processes run in at t = 0: the task
    /// generator, then each robot (main, monitor, collector), then the
    /// allocation process.
    pub fn build(self) -> SimResult<Simulation> {
        let config = self.config;
        check(&config)?;

        // ── Layout ────────────────────────────────────────────────────────
        let graph = config.layout.build_graph()?;
        let planner = PathPlanner::astar(Rc::new(graph));
        let resolve = |names: &[String]| -> SimResult<Vec<NodeId>> {
            names.iter().map(|n| planner.node_named(n).map_err(SimError::from)).collect()
        };
        let stations: Rc<[NodeId]> = resolve(&config.layout.charge_locations)?.into();
        let starts = resolve(&config.layout.start_locations)?;

        // ── Kernel and knowledge base ─────────────────────────────────────
        let mut kernel = Kernel::new().with_watchdog(SimTime(config.run.watchdog));
        if self.trace {
            kernel.enable_trace();
        }
        let handle = kernel.handle();
        let kb = KnowledgeBase::new(&handle, config.fleet.agvs);

        // ── Processes ─────────────────────────────────────────────────────
        let order_count = self.orders.len();
        let generator = kernel.spawn(
            "task-generator",
            TaskGenerator::new(handle.clone(), kb.clone(), planner.clone(), self.orders, config.run.end_check_interval)
                .run(),
        );

        let params = Rc::new(config.agv.clone());
        let mut agents = Vec::with_capacity(config.fleet.agvs);
        for (i, &start) in starts.iter().take(config.fleet.agvs).enumerate() {
            let agv = Agv::new(
                RobotId(i as u32),
                start,
                handle.clone(),
                kb.clone(),
                planner.clone(),
                Rc::clone(&params),
                Rc::clone(&stations),
            );
            agv.spawn(&mut kernel);
            agents.push(agv);
        }

        let alloc = &config.allocation;
        match alloc.policy {
            Policy::Centralized | Policy::Greedy => {
                let allocator = periodic_allocator(alloc, config.run.seed);
                let manager = FleetManager::new(handle.clone(), kb.clone(), planner.clone(), allocator, alloc.interval);
                kernel.spawn("fleet-manager", manager.run());
            }
            Policy::Auction => {
                let auctioneer = Auctioneer::new(handle.clone(), kb.clone(), alloc.interval);
                kernel.spawn("auctioneer", auctioneer.run());
            }
        }

        info!(
            agvs = agents.len(),
            nodes = planner.graph().node_count(),
            stations = stations.len(),
            orders = order_count,
            policy = %alloc.policy,
            "simulation built"
        );
        Ok(Simulation {
            kernel,
            kb,
            agents,
            generator,
            policy: alloc.policy,
            sample_interval: config.run.sample_interval,
        })
    }
}

fn periodic_allocator(alloc: &AllocationSection, run_seed: u64) -> Box<dyn PeriodicAllocator> {
    if alloc.policy == Policy::Greedy {
        return Box::new(NearestAvailableAllocator::new());
    }
    match (alloc.optimizer, alloc.capacity) {
        (Optimizer::Exact, None) => Box::new(OptimalAllocator::new(ExactAssigner::new())),
        (Optimizer::Exact, Some(cap)) => Box::new(OptimalAllocator::new(ExactAssigner::with_capacity(cap))),
        (Optimizer::RandomSearch, cap) => {
            let mut assigner = RandomSearchAssigner::new(alloc.iterations, alloc.seed.unwrap_or(run_seed));
            if let Some(cap) = cap {
                assigner = assigner.with_capacity(cap);
            }
            Box::new(OptimalAllocator::new(assigner))
        }
    }
}
