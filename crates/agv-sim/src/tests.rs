#[cfg(test)]
mod helpers {
    use agv_core::{OrderNumber, SimTime};
    use csv::StringRecord;

    use crate::{load_config_str, load_orders_reader, SimConfig, SimObserver, StatusTables};

    /// A(0,0) ── B(10,0) ── C(20,0) ── D(30,0), charger at C.
    pub const CORRIDOR: &str = r#"
[fleet]
agvs = 2

[agv]
speed = 2.0
dwell_time = 5.0

[layout]
charge_locations = ["C"]
depot_locations  = ["A"]
start_locations  = ["A", "D", "B"]

[[layout.nodes]]
name = "A"
x = 0.0
y = 0.0
neighbors = ["B"]

[[layout.nodes]]
name = "B"
x = 10.0
y = 0.0
neighbors = ["A", "C"]

[[layout.nodes]]
name = "C"
x = 20.0
y = 0.0
neighbors = ["D"]

[[layout.nodes]]
name = "D"
x = 30.0
y = 0.0
neighbors = ["C"]
"#;

    pub fn corridor() -> SimConfig {
        load_config_str(CORRIDOR, "corridor").unwrap()
    }

    pub fn orders(text: &str) -> Vec<StringRecord> {
        load_orders_reader(text.as_bytes()).unwrap()
    }

    /// Records every sample it is handed.
    #[derive(Default)]
    pub struct Recorder {
        pub samples:  Vec<(SimTime, StatusTables)>,
        pub finished: bool,
    }

    impl SimObserver for Recorder {
        fn on_sample(&mut self, time: SimTime, tables: &StatusTables) {
            self.samples.push((time, tables.clone()));
        }

        fn on_finish(&mut self, _summary: &crate::RunSummary) {
            self.finished = true;
        }
    }

    /// Largest number of places any one order was listed in at once.
    pub struct Conservation {
        pub orders:  Vec<OrderNumber>,
        pub worst:   usize,
        pub samples: usize,
    }

    impl SimObserver for Conservation {
        fn on_sample(&mut self, _time: SimTime, tables: &StatusTables) {
            self.samples += 1;
            for &o in &self.orders {
                self.worst = self.worst.max(tables.holders(o));
            }
        }
    }
}

#[cfg(test)]
mod config {
    use std::io::Write;

    use agv_fleet::{ChargePolicy, InsertionPolicy};

    use super::helpers::*;
    use crate::{load_config, load_config_str, validate, ConfigError, Optimizer, Policy};

    #[test]
    fn corridor_parses_with_defaults() {
        let c = corridor();
        assert_eq!(c.fleet.agvs, 2);
        assert_eq!(c.agv.speed, 2.0);
        assert_eq!(c.agv.charging, ChargePolicy::QueueTask);
        assert_eq!(c.agv.insertion, InsertionPolicy::Tail);
        assert_eq!(c.layout.nodes.len(), 4);
        assert_eq!(c.allocation.policy, Policy::Centralized);
        assert_eq!(c.allocation.optimizer, Optimizer::Exact);
        assert_eq!(c.run.sample_interval, 1.0);
    }

    #[test]
    fn policies_and_optimizers_parse_in_snake_case() {
        let text = format!(
            "{CORRIDOR}\n[allocation]\npolicy = \"auction\"\noptimizer = \"random_search\"\niterations = 50\nseed = 9\n"
        );
        let c = load_config_str(&text, "t").unwrap();
        assert_eq!(c.allocation.policy, Policy::Auction);
        assert_eq!(c.allocation.optimizer, Optimizer::RandomSearch);
        assert_eq!(c.allocation.iterations, 50);
        assert_eq!(c.allocation.seed, Some(9));
    }

    #[test]
    fn unknown_key_is_a_parse_error() {
        let text = CORRIDOR.replace("speed = 2.0", "sped = 2.0");
        let err = load_config_str(&text, "typo.toml").unwrap_err();
        assert!(matches!(err, ConfigError::Parse { ref file, .. } if file == "typo.toml"), "{err}");
    }

    #[test]
    fn validation_reports_every_problem() {
        let mut c = corridor();
        c.fleet.agvs = 4;
        c.agv.speed = -1.0;
        c.layout.nodes[0].neighbors.push("Z".into());
        c.layout.charge_locations = vec!["Q".into()];
        let errors = validate(&c).unwrap_err();
        let text: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
        assert_eq!(errors.len(), 4, "{text:#?}");
        assert!(text.iter().any(|t| t.contains("fleet.agvs") && t.contains("3 start locations")));
        assert!(text.iter().any(|t| t.contains("agv.speed")));
        assert!(text.iter().any(|t| t.contains("layout.nodes.A.neighbors") && t.contains("Z")));
        assert!(text.iter().any(|t| t.contains("layout.charge_locations") && t.contains("Q")));
    }

    #[test]
    fn validation_failure_surfaces_from_load() {
        let text = CORRIDOR.replace("agvs = 2", "agvs = 0");
        let err = load_config_str(&text, "t").unwrap_err();
        match err {
            ConfigError::Validation(msg) => assert!(msg.contains("fleet.agvs")),
            other => panic!("expected validation error, got {other}"),
        }
    }

    #[test]
    fn duplicate_node_names_are_rejected() {
        let mut c = corridor();
        c.layout.nodes[1].name = "A".into();
        let errors = validate(&c).unwrap_err();
        assert!(errors.iter().any(|e| e.to_string().contains("duplicate node name")));
    }

    #[test]
    fn roads_listed_from_both_ends_are_built_once() {
        let c = corridor();
        let graph = c.layout.build_graph().unwrap();
        assert_eq!(graph.node_count(), 4);
        // A-B, B-C, C-D in both directions; B lists A and A lists B.
        assert_eq!(graph.edge_count(), 6);
    }

    #[test]
    fn load_config_reads_a_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(CORRIDOR.as_bytes()).unwrap();
        let c = load_config(file.path()).unwrap();
        assert_eq!(c, corridor());
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_config(dir.path().join("absent.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}

#[cfg(test)]
mod orders {
    use std::io::Write;

    use crate::{load_orders, SimError};

    #[test]
    fn order_file_is_read_without_header() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "# time,order,priority,ax,ay,bx,by").unwrap();
        writeln!(file, "0,1,1,10,20,20,40").unwrap();
        writeln!(file, "12.5, 2, 3, 4, 4").unwrap();
        let records = load_orders(file.path()).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].len(), 7);
        assert_eq!(&records[1][1], "2");
    }

    #[test]
    fn missing_order_file_names_the_path() {
        let err = load_orders("/definitely/not/here.csv").unwrap_err();
        match err {
            SimError::Orders { file, .. } => assert!(file.ends_with("here.csv")),
            other => panic!("expected an order file error, got {other}"),
        }
    }
}

#[cfg(test)]
mod scenarios {
    use agv_core::{OrderNumber, RobotId};
    use agv_fleet::{RobotStatus, TaskKind};
    use agv_kernel::KernelError;

    use super::helpers::*;
    use crate::{load_config_str, NoopObserver, SimBuilder, SimError};

    #[test]
    fn single_robot_single_order() {
        let text = r#"
[fleet]
agvs = 1

[agv]
speed = 1.0
dwell_time = 5.0

[layout]
charge_locations = ["P"]
start_locations  = ["P"]

[[layout.nodes]]
name = "P"
x = 10.0
y = 20.0
neighbors = ["Q"]

[[layout.nodes]]
name = "Q"
x = 20.0
y = 40.0
"#;
        let config = load_config_str(text, "a").unwrap();
        let mut sim = SimBuilder::new(config).orders(orders("0,1,1,10,20,20,40")).build().unwrap();
        let summary = sim.run(&mut NoopObserver).unwrap();

        let leg = 500f64.sqrt();
        assert_eq!(summary.completed, 1);
        assert!((summary.makespan - (leg + 10.0)).abs() < 1e-6, "{summary:?}");
        assert!((summary.travel_time - leg).abs() < 1e-6);
        assert!(summary.duration >= summary.makespan);
        assert!(summary.duration <= summary.makespan + 1.0 + 1e-9);
        assert_eq!(summary.faults, 0);
        assert!(sim.knowledge().is_drained());
    }

    #[test]
    fn each_robot_takes_the_task_next_to_it() {
        let config = corridor();
        let mut sim = SimBuilder::new(config)
            .orders(orders("0,1,1,0,0,10,0\n0,2,1,30,0,20,0"))
            .build()
            .unwrap();
        let summary = sim.run(&mut NoopObserver).unwrap();
        assert_eq!(summary.completed, 2);

        let done = sim.knowledge().completions.snapshot();
        let by = |n| done.iter().find(|c| c.order_number == OrderNumber(n)).map(|c| c.robot);
        assert_eq!(by(1), Some(RobotId(0)));
        assert_eq!(by(2), Some(RobotId(1)));
        // Both legs run in parallel: 5 s dwell, 5 s drive, 5 s dwell.
        assert!((summary.makespan - 15.0).abs() < 1e-9);
    }

    #[test]
    fn low_battery_robot_recharges_before_the_run_ends() {
        let mut config = corridor();
        config.fleet.agvs = 1;
        config.agv.battery_threshold = 20.0;
        config.agv.initial_battery = 22.0;
        config.agv.drain_per_second = 1.0;
        config.agv.max_charging_time = 100.0;
        config.agv.charge_scale = 1.0;
        let mut sim = SimBuilder::new(config).orders(orders("0,1,1,0,0,10,0")).build().unwrap();
        let summary = sim.run(&mut NoopObserver).unwrap();

        assert_eq!(summary.completed, 1);
        assert_eq!(summary.charges, 1);
        assert!((summary.makespan - 15.0).abs() < 1e-9);
        // 22 - 5 s to B - 5 s to C = 12 %, so 88 s on the charger.
        assert!((summary.charging_time - 88.0).abs() < 1e-6, "{summary:?}");
        assert!(summary.duration >= 108.0 - 1e-9);

        let robot = sim.knowledge().robot(RobotId(0)).unwrap();
        assert_eq!(robot.battery, 100.0);
        assert_eq!(robot.status, RobotStatus::Idle);
        let kinds: Vec<TaskKind> = sim.knowledge().completions.snapshot().iter().map(|c| c.kind).collect();
        assert_eq!(kinds, vec![TaskKind::Transport, TaskKind::Charging]);
    }

    #[test]
    fn every_policy_serves_every_order() {
        use crate::Policy;
        let text = "0,1,1,0,0,10,0\n0,2,1,30,0,20,0\n2,3,2,10,0,30,0\n3,4,1,20,0,0,0\n5,5,1,0,0,30,0\n8,6,3,30,0,10,0";
        for policy in [Policy::Centralized, Policy::Greedy, Policy::Auction] {
            let mut config = corridor();
            config.fleet.agvs = 3;
            config.allocation.policy = policy;
            let mut sim = SimBuilder::new(config).orders(orders(text)).build().unwrap();
            let summary = sim.run(&mut NoopObserver).unwrap();
            assert_eq!(summary.completed, 6, "{policy}: {summary:?}");
            assert_eq!(summary.dropped, 0, "{policy}");
            assert_eq!(summary.faults, 0, "{policy}");
        }
    }

    #[test]
    fn capacity_limited_allocation_drains() {
        use crate::Optimizer;
        for optimizer in [Optimizer::Exact, Optimizer::RandomSearch] {
            let mut config = corridor();
            config.fleet.agvs = 1;
            config.allocation.capacity = Some(1);
            config.allocation.optimizer = optimizer;
            config.run.watchdog = 10_000.0;
            let mut sim = SimBuilder::new(config)
                .orders(orders("0,1,1,0,0,10,0\n0,2,1,30,0,20,0\n0,3,1,10,0,0,0"))
                .build()
                .unwrap();
            let summary = sim.run(&mut NoopObserver).unwrap();
            assert_eq!(summary.completed, 3, "{optimizer:?}: {summary:?}");
            assert_eq!(summary.faults, 0);
            assert!(sim.knowledge().is_drained());

            let done: Vec<u64> = sim.knowledge().completions.snapshot().iter().map(|c| c.order_number.0).collect();
            assert_eq!(done, vec![1, 2, 3], "{optimizer:?}");
        }
    }

    #[test]
    fn rejected_orders_are_counted_as_dropped() {
        let mut sim = SimBuilder::new(corridor())
            .orders(orders("0,1,1,0,0,10,0\n1,1,1,30,0,20,0\n1,2,1,0,0,1,0"))
            .build()
            .unwrap();
        let summary = sim.run(&mut NoopObserver).unwrap();
        assert_eq!(summary.completed, 1);
        assert_eq!(summary.dropped, 2);
    }

    #[test]
    fn malformed_order_ends_the_run_with_a_fault() {
        let mut sim = SimBuilder::new(corridor()).orders(orders("0,1,1,0,0,10,0\nbad,line")).build().unwrap();
        let summary = sim.run(&mut NoopObserver).unwrap();
        assert_eq!(summary.faults, 1);
        let fault = &sim.kernel().faults()[0];
        assert_eq!(fault.name, "task-generator");
        assert!(fault.message.contains("line 2"), "{}", fault.message);
    }

    #[test]
    fn no_orders_finishes_at_once() {
        let mut sim = SimBuilder::new(corridor()).build().unwrap();
        let summary = sim.run(&mut NoopObserver).unwrap();
        assert_eq!(summary.duration, 0.0);
        assert_eq!(summary.completed, 0);
    }

    #[test]
    fn watchdog_aborts_a_run_that_overstays() {
        let mut config = corridor();
        config.run.watchdog = 10.0;
        let mut sim = SimBuilder::new(config).orders(orders("0,1,1,0,0,30,0")).build().unwrap();
        let err = sim.run(&mut NoopObserver).unwrap_err();
        assert!(matches!(err, SimError::Kernel(KernelError::WatchdogExpired { .. })), "{err}");
    }

    #[test]
    fn builder_rejects_an_invalid_config() {
        let mut config = corridor();
        config.agv.substeps = 0;
        assert!(matches!(SimBuilder::new(config).build(), Err(SimError::Config(_))));
    }
}

#[cfg(test)]
mod sampling {
    use agv_core::{OrderNumber, SimTime};
    use agv_fleet::RobotStatus;

    use super::helpers::*;
    use crate::{Policy, SimBuilder};

    #[test]
    fn samples_are_evenly_spaced_and_show_finished_instants() {
        let mut config = corridor();
        config.fleet.agvs = 1;
        let mut sim = SimBuilder::new(config).orders(orders("0,1,1,0,0,10,0")).build().unwrap();
        let mut rec = Recorder::default();
        let summary = sim.run(&mut rec).unwrap();
        assert!(rec.finished);

        let times: Vec<f64> = rec.samples.iter().map(|(t, _)| t.secs()).collect();
        assert_eq!(times.first(), Some(&0.0));
        assert!(times.windows(2).all(|w| (w[1] - w[0] - 1.0).abs() < 1e-9));
        assert!(times.iter().all(|&t| t < summary.duration));

        // By the end of t = 0 the task was generated, allocated and started.
        let (_, first) = &rec.samples[0];
        assert!(first.global.is_empty());
        assert_eq!(first.executing.len(), 1);
        assert_eq!(first.robots[0].status, RobotStatus::Busy);

        let (_, driving) = rec.samples.iter().find(|(t, _)| *t == SimTime(7.0)).unwrap();
        assert!(driving.executing[0].picked);
        assert!(driving.robots[0].is_moving());
    }

    #[test]
    fn no_order_is_ever_held_twice() {
        let text = "0,1,1,0,0,10,0\n0,2,1,30,0,20,0\n1,3,2,10,0,30,0\n1,4,1,20,0,0,0\n2,5,1,0,0,30,0\n2,6,3,30,0,10,0";
        for policy in [Policy::Centralized, Policy::Greedy, Policy::Auction] {
            let mut config = corridor();
            config.fleet.agvs = 2;
            config.allocation.policy = policy;
            let mut sim = SimBuilder::new(config).orders(orders(text)).build().unwrap();
            let mut check = Conservation { orders: (1..=6).map(OrderNumber).collect(), worst: 0, samples: 0 };
            sim.run(&mut check).unwrap();
            assert!(check.samples > 0);
            assert_eq!(check.worst, 1, "{policy}");
        }
    }
}

#[cfg(test)]
mod determinism {
    use super::helpers::*;
    use crate::{NoopObserver, Optimizer, Policy, RunSummary, SimBuilder, SimConfig};

    const ORDERS: &str = "0,1,1,0,0,10,0\n0,2,1,30,0,20,0\n2,3,2,10,0,30,0\n3,4,1,20,0,0,0\n5,5,1,0,0,30,0\n8,6,3,30,0,10,0";

    fn run(config: SimConfig) -> (RunSummary, Vec<agv_kernel::TraceEntry>) {
        let mut sim = SimBuilder::new(config).orders(orders(ORDERS)).trace(true).build().unwrap();
        let summary = sim.run(&mut NoopObserver).unwrap();
        let trace = sim.kernel().trace().unwrap().to_vec();
        (summary, trace)
    }

    #[test]
    fn same_inputs_same_run() {
        let mut auction = corridor();
        auction.fleet.agvs = 3;
        auction.allocation.policy = Policy::Auction;

        let mut random = corridor();
        random.fleet.agvs = 3;
        random.allocation.optimizer = Optimizer::RandomSearch;
        random.allocation.iterations = 64;
        random.run.seed = 7;

        for config in [auction, random] {
            let (s1, t1) = run(config.clone());
            let (s2, t2) = run(config);
            assert!(!t1.is_empty());
            assert_eq!(t1, t2);
            assert_eq!(s1, s2);
        }
    }
}
