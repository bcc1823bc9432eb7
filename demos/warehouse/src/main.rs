//! warehouse: a three-robot fleet on a twelve-node floor.
//!
//! ```text
//! cargo run -p warehouse -- [config.toml] [orders.csv] [output-dir]
//! ```
//!
//! Defaults to the config and order file shipped next to this crate and
//! writes the status tables to `output/warehouse`.  Set `RUST_LOG=info` (or
//! `debug`) to follow task and robot events.

use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{Context, Result};
use tracing_subscriber::EnvFilter;

use agv_output::{CsvWriter, SimOutputObserver};
use agv_sim::{load_config, load_orders, SimBuilder};

fn arg_or(args: &[String], i: usize, default: impl AsRef<Path>) -> PathBuf {
    args.get(i).map(PathBuf::from).unwrap_or_else(|| default.as_ref().to_path_buf())
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_target(false)
        .init();

    let here = Path::new(env!("CARGO_MANIFEST_DIR"));
    let args: Vec<String> = std::env::args().skip(1).collect();
    let config_path = arg_or(&args, 0, here.join("config.toml"));
    let orders_path = arg_or(&args, 1, here.join("data/orders.csv"));
    let output_dir = arg_or(&args, 2, "output/warehouse");

    // 1. Inputs.
    let config = load_config(&config_path).with_context(|| format!("loading {}", config_path.display()))?;
    let orders = load_orders(&orders_path)?;
    println!("=== warehouse: AGV fleet simulation ===");
    println!(
        "AGVs: {}  |  Nodes: {}  |  Orders: {}  |  Policy: {}",
        config.fleet.agvs,
        config.layout.nodes.len(),
        orders.len(),
        config.allocation.policy,
    );
    println!();

    // 2. Build.
    let mut sim = SimBuilder::new(config).orders(orders).build()?;

    // 3. Output.
    std::fs::create_dir_all(&output_dir)
        .with_context(|| format!("creating {}", output_dir.display()))?;
    let mut obs = SimOutputObserver::new(CsvWriter::new(&output_dir)?);

    // 4. Run.
    let t0 = Instant::now();
    let summary = sim.run(&mut obs)?;
    let elapsed = t0.elapsed();
    if let Some(e) = obs.take_error() {
        eprintln!("output error: {e}");
    }

    // 5. Summary.
    println!("Simulation complete in {:.3} s (wall clock)", elapsed.as_secs_f64());
    println!("  simulated duration : {:>10.1} s", summary.duration);
    println!("  makespan           : {:>10.1} s", summary.makespan);
    println!("  travel time        : {:>10.1} s", summary.travel_time);
    println!("  charging time      : {:>10.1} s", summary.charging_time);
    println!("  congestions        : {:>10}", summary.congestions);
    println!("  tasks completed    : {:>10}", summary.completed);
    println!("  orders dropped     : {:>10}", summary.dropped);
    println!("  process faults     : {:>10}", summary.faults);
    println!("  samples written    : {:>10}  ({})", obs.samples(), output_dir.display());
    println!();

    // 6. Final robot table.
    println!("{:<8} {:<10} {:<6} {:>8} {:>10}", "Robot", "Status", "Node", "Battery", "Travelled");
    println!("{}", "-".repeat(46));
    for agv in sim.agents() {
        let r = agv.snapshot();
        println!(
            "{:<8} {:<10} {:<6} {:>7.1}% {:>9.1}s",
            r.id.0, r.status.as_str(), r.node.0, r.battery, r.travelled_time
        );
    }

    for fault in sim.kernel().faults() {
        eprintln!("fault: {fault}");
    }
    Ok(())
}
