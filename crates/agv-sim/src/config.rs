//! Run configuration, read from TOML.
//!
//! ```toml
//! [fleet]
//! agvs = 2
//!
//! [agv]                       # every key optional, see `AgvParams`
//! speed = 1.0
//! dwell_time = 5.0
//!
//! [layout]
//! charge_locations = ["C"]
//! depot_locations  = ["A"]
//! start_locations  = ["A", "B"]
//!
//! [[layout.nodes]]
//! name = "A"
//! x = 0.0
//! y = 0.0
//! neighbors = ["B"]
//!
//! [allocation]
//! policy    = "centralized"   # or "greedy", "auction"
//! optimizer = "exact"         # or "random_search"
//! interval  = 1.0
//!
//! [run]
//! seed            = 42
//! sample_interval = 1.0
//! ```
//!
//! [`load_config`] parses and then runs [`validate`], which reports every
//! problem it finds rather than stopping at the first.

use std::collections::HashSet;
use std::fmt;
use std::path::Path;

use agv_core::Point;
use agv_fleet::AgvParams;
use agv_spatial::{Graph, GraphBuilder, SpatialResult};
use serde::Deserialize;
use thiserror::Error;

// ── Errors ────────────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file '{file}': {source}")]
    Io {
        file: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file '{file}': {source}")]
    Parse {
        file: String,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid value for '{field}': {value} ({reason})")]
    InvalidField { field: String, value: String, reason: String },

    #[error("config validation failed:\n{0}")]
    Validation(String),
}

// ── Sections ──────────────────────────────────────────────────────────────────

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SimConfig {
    pub fleet:      FleetSection,
    #[serde(default)]
    pub agv:        AgvParams,
    pub layout:     LayoutSection,
    #[serde(default)]
    pub allocation: AllocationSection,
    #[serde(default)]
    pub run:        RunSection,
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FleetSection {
    /// Number of robots.  Robot `i` starts at `layout.start_locations[i]`.
    pub agvs: usize,
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NodeSpec {
    pub name:      String,
    pub x:         f64,
    pub y:         f64,
    /// Nodes joined to this one by a two-way road.
    #[serde(default)]
    pub neighbors: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LayoutSection {
    pub nodes:            Vec<NodeSpec>,
    pub charge_locations: Vec<String>,
    /// Parking spots.  Validated but not used by any policy yet.
    #[serde(default)]
    pub depot_locations:  Vec<String>,
    pub start_locations:  Vec<String>,
}

impl LayoutSection {
    /// Build the floor graph.  Every listed neighbour becomes a two-way road;
    /// a pair listed from both ends is connected once.
    pub fn build_graph(&self) -> SpatialResult<Graph> {
        let mut b = GraphBuilder::new();
        for n in &self.nodes {
            b.add_node(&n.name, Point::new(n.x, n.y))?;
        }
        let mut seen = HashSet::new();
        for n in &self.nodes {
            let fresh: Vec<&str> = n
                .neighbors
                .iter()
                .map(String::as_str)
                .filter(|m| {
                    let key = if n.name.as_str() < *m { (n.name.as_str(), *m) } else { (*m, n.name.as_str()) };
                    seen.insert(key)
                })
                .collect();
            b.connect_by_name(&n.name, &fresh)?;
        }
        Ok(b.build())
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Policy {
    /// Periodic global re-plan with an assignment optimizer.
    #[default]
    Centralized,
    /// Periodic nearest-task push to idle robots.
    Greedy,
    /// Event-driven single-item auction.
    Auction,
}

impl fmt::Display for Policy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Policy::Centralized => "centralized",
            Policy::Greedy => "greedy",
            Policy::Auction => "auction",
        })
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Optimizer {
    #[default]
    Exact,
    RandomSearch,
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AllocationSection {
    pub policy:     Policy,
    /// Only read by the centralized policy.
    pub optimizer:  Optimizer,
    /// Seconds between allocation ticks (auction: between bidder checks).
    pub interval:   f64,
    /// Random-search trials per tick.
    pub iterations: usize,
    /// Most tasks one robot may receive per tick.  Unlimited when absent.
    pub capacity:   Option<usize>,
    /// Random-search seed.  Defaults to `run.seed`.
    pub seed:       Option<u64>,
}

impl Default for AllocationSection {
    fn default() -> Self {
        Self {
            policy:     Policy::Centralized,
            optimizer:  Optimizer::Exact,
            interval:   1.0,
            iterations: 1_000,
            capacity:   None,
            seed:       None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RunSection {
    pub seed:               u64,
    /// Seconds between status-table samples.
    pub sample_interval:    f64,
    /// Seconds between the generator's "is the fleet drained" checks.
    pub end_check_interval: f64,
    /// Simulated seconds after which the run is aborted.
    pub watchdog:           f64,
}

impl Default for RunSection {
    fn default() -> Self {
        Self {
            seed:               42,
            sample_interval:    1.0,
            end_check_interval: 1.0,
            watchdog:           7.0 * 24.0 * 3_600.0,
        }
    }
}

// ── Loading ───────────────────────────────────────────────────────────────────

/// Read, parse and validate a TOML config file.
pub fn load_config(path: impl AsRef<Path>) -> Result<SimConfig, ConfigError> {
    let path = path.as_ref();
    let file = path.display().to_string();
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io { file: file.clone(), source })?;
    load_config_str(&content, &file)
}

/// Parse and validate TOML text.  `source_name` only appears in errors.
pub fn load_config_str(content: &str, source_name: &str) -> Result<SimConfig, ConfigError> {
    let config: SimConfig = toml::from_str(content).map_err(|source| ConfigError::Parse {
        file: source_name.to_string(),
        source,
    })?;
    check(&config)?;
    Ok(config)
}

/// [`validate`], with every problem folded into one
/// [`ConfigError::Validation`].
pub fn check(config: &SimConfig) -> Result<(), ConfigError> {
    validate(config).map_err(|errors| {
        let lines: Vec<String> = errors.iter().map(|e| format!("  - {e}")).collect();
        ConfigError::Validation(lines.join("\n"))
    })
}

// ── Validation ────────────────────────────────────────────────────────────────

fn invalid(field: &str, value: impl fmt::Display, reason: &str) -> ConfigError {
    ConfigError::InvalidField { field: field.into(), value: value.to_string(), reason: reason.into() }
}

fn positive(errors: &mut Vec<ConfigError>, field: &str, v: f64) {
    if !(v.is_finite() && v > 0.0) {
        errors.push(invalid(field, v, "must be a positive number"));
    }
}

fn non_negative(errors: &mut Vec<ConfigError>, field: &str, v: f64) {
    if !(v.is_finite() && v >= 0.0) {
        errors.push(invalid(field, v, "must be zero or more"));
    }
}

fn percent(errors: &mut Vec<ConfigError>, field: &str, v: f64) {
    if !(0.0..=100.0).contains(&v) {
        errors.push(invalid(field, v, "must lie in [0, 100]"));
    }
}

/// Check a parsed config.  Returns every problem found.
pub fn validate(config: &SimConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    // ── fleet / agv ───────────────────────────────────────────────────────
    let starts = config.layout.start_locations.len();
    if config.fleet.agvs == 0 {
        errors.push(invalid("fleet.agvs", 0, "at least one AGV is required"));
    } else if config.fleet.agvs > starts {
        errors.push(invalid(
            "fleet.agvs",
            config.fleet.agvs,
            &format!("only {starts} start locations are listed"),
        ));
    }
    let agv = &config.agv;
    positive(&mut errors, "agv.speed", agv.speed);
    non_negative(&mut errors, "agv.dwell_time", agv.dwell_time);
    percent(&mut errors, "agv.battery_threshold", agv.battery_threshold);
    percent(&mut errors, "agv.initial_battery", agv.initial_battery);
    non_negative(&mut errors, "agv.drain_per_second", agv.drain_per_second);
    non_negative(&mut errors, "agv.max_charging_time", agv.max_charging_time);
    non_negative(&mut errors, "agv.charge_scale", agv.charge_scale);
    positive(&mut errors, "agv.status_interval", agv.status_interval);
    non_negative(&mut errors, "agv.collision_threshold", agv.collision_threshold);
    non_negative(&mut errors, "agv.collision_tolerance", agv.collision_tolerance);
    positive(&mut errors, "agv.collision_poll", agv.collision_poll);
    if agv.substeps == 0 {
        errors.push(invalid("agv.substeps", 0, "must be at least 1"));
    }
    if agv.charge_steps == 0 {
        errors.push(invalid("agv.charge_steps", 0, "must be at least 1"));
    }

    // ── layout ────────────────────────────────────────────────────────────
    let layout = &config.layout;
    if layout.nodes.is_empty() {
        errors.push(invalid("layout.nodes", "[]", "the layout has no nodes"));
    }
    let mut names = HashSet::new();
    for n in &layout.nodes {
        if !names.insert(n.name.as_str()) {
            errors.push(invalid("layout.nodes.name", &n.name, "duplicate node name"));
        }
        if !(n.x.is_finite() && n.y.is_finite()) {
            errors.push(invalid(&format!("layout.nodes.{}", n.name), format!("({}, {})", n.x, n.y), "coordinates must be finite"));
        }
    }
    for n in &layout.nodes {
        for m in n.neighbors.iter().filter(|m| !names.contains(m.as_str())) {
            errors.push(invalid(&format!("layout.nodes.{}.neighbors", n.name), m, "unknown node"));
        }
    }
    let lists = [
        ("layout.charge_locations", &layout.charge_locations),
        ("layout.depot_locations", &layout.depot_locations),
        ("layout.start_locations", &layout.start_locations),
    ];
    for (field, list) in lists {
        for m in list.iter().filter(|m| !names.contains(m.as_str())) {
            errors.push(invalid(field, m, "unknown node"));
        }
    }
    if layout.charge_locations.is_empty() {
        errors.push(invalid("layout.charge_locations", "[]", "at least one charging station is required"));
    }

    // ── allocation / run ──────────────────────────────────────────────────
    let alloc = &config.allocation;
    positive(&mut errors, "allocation.interval", alloc.interval);
    if alloc.optimizer == Optimizer::RandomSearch && alloc.iterations == 0 {
        errors.push(invalid("allocation.iterations", 0, "random search needs at least one iteration"));
    }
    if alloc.capacity == Some(0) {
        errors.push(invalid("allocation.capacity", 0, "must be at least 1 when set"));
    }
    let run = &config.run;
    positive(&mut errors, "run.sample_interval", run.sample_interval);
    positive(&mut errors, "run.end_check_interval", run.end_check_interval);
    positive(&mut errors, "run.watchdog", run.watchdog);

    if errors.is_empty() { Ok(()) } else { Err(errors) }
}
