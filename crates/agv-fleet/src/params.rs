//! Per-robot behaviour parameters.

use serde::Deserialize;

/// What a robot does once its battery falls under the threshold.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ChargePolicy {
    /// Finish the current task, then drive straight to the nearest station.
    Divert,
    /// Put a charging task at the front of the robot's own queue.
    #[default]
    QueueTask,
}

/// Where an awarded or pushed task goes in the robot's queue.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum InsertionPolicy {
    #[default]
    Tail,
    /// Re-solve the visiting order of the whole queue (TSP).
    Reoptimize,
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AgvParams {
    /// Metres per simulated second.
    pub speed: f64,
    /// Seconds spent at each pickup and each dropoff.
    pub dwell_time: f64,
    /// Percent under which a robot becomes `EMPTY`.
    pub battery_threshold: f64,
    pub initial_battery: f64,
    /// Percent lost per second of travel.  The default empties a full
    /// battery in one hour of driving.
    pub drain_per_second: f64,
    /// Seconds to charge from 0 to 100, before `charge_scale`.
    pub max_charging_time: f64,
    pub charge_scale: f64,
    /// Battery rises in this many equal increments while charging.
    pub charge_steps: u32,
    /// Interpolation steps per edge.
    pub substeps: u32,
    /// Period of the background battery check.
    pub status_interval: f64,
    /// Distance (m) under which a robot ahead blocks.
    pub collision_threshold: f64,
    /// Half-angle (rad) of the "ahead" cone.
    pub collision_tolerance: f64,
    /// Seconds between clearance checks while blocked.
    pub collision_poll: f64,
    pub charging: ChargePolicy,
    pub insertion: InsertionPolicy,
}

impl Default for AgvParams {
    fn default() -> Self {
        Self {
            speed:               1.0,
            dwell_time:          5.0,
            battery_threshold:   20.0,
            initial_battery:     100.0,
            drain_per_second:    100.0 / 3_600.0,
            max_charging_time:   3_600.0,
            charge_scale:        0.01,
            charge_steps:        10,
            substeps:            5,
            status_interval:     1.0,
            collision_threshold: 0.5,
            collision_tolerance: 0.5,
            collision_poll:      1.0,
            charging:            ChargePolicy::QueueTask,
            insertion:           InsertionPolicy::Tail,
        }
    }
}

impl AgvParams {
    /// Seconds needed to go from `battery` to full.
    pub fn charge_duration(&self, battery: f64) -> f64 {
        self.max_charging_time * (100.0 - battery).max(0.0) / 100.0 * self.charge_scale
    }
}
