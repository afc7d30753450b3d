// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Saved simulation preferences (tick periods, walk/jitter ranges, toast TTL).

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Storage key the host uses for [`SimulationPrefs`].
pub const SIMULATION_PREFS_KEY: &str = "simulation";

/// Tunables for the fleet simulation and the notification channel.
///
/// Missing fields fall back to their defaults, so older saved blobs keep loading.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationPrefs {
    /// Whether the simulation starts enabled.
    pub enabled: bool,
    /// Period of the truck movement process, in milliseconds.
    pub movement_interval_ms: u64,
    /// Max per-axis offset (degrees) applied to a truck on each movement tick.
    pub movement_step_deg: f64,
    /// Period of the organic demand process, in milliseconds.
    pub demand_interval_ms: u64,
    /// Probability that a demand tick spawns a material.
    pub demand_probability: f64,
    /// Max per-axis offset (degrees) of spawned materials around `city_center`.
    pub demand_jitter_deg: f64,
    /// City-center coordinate as `[lat, lng]`.
    pub city_center: [f64; 2],
    /// Lifetime of a posted notification, in milliseconds.
    pub notification_ttl_ms: u64,
    /// Fixed RNG seed; `None` draws from OS entropy.
    pub seed: Option<u64>,
}

impl Default for SimulationPrefs {
    fn default() -> Self {
        Self {
            enabled: true,
            movement_interval_ms: 2_000,
            movement_step_deg: 0.00025,
            demand_interval_ms: 10_000,
            demand_probability: 0.3,
            demand_jitter_deg: 0.01,
            city_center: [-23.5505, -46.6333],
            notification_ttl_ms: 5_000,
            seed: None,
        }
    }
}

impl SimulationPrefs {
    /// Movement period as a `Duration`.
    pub fn movement_interval(&self) -> Duration {
        Duration::from_millis(self.movement_interval_ms)
    }

    /// Demand period as a `Duration`.
    pub fn demand_interval(&self) -> Duration {
        Duration::from_millis(self.demand_interval_ms)
    }

    /// Notification lifetime as a `Duration`.
    pub fn notification_ttl(&self) -> Duration {
        Duration::from_millis(self.notification_ttl_ms)
    }

    /// Demand probability clamped into `[0, 1]` (NaN reads as 0).
    pub fn clamped_demand_probability(&self) -> f64 {
        if self.demand_probability.is_nan() {
            0.0
        } else {
            self.demand_probability.clamp(0.0, 1.0)
        }
    }
}
