//! Runtime configuration for a host-side cast session.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::frame::quality::MAX_QUALITY_LEVEL;

/// Configuration for the host capture/stream loop.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CastConfig {
    /// Target capture ticks per second (1..=60).
    pub target_fps: u8,
    /// Initial quality ladder level.
    pub initial_quality_level: u8,
    /// Reported latency above this (ms) lowers quality one step.
    pub latency_high_water_ms: u64,
    /// Reported latency below this (ms) raises quality one step.
    pub latency_low_water_ms: u64,
    /// Accept Normal-mode cast requests without an operator decision.
    /// Unattended requests are always accepted.
    pub auto_accept: bool,
}

impl Default for CastConfig {
    fn default() -> Self {
        Self {
            target_fps: 30,
            initial_quality_level: MAX_QUALITY_LEVEL,
            latency_high_water_ms: 1000,
            latency_low_water_ms: 250,
            auto_accept: true,
        }
    }
}

impl CastConfig {
    /// Interval between capture ticks.
    pub fn frame_interval(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.target_fps.clamp(1, 60) as f64)
    }

    pub fn latency_high_water(&self) -> Duration {
        Duration::from_millis(self.latency_high_water_ms)
    }

    pub fn latency_low_water(&self) -> Duration {
        Duration::from_millis(self.latency_low_water_ms)
    }
}
