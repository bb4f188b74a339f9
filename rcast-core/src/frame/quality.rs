//! Latency-driven quality control.
//!
//! The viewer reports the observed delivery latency of each frame; the
//! controller walks a discrete quality ladder one step at a time.
//! Latency above the high-water mark lowers quality (more compression),
//! latency below the low-water mark raises it. The specific thresholds
//! are tunable policy, not part of the contract.

use std::time::Duration;

/// Highest quality level on the ladder.
pub const MAX_QUALITY_LEVEL: u8 = 5;

/// Encoder quality percentage for each ladder level.
const LEVEL_PERCENTS: [u8; (MAX_QUALITY_LEVEL + 1) as usize] = [20, 40, 60, 75, 90, 100];

/// Feedback controller over the discrete quality ladder.
#[derive(Debug, Clone)]
pub struct LatencyController {
    level: u8,
    high_water: Duration,
    low_water: Duration,
}

impl LatencyController {
    pub fn new(initial_level: u8, high_water: Duration, low_water: Duration) -> Self {
        Self {
            level: initial_level.min(MAX_QUALITY_LEVEL),
            high_water,
            low_water,
        }
    }

    /// Current ladder level (0 = most compressed).
    pub fn level(&self) -> u8 {
        self.level
    }

    /// Encoder quality percentage for the current level.
    pub fn quality_percent(&self) -> u8 {
        LEVEL_PERCENTS[self.level as usize]
    }

    /// Pin the ladder to an explicit level (viewer-requested).
    pub fn set_level(&mut self, level: u8) {
        self.level = level.min(MAX_QUALITY_LEVEL);
    }

    /// Feed one measured latency sample; moves at most one step.
    pub fn record_latency(&mut self, latency: Duration) {
        if latency > self.high_water {
            self.level = self.level.saturating_sub(1);
        } else if latency < self.low_water {
            self.level = (self.level + 1).min(MAX_QUALITY_LEVEL);
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────
