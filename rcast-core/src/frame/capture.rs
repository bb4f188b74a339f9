//! Per-session capture orchestration.
//!
//! [`CaptureLoop`] owns the single most-recently-captured frame for a
//! session and runs one capture→diff→encode step per tick. It is
//! synchronous and CPU-bound by design: one tick must run to completion
//! before the next — diffing needs a stable (previous, current) pair.
//! Scheduling and pacing belong to the session driver.

use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::config::CastConfig;
use crate::frame::buffer::PixelBuffer;
use crate::frame::diff::{self, DirtyRegion};
use crate::frame::encoder::{EncodedFrame, FrameEncoder};
use crate::frame::quality::LatencyController;

/// Stateful capture→diff→encode pipeline for one session.
pub struct CaptureLoop {
    /// The most recently captured frame, absent before the first tick
    /// and after a forced reset. Exclusively owned by this loop.
    previous: Option<PixelBuffer>,
    encoder: FrameEncoder,
    controller: LatencyController,
}

impl CaptureLoop {
    pub fn new(config: &CastConfig) -> Self {
        Self {
            previous: None,
            encoder: FrameEncoder::new(),
            controller: LatencyController::new(
                config.initial_quality_level,
                config.latency_high_water(),
                config.latency_low_water(),
            ),
        }
    }

    /// Run one capture cycle over a freshly captured frame.
    ///
    /// Returns `None` when there is nothing to transmit (unchanged
    /// screen, or a skipped degenerate region). `previous` is replaced
    /// with `current` on every tick regardless of emission — freshness
    /// tracks wall-clock capture, not "last transmitted". Any diff
    /// failure degrades to a full-frame retransmit; availability
    /// outranks diff precision.
    pub fn tick(&mut self, current: PixelBuffer) -> Option<EncodedFrame> {
        let captured_at = Instant::now();
        let (region, merged) = self.diff(&current);

        let encoded = if region.is_empty() {
            None
        } else {
            let buffer = merged.as_ref().unwrap_or(&current);
            match self
                .encoder
                .encode(buffer, &region, self.controller.quality_percent())
            {
                Ok(payload) => Some(EncodedFrame {
                    region,
                    payload,
                    captured_at,
                }),
                Err(e) => {
                    debug!(error = %e, "skipping frame");
                    None
                }
            }
        };

        self.previous = Some(current);
        encoded
    }

    /// Diff against the held previous frame, or force full-frame mode.
    fn diff(&self, current: &PixelBuffer) -> (DirtyRegion, Option<PixelBuffer>) {
        let full = DirtyRegion::full_frame(current.width, current.height);
        let Some(prev) = &self.previous else {
            return (full, None);
        };
        match diff::compare_merged(current, prev, false) {
            Ok((region, merged)) => (region, Some(merged)),
            Err(e) => {
                // Resolution changes and format surprises land here;
                // retransmit everything rather than fail the loop.
                warn!(error = %e, "frame diff failed, forcing full frame");
                (full, None)
            }
        }
    }

    /// Drop the held frame so the next tick transmits the full frame
    /// (screen re-selection, resolution change).
    pub fn force_full_frame(&mut self) {
        self.previous = None;
    }

    /// Feed one viewer-reported latency sample into quality control.
    pub fn record_latency(&mut self, latency: Duration) {
        self.controller.record_latency(latency);
    }

    /// Pin the quality ladder to a viewer-requested level.
    pub fn set_quality_level(&mut self, level: u8) {
        self.controller.set_level(level);
    }

    /// Current quality ladder level.
    pub fn quality_level(&self) -> u8 {
        self.controller.level()
    }

    /// Frames encoded since the loop was created.
    pub fn frames_encoded(&self) -> u64 {
        self.encoder.frame_count()
    }
}

// ── Tests ────────────────────────────────────────────────────────
