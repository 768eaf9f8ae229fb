//! # Frame Pipeline
//!
//! Drives the lifecycle core once per frame on the render thread.
//!
//! ```text
//! ┌──────────────┬──────────────────────────┬─────────────────┐
//! │ begin frame  │ registry.process()       │ device.end_frame│
//! │              │ init -> update -> release│ (submit)        │
//! └──────────────┴──────────────────────────┴─────────────────┘
//! ```

mod frame;
mod stats;

pub use frame::FrameResult;
pub use stats::FrameStats;

use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::device::DeviceContext;
use crate::error::HalResult;
use ember_core::ResourceRegistry;

/// Frame driver settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameDriverConfig {
    /// Frame time above which a warning is logged.
    pub frame_budget: Duration,
    /// Upper bound on frames [`FrameDriver::drain`] runs.
    pub max_drain_frames: u32,
}

impl Default for FrameDriverConfig {
    fn default() -> Self {
        Self {
            frame_budget: Duration::from_micros(16_666), // ~16ms for 60fps
            max_drain_frames: 8,
        }
    }
}

/// Owns the per-frame sequence: process the registry, then submit.
///
/// Must be driven from the registry's render thread.
pub struct FrameDriver {
    config: FrameDriverConfig,
    context: Arc<DeviceContext>,
    registry: Arc<ResourceRegistry>,
    stats: FrameStats,
}

impl FrameDriver {
    /// Creates a driver with default settings.
    #[must_use]
    pub fn new(context: Arc<DeviceContext>, registry: Arc<ResourceRegistry>) -> Self {
        Self::with_config(FrameDriverConfig::default(), context, registry)
    }

    /// Creates a driver with explicit settings.
    #[must_use]
    pub fn with_config(
        config: FrameDriverConfig,
        context: Arc<DeviceContext>,
        registry: Arc<ResourceRegistry>,
    ) -> Self {
        Self {
            config,
            context,
            registry,
            stats: FrameStats::default(),
        }
    }

    /// Runs one frame: `registry.process()` followed by `device.end_frame()`.
    ///
    /// # Errors
    ///
    /// A lifecycle error when called off the render thread, a device error if
    /// submission fails.
    pub fn run_frame(&mut self) -> HalResult<FrameResult> {
        let frame_start = Instant::now();
        let failures_before = self.context.hook_failures();

        let process = self.registry.process()?;
        let process_us = elapsed_us(frame_start);

        self.context.device().end_frame()?;

        let frame_time_us = elapsed_us(frame_start);
        let over_budget = frame_start.elapsed() > self.config.frame_budget;
        if over_budget {
            tracing::warn!(
                "Frame {} took {}us (budget {:?})",
                process.frame,
                frame_time_us,
                self.config.frame_budget
            );
        }

        let result = FrameResult {
            frame_number: process.frame,
            process,
            process_us,
            frame_time_us,
            hook_failures: self.context.hook_failures() - failures_before,
            over_budget,
        };
        self.stats.record(&result);
        Ok(result)
    }

    /// Runs frames until no lifecycle work is pending, up to
    /// `max_drain_frames`. Returns the number of frames run.
    ///
    /// Used at shutdown so every queued releaser reaches the device.
    ///
    /// # Errors
    ///
    /// As [`FrameDriver::run_frame`].
    pub fn drain(&mut self) -> HalResult<u32> {
        let mut frames = 0;
        while frames < self.config.max_drain_frames {
            let pending = self.registry.pending();
            if pending.init + pending.update + pending.release == 0 {
                break;
            }
            self.run_frame()?;
            frames += 1;
        }

        let pending = self.registry.pending();
        if pending.init + pending.update + pending.release > 0 {
            tracing::warn!("Drain stopped after {} frames with {:?} pending", frames, pending);
        }
        Ok(frames)
    }

    /// Running totals.
    #[must_use]
    pub fn stats(&self) -> FrameStats {
        self.stats
    }

    /// The driven registry.
    #[must_use]
    pub fn registry(&self) -> &Arc<ResourceRegistry> {
        &self.registry
    }

    /// The device context.
    #[must_use]
    pub fn context(&self) -> &Arc<DeviceContext> {
        &self.context
    }
}

fn elapsed_us(start: Instant) -> u32 {
    u32::try_from(start.elapsed().as_micros()).unwrap_or(u32::MAX)
}
