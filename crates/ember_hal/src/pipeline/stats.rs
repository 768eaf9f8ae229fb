//! Frame driver statistics.

use super::FrameResult;

/// Running totals across all driven frames.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameStats {
    /// Frames driven.
    pub total_frames: u64,
    /// Initializers fired.
    pub initialized: u64,
    /// Updaters fired.
    pub updated: u64,
    /// Releasers fired.
    pub released: u64,
    /// Device failures inside hooks.
    pub hook_failures: u64,
    /// Worst frame time (microseconds).
    pub worst_frame_time_us: u32,
    /// Frames over budget.
    pub frames_over_budget: u32,
}

impl FrameStats {
    /// Folds one frame into the totals.
    pub fn record(&mut self, frame: &FrameResult) {
        self.total_frames += 1;
        self.initialized += frame.process.initialized as u64;
        self.updated += frame.process.updated as u64;
        self.released += frame.process.released as u64;
        self.hook_failures += frame.hook_failures;
        self.worst_frame_time_us = self.worst_frame_time_us.max(frame.frame_time_us);
        if frame.over_budget {
            self.frames_over_budget += 1;
        }
    }

    /// Natively created objects whose release has not run yet.
    #[must_use]
    pub fn outstanding(&self) -> u64 {
        self.initialized.saturating_sub(self.released)
    }
}
