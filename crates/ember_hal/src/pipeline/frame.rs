//! Result of a single driven frame.

use ember_core::ProcessReport;

/// What one [`FrameDriver::run_frame`](super::FrameDriver::run_frame) did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameResult {
    /// Frame number after the registry pass.
    pub frame_number: u64,
    /// Lifecycle work executed by the registry.
    pub process: ProcessReport,
    /// Time spent in `process()` (microseconds).
    pub process_us: u32,
    /// Total frame time (microseconds).
    pub frame_time_us: u32,
    /// Device failures swallowed inside hooks this frame.
    pub hook_failures: u64,
    /// Frame exceeded the configured budget.
    pub over_budget: bool,
}

impl FrameResult {
    /// True if the registry had nothing to do.
    #[must_use]
    pub const fn is_idle(&self) -> bool {
        self.process.is_idle()
    }
}
