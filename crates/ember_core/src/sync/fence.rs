//! # Sync Fences
//!
//! GPU -> CPU completion signals queried by polling.
//!
//! ```text
//!   Unsignaled ──poll() == true──> Signaled   (one-way latch)
//!        │                            ▲
//!        └──────── dispose() ─────────┘
//! ```
//!
//! Polling real GPU state is expensive, and finished GPU work never
//! "un-finishes", so once a fence reads signaled the backend is never asked
//! again.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crate::config::FenceConfig;

// ============================================================================
// FRAME CLOCK
// ============================================================================

/// Shared, monotonically increasing frame counter.
///
/// The registry advances it once per `process()` pass; frame fences observe it.
#[derive(Clone, Debug, Default)]
pub struct FrameClock {
    frame: Arc<AtomicU64>,
}

impl FrameClock {
    /// Creates a clock at frame 0.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current frame number.
    #[inline]
    #[must_use]
    pub fn current(&self) -> u64 {
        self.frame.load(Ordering::Acquire)
    }

    /// Moves to the next frame and returns its number.
    #[inline]
    pub fn advance(&self) -> u64 {
        self.frame.fetch_add(1, Ordering::AcqRel) + 1
    }
}

// ============================================================================
// CANCELLATION
// ============================================================================

/// Cooperative cancellation flag shared between a waiter and its owner.
#[derive(Clone, Debug, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    /// Creates a token that is not cancelled.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation. Every clone observes it.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    /// True once [`CancelToken::cancel`] has been called on any clone.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

// ============================================================================
// FENCE
// ============================================================================

/// How a bounded wait ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WaitOutcome {
    /// The fence signaled.
    Signaled,
    /// The timeout elapsed first.
    TimedOut,
    /// The cancel token fired first.
    Cancelled,
}

impl WaitOutcome {
    /// True for [`WaitOutcome::Signaled`].
    #[must_use]
    pub const fn is_signaled(self) -> bool {
        matches!(self, Self::Signaled)
    }
}

/// Parameters of a bounded fence wait.
#[derive(Clone, Debug)]
pub struct FenceWait {
    /// Give up after this long.
    pub timeout: Duration,
    /// Back-to-back checks before yielding.
    pub spin_iterations: u32,
    /// Sleep between checks after spinning; zero means `yield_now`.
    pub poll_interval: Duration,
    /// Optional external cancellation.
    pub cancel: Option<CancelToken>,
}

impl FenceWait {
    /// Waits up to `timeout` with the default spin/poll settings.
    #[must_use]
    pub fn new(timeout: Duration) -> Self {
        let defaults = FenceConfig::default();
        Self {
            timeout,
            spin_iterations: defaults.spin_iterations,
            poll_interval: defaults.poll_interval(),
            cancel: None,
        }
    }

    /// Builds a wait from configuration, using its default timeout.
    #[must_use]
    pub fn from_config(config: &FenceConfig) -> Self {
        Self {
            timeout: config.default_timeout(),
            spin_iterations: config.spin_iterations,
            poll_interval: config.poll_interval(),
            cancel: None,
        }
    }

    /// Aborts the wait when `token` is cancelled.
    #[must_use]
    pub fn with_cancel(mut self, token: CancelToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Overrides the sleep between polls.
    #[must_use]
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(CancelToken::is_cancelled)
    }
}

/// Polling completion fence with a cached, monotonic signaled latch.
///
/// # Example
///
/// ```rust
/// use ember_core::{FrameClock, SyncFence};
///
/// let clock = FrameClock::new();
/// let fence = SyncFence::frame_based(&clock);
/// assert!(!fence.check());
///
/// clock.advance();
/// assert!(fence.check());
/// ```
pub struct SyncFence {
    /// Latched completion state.
    signaled: AtomicBool,
    /// Backend query; only called while unsignaled.
    poll: Box<dyn Fn() -> bool + Send + Sync>,
    /// Number of backend queries made (diagnostics).
    polls: AtomicU64,
}

impl SyncFence {
    /// Creates an unsignaled fence backed by `poll`.
    ///
    /// `poll` must not assume it is called at any particular rate.
    #[must_use]
    pub fn new(poll: impl Fn() -> bool + Send + Sync + 'static) -> Self {
        Self {
            signaled: AtomicBool::new(false),
            poll: Box::new(poll),
            polls: AtomicU64::new(0),
        }
    }

    /// Creates a fence that is already signaled.
    #[must_use]
    pub fn signaled() -> Self {
        let fence = Self::new(|| true);
        fence.signaled.store(true, Ordering::Release);
        fence
    }

    /// Fallback for backends without a CPU-visible fence: signaled once the
    /// frame clock has moved strictly past the frame current at creation.
    #[must_use]
    pub fn frame_based(clock: &FrameClock) -> Self {
        let created = clock.current();
        let clock = clock.clone();
        Self::new(move || clock.current() > created)
    }

    /// Returns true if the fence has signaled, polling the backend only
    /// while it has not.
    pub fn check(&self) -> bool {
        if self.signaled.load(Ordering::Acquire) {
            return true;
        }

        self.polls.fetch_add(1, Ordering::Relaxed);
        if (self.poll)() {
            self.signaled.store(true, Ordering::Release);
            return true;
        }
        false
    }

    /// Cached state. Never polls.
    #[inline]
    #[must_use]
    pub fn is_signaled(&self) -> bool {
        self.signaled.load(Ordering::Acquire)
    }

    /// Forces the fence signaled. Holders of a fence whose backing object
    /// is gone see "complete" instead of waiting forever. Idempotent.
    pub fn dispose(&self) {
        self.signaled.store(true, Ordering::Release);
    }

    /// Number of backend polls performed so far.
    #[must_use]
    pub fn poll_count(&self) -> u64 {
        self.polls.load(Ordering::Relaxed)
    }

    /// Waits for the fence without ever blocking unboundedly.
    ///
    /// Spins for `spin_iterations` checks, then sleeps `poll_interval` (or
    /// yields) between checks until the fence signals, the timeout elapses,
    /// or the cancel token fires.
    pub fn wait(&self, wait: &FenceWait) -> WaitOutcome {
        let start = Instant::now();
        let mut spins = 0u32;

        loop {
            if self.check() {
                return WaitOutcome::Signaled;
            }
            if wait.is_cancelled() {
                tracing::debug!("Fence wait cancelled after {:?}", start.elapsed());
                return WaitOutcome::Cancelled;
            }
            if start.elapsed() >= wait.timeout {
                tracing::warn!(
                    "Fence wait timed out after {:?} ({} polls)",
                    wait.timeout,
                    self.poll_count()
                );
                return WaitOutcome::TimedOut;
            }

            if spins < wait.spin_iterations {
                spins += 1;
                std::hint::spin_loop();
            } else if wait.poll_interval.is_zero() {
                thread::yield_now();
            } else {
                thread::sleep(wait.poll_interval);
            }
        }
    }
}

impl fmt::Debug for SyncFence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyncFence")
            .field("signaled", &self.is_signaled())
            .field("polls", &self.poll_count())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn counting_fence(signal_after: usize) -> (SyncFence, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&calls);
        let fence = SyncFence::new(move || c.fetch_add(1, Ordering::SeqCst) + 1 >= signal_after);
        (fence, calls)
    }

    #[test]
    fn test_latch_stops_polling() {
        let (fence, calls) = counting_fence(3);

        assert!(!fence.check());
        assert!(!fence.check());
        assert!(fence.check());
        assert_eq!(calls.load(Ordering::SeqCst), 3);

        for _ in 0..10 {
            assert!(fence.check());
        }
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(fence.poll_count(), 3);
    }

    #[test]
    fn test_false_is_not_cached() {
        let (fence, calls) = counting_fence(usize::MAX);
        for _ in 0..5 {
            assert!(!fence.check());
        }
        assert_eq!(calls.load(Ordering::SeqCst), 5);
        assert!(!fence.is_signaled());
    }

    #[test]
    fn test_dispose_forces_signaled() {
        let (fence, calls) = counting_fence(usize::MAX);
        fence.dispose();
        fence.dispose();

        assert!(fence.is_signaled());
        assert!(fence.check());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_signaled_constructor_never_polls() {
        let fence = SyncFence::signaled();
        assert!(fence.check());
        assert_eq!(fence.poll_count(), 0);
    }

    #[test]
    fn test_frame_fence_needs_strictly_later_frame() {
        let clock = FrameClock::new();
        clock.advance();
        let fence = SyncFence::frame_based(&clock);

        assert!(!fence.check());
        assert_eq!(clock.advance(), 2);
        assert!(fence.check());
    }

    #[test]
    fn test_wait_until_signaled() {
        let (fence, _) = counting_fence(50);
        let outcome = fence.wait(&FenceWait::new(Duration::from_secs(5)));
        assert_eq!(outcome, WaitOutcome::Signaled);
        assert_eq!(fence.poll_count(), 50);
    }

    #[test]
    fn test_wait_times_out() {
        let fence = SyncFence::new(|| false);
        let wait = FenceWait::new(Duration::from_millis(20))
            .with_poll_interval(Duration::from_millis(1));

        let start = Instant::now();
        assert_eq!(fence.wait(&wait), WaitOutcome::TimedOut);
        assert!(start.elapsed() >= Duration::from_millis(20));
        assert!(!fence.is_signaled());
    }

    #[test]
    fn test_wait_cancelled_from_other_thread() {
        let fence = SyncFence::new(|| false);
        let token = CancelToken::new();
        let wait = FenceWait::new(Duration::from_secs(30)).with_cancel(token.clone());

        let canceller = thread::spawn(move || {
            thread::sleep(Duration::from_millis(10));
            token.cancel();
        });

        assert_eq!(fence.wait(&wait), WaitOutcome::Cancelled);
        canceller.join().unwrap();
    }

    #[test]
    fn test_wait_from_config() {
        let config = FenceConfig {
            spin_iterations: 0,
            poll_interval_us: 0,
            default_timeout_ms: 5,
        };
        let wait = FenceWait::from_config(&config);
        assert_eq!(wait.timeout, Duration::from_millis(5));
        assert_eq!(SyncFence::new(|| false).wait(&wait), WaitOutcome::TimedOut);
    }
}
