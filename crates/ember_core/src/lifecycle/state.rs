//! # Lifecycle State
//!
//! Per-resource handle and state machine, stored inline in every resource.
//!
//! ```text
//! Unregistered ──register──> PendingInit ──process──> Ready
//!                                 │                     │ ▲ invalidate/update
//!                                 └──── unregister ─────┤ │
//!                                                       ▼ │
//!                                   PendingRelease ──process──> Released
//! ```

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU8, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use super::registry::ResourceRegistry;

/// Registry-issued identifier of a resource.
///
/// Handle `0` is reserved for "unregistered".
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct ResourceHandle(u32);

impl ResourceHandle {
    /// The "not registered" sentinel.
    pub const NULL: Self = Self(0);

    /// Wraps a raw id.
    #[inline]
    #[must_use]
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    /// The raw id.
    #[inline]
    #[must_use]
    pub const fn raw(self) -> u32 {
        self.0
    }

    /// True for [`ResourceHandle::NULL`].
    #[inline]
    #[must_use]
    pub const fn is_null(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for ResourceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Where a resource is in its lifecycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum LifecycleState {
    /// Created, not yet known to a registry.
    Unregistered = 0,
    /// Registered; initializer queued.
    PendingInit = 1,
    /// Initialized and usable.
    Ready = 2,
    /// Unregistered; releaser queued.
    PendingRelease = 3,
    /// Releaser ran. Terminal.
    Released = 4,
}

impl From<u8> for LifecycleState {
    fn from(v: u8) -> Self {
        match v {
            0 => Self::Unregistered,
            1 => Self::PendingInit,
            2 => Self::Ready,
            3 => Self::PendingRelease,
            _ => Self::Released,
        }
    }
}

/// Lifecycle bookkeeping embedded in every resource.
///
/// All fields are atomics so any thread can read state, and registration,
/// invalidation and unregistration can race without a lock. The registry
/// link is a weak back-reference: the resource never keeps its registry
/// alive.
pub struct Lifecycle {
    handle: AtomicU32,
    state: AtomicU8,
    dirty: AtomicBool,
    /// An update request is sitting in the registry's update queue.
    update_queued: AtomicBool,
    /// The initializer has been run.
    initialized: AtomicBool,
    registry: Mutex<Weak<ResourceRegistry>>,
}

impl Lifecycle {
    /// Fresh, unregistered state.
    #[must_use]
    pub fn new() -> Self {
        Self {
            handle: AtomicU32::new(ResourceHandle::NULL.raw()),
            state: AtomicU8::new(LifecycleState::Unregistered as u8),
            dirty: AtomicBool::new(false),
            update_queued: AtomicBool::new(false),
            initialized: AtomicBool::new(false),
            registry: Mutex::new(Weak::new()),
        }
    }

    /// Handle assigned at registration, or [`ResourceHandle::NULL`].
    #[inline]
    #[must_use]
    pub fn handle(&self) -> ResourceHandle {
        ResourceHandle(self.handle.load(Ordering::Acquire))
    }

    /// Current state.
    #[inline]
    #[must_use]
    pub fn state(&self) -> LifecycleState {
        LifecycleState::from(self.state.load(Ordering::Acquire))
    }

    /// True between an invalidation and the update that consumes it.
    #[inline]
    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.dirty.load(Ordering::Acquire)
    }

    /// True once the initializer has run.
    #[inline]
    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::Acquire)
    }

    /// The registry this resource is registered with, if it is still alive.
    #[must_use]
    pub fn registry(&self) -> Option<Arc<ResourceRegistry>> {
        self.registry.lock().upgrade()
    }

    // ========================================================================
    // Transitions (registry only)
    // ========================================================================

    /// Atomically moves `from -> to`; on failure returns the observed state.
    pub(crate) fn transition(
        &self,
        from: LifecycleState,
        to: LifecycleState,
    ) -> Result<(), LifecycleState> {
        self.state
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .map(|_| ())
            .map_err(LifecycleState::from)
    }

    pub(crate) fn set_state(&self, state: LifecycleState) {
        self.state.store(state as u8, Ordering::Release);
    }

    pub(crate) fn bind(&self, handle: ResourceHandle, registry: &Arc<ResourceRegistry>) {
        *self.registry.lock() = Arc::downgrade(registry);
        self.handle.store(handle.raw(), Ordering::Release);
    }

    pub(crate) fn unbind(&self) {
        self.handle.store(ResourceHandle::NULL.raw(), Ordering::Release);
        *self.registry.lock() = Weak::new();
    }

    pub(crate) fn set_initialized(&self) {
        self.initialized.store(true, Ordering::Release);
    }

    /// Sets dirty; returns true if the caller must enqueue an update.
    pub(crate) fn mark_dirty(&self) -> bool {
        self.dirty.store(true, Ordering::Release);
        !self.update_queued.swap(true, Ordering::AcqRel)
    }

    /// Clears dirty; returns whether it was set.
    pub(crate) fn take_dirty(&self) -> bool {
        self.dirty.swap(false, Ordering::AcqRel)
    }

    pub(crate) fn clear_update_queued(&self) {
        self.update_queued.store(false, Ordering::Release);
    }
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Lifecycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Lifecycle")
            .field("handle", &self.handle())
            .field("state", &self.state())
            .field("dirty", &self.is_dirty())
            .field("initialized", &self.is_initialized())
            .finish_non_exhaustive()
    }
}
