//! Device fence exposed as a [`SyncFence`].

use std::sync::Arc;

use parking_lot::Mutex;

use super::NativeSlot;
use crate::device::{DeviceContext, NativeHandle};
use ember_core::{
    empty_action, ActionRef, FenceWait, Lifecycle, LifecycleObject, OneShotAction, SyncFence,
    WaitOutcome,
};

struct FenceShared {
    context: Arc<DeviceContext>,
    native: NativeSlot,
}

impl FenceShared {
    /// Queries the device. Unsignaled until the native fence exists.
    fn poll(&self) -> bool {
        let Some(handle) = *self.native.lock() else {
            return false;
        };
        self.context
            .report("fence_signaled", "fence", self.context.device().fence_signaled(handle))
            .unwrap_or(false)
    }
}

/// GPU completion marker.
///
/// The native fence is inserted when the registry initializes this object,
/// i.e. after all work already recorded for the frame. Once released, the
/// [`SyncFence`] is disposed so waiters see "complete" instead of hanging.
pub struct GpuFence {
    lifecycle: Lifecycle,
    shared: Arc<FenceShared>,
    sync: Arc<SyncFence>,
    init: ActionRef,
    release: ActionRef,
}

impl GpuFence {
    /// Creates an unregistered fence.
    #[must_use]
    pub fn new(context: &Arc<DeviceContext>) -> Arc<Self> {
        let shared = Arc::new(FenceShared {
            context: Arc::clone(context),
            native: Mutex::new(None),
        });

        let poller = Arc::clone(&shared);
        let sync = Arc::new(SyncFence::new(move || poller.poll()));

        let init = OneShotAction::new(Arc::clone(&shared), |shared: Arc<FenceShared>| {
            let result = shared.context.device().create_fence();
            *shared.native.lock() = shared.context.report("create_fence", "fence", result);
        });

        let disposed = Arc::clone(&sync);
        let release = OneShotAction::new(Arc::clone(&shared), move |shared: Arc<FenceShared>| {
            if let Some(handle) = shared.native.lock().take() {
                let result = shared.context.device().destroy_fence(handle);
                shared.context.report("destroy_fence", "fence", result);
            }
            disposed.dispose();
        });

        Arc::new(Self {
            lifecycle: Lifecycle::new(),
            shared,
            sync,
            init: init.into_ref(),
            release: release.into_ref(),
        })
    }

    /// Native handle, once initialized and until released.
    #[must_use]
    pub fn native(&self) -> Option<NativeHandle> {
        *self.shared.native.lock()
    }

    /// The polling fence.
    #[must_use]
    pub fn sync(&self) -> &SyncFence {
        &self.sync
    }

    /// Polls the device unless already signaled.
    pub fn is_complete(&self) -> bool {
        self.sync.check()
    }

    /// Bounded wait for completion.
    pub fn wait(&self, wait: &FenceWait) -> WaitOutcome {
        self.sync.wait(wait)
    }
}

impl LifecycleObject for GpuFence {
    fn lifecycle(&self) -> &Lifecycle {
        &self.lifecycle
    }

    fn initializer(&self) -> ActionRef {
        Arc::clone(&self.init)
    }

    fn updater(&self) -> ActionRef {
        empty_action()
    }

    fn releaser(&self) -> ActionRef {
        Arc::clone(&self.release)
    }

    fn label(&self) -> &str {
        "fence"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::HeadlessDevice;

    #[test]
    fn test_unsignaled_before_initialization() {
        let context = DeviceContext::new(Arc::new(HeadlessDevice::new()));
        let fence = GpuFence::new(&context);

        assert!(!fence.is_complete());
        assert!(fence.native().is_none());
        assert_eq!(fence.sync().poll_count(), 1);
        assert_eq!(context.hook_failures(), 0);
    }
}
