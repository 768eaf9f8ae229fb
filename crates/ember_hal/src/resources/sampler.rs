//! Immutable sampler state.

use std::sync::Arc;

use parking_lot::Mutex;

use super::NativeSlot;
use crate::device::{DeviceContext, NativeHandle, SamplerDesc};
use ember_core::{empty_action, ActionRef, Lifecycle, LifecycleObject, OneShotAction};

/// Texture sampling state. Has nothing to update after creation.
pub struct Sampler {
    lifecycle: Lifecycle,
    desc: SamplerDesc,
    native: Arc<NativeSlot>,
    init: ActionRef,
    release: ActionRef,
}

impl Sampler {
    /// Creates an unregistered sampler.
    #[must_use]
    pub fn new(context: &Arc<DeviceContext>, desc: SamplerDesc) -> Arc<Self> {
        let native: Arc<NativeSlot> = Arc::new(Mutex::new(None));

        let slot = Arc::clone(&native);
        let init = OneShotAction::new(Arc::clone(context), move |context: Arc<DeviceContext>| {
            let result = context.device().create_sampler(&desc);
            *slot.lock() = context.report("create_sampler", "sampler", result);
        });

        let slot = Arc::clone(&native);
        let release = OneShotAction::new(Arc::clone(context), move |context: Arc<DeviceContext>| {
            if let Some(handle) = slot.lock().take() {
                let result = context.device().destroy_sampler(handle);
                context.report("destroy_sampler", "sampler", result);
            }
        });

        Arc::new(Self {
            lifecycle: Lifecycle::new(),
            desc,
            native,
            init: init.into_ref(),
            release: release.into_ref(),
        })
    }

    /// Creation parameters.
    #[must_use]
    pub fn desc(&self) -> SamplerDesc {
        self.desc
    }

    /// Native handle, once initialized and until released.
    #[must_use]
    pub fn native(&self) -> Option<NativeHandle> {
        *self.native.lock()
    }
}

impl LifecycleObject for Sampler {
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
        "sampler"
    }
}
