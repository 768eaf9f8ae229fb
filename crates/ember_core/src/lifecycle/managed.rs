//! # Managed Resources
//!
//! Scope-bound registration: a [`Managed`] wrapper unregisters its resource
//! when dropped, so application code cannot forget to release native memory.

use std::fmt;
use std::ops::Deref;
use std::sync::Arc;

use super::object::{LifecycleExt, LifecycleObject};
use super::registry::ResourceRegistry;
use super::state::{LifecycleState, ResourceHandle};
use crate::error::{LifecycleError, LifecycleResult};

/// A registered resource that is unregistered when the wrapper drops.
///
/// # Example
///
/// ```rust,ignore
/// let texture = Managed::register(&registry, Texture::new(device, desc))?;
/// texture.invalidate()?;
/// drop(texture); // releaser queued for the next process()
/// ```
pub struct Managed<T: LifecycleObject> {
    object: Arc<T>,
}

impl<T: LifecycleObject> Managed<T> {
    /// Registers `object` with `registry` and takes over its unregistration.
    ///
    /// # Errors
    ///
    /// As [`ResourceRegistry::register`].
    pub fn register(registry: &Arc<ResourceRegistry>, object: Arc<T>) -> LifecycleResult<Self> {
        registry.register(&object)?;
        Ok(Self { object })
    }

    /// Handle assigned at registration.
    #[inline]
    #[must_use]
    pub fn handle(&self) -> ResourceHandle {
        self.object.lifecycle().handle()
    }

    /// Shared reference to the resource.
    #[must_use]
    pub fn object(&self) -> &Arc<T> {
        &self.object
    }

    /// Unregisters now and reports the outcome, instead of logging it on drop.
    ///
    /// # Errors
    ///
    /// As [`ResourceRegistry::unregister`], plus `NotFound` if the registry
    /// has already been dropped.
    pub fn dispose(self) -> LifecycleResult<()> {
        let result = unregister(&*self.object);
        // Drop sees PendingRelease and skips
        drop(self);
        result
    }
}

fn unregister<T: LifecycleObject>(object: &T) -> LifecycleResult<()> {
    match object.lifecycle().registry() {
        Some(registry) => registry.unregister(object),
        None => Err(LifecycleError::NotFound(format!(
            "registry of {} is gone, release was not queued",
            object.label()
        ))),
    }
}

impl<T: LifecycleObject> Deref for Managed<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.object
    }
}

impl<T: LifecycleObject> Drop for Managed<T> {
    fn drop(&mut self) {
        if !matches!(
            self.object.state(),
            LifecycleState::PendingInit | LifecycleState::Ready
        ) {
            return;
        }
        if let Err(err) = unregister(&*self.object) {
            tracing::warn!(
                "Failed to unregister {} {} on drop: {}",
                self.object.label(),
                self.handle(),
                err
            );
        }
    }
}

impl<T: LifecycleObject> fmt::Debug for Managed<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Managed")
            .field("label", &self.object.label())
            .field("lifecycle", self.object.lifecycle())
            .finish()
    }
}
