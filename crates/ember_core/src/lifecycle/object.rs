//! # Lifecycle Objects
//!
//! The contract a GPU-backed resource implements so the registry can create,
//! update and destroy it on the render thread.

use std::sync::Arc;

use super::registry::ResourceRegistry;
use super::state::{Lifecycle, LifecycleState, ResourceHandle};
use crate::error::{LifecycleError, LifecycleResult};
use crate::sync::{ActionRef, Invocation};

/// A resource whose native side is created, updated and destroyed lazily.
///
/// Hooks are handed out as one-shot actions, so a hook enqueued twice, or
/// triggered by both disposal and registry cleanup, still runs once.
///
/// - `initializer` and `releaser` must be non-empty whenever the resource
///   owns a native handle.
/// - `updater` may return the empty action when there is nothing to update
///   (immutable state); otherwise it should return a *fresh* action per call.
///
/// # Example
///
/// ```rust
/// use std::sync::Arc;
/// use ember_core::{empty_action, ActionRef, Lifecycle, LifecycleObject, OneShotAction};
///
/// struct DepthTarget {
///     lifecycle: Lifecycle,
///     init: ActionRef,
/// }
///
/// impl LifecycleObject for DepthTarget {
///     fn lifecycle(&self) -> &Lifecycle { &self.lifecycle }
///     fn initializer(&self) -> ActionRef { Arc::clone(&self.init) }
///     fn updater(&self) -> ActionRef { empty_action() }
///     fn releaser(&self) -> ActionRef { empty_action() }
/// }
///
/// let target = DepthTarget {
///     lifecycle: Lifecycle::new(),
///     init: OneShotAction::from_fn(|| {}).into_ref(),
/// };
/// assert_eq!(target.label(), "resource");
/// ```
pub trait LifecycleObject: Send + Sync + 'static {
    /// Embedded lifecycle bookkeeping.
    fn lifecycle(&self) -> &Lifecycle;

    /// Creates the native resource.
    fn initializer(&self) -> ActionRef;

    /// Pushes pending changes to the native resource.
    fn updater(&self) -> ActionRef;

    /// Destroys the native resource.
    fn releaser(&self) -> ActionRef;

    /// Short name used in logs.
    fn label(&self) -> &str {
        "resource"
    }
}

/// Convenience accessors and render-thread operations for every
/// [`LifecycleObject`].
pub trait LifecycleExt: LifecycleObject {
    /// Handle assigned at registration.
    fn handle(&self) -> ResourceHandle {
        self.lifecycle().handle()
    }

    /// Current state.
    fn state(&self) -> LifecycleState {
        self.lifecycle().state()
    }

    /// True between an invalidation and the update that consumes it.
    fn is_dirty(&self) -> bool {
        self.lifecycle().is_dirty()
    }

    /// True once the initializer has run.
    fn is_initialized(&self) -> bool {
        self.lifecycle().is_initialized()
    }

    /// Marks the resource as needing an update and queues it. Safe from any
    /// thread; redundant calls before the update runs queue nothing extra.
    ///
    /// Returns true if this call queued the update.
    ///
    /// # Errors
    ///
    /// `NotFound` if unregistered, `PreconditionViolation` if released.
    fn invalidate(&self) -> LifecycleResult<bool> {
        bound_registry(self)?.invalidate(self)
    }

    /// Runs the initializer now if it has not run yet. Render thread only.
    ///
    /// # Errors
    ///
    /// `PreconditionViolation` off the render thread or after release,
    /// `NotFound` if unregistered.
    fn ensure_initialized(&self) -> LifecycleResult<()> {
        let registry = bound_registry(self)?;
        registry.render_thread().check("ensure_initialized")?;

        run_initializer(self);
        let _ = self
            .lifecycle()
            .transition(LifecycleState::PendingInit, LifecycleState::Ready);
        Ok(())
    }

    /// Runs the updater now if the resource is dirty. Render thread only.
    ///
    /// Returns true if an update ran.
    ///
    /// # Errors
    ///
    /// As [`LifecycleExt::ensure_initialized`], plus `PreconditionViolation`
    /// if the resource has not been initialized yet.
    fn ensure_updated(&self) -> LifecycleResult<bool> {
        let registry = bound_registry(self)?;
        registry.render_thread().check("ensure_updated")?;

        if !self.lifecycle().is_initialized() {
            return Err(LifecycleError::PreconditionViolation(format!(
                "{} {} must be initialized before it can be updated",
                self.label(),
                self.handle()
            )));
        }
        Ok(run_updater(self))
    }

    /// Initializes and updates the resource now. Render thread only.
    ///
    /// # Errors
    ///
    /// As [`LifecycleExt::ensure_initialized`].
    fn ensure_ready(&self) -> LifecycleResult<()> {
        self.ensure_initialized()?;
        self.ensure_updated()?;
        Ok(())
    }
}

impl<T: LifecycleObject + ?Sized> LifecycleExt for T {}

/// Resolves the registry a resource is bound to, rejecting released and
/// unregistered resources.
fn bound_registry<T: LifecycleObject + ?Sized>(
    object: &T,
) -> LifecycleResult<Arc<ResourceRegistry>> {
    let lifecycle = object.lifecycle();
    match lifecycle.state() {
        LifecycleState::Released => Err(LifecycleError::PreconditionViolation(format!(
            "{} has been released",
            object.label()
        ))),
        LifecycleState::Unregistered => Err(LifecycleError::NotFound(format!(
            "{} is not registered",
            object.label()
        ))),
        _ => lifecycle.registry().ok_or_else(|| {
            LifecycleError::NotFound(format!("registry of {} is gone", object.label()))
        }),
    }
}

// ============================================================================
// Hook execution (render thread)
// ============================================================================

/// Runs the initializer once. Returns true if it fired now.
pub(crate) fn run_initializer<T: LifecycleObject + ?Sized>(object: &T) -> bool {
    let lifecycle = object.lifecycle();
    if lifecycle.is_initialized() {
        return false;
    }
    let outcome = object.initializer().invoke();
    lifecycle.set_initialized();
    tracing::trace!("init {} {}: {:?}", object.label(), lifecycle.handle(), outcome);
    outcome == Invocation::Fired
}

/// Runs the updater if dirty. Returns true if it fired.
pub(crate) fn run_updater<T: LifecycleObject + ?Sized>(object: &T) -> bool {
    let lifecycle = object.lifecycle();
    if !lifecycle.take_dirty() {
        return false;
    }
    let outcome = object.updater().invoke();
    tracing::trace!("update {} {}: {:?}", object.label(), lifecycle.handle(), outcome);
    outcome == Invocation::Fired
}

/// Runs the releaser. Returns true if it fired.
pub(crate) fn run_releaser<T: LifecycleObject + ?Sized>(object: &T) -> bool {
    let outcome = object.releaser().invoke();
    tracing::trace!(
        "release {} {}: {:?}",
        object.label(),
        object.lifecycle().handle(),
        outcome
    );
    outcome == Invocation::Fired
}
