//! # One-Shot Actions
//!
//! Callbacks that fire at most once, no matter how many threads race to
//! trigger them. Used for "create native resource" and "destroy native
//! resource" hooks, where application disposal and registry cleanup may both
//! try to run the same device call.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::{LifecycleError, LifecycleResult};

/// Boxed callback consuming the captured payload.
pub type Callback<P> = Box<dyn FnOnce(P) + Send + 'static>;

/// Type-erased, shareable one-shot action.
pub type ActionRef = Arc<dyn Action>;

/// Result of invoking a one-shot action.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Invocation {
    /// This call won the race and ran the callback.
    Fired,
    /// The callback already ran (or is running) on behalf of another call.
    AlreadyFired,
    /// The action has no callback; nothing to do.
    Empty,
}

/// Object-safe view of a [`OneShotAction`], independent of its payload type.
pub trait Action: Send + Sync {
    /// Runs the callback if this is the first invocation.
    fn invoke(&self) -> Invocation;

    /// Returns true only for the call that actually ran the callback.
    fn try_invoke(&self) -> bool {
        self.invoke() == Invocation::Fired
    }

    /// True once the callback has been claimed by some caller.
    fn has_fired(&self) -> bool;

    /// True for the no-op sentinel.
    fn is_empty(&self) -> bool;
}

/// A callback plus its by-value payload, guarded so it runs at most once.
///
/// The guard is an atomic compare-and-set; only the winning thread ever
/// touches the stored callback, so losers return without blocking.
///
/// # Example
///
/// ```rust
/// use ember_core::{Invocation, OneShotAction};
///
/// let raw_buffer = 17u64;
/// let release = OneShotAction::new(raw_buffer, |raw| {
///     assert_eq!(raw, 17);
/// });
///
/// assert_eq!(release.invoke(), Invocation::Fired);
/// assert_eq!(release.invoke(), Invocation::AlreadyFired);
/// ```
pub struct OneShotAction<P = ()> {
    /// Set by the single winning invocation.
    fired: AtomicBool,
    /// Payload and callback, taken by the winner.
    pending: Mutex<Option<(P, Callback<P>)>>,
    /// No-op sentinel.
    empty: bool,
}

impl<P> OneShotAction<P> {
    /// Wraps `callback` and the payload it will receive.
    ///
    /// # Arguments
    ///
    /// * `payload` - Value handed to the callback (e.g. a raw GPU handle)
    /// * `callback` - Work to run at most once
    #[must_use]
    pub fn new(payload: P, callback: impl FnOnce(P) + Send + 'static) -> Self {
        Self {
            fired: AtomicBool::new(false),
            pending: Mutex::new(Some((payload, Box::new(callback)))),
            empty: false,
        }
    }

    /// Wraps an optional callback.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::InvalidArgument`] when `callback` is `None`.
    /// Use [`OneShotAction::empty`] to build a deliberate no-op.
    pub fn try_new(payload: P, callback: Option<Callback<P>>) -> LifecycleResult<Self> {
        let callback = callback.ok_or_else(|| {
            LifecycleError::InvalidArgument("one-shot action requires a callback".into())
        })?;
        Ok(Self {
            fired: AtomicBool::new(false),
            pending: Mutex::new(Some((payload, callback))),
            empty: false,
        })
    }

    /// The no-op sentinel for resources that need no hook (e.g. an immutable
    /// sampler's updater). Invoking it always reports [`Invocation::Empty`].
    #[must_use]
    pub fn empty() -> Self {
        Self {
            fired: AtomicBool::new(false),
            pending: Mutex::new(None),
            empty: true,
        }
    }

    /// Runs the callback if this is the first invocation.
    pub fn invoke(&self) -> Invocation {
        if self.empty {
            return Invocation::Empty;
        }
        if self
            .fired
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Invocation::AlreadyFired;
        }

        // Only the CAS winner reaches this point
        let pending = self.pending.lock().take();
        match pending {
            Some((payload, callback)) => {
                callback(payload);
                Invocation::Fired
            }
            None => Invocation::AlreadyFired,
        }
    }

    /// Returns true only for the call that actually ran the callback.
    #[inline]
    pub fn try_invoke(&self) -> bool {
        self.invoke() == Invocation::Fired
    }

    /// True once the callback has been claimed.
    #[inline]
    #[must_use]
    pub fn has_fired(&self) -> bool {
        self.fired.load(Ordering::Acquire)
    }

    /// True for the no-op sentinel.
    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.empty
    }
}

impl<P: Send + 'static> OneShotAction<P> {
    /// Erases the payload type so the action can be handed out as an
    /// [`ActionRef`].
    #[must_use]
    pub fn into_ref(self) -> ActionRef {
        Arc::new(self)
    }
}

impl OneShotAction<()> {
    /// Wraps a callback that needs no payload.
    #[must_use]
    pub fn from_fn(callback: impl FnOnce() + Send + 'static) -> Self {
        Self::new((), move |()| callback())
    }
}

impl<P: Send> Action for OneShotAction<P> {
    fn invoke(&self) -> Invocation {
        OneShotAction::invoke(self)
    }

    fn has_fired(&self) -> bool {
        OneShotAction::has_fired(self)
    }

    fn is_empty(&self) -> bool {
        OneShotAction::is_empty(self)
    }
}

impl<P> fmt::Debug for OneShotAction<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OneShotAction")
            .field("fired", &self.has_fired())
            .field("empty", &self.empty)
            .finish()
    }
}

/// Shared no-op action.
#[must_use]
pub fn empty_action() -> ActionRef {
    Arc::new(OneShotAction::<()>::empty())
}
