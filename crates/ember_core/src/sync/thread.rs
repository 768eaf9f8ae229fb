//! # Render Thread Affinity
//!
//! Exactly one thread may run `process()`, the `ensure_*` family and device
//! calls. [`RenderThread`] remembers which one.

use std::thread::{self, ThreadId};

use crate::config::AffinityPolicy;
use crate::error::{LifecycleError, LifecycleResult};

/// Identity of the designated render thread plus the violation policy.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RenderThread {
    id: ThreadId,
    policy: AffinityPolicy,
}

impl RenderThread {
    /// Designates the calling thread as the render thread.
    #[must_use]
    pub fn current(policy: AffinityPolicy) -> Self {
        Self {
            id: thread::current().id(),
            policy,
        }
    }

    /// Designates an arbitrary thread (e.g. a spawned render loop).
    #[must_use]
    pub const fn from_id(id: ThreadId, policy: AffinityPolicy) -> Self {
        Self { id, policy }
    }

    /// Id of the render thread.
    #[inline]
    #[must_use]
    pub const fn id(&self) -> ThreadId {
        self.id
    }

    /// True when called from the render thread.
    #[inline]
    #[must_use]
    pub fn is_current(&self) -> bool {
        thread::current().id() == self.id
    }

    /// Verifies the caller runs on the render thread.
    ///
    /// # Arguments
    ///
    /// * `operation` - Name of the guarded call, used in the error message
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::PreconditionViolation`] off-thread under
    /// [`AffinityPolicy::Error`].
    ///
    /// # Panics
    ///
    /// Panics off-thread under [`AffinityPolicy::Panic`].
    pub fn check(&self, operation: &str) -> LifecycleResult<()> {
        if self.is_current() {
            return Ok(());
        }

        let caller = thread::current();
        let message = format!(
            "{operation} must run on the render thread {:?}, called from {:?} ({})",
            self.id,
            caller.id(),
            caller.name().unwrap_or("unnamed"),
        );
        match self.policy {
            AffinityPolicy::Panic => panic!("{message}"),
            AffinityPolicy::Error => {
                tracing::error!("{}", message);
                Err(LifecycleError::PreconditionViolation(message))
            }
        }
    }
}
