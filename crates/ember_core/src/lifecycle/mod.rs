//! # Resource Lifecycle
//!
//! ## The Problem
//!
//! Native GPU objects may only be created, modified and destroyed on the
//! render thread, yet the application builds and drops resources everywhere.
//!
//! ## The Solution
//!
//! Every resource embeds a [`Lifecycle`] and exposes three one-shot hooks.
//! Registration, invalidation and unregistration only enqueue work; the
//! render thread drains the queues once per frame with
//! [`ResourceRegistry::process`].
//!
//! ```text
//! any thread                      render thread
//! ──────────                      ─────────────
//! register(obj)    ─> init queue    ─┐
//! obj.invalidate() ─> update queue  ─┼─> process(): init, update, release
//! unregister(obj)  ─> release queue ─┘
//! ```

mod managed;
mod object;
mod registry;
mod state;

pub use managed::Managed;
pub use object::{LifecycleExt, LifecycleObject};
pub use registry::{PendingCounts, ProcessReport, RegistryStats, ResourceRegistry};
pub use state::{Lifecycle, LifecycleState, ResourceHandle};
