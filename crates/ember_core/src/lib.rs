//! # EMBER Core
//!
//! Deferred lifecycle management for GPU-backed resources:
//! - Any thread may create, modify or drop a resource
//! - Only the render thread ever touches native objects
//! - Native create/update/destroy calls run at most once each, in order
//!
//! ## Architecture Rules
//!
//! 1. **Enqueue, never block** - worker threads only push work
//! 2. **One drain per frame** - `process()` runs init, update, release
//! 3. **Fire once** - every native hook is a one-shot action
//!
//! ## Example
//!
//! ```rust,ignore
//! use ember_core::{RegistryConfig, ResourceRegistry};
//!
//! let registry = ResourceRegistry::new(RegistryConfig::default())?;
//! registry.register(&vertex_buffer)?;   // any thread
//! registry.process()?;                  // render thread, once per frame
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod error;
pub mod lifecycle;
pub mod memory;
pub mod sync;

pub use config::{AffinityPolicy, EngineConfig, FenceConfig, RegistryConfig};
pub use error::{ConfigError, LifecycleError, LifecycleResult};
pub use lifecycle::{
    Lifecycle, LifecycleExt, LifecycleObject, LifecycleState, Managed, PendingCounts,
    ProcessReport, RegistryStats, ResourceHandle, ResourceRegistry,
};
pub use memory::IdAllocator;
pub use sync::{
    empty_action, Action, ActionRef, Callback, CancelToken, FenceWait, FrameClock, Invocation,
    OneShotAction, RenderThread, SyncFence, WaitOutcome,
};
