//! # Synchronization Primitives
//!
//! ## The Problem
//!
//! ```text
//! Worker threads:  "create this buffer", "drop that texture"
//! Render thread:   the only thread allowed to touch the device
//! GPU:             still reading last frame's resources
//! ```
//!
//! ## The Pieces
//!
//! - [`OneShotAction`]: a hook that fires at most once, even when disposal
//!   and registry cleanup race to trigger it
//! - [`SyncFence`]: latched GPU completion, polled, never blocking unboundedly
//! - [`RenderThread`]: which thread may drive the device
//! - [`FrameClock`]: the frame counter frame fences compare against

mod fence;
mod one_shot;
mod thread;

pub use fence::{CancelToken, FenceWait, FrameClock, SyncFence, WaitOutcome};
pub use one_shot::{empty_action, Action, ActionRef, Callback, Invocation, OneShotAction};
pub use thread::RenderThread;
