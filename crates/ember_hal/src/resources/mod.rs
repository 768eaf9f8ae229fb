//! # Lifecycle-Managed GPU Resources
//!
//! Each resource keeps its descriptor and staged CPU-side data, and hands the
//! registry one-shot hooks that talk to the device:
//!
//! | Resource   | initializer        | updater             | releaser        |
//! |------------|--------------------|---------------------|-----------------|
//! | `Buffer`   | create + flush     | flush staged writes | destroy         |
//! | `Texture`  | create + upload    | upload latest image | destroy         |
//! | `Sampler`  | create             | (empty)             | destroy         |
//! | `GpuFence` | insert fence       | (empty)             | destroy + dispose |
//!
//! Writes from any thread only stage data and invalidate; the device sees
//! them on the render thread during the next `process()`.

mod buffer;
mod fence;
mod sampler;
mod texture;

pub use buffer::Buffer;
pub use fence::GpuFence;
pub use sampler::Sampler;
pub use texture::Texture;

use parking_lot::Mutex;

use crate::device::NativeHandle;
use crate::error::HalResult;
use ember_core::{LifecycleError, LifecycleExt, LifecycleObject, LifecycleState};

/// Native handle slot shared between a resource and its hooks.
type NativeSlot = Mutex<Option<NativeHandle>>;

/// Rejects writes to a released resource before anything is staged.
fn check_writable<T: LifecycleObject>(object: &T) -> HalResult<()> {
    if object.state() == LifecycleState::Released {
        return Err(LifecycleError::PreconditionViolation(format!(
            "{} has been released",
            object.label()
        ))
        .into());
    }
    Ok(())
}

/// Queues an update for staged data. Unregistered resources flush staged
/// data from their initializer instead.
fn request_update<T: LifecycleObject>(object: &T) -> HalResult<()> {
    if object.state() == LifecycleState::Unregistered {
        return Ok(());
    }
    object.invalidate()?;
    Ok(())
}
