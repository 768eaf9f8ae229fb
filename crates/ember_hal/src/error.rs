//! # HAL Error Types

use thiserror::Error;

use crate::device::NativeHandle;
use ember_core::LifecycleError;

/// Failures reported by a [`RenderDevice`](crate::device::RenderDevice).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DeviceError {
    /// The handle was never created or has already been destroyed.
    #[error("unknown native handle {0}")]
    UnknownHandle(NativeHandle),

    /// A write falls outside the destination resource.
    #[error("write of {len} bytes at offset {offset} exceeds size {size}")]
    OutOfBounds {
        /// Start of the write.
        offset: u64,
        /// Length of the write.
        len: u64,
        /// Size of the destination.
        size: u64,
    },

    /// A descriptor was rejected (zero size, bad dimensions).
    #[error("invalid descriptor: {0}")]
    InvalidDescriptor(String),

    /// The backend failed for its own reasons (device lost, out of memory).
    #[error("backend failure: {0}")]
    Backend(String),
}

/// Result type for device calls.
pub type DeviceResult<T> = Result<T, DeviceError>;

/// Errors surfaced by HAL resources and the frame driver.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HalError {
    /// A device call failed.
    #[error(transparent)]
    Device(#[from] DeviceError),

    /// A lifecycle rule was violated.
    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),
}

/// Result type for HAL operations.
pub type HalResult<T> = Result<T, HalError>;
