//! # Render Device
//!
//! The narrow surface every graphics backend implements. Apart from fence
//! queries, methods are only called from the render thread, inside lifecycle
//! hooks or the frame driver.
//!
//! ```text
//! Buffer / Texture / Sampler / GpuFence
//!        │ one-shot hooks
//!        ▼
//!   DeviceContext ──> dyn RenderDevice ──> HeadlessDevice | real backend
//! ```

mod headless;

pub use headless::{DeviceCall, HeadlessConfig, HeadlessDevice};

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::error::DeviceResult;

// ============================================================================
// NATIVE HANDLES & DESCRIPTORS
// ============================================================================

/// Backend-issued identifier of a native object.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NativeHandle(u64);

impl NativeHandle {
    /// Wraps a backend id.
    #[inline]
    #[must_use]
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// The backend id.
    #[inline]
    #[must_use]
    pub const fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for NativeHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "native:{}", self.0)
    }
}

/// Kind of native object behind a handle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    /// Linear memory.
    Buffer,
    /// 2D image.
    Texture,
    /// Sampling state.
    Sampler,
    /// Completion fence.
    Fence,
}

/// How a buffer will be bound.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum BufferUsage {
    /// Vertex input.
    #[default]
    Vertex,
    /// Index input.
    Index,
    /// Uniform block.
    Uniform,
    /// Read/write storage.
    Storage,
}

/// Buffer creation parameters.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BufferDesc {
    /// Debug name.
    pub label: String,
    /// Size in bytes. Must be non-zero.
    pub size: u64,
    /// Binding usage.
    pub usage: BufferUsage,
}

impl BufferDesc {
    /// Describes a buffer of `size` bytes.
    #[must_use]
    pub fn new(label: impl Into<String>, size: u64, usage: BufferUsage) -> Self {
        Self {
            label: label.into(),
            size,
            usage,
        }
    }
}

/// Pixel layout of a texture.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum TextureFormat {
    /// 8-bit RGBA.
    #[default]
    Rgba8,
    /// Single 8-bit channel.
    R8,
    /// 32-bit float depth.
    Depth32,
}

impl TextureFormat {
    /// Bytes per texel.
    #[must_use]
    pub const fn bytes_per_pixel(self) -> u64 {
        match self {
            Self::Rgba8 | Self::Depth32 => 4,
            Self::R8 => 1,
        }
    }
}

/// Texture creation parameters.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TextureDesc {
    /// Debug name.
    pub label: String,
    /// Width in texels.
    pub width: u32,
    /// Height in texels.
    pub height: u32,
    /// Texel format.
    pub format: TextureFormat,
}

impl TextureDesc {
    /// Describes a `width` x `height` texture.
    #[must_use]
    pub fn new(label: impl Into<String>, width: u32, height: u32, format: TextureFormat) -> Self {
        Self {
            label: label.into(),
            width,
            height,
            format,
        }
    }

    /// Size of the full image in bytes.
    #[must_use]
    pub fn byte_size(&self) -> u64 {
        u64::from(self.width) * u64::from(self.height) * self.format.bytes_per_pixel()
    }
}

/// Texel filtering.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum FilterMode {
    /// Nearest texel.
    Nearest,
    /// Bilinear.
    #[default]
    Linear,
}

/// Out-of-range coordinate handling.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum AddressMode {
    /// Clamp to the edge texel.
    #[default]
    ClampToEdge,
    /// Tile.
    Repeat,
    /// Tile, mirrored.
    MirrorRepeat,
}

/// Sampler creation parameters. Immutable once created.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct SamplerDesc {
    /// Magnification and minification filter.
    pub filter: FilterMode,
    /// Addressing on all axes.
    pub address: AddressMode,
}

// ============================================================================
// DEVICE TRAIT
// ============================================================================

/// A graphics backend.
///
/// Implementations may assume every call except [`RenderDevice::fence_signaled`]
/// arrives on the render thread. Fence queries come from any thread, at any
/// rate.
pub trait RenderDevice: Send + Sync {
    /// Creates a buffer.
    ///
    /// # Errors
    ///
    /// `InvalidDescriptor` for a zero size, `Backend` on allocation failure.
    fn create_buffer(&self, desc: &BufferDesc) -> DeviceResult<NativeHandle>;

    /// Copies `data` into `buffer` at `offset`.
    ///
    /// # Errors
    ///
    /// `UnknownHandle`, or `OutOfBounds` if the range exceeds the buffer.
    fn write_buffer(&self, buffer: NativeHandle, offset: u64, data: &[u8]) -> DeviceResult<()>;

    /// Destroys a buffer.
    ///
    /// # Errors
    ///
    /// `UnknownHandle` if it does not exist.
    fn destroy_buffer(&self, buffer: NativeHandle) -> DeviceResult<()>;

    /// Creates a texture.
    ///
    /// # Errors
    ///
    /// `InvalidDescriptor` for zero dimensions.
    fn create_texture(&self, desc: &TextureDesc) -> DeviceResult<NativeHandle>;

    /// Replaces the full image of `texture`.
    ///
    /// # Errors
    ///
    /// `UnknownHandle`, or `OutOfBounds` if `data` is not the image size.
    fn write_texture(&self, texture: NativeHandle, data: &[u8]) -> DeviceResult<()>;

    /// Destroys a texture.
    ///
    /// # Errors
    ///
    /// `UnknownHandle` if it does not exist.
    fn destroy_texture(&self, texture: NativeHandle) -> DeviceResult<()>;

    /// Creates a sampler.
    ///
    /// # Errors
    ///
    /// `Backend` on failure.
    fn create_sampler(&self, desc: &SamplerDesc) -> DeviceResult<NativeHandle>;

    /// Destroys a sampler.
    ///
    /// # Errors
    ///
    /// `UnknownHandle` if it does not exist.
    fn destroy_sampler(&self, sampler: NativeHandle) -> DeviceResult<()>;

    /// Inserts a fence after all work submitted so far.
    ///
    /// # Errors
    ///
    /// `Backend` on failure.
    fn create_fence(&self) -> DeviceResult<NativeHandle>;

    /// True once the GPU has passed `fence`.
    ///
    /// # Errors
    ///
    /// `UnknownHandle` if it does not exist.
    fn fence_signaled(&self, fence: NativeHandle) -> DeviceResult<bool>;

    /// Destroys a fence.
    ///
    /// # Errors
    ///
    /// `UnknownHandle` if it does not exist.
    fn destroy_fence(&self, fence: NativeHandle) -> DeviceResult<()>;

    /// Submits the frame's work.
    ///
    /// # Errors
    ///
    /// `Backend` on submission failure.
    fn end_frame(&self) -> DeviceResult<()>;
}

// ============================================================================
// DEVICE CONTEXT
// ============================================================================

/// Shared device handle handed to every resource.
///
/// Hooks cannot return errors, so device failures inside them are logged and
/// counted here instead.
pub struct DeviceContext {
    device: Arc<dyn RenderDevice>,
    hook_failures: AtomicU64,
}

impl DeviceContext {
    /// Wraps a device.
    #[must_use]
    pub fn new(device: Arc<dyn RenderDevice>) -> Arc<Self> {
        Arc::new(Self {
            device,
            hook_failures: AtomicU64::new(0),
        })
    }

    /// The backend.
    #[inline]
    #[must_use]
    pub fn device(&self) -> &dyn RenderDevice {
        &*self.device
    }

    /// Device failures swallowed inside hooks so far.
    #[must_use]
    pub fn hook_failures(&self) -> u64 {
        self.hook_failures.load(Ordering::Relaxed)
    }

    /// Unwraps a hook's device result, logging and counting failures.
    pub(crate) fn report<T>(&self, operation: &str, label: &str, result: DeviceResult<T>) -> Option<T> {
        match result {
            Ok(value) => Some(value),
            Err(err) => {
                self.hook_failures.fetch_add(1, Ordering::Relaxed);
                tracing::error!("{} of {} failed: {}", operation, label, err);
                None
            }
        }
    }
}

impl fmt::Debug for DeviceContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeviceContext")
            .field("hook_failures", &self.hook_failures())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_texture_byte_size() {
        let desc = TextureDesc::new("albedo", 64, 32, TextureFormat::Rgba8);
        assert_eq!(desc.byte_size(), 64 * 32 * 4);
        let mask = TextureDesc::new("mask", 64, 32, TextureFormat::R8);
        assert_eq!(mask.byte_size(), 64 * 32);
    }

    #[test]
    fn test_report_counts_failures() {
        let context = DeviceContext::new(Arc::new(HeadlessDevice::new()));
        assert_eq!(context.report("create", "a", Ok(3)), Some(3));
        assert_eq!(
            context.report::<()>("create", "b", Err(crate::DeviceError::Backend("lost".into()))),
            None
        );
        assert_eq!(context.hook_failures(), 1);
    }
}
