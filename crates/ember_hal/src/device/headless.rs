//! # Headless Device
//!
//! In-memory [`RenderDevice`] for tests, dedicated servers and CI. Every
//! call is recorded, every native object is tracked, and buffer/texture
//! contents are kept so uploads can be checked byte for byte.

use std::collections::{HashMap, HashSet};
use std::thread::{self, ThreadId};

use parking_lot::Mutex;

use super::{BufferDesc, NativeHandle, RenderDevice, ResourceKind, SamplerDesc, TextureDesc};
use crate::error::{DeviceError, DeviceResult};

/// Headless backend settings.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HeadlessConfig {
    /// Frames a fence takes to signal after creation.
    pub fence_latency_frames: u64,
}

impl Default for HeadlessConfig {
    fn default() -> Self {
        Self {
            fence_latency_frames: 2,
        }
    }
}

/// One recorded device call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DeviceCall {
    /// `create_buffer`
    CreateBuffer(NativeHandle),
    /// `write_buffer`
    WriteBuffer {
        /// Target.
        handle: NativeHandle,
        /// Byte offset.
        offset: u64,
        /// Byte count.
        len: usize,
    },
    /// `destroy_buffer`
    DestroyBuffer(NativeHandle),
    /// `create_texture`
    CreateTexture(NativeHandle),
    /// `write_texture`
    WriteTexture(NativeHandle),
    /// `destroy_texture`
    DestroyTexture(NativeHandle),
    /// `create_sampler`
    CreateSampler(NativeHandle),
    /// `destroy_sampler`
    DestroySampler(NativeHandle),
    /// `create_fence`
    CreateFence(NativeHandle),
    /// `destroy_fence`
    DestroyFence(NativeHandle),
    /// `end_frame`, with the number of the frame just submitted.
    EndFrame(u64),
}

struct NativeObject {
    kind: ResourceKind,
    data: Vec<u8>,
    /// Frame the object was created in (fences).
    created_frame: u64,
    signaled: bool,
}

#[derive(Default)]
struct HeadlessState {
    next_handle: u64,
    frame: u64,
    live: HashMap<NativeHandle, NativeObject>,
    calls: Vec<DeviceCall>,
    threads: HashSet<ThreadId>,
    /// Remaining create/write/destroy calls to fail.
    fail_next: usize,
}

impl HeadlessState {
    fn enter(&mut self) -> DeviceResult<()> {
        self.threads.insert(thread::current().id());
        if self.fail_next > 0 {
            self.fail_next -= 1;
            return Err(DeviceError::Backend("injected failure".into()));
        }
        Ok(())
    }

    fn create(&mut self, kind: ResourceKind, data: Vec<u8>) -> NativeHandle {
        self.next_handle += 1;
        let handle = NativeHandle::new(self.next_handle);
        self.live.insert(
            handle,
            NativeObject {
                kind,
                data,
                created_frame: self.frame,
                signaled: false,
            },
        );
        handle
    }

    fn object_mut(&mut self, handle: NativeHandle, kind: ResourceKind) -> DeviceResult<&mut NativeObject> {
        self.live
            .get_mut(&handle)
            .filter(|object| object.kind == kind)
            .ok_or(DeviceError::UnknownHandle(handle))
    }

    fn destroy(&mut self, handle: NativeHandle, kind: ResourceKind) -> DeviceResult<()> {
        self.object_mut(handle, kind)?;
        self.live.remove(&handle);
        Ok(())
    }
}

/// Recording, in-memory render device.
///
/// # Example
///
/// ```rust
/// use ember_hal::{BufferDesc, BufferUsage, HeadlessDevice, RenderDevice};
///
/// let device = HeadlessDevice::new();
/// let buffer = device.create_buffer(&BufferDesc::new("vbo", 16, BufferUsage::Vertex)).unwrap();
/// device.write_buffer(buffer, 4, &[1, 2, 3, 4]).unwrap();
/// assert_eq!(device.contents(buffer).unwrap()[4..8], [1, 2, 3, 4]);
/// ```
pub struct HeadlessDevice {
    config: HeadlessConfig,
    state: Mutex<HeadlessState>,
}

impl HeadlessDevice {
    /// Creates a device with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(HeadlessConfig::default())
    }

    /// Creates a device with explicit settings.
    #[must_use]
    pub fn with_config(config: HeadlessConfig) -> Self {
        Self {
            config,
            state: Mutex::new(HeadlessState::default()),
        }
    }

    /// Snapshot of every call made so far.
    #[must_use]
    pub fn calls(&self) -> Vec<DeviceCall> {
        self.state.lock().calls.clone()
    }

    /// Number of native objects alive.
    #[must_use]
    pub fn live_count(&self) -> usize {
        self.state.lock().live.len()
    }

    /// Number of native objects of `kind` alive.
    #[must_use]
    pub fn live_count_of(&self, kind: ResourceKind) -> usize {
        self.state
            .lock()
            .live
            .values()
            .filter(|object| object.kind == kind)
            .count()
    }

    /// True if `handle` refers to a live native object.
    #[must_use]
    pub fn is_live(&self, handle: NativeHandle) -> bool {
        self.state.lock().live.contains_key(&handle)
    }

    /// Copy of a buffer's or texture's bytes.
    #[must_use]
    pub fn contents(&self, handle: NativeHandle) -> Option<Vec<u8>> {
        self.state
            .lock()
            .live
            .get(&handle)
            .map(|object| object.data.clone())
    }

    /// Frames submitted so far.
    #[must_use]
    pub fn frame(&self) -> u64 {
        self.state.lock().frame
    }

    /// Signals every live fence immediately.
    pub fn signal_all(&self) {
        let mut state = self.state.lock();
        for object in state.live.values_mut() {
            if object.kind == ResourceKind::Fence {
                object.signaled = true;
            }
        }
    }

    /// Makes the next `count` create/write/destroy calls fail.
    pub fn fail_next(&self, count: usize) {
        self.state.lock().fail_next = count;
    }

    /// Threads that have made device calls.
    #[must_use]
    pub fn calling_threads(&self) -> HashSet<ThreadId> {
        self.state.lock().threads.clone()
    }
}

impl Default for HeadlessDevice {
    fn default() -> Self {
        Self::new()
    }
}

fn check_range(offset: u64, len: usize, size: usize) -> DeviceResult<std::ops::Range<usize>> {
    let out_of_bounds = || DeviceError::OutOfBounds {
        offset,
        len: len as u64,
        size: size as u64,
    };
    let start = usize::try_from(offset).map_err(|_| out_of_bounds())?;
    let end = start.checked_add(len).ok_or_else(out_of_bounds)?;
    if end > size {
        return Err(out_of_bounds());
    }
    Ok(start..end)
}

impl RenderDevice for HeadlessDevice {
    fn create_buffer(&self, desc: &BufferDesc) -> DeviceResult<NativeHandle> {
        let mut state = self.state.lock();
        state.enter()?;
        if desc.size == 0 {
            return Err(DeviceError::InvalidDescriptor(format!(
                "buffer '{}' has zero size",
                desc.label
            )));
        }
        let size = usize::try_from(desc.size)
            .map_err(|_| DeviceError::Backend(format!("buffer '{}' too large", desc.label)))?;
        let handle = state.create(ResourceKind::Buffer, vec![0; size]);
        state.calls.push(DeviceCall::CreateBuffer(handle));
        Ok(handle)
    }

    fn write_buffer(&self, buffer: NativeHandle, offset: u64, data: &[u8]) -> DeviceResult<()> {
        let mut state = self.state.lock();
        state.enter()?;
        let object = state.object_mut(buffer, ResourceKind::Buffer)?;
        let range = check_range(offset, data.len(), object.data.len())?;
        object.data[range].copy_from_slice(data);
        state.calls.push(DeviceCall::WriteBuffer {
            handle: buffer,
            offset,
            len: data.len(),
        });
        Ok(())
    }

    fn destroy_buffer(&self, buffer: NativeHandle) -> DeviceResult<()> {
        let mut state = self.state.lock();
        state.enter()?;
        state.destroy(buffer, ResourceKind::Buffer)?;
        state.calls.push(DeviceCall::DestroyBuffer(buffer));
        Ok(())
    }

    fn create_texture(&self, desc: &TextureDesc) -> DeviceResult<NativeHandle> {
        let mut state = self.state.lock();
        state.enter()?;
        if desc.width == 0 || desc.height == 0 {
            return Err(DeviceError::InvalidDescriptor(format!(
                "texture '{}' is {}x{}",
                desc.label, desc.width, desc.height
            )));
        }
        let size = usize::try_from(desc.byte_size())
            .map_err(|_| DeviceError::Backend(format!("texture '{}' too large", desc.label)))?;
        let handle = state.create(ResourceKind::Texture, vec![0; size]);
        state.calls.push(DeviceCall::CreateTexture(handle));
        Ok(handle)
    }

    fn write_texture(&self, texture: NativeHandle, data: &[u8]) -> DeviceResult<()> {
        let mut state = self.state.lock();
        state.enter()?;
        let object = state.object_mut(texture, ResourceKind::Texture)?;
        if data.len() != object.data.len() {
            return Err(DeviceError::OutOfBounds {
                offset: 0,
                len: data.len() as u64,
                size: object.data.len() as u64,
            });
        }
        object.data.copy_from_slice(data);
        state.calls.push(DeviceCall::WriteTexture(texture));
        Ok(())
    }

    fn destroy_texture(&self, texture: NativeHandle) -> DeviceResult<()> {
        let mut state = self.state.lock();
        state.enter()?;
        state.destroy(texture, ResourceKind::Texture)?;
        state.calls.push(DeviceCall::DestroyTexture(texture));
        Ok(())
    }

    fn create_sampler(&self, _desc: &SamplerDesc) -> DeviceResult<NativeHandle> {
        let mut state = self.state.lock();
        state.enter()?;
        let handle = state.create(ResourceKind::Sampler, Vec::new());
        state.calls.push(DeviceCall::CreateSampler(handle));
        Ok(handle)
    }

    fn destroy_sampler(&self, sampler: NativeHandle) -> DeviceResult<()> {
        let mut state = self.state.lock();
        state.enter()?;
        state.destroy(sampler, ResourceKind::Sampler)?;
        state.calls.push(DeviceCall::DestroySampler(sampler));
        Ok(())
    }

    fn create_fence(&self) -> DeviceResult<NativeHandle> {
        let mut state = self.state.lock();
        state.enter()?;
        let handle = state.create(ResourceKind::Fence, Vec::new());
        state.calls.push(DeviceCall::CreateFence(handle));
        Ok(handle)
    }

    fn fence_signaled(&self, fence: NativeHandle) -> DeviceResult<bool> {
        let mut state = self.state.lock();
        let frame = state.frame;
        let object = state.object_mut(fence, ResourceKind::Fence)?;
        Ok(object.signaled || frame >= object.created_frame + self.config.fence_latency_frames)
    }

    fn destroy_fence(&self, fence: NativeHandle) -> DeviceResult<()> {
        let mut state = self.state.lock();
        state.enter()?;
        state.destroy(fence, ResourceKind::Fence)?;
        state.calls.push(DeviceCall::DestroyFence(fence));
        Ok(())
    }

    fn end_frame(&self) -> DeviceResult<()> {
        let mut state = self.state.lock();
        state.threads.insert(thread::current().id());
        state.frame += 1;
        let frame = state.frame;
        state.calls.push(DeviceCall::EndFrame(frame));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::{BufferUsage, TextureFormat};

    #[test]
    fn test_buffer_roundtrip_and_bounds() {
        let device = HeadlessDevice::new();
        let buffer = device
            .create_buffer(&BufferDesc::new("b", 8, BufferUsage::Uniform))
            .unwrap();

        device.write_buffer(buffer, 0, &[9; 8]).unwrap();
        assert_eq!(device.contents(buffer), Some(vec![9; 8]));

        let err = device.write_buffer(buffer, 6, &[0; 4]).unwrap_err();
        assert_eq!(
            err,
            DeviceError::OutOfBounds {
                offset: 6,
                len: 4,
                size: 8
            }
        );
    }

    #[test]
    fn test_zero_sized_buffer_rejected() {
        let device = HeadlessDevice::new();
        let err = device
            .create_buffer(&BufferDesc::new("empty", 0, BufferUsage::Vertex))
            .unwrap_err();
        assert!(matches!(err, DeviceError::InvalidDescriptor(_)));
        assert_eq!(device.live_count(), 0);
    }

    #[test]
    fn test_destroy_checks_kind_and_liveness() {
        let device = HeadlessDevice::new();
        let texture = device
            .create_texture(&TextureDesc::new("t", 2, 2, TextureFormat::R8))
            .unwrap();

        assert_eq!(
            device.destroy_buffer(texture),
            Err(DeviceError::UnknownHandle(texture))
        );
        device.destroy_texture(texture).unwrap();
        assert_eq!(
            device.destroy_texture(texture),
            Err(DeviceError::UnknownHandle(texture))
        );
        assert_eq!(device.live_count(), 0);
    }

    #[test]
    fn test_fence_latency() {
        let device = HeadlessDevice::with_config(HeadlessConfig {
            fence_latency_frames: 2,
        });
        let fence = device.create_fence().unwrap();

        assert!(!device.fence_signaled(fence).unwrap());
        device.end_frame().unwrap();
        assert!(!device.fence_signaled(fence).unwrap());
        device.end_frame().unwrap();
        assert!(device.fence_signaled(fence).unwrap());
    }

    #[test]
    fn test_signal_all() {
        let device = HeadlessDevice::new();
        let fence = device.create_fence().unwrap();
        device.signal_all();
        assert!(device.fence_signaled(fence).unwrap());
    }

    #[test]
    fn test_injected_failures() {
        let device = HeadlessDevice::new();
        device.fail_next(1);
        assert!(matches!(
            device.create_sampler(&SamplerDesc::default()),
            Err(DeviceError::Backend(_))
        ));
        assert!(device.create_sampler(&SamplerDesc::default()).is_ok());
        assert_eq!(device.live_count_of(ResourceKind::Sampler), 1);
    }
}
