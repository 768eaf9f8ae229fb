//! GPU buffer with staged, range-checked writes.

use std::mem;
use std::sync::Arc;

use bytemuck::Pod;
use parking_lot::Mutex;

use super::{check_writable, request_update, NativeSlot};
use crate::device::{BufferDesc, DeviceContext, NativeHandle};
use crate::error::{DeviceError, HalResult};
use ember_core::{ActionRef, Lifecycle, LifecycleObject, OneShotAction};

struct StagedWrite {
    offset: u64,
    data: Vec<u8>,
}

/// State shared with the hooks.
struct BufferShared {
    context: Arc<DeviceContext>,
    desc: BufferDesc,
    native: NativeSlot,
    staged: Mutex<Vec<StagedWrite>>,
}

impl BufferShared {
    fn create(&self) {
        let result = self.context.device().create_buffer(&self.desc);
        if let Some(handle) = self.context.report("create_buffer", &self.desc.label, result) {
            *self.native.lock() = Some(handle);
            self.flush();
        }
    }

    fn flush(&self) {
        let Some(handle) = *self.native.lock() else {
            return;
        };
        let writes = mem::take(&mut *self.staged.lock());
        for write in writes {
            let result = self
                .context
                .device()
                .write_buffer(handle, write.offset, &write.data);
            self.context.report("write_buffer", &self.desc.label, result);
        }
    }

    fn destroy(&self) {
        self.staged.lock().clear();
        if let Some(handle) = self.native.lock().take() {
            let result = self.context.device().destroy_buffer(handle);
            self.context.report("destroy_buffer", &self.desc.label, result);
        }
    }
}

/// Linear GPU memory.
///
/// # Example
///
/// ```rust,ignore
/// let vertices = Buffer::new(&context, BufferDesc::new("quad", 64, BufferUsage::Vertex));
/// registry.register(&vertices)?;
/// vertices.write_pod(0, &[0.0f32, 0.0, 1.0, 0.0])?; // any thread
/// registry.process()?;                              // created, then written
/// ```
pub struct Buffer {
    lifecycle: Lifecycle,
    shared: Arc<BufferShared>,
    init: ActionRef,
    release: ActionRef,
}

impl Buffer {
    /// Creates an unregistered buffer. Nothing touches the device until the
    /// registry runs the initializer.
    #[must_use]
    pub fn new(context: &Arc<DeviceContext>, desc: BufferDesc) -> Arc<Self> {
        let shared = Arc::new(BufferShared {
            context: Arc::clone(context),
            desc,
            native: Mutex::new(None),
            staged: Mutex::new(Vec::new()),
        });
        Arc::new(Self {
            lifecycle: Lifecycle::new(),
            init: OneShotAction::new(Arc::clone(&shared), |s: Arc<BufferShared>| s.create())
                .into_ref(),
            release: OneShotAction::new(Arc::clone(&shared), |s: Arc<BufferShared>| s.destroy())
                .into_ref(),
            shared,
        })
    }

    /// Creation parameters.
    #[must_use]
    pub fn desc(&self) -> &BufferDesc {
        &self.shared.desc
    }

    /// Native handle, once initialized and until released.
    #[must_use]
    pub fn native(&self) -> Option<NativeHandle> {
        *self.shared.native.lock()
    }

    /// Bytes staged but not yet written to the device.
    #[must_use]
    pub fn staged_bytes(&self) -> usize {
        self.shared.staged.lock().iter().map(|w| w.data.len()).sum()
    }

    /// Stages `data` at `offset` and queues an update.
    ///
    /// # Errors
    ///
    /// `OutOfBounds` if the range exceeds the buffer, a lifecycle error if
    /// the buffer has been released.
    pub fn write(&self, offset: u64, data: &[u8]) -> HalResult<()> {
        check_writable(self)?;
        let size = self.shared.desc.size;
        let len = data.len() as u64;
        if offset.checked_add(len).map_or(true, |end| end > size) {
            return Err(DeviceError::OutOfBounds { offset, len, size }.into());
        }

        self.shared.staged.lock().push(StagedWrite {
            offset,
            data: data.to_vec(),
        });
        request_update(self)
    }

    /// Stages a slice of plain-old-data values.
    ///
    /// # Errors
    ///
    /// As [`Buffer::write`].
    pub fn write_pod<T: Pod>(&self, offset: u64, values: &[T]) -> HalResult<()> {
        self.write(offset, bytemuck::cast_slice(values))
    }
}

impl LifecycleObject for Buffer {
    fn lifecycle(&self) -> &Lifecycle {
        &self.lifecycle
    }

    fn initializer(&self) -> ActionRef {
        Arc::clone(&self.init)
    }

    fn updater(&self) -> ActionRef {
        OneShotAction::new(Arc::clone(&self.shared), |s: Arc<BufferShared>| s.flush()).into_ref()
    }

    fn releaser(&self) -> ActionRef {
        Arc::clone(&self.release)
    }

    fn label(&self) -> &str {
        &self.shared.desc.label
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::{BufferUsage, HeadlessDevice};

    fn context() -> Arc<DeviceContext> {
        DeviceContext::new(Arc::new(HeadlessDevice::new()))
    }

    #[test]
    fn test_unregistered_write_only_stages() {
        let buffer = Buffer::new(&context(), BufferDesc::new("b", 8, BufferUsage::Vertex));
        buffer.write(0, &[1, 2]).unwrap();
        buffer.write_pod(4, &[0xFFFF_FFFFu32]).unwrap();

        assert_eq!(buffer.staged_bytes(), 6);
        assert!(buffer.native().is_none());
        assert_eq!(buffer.label(), "b");
    }

    #[test]
    fn test_write_range_overflow_rejected() {
        let buffer = Buffer::new(&context(), BufferDesc::new("b", 8, BufferUsage::Vertex));
        assert!(buffer.write(u64::MAX, &[1]).is_err());
        assert!(buffer.write(8, &[1]).is_err());
        assert!(buffer.write(8, &[]).is_ok());
    }
}
