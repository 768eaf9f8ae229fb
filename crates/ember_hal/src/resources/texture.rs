//! 2D texture with a staged full-image upload.

use std::sync::Arc;

use bytemuck::Pod;
use parking_lot::Mutex;

use super::{check_writable, request_update, NativeSlot};
use crate::device::{DeviceContext, NativeHandle, TextureDesc};
use crate::error::{DeviceError, HalResult};
use ember_core::{ActionRef, Lifecycle, LifecycleObject, OneShotAction};

struct TextureShared {
    context: Arc<DeviceContext>,
    desc: TextureDesc,
    native: NativeSlot,
    /// Latest image; earlier uploads not yet flushed are superseded.
    staged: Mutex<Option<Vec<u8>>>,
}

impl TextureShared {
    fn create(&self) {
        let result = self.context.device().create_texture(&self.desc);
        if let Some(handle) = self.context.report("create_texture", &self.desc.label, result) {
            *self.native.lock() = Some(handle);
            self.flush();
        }
    }

    fn flush(&self) {
        let Some(handle) = *self.native.lock() else {
            return;
        };
        if let Some(image) = self.staged.lock().take() {
            let result = self.context.device().write_texture(handle, &image);
            self.context.report("write_texture", &self.desc.label, result);
        }
    }

    fn destroy(&self) {
        self.staged.lock().take();
        if let Some(handle) = self.native.lock().take() {
            let result = self.context.device().destroy_texture(handle);
            self.context.report("destroy_texture", &self.desc.label, result);
        }
    }
}

/// Sampled 2D image.
pub struct Texture {
    lifecycle: Lifecycle,
    shared: Arc<TextureShared>,
    init: ActionRef,
    release: ActionRef,
}

impl Texture {
    /// Creates an unregistered texture.
    #[must_use]
    pub fn new(context: &Arc<DeviceContext>, desc: TextureDesc) -> Arc<Self> {
        let shared = Arc::new(TextureShared {
            context: Arc::clone(context),
            desc,
            native: Mutex::new(None),
            staged: Mutex::new(None),
        });
        Arc::new(Self {
            lifecycle: Lifecycle::new(),
            init: OneShotAction::new(Arc::clone(&shared), |s: Arc<TextureShared>| s.create())
                .into_ref(),
            release: OneShotAction::new(Arc::clone(&shared), |s: Arc<TextureShared>| s.destroy())
                .into_ref(),
            shared,
        })
    }

    /// Creation parameters.
    #[must_use]
    pub fn desc(&self) -> &TextureDesc {
        &self.shared.desc
    }

    /// Native handle, once initialized and until released.
    #[must_use]
    pub fn native(&self) -> Option<NativeHandle> {
        *self.shared.native.lock()
    }

    /// True if an image is staged and not yet uploaded.
    #[must_use]
    pub fn has_pending_upload(&self) -> bool {
        self.shared.staged.lock().is_some()
    }

    /// Stages a full image and queues an update.
    ///
    /// # Errors
    ///
    /// `OutOfBounds` unless `pixels` is exactly the image size, a lifecycle
    /// error if the texture has been released.
    pub fn upload(&self, pixels: &[u8]) -> HalResult<()> {
        check_writable(self)?;
        let size = self.shared.desc.byte_size();
        if pixels.len() as u64 != size {
            return Err(DeviceError::OutOfBounds {
                offset: 0,
                len: pixels.len() as u64,
                size,
            }
            .into());
        }

        *self.shared.staged.lock() = Some(pixels.to_vec());
        request_update(self)
    }

    /// Stages a full image of plain-old-data texels.
    ///
    /// # Errors
    ///
    /// As [`Texture::upload`].
    pub fn upload_pod<T: Pod>(&self, texels: &[T]) -> HalResult<()> {
        self.upload(bytemuck::cast_slice(texels))
    }
}

impl LifecycleObject for Texture {
    fn lifecycle(&self) -> &Lifecycle {
        &self.lifecycle
    }

    fn initializer(&self) -> ActionRef {
        Arc::clone(&self.init)
    }

    fn updater(&self) -> ActionRef {
        OneShotAction::new(Arc::clone(&self.shared), |s: Arc<TextureShared>| s.flush()).into_ref()
    }

    fn releaser(&self) -> ActionRef {
        Arc::clone(&self.release)
    }

    fn label(&self) -> &str {
        &self.shared.desc.label
    }
}
