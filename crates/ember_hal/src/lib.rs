//! # EMBER HAL
//!
//! Reference collaborators for the lifecycle core:
//! - [`RenderDevice`]: the backend surface, plus [`HeadlessDevice`]
//! - [`Buffer`], [`Texture`], [`Sampler`], [`GpuFence`]: resources whose
//!   native side is created, updated and destroyed by the registry
//! - [`FrameDriver`]: one registry pass and one submit per frame
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//! use ember_core::{RegistryConfig, ResourceRegistry};
//! use ember_hal::{Buffer, BufferDesc, BufferUsage, DeviceContext, FrameDriver, HeadlessDevice};
//!
//! let device = Arc::new(HeadlessDevice::new());
//! let context = DeviceContext::new(device.clone());
//! let registry = ResourceRegistry::new(RegistryConfig::default()).unwrap();
//! let mut driver = FrameDriver::new(context.clone(), registry.clone());
//!
//! let buffer = Buffer::new(&context, BufferDesc::new("quad", 16, BufferUsage::Vertex));
//! registry.register(&buffer).unwrap();
//! buffer.write_pod(0, &[1.0f32, 2.0, 3.0, 4.0]).unwrap();
//!
//! driver.run_frame().unwrap();
//! assert_eq!(device.live_count(), 1);
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod device;
pub mod error;
pub mod pipeline;
pub mod resources;

pub use device::{
    AddressMode, BufferDesc, BufferUsage, DeviceCall, DeviceContext, FilterMode, HeadlessConfig,
    HeadlessDevice, NativeHandle, RenderDevice, ResourceKind, SamplerDesc, TextureDesc,
    TextureFormat,
};
pub use error::{DeviceError, DeviceResult, HalError, HalResult};
pub use pipeline::{FrameDriver, FrameDriverConfig, FrameResult, FrameStats};
pub use resources::{Buffer, GpuFence, Sampler, Texture};
