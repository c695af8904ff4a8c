//! Gazer GPU Layer
//!
//! Owns the rendering context and everything that touches GPU memory:
//! - **Devices:** [`GpuDevice`] with a host-memory backend and, behind the
//!   `wgpu` feature, a compute backend
//! - **Context:** [`GpuResource`] and its [`RenderLoop`] run modes
//!   (headless, or an eframe window behind the `window` feature)
//! - **Ingest:** Upload plus channel swizzle into the downstream order
//! - **Display:** The [`DisplaySink`] contract and letterbox geometry

pub mod device;
pub mod display;
pub mod ingest;
pub mod resource;
pub mod software;
#[cfg(feature = "wgpu")]
pub mod wgpu_device;
#[cfg(feature = "window")]
pub mod window;

pub use device::{create_device, GpuDevice};
pub use display::{DisplayGeometry, DisplaySink};
pub use ingest::TextureIngest;
pub use resource::{
    ContextMode, GpuResource, HeadlessLoop, LoopExit, RenderControl, RenderLoop, RenderStep,
};
pub use software::SoftwareDevice;
