//! GPU device abstraction.
//!
//! A device owns every texture it hands out. Handles are plain values; they
//! become invalid once released or once the device is dropped.

use std::sync::Arc;

use gazer_common::config::GpuBackendKind;
use gazer_common::error::{GazerError, GazerResult};
use gazer_frame_model::{HostImage, PixelFormat, Swizzle, TextureHandle};

use crate::software::SoftwareDevice;

/// Operations the pipeline needs from a GPU.
///
/// Textures are 4x8-bit images tagged with the channel order of their
/// contents.
pub trait GpuDevice: Send + Sync {
    /// Short backend name for logs ("software", "wgpu").
    fn backend_name(&self) -> &str;

    /// Allocate a zero-filled texture.
    fn create_texture(
        &self,
        width: u32,
        height: u32,
        format: PixelFormat,
    ) -> GazerResult<TextureHandle>;

    fn release_texture(&self, texture: TextureHandle) -> GazerResult<()>;

    fn texture_size(&self, texture: TextureHandle) -> GazerResult<(u32, u32)>;

    fn texture_format(&self, texture: TextureHandle) -> GazerResult<PixelFormat>;

    /// Replace the texture contents with a tightly packed host buffer.
    fn upload(&self, texture: TextureHandle, pixels: &[u8]) -> GazerResult<()>;

    /// Write `swizzle(src)` into `dst`. Both textures must have the same size
    /// and be distinct.
    fn swizzle(&self, src: TextureHandle, dst: TextureHandle, swizzle: Swizzle)
        -> GazerResult<()>;

    /// Copy the texture contents back to host memory.
    fn read_pixels(&self, texture: TextureHandle) -> GazerResult<HostImage>;
}

/// Pick and construct a device for the requested backend.
///
/// `Auto` prefers wgpu when it is compiled in and an adapter exists, and
/// falls back to the software device otherwise. An explicit `Wgpu` request
/// fails with `ResourceUnavailable` instead of falling back.
pub fn create_device(kind: GpuBackendKind) -> GazerResult<Arc<dyn GpuDevice>> {
    match kind {
        GpuBackendKind::Software => Ok(Arc::new(SoftwareDevice::new())),
        GpuBackendKind::Wgpu => hardware_device(),
        GpuBackendKind::Auto => match hardware_device() {
            Ok(device) => Ok(device),
            Err(e) => {
                tracing::info!(reason = %e, "Falling back to software GPU device");
                Ok(Arc::new(SoftwareDevice::new()))
            }
        },
    }
}

#[cfg(feature = "wgpu")]
fn hardware_device() -> GazerResult<Arc<dyn GpuDevice>> {
    Ok(Arc::new(crate::wgpu_device::WgpuDevice::new()?))
}

#[cfg(not(feature = "wgpu"))]
fn hardware_device() -> GazerResult<Arc<dyn GpuDevice>> {
    Err(GazerError::resource_unavailable(
        "built without the `wgpu` feature",
    ))
}

pub(crate) fn check_same_size(
    src: (u32, u32),
    dst: (u32, u32),
) -> GazerResult<()> {
    if src != dst {
        return Err(GazerError::gpu(format!(
            "swizzle size mismatch: {}x{} -> {}x{}",
            src.0, src.1, dst.0, dst.1
        )));
    }
    Ok(())
}

pub(crate) fn unknown_texture(texture: TextureHandle) -> GazerError {
    GazerError::gpu(format!("unknown texture {texture}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn software_backend_is_always_available() {
        let device = create_device(GpuBackendKind::Software).unwrap();
        assert_eq!(device.backend_name(), "software");
    }

    #[test]
    fn auto_always_yields_a_device() {
        let device = create_device(GpuBackendKind::Auto).unwrap();
        assert!(!device.backend_name().is_empty());
    }

    #[cfg(not(feature = "wgpu"))]
    #[test]
    fn explicit_wgpu_without_feature_is_unavailable() {
        let err = create_device(GpuBackendKind::Wgpu).err().unwrap();
        assert!(matches!(err, GazerError::ResourceUnavailable { .. }));
    }
}
