//! Frame upload and channel-order correction.

use std::sync::Arc;

use gazer_common::error::{GazerError, GazerResult};
use gazer_frame_model::{Frame, PixelFormat, Swizzle, TextureHandle};

use crate::device::GpuDevice;

#[derive(Debug, Clone, Copy)]
struct Slot {
    texture: TextureHandle,
    width: u32,
    height: u32,
}

/// Uploads frames into a raw texture and swizzles them into an output
/// texture in the downstream channel order.
///
/// Both textures are reused across frames and reallocated only when the
/// frame size changes. The returned handle is valid until the next upload.
pub struct TextureIngest {
    device: Arc<dyn GpuDevice>,
    source_format: PixelFormat,
    target_format: PixelFormat,
    swizzle: Swizzle,
    raw: Option<Slot>,
    output: Option<Slot>,
    uploads: u64,
    allocations: u64,
}

impl TextureIngest {
    /// Ingest that converts `source_format` frames to RGBA.
    pub fn new(device: Arc<dyn GpuDevice>, source_format: PixelFormat) -> Self {
        Self::with_target(device, source_format, PixelFormat::Rgba)
    }

    pub fn with_target(
        device: Arc<dyn GpuDevice>,
        source_format: PixelFormat,
        target_format: PixelFormat,
    ) -> Self {
        Self {
            device,
            source_format,
            target_format,
            swizzle: Swizzle::between(source_format, target_format),
            raw: None,
            output: None,
            uploads: 0,
            allocations: 0,
        }
    }

    pub fn target_format(&self) -> PixelFormat {
        self.target_format
    }

    /// Frames uploaded so far.
    pub fn uploads(&self) -> u64 {
        self.uploads
    }

    /// Texture pairs allocated so far.
    pub fn allocations(&self) -> u64 {
        self.allocations
    }

    /// Upload `frame` and return the swizzled texture.
    pub fn upload(&mut self, frame: &Frame) -> GazerResult<TextureHandle> {
        if frame.is_end_of_stream() {
            return Err(GazerError::source(format!(
                "cannot upload end-of-stream frame {}",
                frame.index
            )));
        }
        if frame.format != self.source_format {
            return Err(GazerError::unsupported_format(format!(
                "frame {} is {}, ingest expects {}",
                frame.index, frame.format, self.source_format
            )));
        }

        let (raw, output) = self.ensure_slots(frame.width, frame.height)?;
        self.device.upload(raw, frame.pixels())?;
        self.device.swizzle(raw, output, self.swizzle)?;
        self.uploads += 1;

        tracing::trace!(frame = frame.index, texture = %output, "Frame ingested");
        Ok(output)
    }

    fn ensure_slots(
        &mut self,
        width: u32,
        height: u32,
    ) -> GazerResult<(TextureHandle, TextureHandle)> {
        if let (Some(raw), Some(output)) = (self.raw, self.output) {
            if raw.width == width && raw.height == height {
                return Ok((raw.texture, output.texture));
            }
            tracing::debug!(
                from_w = raw.width,
                from_h = raw.height,
                to_w = width,
                to_h = height,
                "Frame size changed, reallocating ingest textures"
            );
        }
        self.release();

        let raw = self.device.create_texture(width, height, self.source_format)?;
        self.raw = Some(Slot {
            texture: raw,
            width,
            height,
        });
        let output = self.device.create_texture(width, height, self.target_format)?;
        self.output = Some(Slot {
            texture: output,
            width,
            height,
        });
        self.allocations += 1;
        Ok((raw, output))
    }

    fn release(&mut self) {
        for slot in [self.raw.take(), self.output.take()].into_iter().flatten() {
            if let Err(e) = self.device.release_texture(slot.texture) {
                tracing::warn!(texture = %slot.texture, error = %e, "Failed to release texture");
            }
        }
    }
}

impl Drop for TextureIngest {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::software::SoftwareDevice;

    fn frame(index: u64, width: u32, height: u32, fill: [u8; 4]) -> Frame {
        let pixels: Vec<u8> = fill
            .iter()
            .copied()
            .cycle()
            .take(PixelFormat::frame_size(width, height))
            .collect();
        Frame::new(index, width, height, PixelFormat::Bgra, pixels).unwrap()
    }

    #[test]
    fn upload_swizzles_to_rgba() {
        let device = Arc::new(SoftwareDevice::new());
        let mut ingest = TextureIngest::new(device.clone(), PixelFormat::Bgra);
        let tex = ingest.upload(&frame(0, 2, 2, [10, 20, 30, 40])).unwrap();
        let image = device.read_pixels(tex).unwrap();
        assert_eq!(image.format, PixelFormat::Rgba);
        assert_eq!(image.pixel(1, 1), Some([30, 20, 10, 40]));
    }

    #[test]
    fn slots_are_reused_until_size_changes() {
        let device = Arc::new(SoftwareDevice::new());
        let mut ingest = TextureIngest::new(device.clone(), PixelFormat::Bgra);
        let a = ingest.upload(&frame(0, 4, 4, [0; 4])).unwrap();
        let b = ingest.upload(&frame(1, 4, 4, [1; 4])).unwrap();
        assert_eq!(a, b);
        assert_eq!(ingest.allocations(), 1);
        assert_eq!(device.live_textures(), 2);

        ingest.upload(&frame(2, 8, 4, [2; 4])).unwrap();
        assert_eq!(ingest.allocations(), 2);
        assert_eq!(device.live_textures(), 2);
        assert_eq!(ingest.uploads(), 3);
    }

    #[test]
    fn drop_releases_textures() {
        let device = Arc::new(SoftwareDevice::new());
        {
            let mut ingest = TextureIngest::new(device.clone(), PixelFormat::Bgra);
            ingest.upload(&frame(0, 2, 2, [0; 4])).unwrap();
        }
        assert_eq!(device.live_textures(), 0);
    }

    #[test]
    fn rejects_sentinel_and_wrong_format() {
        let device = Arc::new(SoftwareDevice::new());
        let mut ingest = TextureIngest::new(device, PixelFormat::Rgba);
        assert!(ingest.upload(&Frame::end_of_stream(0)).is_err());
        let err = ingest.upload(&frame(0, 1, 1, [0; 4])).unwrap_err();
        assert!(matches!(err, GazerError::UnsupportedFormat { .. }));
    }
}
