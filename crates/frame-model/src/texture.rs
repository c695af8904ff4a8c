//! GPU texture handles and host-side images.

use gazer_common::error::{GazerError, GazerResult};

use crate::pixel::PixelFormat;

/// Opaque reference to a GPU-resident image.
///
/// A plain value: copying it does not extend the texture's lifetime, which
/// is governed by the device that issued it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TextureHandle(pub u32);

impl TextureHandle {
    pub fn id(self) -> u32 {
        self.0
    }
}

impl std::fmt::Display for TextureHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "tex#{}", self.0)
    }
}

/// A host-readable image, e.g. the result of a GPU readback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostImage {
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
    pub data: Vec<u8>,
}

impl HostImage {
    pub fn new(width: u32, height: u32, format: PixelFormat, data: Vec<u8>) -> GazerResult<Self> {
        let expected = PixelFormat::frame_size(width, height);
        if data.len() != expected {
            return Err(GazerError::gpu(format!(
                "Image buffer is {} bytes, expected {expected} for {width}x{height}",
                data.len()
            )));
        }
        Ok(Self {
            width,
            height,
            format,
            data,
        })
    }

    /// Pixel at `(x, y)` in the image's own channel order.
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let offset = (y as usize * self.width as usize + x as usize) * PixelFormat::BYTES_PER_PIXEL;
        let px = self.data.get(offset..offset + 4)?;
        Some([px[0], px[1], px[2], px[3]])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pixel_lookup_is_row_major() {
        let mut data = vec![0u8; 2 * 2 * 4];
        data[12..16].copy_from_slice(&[9, 8, 7, 6]);
        let image = HostImage::new(2, 2, PixelFormat::Rgba, data).unwrap();
        assert_eq!(image.pixel(1, 1), Some([9, 8, 7, 6]));
        assert_eq!(image.pixel(2, 0), None);
    }

    #[test]
    fn handle_display() {
        assert_eq!(TextureHandle(3).to_string(), "tex#3");
    }
}
