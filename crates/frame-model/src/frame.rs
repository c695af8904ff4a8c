//! Captured frames.

use bytes::Bytes;

use gazer_common::error::{GazerError, GazerResult};

use crate::pixel::PixelFormat;

/// One captured instant from a frame source.
///
/// The pixel buffer is immutable and cheap to clone. A frame whose pixel
/// buffer is empty marks the end of the stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Position in the source, starting at zero.
    pub index: u64,
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
    pixels: Bytes,
}

impl Frame {
    /// Create a frame, checking that the buffer is tightly packed.
    pub fn new(
        index: u64,
        width: u32,
        height: u32,
        format: PixelFormat,
        pixels: impl Into<Bytes>,
    ) -> GazerResult<Self> {
        let pixels = pixels.into();
        let expected = PixelFormat::frame_size(width, height);
        if pixels.is_empty() || width == 0 || height == 0 {
            return Err(GazerError::source(format!(
                "Frame {index} has no pixels ({width}x{height})"
            )));
        }
        if pixels.len() != expected {
            return Err(GazerError::source(format!(
                "Frame {index} buffer is {} bytes, expected {expected} for {width}x{height} {format}",
                pixels.len()
            )));
        }
        Ok(Self {
            index,
            width,
            height,
            format,
            pixels,
        })
    }

    /// The end-of-stream sentinel.
    pub fn end_of_stream(index: u64) -> Self {
        Self {
            index,
            width: 0,
            height: 0,
            format: PixelFormat::Rgba,
            pixels: Bytes::new(),
        }
    }

    pub fn is_end_of_stream(&self) -> bool {
        self.pixels.is_empty()
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }
}
