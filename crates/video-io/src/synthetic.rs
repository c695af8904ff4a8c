//! Synthetic test pattern source.

use image::{ImageBuffer, Rgba, RgbaImage};
use imageproc::drawing::draw_filled_circle_mut;

use gazer_common::error::{GazerError, GazerResult};
use gazer_frame_model::{Frame, PixelFormat, Swizzle};

const BACKGROUND: Rgba<u8> = Rgba([40, 40, 50, 255]);
const MOVER: Rgba<u8> = Rgba([255, 50, 50, 255]);
const MARKER: Rgba<u8> = Rgba([250, 250, 250, 255]);

/// Deterministic frames with a disc sweeping left to right and a fixed
/// bright marker. Random access: any index below the frame count can be
/// pulled at any time.
#[derive(Debug)]
pub struct SyntheticSource {
    name: String,
    width: u32,
    height: u32,
    frames: u64,
    format: PixelFormat,
    started: bool,
}

impl SyntheticSource {
    pub fn new(width: u32, height: u32, frames: u64) -> Self {
        Self {
            name: format!("synthetic://{width}x{height}?frames={frames}"),
            width,
            height,
            frames,
            format: PixelFormat::Bgra,
            started: false,
        }
    }

    pub fn frame_count(&self) -> u64 {
        self.frames
    }

    /// Pattern for `index` in RGBA.
    pub fn render(&self, index: u64) -> RgbaImage {
        render_pattern(self.width, self.height, index)
    }
}

/// Center of the moving disc at `index`.
pub fn mover_center(width: u32, height: u32, index: u64) -> (i32, i32) {
    let radius = mover_radius(width, height);
    let travel = (width as i64 - 2 * radius as i64).max(1);
    let step = (width as i64 / 16).max(1);
    let x = radius as i64 + (index as i64 * step) % travel;
    (x as i32, (height / 2) as i32)
}

fn mover_radius(width: u32, height: u32) -> i32 {
    (width.min(height) / 8).max(1) as i32
}

fn render_pattern(width: u32, height: u32, index: u64) -> RgbaImage {
    let mut img = ImageBuffer::from_pixel(width, height, BACKGROUND);

    draw_filled_circle_mut(
        &mut img,
        mover_center(width, height, index),
        mover_radius(width, height),
        MOVER,
    );

    // Static bright marker in the top-right quadrant.
    let marker_radius = (width.min(height) / 32).max(1) as i32;
    draw_filled_circle_mut(
        &mut img,
        ((3 * width / 4) as i32, (height / 4) as i32),
        marker_radius,
        MARKER,
    );

    img
}

impl crate::source::FrameSource for SyntheticSource {
    fn describe(&self) -> &str {
        &self.name
    }

    fn output_format(&self) -> PixelFormat {
        self.format
    }

    fn set_output_format(&mut self, format: PixelFormat) -> GazerResult<()> {
        if self.started && format != self.format {
            return Err(GazerError::source(format!(
                "{}: output format is fixed once frames have been pulled",
                self.name
            )));
        }
        self.format = format;
        Ok(())
    }

    fn pull(&mut self, index: u64) -> GazerResult<Frame> {
        self.started = true;
        if index >= self.frames {
            return Ok(Frame::end_of_stream(index));
        }

        let rgba = self.render(index).into_raw();
        let pixels = if self.format == PixelFormat::Rgba {
            rgba
        } else {
            let mut converted = vec![0u8; rgba.len()];
            Swizzle::between(PixelFormat::Rgba, self.format).apply(&rgba, &mut converted);
            converted
        };
        Frame::new(index, self.width, self.height, self.format, pixels)
    }
}
