//! On-screen presentation.

use gazer_common::error::GazerResult;
use gazer_frame_model::{PixelFormat, TextureHandle};

/// Where a frame lands inside the drawable surface, in surface pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DisplayGeometry {
    pub offset_x: f32,
    pub offset_y: f32,
    pub width: f32,
    pub height: f32,
}

impl DisplayGeometry {
    /// Largest aspect-preserving placement of `content` centered in
    /// `surface`. Degenerate sizes yield an empty rectangle at the origin.
    pub fn fit(content: (u32, u32), surface: (u32, u32)) -> Self {
        let (cw, ch) = (content.0 as f32, content.1 as f32);
        let (sw, sh) = (surface.0 as f32, surface.1 as f32);
        if cw <= 0.0 || ch <= 0.0 || sw <= 0.0 || sh <= 0.0 {
            return Self {
                offset_x: 0.0,
                offset_y: 0.0,
                width: 0.0,
                height: 0.0,
            };
        }
        let scale = (sw / cw).min(sh / ch);
        let width = cw * scale;
        let height = ch * scale;
        Self {
            offset_x: (sw - width) / 2.0,
            offset_y: (sh - height) / 2.0,
            width,
            height,
        }
    }
}

/// Binds processed textures to a visible surface.
pub trait DisplaySink {
    /// Prepare for frames of the given size and format.
    fn init(&mut self, width: u32, height: u32, format: PixelFormat) -> GazerResult<()>;

    /// Current drawable size in pixels.
    fn surface_size(&self) -> (u32, u32);

    fn set_display_geometry(&mut self, geometry: DisplayGeometry);

    /// Show `texture`. Failures are reported as `GazerError::Present`.
    fn present(&mut self, texture: TextureHandle) -> GazerResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn wide_content_is_letterboxed() {
        let g = DisplayGeometry::fit((1920, 1080), (800, 800));
        assert_eq!(g.width, 800.0);
        assert_eq!(g.height, 450.0);
        assert_eq!(g.offset_x, 0.0);
        assert_eq!(g.offset_y, 175.0);
    }

    #[test]
    fn tall_content_is_pillarboxed() {
        let g = DisplayGeometry::fit((480, 640), (1280, 640));
        assert_eq!(g.height, 640.0);
        assert_eq!(g.width, 480.0);
        assert_eq!(g.offset_x, 400.0);
    }

    #[test]
    fn empty_surface_is_empty() {
        let g = DisplayGeometry::fit((640, 480), (0, 100));
        assert_eq!(g.width, 0.0);
        assert_eq!(g.height, 0.0);
    }

    proptest! {
        #[test]
        fn fit_stays_inside_and_preserves_aspect(
            cw in 1u32..4096, ch in 1u32..4096,
            sw in 1u32..4096, sh in 1u32..4096,
        ) {
            let g = DisplayGeometry::fit((cw, ch), (sw, sh));
            let eps = 1e-2;
            prop_assert!(g.offset_x >= -eps && g.offset_y >= -eps);
            prop_assert!(g.offset_x + g.width <= sw as f32 + eps);
            prop_assert!(g.offset_y + g.height <= sh as f32 + eps);
            // one axis fills the surface
            prop_assert!(
                (g.width - sw as f32).abs() < eps || (g.height - sh as f32).abs() < eps
            );
            let content_aspect = cw as f64 / ch as f64;
            let placed_aspect = g.width as f64 / g.height as f64;
            prop_assert!((content_aspect - placed_aspect).abs() / content_aspect < 1e-3);
        }
    }
}
