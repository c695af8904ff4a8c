//! Annotation painting on the processor output.

use image::{Rgba, RgbaImage};
use imageproc::drawing::{draw_cross_mut, draw_hollow_rect_mut};
use imageproc::rect::Rect;

use crate::analysis::PixelBox;

const MOTION_COLOR: Rgba<u8> = Rgba([40, 220, 90, 255]);
const BLOB_COLOR: Rgba<u8> = Rgba([255, 210, 0, 255]);

/// Outline `region` with a two pixel border.
pub fn draw_region(image: &mut RgbaImage, region: PixelBox) {
    let outer = Rect::at(region.x0 as i32, region.y0 as i32).of_size(region.width(), region.height());
    draw_hollow_rect_mut(image, outer, MOTION_COLOR);
    if region.width() > 2 && region.height() > 2 {
        let inner = Rect::at(region.x0 as i32 + 1, region.y0 as i32 + 1)
            .of_size(region.width() - 2, region.height() - 2);
        draw_hollow_rect_mut(image, inner, MOTION_COLOR);
    }
}

/// Mark a point with a small cross.
pub fn draw_marker(image: &mut RgbaImage, x: f32, y: f32) {
    draw_cross_mut(image, BLOB_COLOR, x.round() as i32, y.round() as i32);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn region_border_is_painted_inside_untouched() {
        let mut img = RgbaImage::from_pixel(16, 16, Rgba([0, 0, 0, 255]));
        draw_region(
            &mut img,
            PixelBox {
                x0: 2,
                y0: 3,
                x1: 10,
                y1: 12,
            },
        );
        assert_eq!(*img.get_pixel(2, 3), MOTION_COLOR);
        assert_eq!(*img.get_pixel(3, 4), MOTION_COLOR);
        assert_eq!(*img.get_pixel(10, 12), MOTION_COLOR);
        assert_eq!(*img.get_pixel(6, 7), Rgba([0, 0, 0, 255]));
        assert_eq!(*img.get_pixel(0, 0), Rgba([0, 0, 0, 255]));
    }

    #[test]
    fn marker_near_edge_is_clipped() {
        let mut img = RgbaImage::from_pixel(4, 4, Rgba([0, 0, 0, 255]));
        draw_marker(&mut img, 0.2, 3.6);
        assert_eq!(*img.get_pixel(0, 3), BLOB_COLOR);
    }
}
