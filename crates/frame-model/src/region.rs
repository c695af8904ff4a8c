//! Normalized image regions and points.
//!
//! Coordinates are normalized to `[0.0, 1.0]` relative to the frame so that
//! analysis results survive resolution changes.

use serde::{Deserialize, Serialize};

/// A rectangle within a frame. `(0.0, 0.0)` is top-left, `(1.0, 1.0)` is
/// bottom-right.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Region {
    pub x: f32,
    pub y: f32,
    pub w: f32,
    pub h: f32,
}

impl Region {
    pub const FULL: Region = Region {
        x: 0.0,
        y: 0.0,
        w: 1.0,
        h: 1.0,
    };

    /// Create a region, clamping to the frame.
    pub fn new(x: f32, y: f32, w: f32, h: f32) -> Self {
        let x = x.clamp(0.0, 1.0);
        let y = y.clamp(0.0, 1.0);
        Self {
            x,
            y,
            w: w.clamp(0.0, 1.0 - x),
            h: h.clamp(0.0, 1.0 - y),
        }
    }

    /// Region spanning the inclusive pixel box `[x0, x1] x [y0, y1]`.
    pub fn from_pixel_bounds(x0: u32, y0: u32, x1: u32, y1: u32, width: u32, height: u32) -> Self {
        let width = width.max(1) as f32;
        let height = height.max(1) as f32;
        Self::new(
            x0 as f32 / width,
            y0 as f32 / height,
            (x1 + 1 - x0.min(x1)) as f32 / width,
            (y1 + 1 - y0.min(y1)) as f32 / height,
        )
    }

    /// Region centered at `(cx, cy)`, shifted to stay inside the frame.
    pub fn centered(cx: f32, cy: f32, w: f32, h: f32) -> Self {
        let w = w.clamp(0.0, 1.0);
        let h = h.clamp(0.0, 1.0);
        let x = (cx - w / 2.0).clamp(0.0, 1.0 - w);
        let y = (cy - h / 2.0).clamp(0.0, 1.0 - h);
        Self { x, y, w, h }
    }

    pub fn center(&self) -> (f32, f32) {
        (self.x + self.w / 2.0, self.y + self.h / 2.0)
    }

    pub fn right(&self) -> f32 {
        (self.x + self.w).min(1.0)
    }

    pub fn bottom(&self) -> f32 {
        (self.y + self.h).min(1.0)
    }

    pub fn contains(&self, px: f32, py: f32) -> bool {
        px >= self.x && px <= self.right() && py >= self.y && py <= self.bottom()
    }

    /// Grow or shrink around the center by `factor`.
    pub fn scaled(&self, factor: f32) -> Self {
        let (cx, cy) = self.center();
        Self::centered(cx, cy, self.w * factor, self.h * factor)
    }

    /// Inclusive pixel bounds `(x0, y0, x1, y1)` inside a `width x height` frame.
    pub fn to_pixel_bounds(&self, width: u32, height: u32) -> (u32, u32, u32, u32) {
        let max_x = width.saturating_sub(1);
        let max_y = height.saturating_sub(1);
        let x0 = ((self.x * width as f32).floor() as u32).min(max_x);
        let y0 = ((self.y * height as f32).floor() as u32).min(max_y);
        let x1 = ((self.right() * width as f32).ceil() as u32)
            .saturating_sub(1)
            .clamp(x0, max_x);
        let y1 = ((self.bottom() * height as f32).ceil() as u32)
            .saturating_sub(1)
            .clamp(y0, max_y);
        (x0, y0, x1, y1)
    }
}

impl Default for Region {
    fn default() -> Self {
        Self::FULL
    }
}

/// A normalized 2D point.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point2D {
    pub x: f32,
    pub y: f32,
}

impl Point2D {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn centered_region_clamps_to_frame() {
        let region = Region::centered(0.05, 0.95, 0.4, 0.4);
        assert!(region.x >= 0.0);
        assert!(region.right() <= 1.0);
        assert!(region.bottom() <= 1.0 + f32::EPSILON);
        assert!((region.w - 0.4).abs() < 1e-6);
    }

    #[test]
    fn scaled_keeps_center_away_from_edges() {
        let region = Region::new(0.4, 0.4, 0.2, 0.2);
        let grown = region.scaled(2.0);
        let (cx, cy) = grown.center();
        assert!((cx - 0.5).abs() < 1e-6);
        assert!((cy - 0.5).abs() < 1e-6);
        assert!((grown.w - 0.4).abs() < 1e-6);
    }

    #[test]
    fn pixel_bounds_round_trip() {
        let region = Region::from_pixel_bounds(10, 20, 29, 39, 100, 100);
        assert!((region.w - 0.2).abs() < 1e-6);
        assert_eq!(region.to_pixel_bounds(100, 100), (10, 20, 29, 39));
    }

    #[test]
    fn contains_edges() {
        assert!(Region::FULL.contains(0.0, 0.0));
        assert!(Region::FULL.contains(1.0, 1.0));
        assert!(!Region::new(0.5, 0.5, 0.1, 0.1).contains(0.2, 0.2));
    }
}
