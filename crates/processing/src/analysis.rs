//! Per-frame image statistics over packed RGBA buffers.
//!
//! Every pass splits the image into rows and reduces the per-row results on
//! the caller's rayon pool.

use rayon::prelude::*;
use rayon::ThreadPool;

use gazer_frame_model::PixelFormat;

/// Luma at or above which a pixel belongs to the bright blob.
pub const BLOB_LUMA_THRESHOLD: u8 = 230;

/// Inclusive pixel bounding box.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelBox {
    pub x0: u32,
    pub y0: u32,
    pub x1: u32,
    pub y1: u32,
}

impl PixelBox {
    fn point(x: u32, y: u32) -> Self {
        Self {
            x0: x,
            y0: y,
            x1: x,
            y1: y,
        }
    }

    fn union(self, other: PixelBox) -> Self {
        Self {
            x0: self.x0.min(other.x0),
            y0: self.y0.min(other.y0),
            x1: self.x1.max(other.x1),
            y1: self.y1.max(other.y1),
        }
    }

    pub fn width(&self) -> u32 {
        self.x1 - self.x0 + 1
    }

    pub fn height(&self) -> u32 {
        self.y1 - self.y0 + 1
    }
}

/// Pixels that changed between two frames.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MotionStats {
    pub moving_pixels: u64,
    pub bounds: Option<PixelBox>,
}

impl MotionStats {
    fn include(&mut self, x: u32, y: u32) {
        self.moving_pixels += 1;
        let point = PixelBox::point(x, y);
        self.bounds = Some(match self.bounds {
            Some(b) => b.union(point),
            None => point,
        });
    }

    fn merge(self, other: MotionStats) -> MotionStats {
        let bounds = match (self.bounds, other.bounds) {
            (Some(a), Some(b)) => Some(a.union(b)),
            (a, b) => a.or(b),
        };
        MotionStats {
            moving_pixels: self.moving_pixels + other.moving_pixels,
            bounds,
        }
    }
}

/// Pixels above the blob threshold and their centroid in pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BlobStats {
    pub pixels: u64,
    pub centroid: (f32, f32),
}

#[derive(Default)]
struct BlobAccum {
    pixels: u64,
    sum_x: u64,
    sum_y: u64,
}

impl BlobAccum {
    fn merge(self, other: BlobAccum) -> BlobAccum {
        BlobAccum {
            pixels: self.pixels + other.pixels,
            sum_x: self.sum_x + other.sum_x,
            sum_y: self.sum_y + other.sum_y,
        }
    }
}

/// Integer Rec. 601 luma.
pub fn luma(r: u8, g: u8, b: u8) -> u8 {
    ((77 * r as u32 + 150 * g as u32 + 29 * b as u32) >> 8) as u8
}

fn stride(width: u32) -> usize {
    width as usize * PixelFormat::BYTES_PER_PIXEL
}

/// Mean of the R, G and B channels in `[0, 255]`.
pub fn channel_means(pixels: &[u8], width: u32, pool: &ThreadPool) -> [f32; 3] {
    let row = stride(width);
    if row == 0 || pixels.is_empty() {
        return [0.0; 3];
    }
    let sums = pool.install(|| {
        pixels
            .par_chunks(row)
            .map(|line| {
                line.chunks_exact(4).fold([0u64; 3], |mut acc, px| {
                    acc[0] += px[0] as u64;
                    acc[1] += px[1] as u64;
                    acc[2] += px[2] as u64;
                    acc
                })
            })
            .reduce(|| [0u64; 3], |a, b| [a[0] + b[0], a[1] + b[1], a[2] + b[2]])
    });
    let count = (pixels.len() / PixelFormat::BYTES_PER_PIXEL) as f32;
    sums.map(|s| s as f32 / count)
}

/// Compare two frames of equal size. A pixel moves when any colour channel
/// differs by more than `threshold`.
pub fn motion(
    previous: &[u8],
    current: &[u8],
    width: u32,
    threshold: u8,
    pool: &ThreadPool,
) -> MotionStats {
    let row = stride(width);
    if row == 0 || previous.len() != current.len() {
        return MotionStats::default();
    }
    pool.install(|| {
        previous
            .par_chunks(row)
            .zip(current.par_chunks(row))
            .enumerate()
            .map(|(y, (old, new))| {
                let mut stats = MotionStats::default();
                for (x, (a, b)) in old.chunks_exact(4).zip(new.chunks_exact(4)).enumerate() {
                    let moved = a[..3]
                        .iter()
                        .zip(&b[..3])
                        .any(|(p, q)| p.abs_diff(*q) > threshold);
                    if moved {
                        stats.include(x as u32, y as u32);
                    }
                }
                stats
            })
            .reduce(MotionStats::default, MotionStats::merge)
    })
}

/// Centroid of the pixels whose luma is at least `threshold`.
pub fn bright_blob(pixels: &[u8], width: u32, threshold: u8, pool: &ThreadPool) -> Option<BlobStats> {
    let row = stride(width);
    if row == 0 {
        return None;
    }
    let accum = pool.install(|| {
        pixels
            .par_chunks(row)
            .enumerate()
            .map(|(y, line)| {
                let mut acc = BlobAccum::default();
                for (x, px) in line.chunks_exact(4).enumerate() {
                    if luma(px[0], px[1], px[2]) >= threshold {
                        acc.pixels += 1;
                        acc.sum_x += x as u64;
                        acc.sum_y += y as u64;
                    }
                }
                acc
            })
            .reduce(BlobAccum::default, BlobAccum::merge)
    });
    if accum.pixels == 0 {
        return None;
    }
    let n = accum.pixels as f32;
    Some(BlobStats {
        pixels: accum.pixels,
        centroid: (accum.sum_x as f32 / n, accum.sum_y as f32 / n),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn pool() -> ThreadPool {
        rayon::ThreadPoolBuilder::new()
            .num_threads(2)
            .build()
            .unwrap()
    }

    fn solid(width: u32, height: u32, px: [u8; 4]) -> Vec<u8> {
        px.repeat((width * height) as usize)
    }

    fn set(buf: &mut [u8], width: u32, x: u32, y: u32, px: [u8; 4]) {
        let o = ((y * width + x) * 4) as usize;
        buf[o..o + 4].copy_from_slice(&px);
    }

    #[test]
    fn luma_extremes() {
        assert_eq!(luma(0, 0, 0), 0);
        assert_eq!(luma(255, 255, 255), 255);
        assert!(luma(0, 255, 0) > luma(255, 0, 0));
    }

    #[test]
    fn means_of_solid_image() {
        let buf = solid(8, 4, [10, 20, 30, 255]);
        assert_eq!(channel_means(&buf, 8, &pool()), [10.0, 20.0, 30.0]);
        assert_eq!(channel_means(&[], 8, &pool()), [0.0; 3]);
    }

    #[test]
    fn motion_bounds_cover_changed_pixels() {
        let pool = pool();
        let before = solid(10, 6, [0, 0, 0, 255]);
        let mut after = before.clone();
        set(&mut after, 10, 2, 1, [200, 0, 0, 255]);
        set(&mut after, 10, 7, 4, [0, 0, 90, 255]);
        // alpha changes are ignored, small changes stay below threshold
        set(&mut after, 10, 9, 5, [5, 5, 5, 0]);

        let stats = motion(&before, &after, 10, 24, &pool);
        assert_eq!(stats.moving_pixels, 2);
        assert_eq!(
            stats.bounds,
            Some(PixelBox {
                x0: 2,
                y0: 1,
                x1: 7,
                y1: 4
            })
        );
        assert_eq!(stats.bounds.unwrap().width(), 6);
    }

    #[test]
    fn identical_or_mismatched_frames_have_no_motion() {
        let pool = pool();
        let a = solid(4, 4, [1, 2, 3, 255]);
        assert_eq!(motion(&a, &a, 4, 0, &pool), MotionStats::default());
        assert_eq!(motion(&a, &a[..16], 4, 0, &pool), MotionStats::default());
    }

    #[test]
    fn blob_centroid() {
        let pool = pool();
        let mut buf = solid(8, 8, [40, 40, 50, 255]);
        assert!(bright_blob(&buf, 8, BLOB_LUMA_THRESHOLD, &pool).is_none());
        for (x, y) in [(5, 1), (6, 1), (5, 2), (6, 2)] {
            set(&mut buf, 8, x, y, [250, 250, 250, 255]);
        }
        let blob = bright_blob(&buf, 8, BLOB_LUMA_THRESHOLD, &pool).unwrap();
        assert_eq!(blob.pixels, 4);
        assert_eq!(blob.centroid, (5.5, 1.5));
    }

    proptest! {
        #[test]
        fn motion_box_is_the_tight_hull_of_changed_pixels(
            changed in prop::collection::btree_set((0u32..12, 0u32..9), 1..20)
        ) {
            let pool = pool();
            let before = solid(12, 9, [0, 0, 0, 255]);
            let mut after = before.clone();
            for &(x, y) in &changed {
                set(&mut after, 12, x, y, [255, 255, 255, 255]);
            }
            let stats = motion(&before, &after, 12, 10, &pool);
            prop_assert_eq!(stats.moving_pixels, changed.len() as u64);
            let b = stats.bounds.unwrap();
            prop_assert_eq!(b.x0, changed.iter().map(|p| p.0).min().unwrap());
            prop_assert_eq!(b.x1, changed.iter().map(|p| p.0).max().unwrap());
            prop_assert_eq!(b.y0, changed.iter().map(|p| p.1).min().unwrap());
            prop_assert_eq!(b.y1, changed.iter().map(|p| p.1).max().unwrap());
        }
    }
}
