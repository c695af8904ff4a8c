//! Pixel formats and channel permutations.
//!
//! Every format carried through the pipeline is 8 bits per channel with four
//! interleaved channels; formats differ only in channel order.

use serde::{Deserialize, Serialize};

use gazer_common::error::GazerError;

/// A colour channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    Red,
    Green,
    Blue,
    Alpha,
}

/// Interleaved 4x8-bit pixel layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PixelFormat {
    Rgba,
    Bgra,
    Argb,
    Abgr,
}

impl PixelFormat {
    pub const BYTES_PER_PIXEL: usize = 4;

    /// Channel stored at each byte offset.
    pub fn channels(self) -> [Channel; 4] {
        use Channel::*;
        match self {
            PixelFormat::Rgba => [Red, Green, Blue, Alpha],
            PixelFormat::Bgra => [Blue, Green, Red, Alpha],
            PixelFormat::Argb => [Alpha, Red, Green, Blue],
            PixelFormat::Abgr => [Alpha, Blue, Green, Red],
        }
    }

    /// Byte offset of `channel` within one pixel.
    pub fn offset_of(self, channel: Channel) -> usize {
        self.channels()
            .iter()
            .position(|c| *c == channel)
            .unwrap_or_default()
    }

    /// Conventional upper-case name ("RGBA", "BGRA", ...).
    pub fn as_str(self) -> &'static str {
        match self {
            PixelFormat::Rgba => "RGBA",
            PixelFormat::Bgra => "BGRA",
            PixelFormat::Argb => "ARGB",
            PixelFormat::Abgr => "ABGR",
        }
    }

    /// Size in bytes of a tightly packed image.
    pub fn frame_size(width: u32, height: u32) -> usize {
        width as usize * height as usize * Self::BYTES_PER_PIXEL
    }
}

impl std::fmt::Display for PixelFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for PixelFormat {
    type Err = GazerError;

    /// Parse a format name, case-insensitively. Anything that is not a
    /// 4x8-bit interleaved layout is rejected.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "RGBA" => Ok(PixelFormat::Rgba),
            "BGRA" => Ok(PixelFormat::Bgra),
            "ARGB" => Ok(PixelFormat::Argb),
            "ABGR" => Ok(PixelFormat::Abgr),
            _ => Err(GazerError::unsupported_format(s)),
        }
    }
}

/// Fixed channel permutation: output byte `i` takes input byte `order[i]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Swizzle {
    order: [u8; 4],
}

impl Swizzle {
    pub const IDENTITY: Swizzle = Swizzle {
        order: [0, 1, 2, 3],
    };

    /// Build from an explicit order. Returns `None` unless `order` is a
    /// permutation of `0..4`.
    pub fn from_order(order: [u8; 4]) -> Option<Self> {
        let mut seen = [false; 4];
        for &idx in &order {
            let slot = seen.get_mut(idx as usize)?;
            if *slot {
                return None;
            }
            *slot = true;
        }
        Some(Self { order })
    }

    /// Permutation that rewrites pixels stored as `from` into `to`.
    pub fn between(from: PixelFormat, to: PixelFormat) -> Self {
        let mut order = [0u8; 4];
        for (slot, channel) in order.iter_mut().zip(to.channels()) {
            *slot = from.offset_of(channel) as u8;
        }
        Self { order }
    }

    pub fn order(&self) -> [u8; 4] {
        self.order
    }

    pub fn is_identity(&self) -> bool {
        *self == Self::IDENTITY
    }

    /// The permutation that undoes this one.
    pub fn inverse(&self) -> Self {
        let mut order = [0u8; 4];
        for (i, &src) in self.order.iter().enumerate() {
            order[src as usize] = i as u8;
        }
        Self { order }
    }

    /// Apply to a single pixel.
    pub fn apply_pixel(&self, px: [u8; 4]) -> [u8; 4] {
        [
            px[self.order[0] as usize],
            px[self.order[1] as usize],
            px[self.order[2] as usize],
            px[self.order[3] as usize],
        ]
    }

    /// Apply to a packed buffer, writing into `dst`.
    ///
    /// Both slices must have the same length, a multiple of four.
    pub fn apply(&self, src: &[u8], dst: &mut [u8]) {
        for (s, d) in src.chunks_exact(4).zip(dst.chunks_exact_mut(4)) {
            d[0] = s[self.order[0] as usize];
            d[1] = s[self.order[1] as usize];
            d[2] = s[self.order[2] as usize];
            d[3] = s[self.order[3] as usize];
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const FORMATS: [PixelFormat; 4] = [
        PixelFormat::Rgba,
        PixelFormat::Bgra,
        PixelFormat::Argb,
        PixelFormat::Abgr,
    ];

    #[test]
    fn bgra_to_rgba_swaps_red_and_blue() {
        let swizzle = Swizzle::between(PixelFormat::Bgra, PixelFormat::Rgba);
        assert_eq!(swizzle.order(), [2, 1, 0, 3]);
        assert_eq!(swizzle.apply_pixel([10, 20, 30, 255]), [30, 20, 10, 255]);
    }

    #[test]
    fn argb_to_rgba_rotates_alpha_to_the_end() {
        let swizzle = Swizzle::between(PixelFormat::Argb, PixelFormat::Rgba);
        assert_eq!(swizzle.apply_pixel([255, 1, 2, 3]), [1, 2, 3, 255]);
    }

    #[test]
    fn same_format_is_identity() {
        for format in FORMATS {
            assert!(Swizzle::between(format, format).is_identity());
        }
    }

    #[test]
    fn parse_accepts_names_and_rejects_planar_formats() {
        assert_eq!("bgra".parse::<PixelFormat>().unwrap(), PixelFormat::Bgra);
        assert_eq!("ABGR".parse::<PixelFormat>().unwrap(), PixelFormat::Abgr);
        let err = "NV12".parse::<PixelFormat>().unwrap_err();
        assert!(matches!(err, GazerError::UnsupportedFormat { .. }));
    }

    #[test]
    fn from_order_rejects_non_permutations() {
        assert!(Swizzle::from_order([0, 0, 1, 2]).is_none());
        assert!(Swizzle::from_order([0, 1, 2, 4]).is_none());
        assert!(Swizzle::from_order([3, 2, 1, 0]).is_some());
    }

    proptest! {
        #[test]
        fn swizzle_round_trips_through_inverse(
            from in 0usize..4,
            to in 0usize..4,
            px in any::<[u8; 4]>(),
        ) {
            let swizzle = Swizzle::between(FORMATS[from], FORMATS[to]);
            let back = Swizzle::between(FORMATS[to], FORMATS[from]);
            prop_assert_eq!(back, swizzle.inverse());
            prop_assert_eq!(back.apply_pixel(swizzle.apply_pixel(px)), px);
        }

        #[test]
        fn buffer_apply_matches_per_pixel(
            pixels in proptest::collection::vec(any::<[u8; 4]>(), 0..32),
        ) {
            let swizzle = Swizzle::between(PixelFormat::Abgr, PixelFormat::Bgra);
            let src: Vec<u8> = pixels.iter().flatten().copied().collect();
            let mut dst = vec![0u8; src.len()];
            swizzle.apply(&src, &mut dst);
            let expected: Vec<u8> = pixels
                .iter()
                .flat_map(|px| swizzle.apply_pixel(*px))
                .collect();
            prop_assert_eq!(dst, expected);
        }
    }
}
