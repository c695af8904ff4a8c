//! Gazer Frame Model
//!
//! Data contracts passed between pipeline stages:
//! - **Frames:** Indexed, immutable pixel buffers; an empty buffer marks
//!   the end of the stream
//! - **Pixels:** 4x8-bit formats and the channel swizzles between them
//! - **Textures:** Opaque GPU handles and host-side readback images
//! - **Settings:** The immutable per-run configuration snapshot
//!
//! Region coordinates are normalized to `[0.0, 1.0]` relative to the frame.

pub mod frame;
pub mod pixel;
pub mod region;
pub mod settings;
pub mod texture;

pub use frame::*;
pub use pixel::*;
pub use region::*;
pub use settings::*;
pub use texture::*;
