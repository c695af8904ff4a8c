//! Host-memory GPU device.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Mutex, MutexGuard};

use rayon::prelude::*;

use gazer_common::error::{GazerError, GazerResult};
use gazer_frame_model::{HostImage, PixelFormat, Swizzle, TextureHandle};

use crate::device::{check_same_size, unknown_texture, GpuDevice};

/// Rows per parallel swizzle task.
const ROWS_PER_TASK: usize = 16;

#[derive(Debug)]
struct SoftTexture {
    width: u32,
    height: u32,
    format: PixelFormat,
    data: Vec<u8>,
}

/// Device that keeps textures in host memory and swizzles on the CPU.
///
/// Always available; used for headless runs without an adapter and in tests.
#[derive(Debug)]
pub struct SoftwareDevice {
    textures: Mutex<HashMap<u32, SoftTexture>>,
    next_id: AtomicU32,
}

impl SoftwareDevice {
    pub fn new() -> Self {
        Self {
            textures: Mutex::new(HashMap::new()),
            next_id: AtomicU32::new(1),
        }
    }

    /// Number of live textures.
    pub fn live_textures(&self) -> usize {
        self.table().map(|t| t.len()).unwrap_or_default()
    }

    fn table(&self) -> GazerResult<MutexGuard<'_, HashMap<u32, SoftTexture>>> {
        self.textures
            .lock()
            .map_err(|_| GazerError::gpu("texture table poisoned"))
    }
}

impl Default for SoftwareDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl GpuDevice for SoftwareDevice {
    fn backend_name(&self) -> &str {
        "software"
    }

    fn create_texture(
        &self,
        width: u32,
        height: u32,
        format: PixelFormat,
    ) -> GazerResult<TextureHandle> {
        if width == 0 || height == 0 {
            return Err(GazerError::gpu(format!(
                "cannot allocate empty texture {width}x{height}"
            )));
        }
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.table()?.insert(
            id,
            SoftTexture {
                width,
                height,
                format,
                data: vec![0; PixelFormat::frame_size(width, height)],
            },
        );
        Ok(TextureHandle(id))
    }

    fn release_texture(&self, texture: TextureHandle) -> GazerResult<()> {
        self.table()?
            .remove(&texture.id())
            .map(|_| ())
            .ok_or_else(|| unknown_texture(texture))
    }

    fn texture_size(&self, texture: TextureHandle) -> GazerResult<(u32, u32)> {
        let table = self.table()?;
        let tex = table.get(&texture.id()).ok_or_else(|| unknown_texture(texture))?;
        Ok((tex.width, tex.height))
    }

    fn texture_format(&self, texture: TextureHandle) -> GazerResult<PixelFormat> {
        let table = self.table()?;
        let tex = table.get(&texture.id()).ok_or_else(|| unknown_texture(texture))?;
        Ok(tex.format)
    }

    fn upload(&self, texture: TextureHandle, pixels: &[u8]) -> GazerResult<()> {
        let mut table = self.table()?;
        let tex = table
            .get_mut(&texture.id())
            .ok_or_else(|| unknown_texture(texture))?;
        if pixels.len() != tex.data.len() {
            return Err(GazerError::gpu(format!(
                "upload of {} bytes into {}x{} texture {texture}",
                pixels.len(),
                tex.width,
                tex.height
            )));
        }
        tex.data.copy_from_slice(pixels);
        Ok(())
    }

    fn swizzle(
        &self,
        src: TextureHandle,
        dst: TextureHandle,
        swizzle: Swizzle,
    ) -> GazerResult<()> {
        if src == dst {
            return Err(GazerError::gpu("swizzle source and target must differ"));
        }
        let mut table = self.table()?;
        // Take the target out so source and target can be borrowed together.
        let mut target = table.remove(&dst.id()).ok_or_else(|| unknown_texture(dst))?;
        let result = match table.get(&src.id()) {
            Some(source) => check_same_size(
                (source.width, source.height),
                (target.width, target.height),
            )
            .map(|()| {
                let row = target.width as usize * PixelFormat::BYTES_PER_PIXEL;
                let chunk = row * ROWS_PER_TASK;
                source
                    .data
                    .par_chunks(chunk)
                    .zip(target.data.par_chunks_mut(chunk))
                    .for_each(|(s, d)| swizzle.apply(s, d));
            }),
            None => Err(unknown_texture(src)),
        };
        table.insert(dst.id(), target);
        result
    }

    fn read_pixels(&self, texture: TextureHandle) -> GazerResult<HostImage> {
        let table = self.table()?;
        let tex = table.get(&texture.id()).ok_or_else(|| unknown_texture(texture))?;
        HostImage::new(tex.width, tex.height, tex.format, tex.data.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handles_start_at_one_and_increase() {
        let device = SoftwareDevice::new();
        let a = device.create_texture(2, 2, PixelFormat::Rgba).unwrap();
        let b = device.create_texture(2, 2, PixelFormat::Rgba).unwrap();
        assert_eq!(a, TextureHandle(1));
        assert!(b > a);
        assert_eq!(device.live_textures(), 2);
    }

    #[test]
    fn upload_swizzle_readback() {
        let device = SoftwareDevice::new();
        let raw = device.create_texture(2, 1, PixelFormat::Bgra).unwrap();
        let out = device.create_texture(2, 1, PixelFormat::Rgba).unwrap();
        device.upload(raw, &[1, 2, 3, 4, 5, 6, 7, 8]).unwrap();
        device
            .swizzle(raw, out, Swizzle::between(PixelFormat::Bgra, PixelFormat::Rgba))
            .unwrap();
        let image = device.read_pixels(out).unwrap();
        assert_eq!(image.format, PixelFormat::Rgba);
        assert_eq!(image.data, vec![3, 2, 1, 4, 7, 6, 5, 8]);
    }

    #[test]
    fn upload_rejects_wrong_length() {
        let device = SoftwareDevice::new();
        let tex = device.create_texture(2, 2, PixelFormat::Rgba).unwrap();
        assert!(device.upload(tex, &[0; 4]).is_err());
    }

    #[test]
    fn swizzle_rejects_mismatched_sizes_and_keeps_target() {
        let device = SoftwareDevice::new();
        let a = device.create_texture(2, 2, PixelFormat::Rgba).unwrap();
        let b = device.create_texture(4, 4, PixelFormat::Rgba).unwrap();
        assert!(device.swizzle(a, b, Swizzle::IDENTITY).is_err());
        assert_eq!(device.texture_size(b).unwrap(), (4, 4));
        assert!(device.swizzle(a, a, Swizzle::IDENTITY).is_err());
    }

    #[test]
    fn released_textures_are_unknown() {
        let device = SoftwareDevice::new();
        let tex = device.create_texture(1, 1, PixelFormat::Rgba).unwrap();
        device.release_texture(tex).unwrap();
        assert!(device.read_pixels(tex).is_err());
        assert!(device.release_texture(tex).is_err());
        assert_eq!(device.live_textures(), 0);
    }
}
