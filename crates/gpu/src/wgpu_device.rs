//! wgpu-backed device.
//!
//! Textures live in storage buffers holding one packed `u32` per pixel. The
//! swizzle runs as a compute pass; readback copies into a mappable staging
//! buffer and waits on the device.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Mutex, MutexGuard};

use wgpu::util::DeviceExt;

use gazer_common::error::{GazerError, GazerResult};
use gazer_frame_model::{HostImage, PixelFormat, Swizzle, TextureHandle};

use crate::device::{check_same_size, unknown_texture, GpuDevice};

const SWIZZLE_SHADER: &str = include_str!("swizzle.wgsl");
const WORKGROUP: u32 = 16;

struct BufferTexture {
    buffer: wgpu::Buffer,
    width: u32,
    height: u32,
    format: PixelFormat,
}

impl BufferTexture {
    fn byte_len(&self) -> u64 {
        PixelFormat::frame_size(self.width, self.height) as u64
    }
}

pub struct WgpuDevice {
    adapter_name: String,
    device: wgpu::Device,
    queue: wgpu::Queue,
    swizzle_pipeline: wgpu::ComputePipeline,
    swizzle_layout: wgpu::BindGroupLayout,
    textures: Mutex<HashMap<u32, BufferTexture>>,
    next_id: AtomicU32,
}

impl WgpuDevice {
    /// Request an adapter and device and build the swizzle pipeline.
    ///
    /// Fails with `ResourceUnavailable` when no adapter is present.
    pub fn new() -> GazerResult<Self> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .build()
            .map_err(|e| GazerError::resource_unavailable(format!("wgpu runtime: {e}")))?;
        runtime.block_on(Self::new_async())
    }

    async fn new_async() -> GazerResult<Self> {
        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await
            .ok_or_else(|| GazerError::resource_unavailable("no GPU adapter found"))?;

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("gazer"),
                    required_features: wgpu::Features::empty(),
                    required_limits: wgpu::Limits::default(),
                    memory_hints: Default::default(),
                },
                None,
            )
            .await
            .map_err(|e| GazerError::resource_unavailable(format!("GPU device: {e}")))?;

        let adapter_name = adapter.get_info().name;
        tracing::info!(adapter = %adapter_name, "wgpu device ready");

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("swizzle_shader"),
            source: wgpu::ShaderSource::Wgsl(SWIZZLE_SHADER.into()),
        });

        let storage_entry = |binding: u32, read_only: bool| wgpu::BindGroupLayoutEntry {
            binding,
            visibility: wgpu::ShaderStages::COMPUTE,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Storage { read_only },
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        };

        let swizzle_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("swizzle_bind_layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
                storage_entry(1, true),
                storage_entry(2, false),
            ],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("swizzle_pipeline_layout"),
            bind_group_layouts: &[&swizzle_layout],
            push_constant_ranges: &[],
        });

        let swizzle_pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label: Some("swizzle_pipeline"),
            layout: Some(&pipeline_layout),
            module: &shader,
            entry_point: Some("main"),
            compilation_options: Default::default(),
            cache: None,
        });

        Ok(Self {
            adapter_name,
            device,
            queue,
            swizzle_pipeline,
            swizzle_layout,
            textures: Mutex::new(HashMap::new()),
            next_id: AtomicU32::new(1),
        })
    }

    pub fn adapter_name(&self) -> &str {
        &self.adapter_name
    }

    fn table(&self) -> GazerResult<MutexGuard<'_, HashMap<u32, BufferTexture>>> {
        self.textures
            .lock()
            .map_err(|_| GazerError::gpu("texture table poisoned"))
    }
}

/// Pack a swizzle order into the shader's `order` word.
fn pack_order(swizzle: Swizzle) -> u32 {
    swizzle
        .order()
        .iter()
        .enumerate()
        .fold(0u32, |acc, (c, &idx)| acc | (u32::from(idx) << (c * 8)))
}

fn params_bytes(width: u32, height: u32, order: u32) -> [u8; 16] {
    let mut bytes = [0u8; 16];
    for (chunk, word) in bytes.chunks_exact_mut(4).zip([width, height, order, 0]) {
        chunk.copy_from_slice(&word.to_le_bytes());
    }
    bytes
}

impl GpuDevice for WgpuDevice {
    fn backend_name(&self) -> &str {
        "wgpu"
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
        let buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("gazer_texture"),
            size: PixelFormat::frame_size(width, height) as u64,
            usage: wgpu::BufferUsages::STORAGE
                | wgpu::BufferUsages::COPY_DST
                | wgpu::BufferUsages::COPY_SRC,
            mapped_at_creation: false,
        });
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.table()?.insert(
            id,
            BufferTexture {
                buffer,
                width,
                height,
                format,
            },
        );
        Ok(TextureHandle(id))
    }

    fn release_texture(&self, texture: TextureHandle) -> GazerResult<()> {
        let tex = self
            .table()?
            .remove(&texture.id())
            .ok_or_else(|| unknown_texture(texture))?;
        tex.buffer.destroy();
        Ok(())
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
        let table = self.table()?;
        let tex = table.get(&texture.id()).ok_or_else(|| unknown_texture(texture))?;
        if pixels.len() as u64 != tex.byte_len() {
            return Err(GazerError::gpu(format!(
                "upload of {} bytes into {}x{} texture {texture}",
                pixels.len(),
                tex.width,
                tex.height
            )));
        }
        self.queue.write_buffer(&tex.buffer, 0, pixels);
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
        let table = self.table()?;
        let source = table.get(&src.id()).ok_or_else(|| unknown_texture(src))?;
        let target = table.get(&dst.id()).ok_or_else(|| unknown_texture(dst))?;
        check_same_size((source.width, source.height), (target.width, target.height))?;

        let params = self
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("swizzle_params"),
                contents: &params_bytes(source.width, source.height, pack_order(swizzle)),
                usage: wgpu::BufferUsages::UNIFORM,
            });

        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("swizzle_bind_group"),
            layout: &self.swizzle_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: params.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: source.buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: target.buffer.as_entire_binding(),
                },
            ],
        });

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("swizzle_encoder"),
            });
        {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("swizzle_pass"),
                timestamp_writes: None,
            });
            pass.set_pipeline(&self.swizzle_pipeline);
            pass.set_bind_group(0, &bind_group, &[]);
            pass.dispatch_workgroups(
                source.width.div_ceil(WORKGROUP),
                source.height.div_ceil(WORKGROUP),
                1,
            );
        }
        self.queue.submit(Some(encoder.finish()));
        Ok(())
    }

    fn read_pixels(&self, texture: TextureHandle) -> GazerResult<HostImage> {
        let table = self.table()?;
        let tex = table.get(&texture.id()).ok_or_else(|| unknown_texture(texture))?;
        let size = tex.byte_len();

        let staging = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("readback_staging"),
            size,
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("readback_encoder"),
            });
        encoder.copy_buffer_to_buffer(&tex.buffer, 0, &staging, 0, size);
        self.queue.submit(Some(encoder.finish()));

        let slice = staging.slice(..);
        let (tx, rx) = std::sync::mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = tx.send(result);
        });
        self.device.poll(wgpu::Maintain::Wait);
        rx.recv()
            .map_err(|_| GazerError::gpu("readback callback dropped"))?
            .map_err(|e| GazerError::gpu(format!("readback map failed: {e}")))?;

        let data = slice.get_mapped_range().to_vec();
        staging.unmap();
        HostImage::new(tex.width, tex.height, tex.format, data)
    }
}
