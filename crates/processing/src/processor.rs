//! The frame processor boundary and the built-in analysis processor.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crossbeam_channel::{Receiver, Sender, TrySendError};
use image::RgbaImage;
use serde::{Deserialize, Serialize};

use gazer_common::error::{GazerError, GazerResult};
use gazer_frame_model::{
    HostImage, PipelineSettings, PixelFormat, Point2D, Region, Swizzle, TextureHandle,
};
use gazer_gpu::GpuDevice;

use crate::analysis::{self, BLOB_LUMA_THRESHOLD};
use crate::models::ModelBundle;
use crate::overlay;

/// Capacity of the analysis side-channel.
pub const ANALYSIS_QUEUE_DEPTH: usize = 64;

/// Consumes one GPU texture per cycle and produces one.
///
/// Called at most once per cycle on the thread that owns the GPU context.
pub trait FrameProcessor {
    /// Process `input` (RGBA, `width x height`). The returned texture is
    /// owned by the processor and stays valid until the next call.
    fn process(
        &mut self,
        input: TextureHandle,
        width: u32,
        height: u32,
    ) -> GazerResult<TextureHandle>;

    /// Hand the pixels of the last output to `delegate`.
    fn read_output_pixels(
        &mut self,
        delegate: &mut dyn FnMut(&HostImage) -> GazerResult<()>,
    ) -> GazerResult<()>;
}

/// Motion between a frame and its predecessor.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MotionReport {
    /// Fraction of pixels that moved.
    pub energy: f32,
    /// Bounding region of the moving pixels, scaled by the crop scale.
    pub region: Option<Region>,
}

/// Bright blob found in a frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BlobReport {
    pub centroid: Point2D,
    pub pixels: u64,
    /// Blob coverage scaled by the detection calibration, in `[0, 1]`.
    pub score: f32,
}

/// Result of analysing one frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameAnalysis {
    /// Position of the frame in processing order, from 0.
    pub sequence: u64,
    pub width: u32,
    pub height: u32,
    pub mean_rgb: [f32; 3],
    #[serde(skip_serializing_if = "Option::is_none")]
    pub motion: Option<MotionReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub blob: Option<BlobReport>,
}

/// Bounded channel for [`FrameAnalysis`] results.
pub fn analysis_channel() -> (Sender<FrameAnalysis>, Receiver<FrameAnalysis>) {
    crossbeam_channel::bounded(ANALYSIS_QUEUE_DEPTH)
}

#[derive(Debug, Default)]
struct Counters {
    processed: AtomicU64,
    published: AtomicU64,
    dropped: AtomicU64,
}

/// Shared view of an [`AnalysisProcessor`]'s counters. Stays readable after
/// the processor itself has been dropped.
#[derive(Debug, Clone, Default)]
pub struct AnalysisStats(Arc<Counters>);

impl AnalysisStats {
    pub fn processed(&self) -> u64 {
        self.0.processed.load(Ordering::Relaxed)
    }

    pub fn published(&self) -> u64 {
        self.0.published.load(Ordering::Relaxed)
    }

    /// Results lost because the side channel was full.
    pub fn dropped(&self) -> u64 {
        self.0.dropped.load(Ordering::Relaxed)
    }
}

#[derive(Debug, Clone, Copy)]
struct OutputSlot {
    texture: TextureHandle,
    width: u32,
    height: u32,
}

/// Reference processor: image statistics, motion, bright blob and an
/// optional overlay, computed on the host from a readback of the input.
pub struct AnalysisProcessor {
    device: Arc<dyn GpuDevice>,
    settings: Arc<PipelineSettings>,
    output: Option<OutputSlot>,
    previous: Option<Vec<u8>>,
    sequence: u64,
    results: Option<Sender<FrameAnalysis>>,
    stats: AnalysisStats,
}

impl AnalysisProcessor {
    pub fn new(
        device: Arc<dyn GpuDevice>,
        settings: Arc<PipelineSettings>,
        models: ModelBundle,
    ) -> Self {
        for (role, path) in models.entries() {
            tracing::info!(parent: &settings.span, role, path = %path.display(), "Model attached");
        }
        tracing::debug!(
            parent: &settings.span,
            stages = ?settings.stages,
            motion_threshold = settings.motion_threshold,
            crop_scale = settings.crop_scale,
            "Analysis processor ready"
        );
        Self {
            device,
            settings,
            output: None,
            previous: None,
            sequence: 0,
            results: None,
            stats: AnalysisStats::default(),
        }
    }

    /// Publish every analysis on `sender`. Results are dropped, not queued,
    /// while the channel is full.
    pub fn with_results(mut self, sender: Sender<FrameAnalysis>) -> Self {
        self.results = Some(sender);
        self
    }

    /// Count into `stats` instead of a private set of counters.
    pub fn with_stats(mut self, stats: AnalysisStats) -> Self {
        self.stats = stats;
        self
    }

    pub fn stats(&self) -> AnalysisStats {
        self.stats.clone()
    }

    fn output_slot(&mut self, width: u32, height: u32) -> GazerResult<TextureHandle> {
        match self.output {
            Some(slot) if slot.width == width && slot.height == height => Ok(slot.texture),
            previous => {
                if let Some(slot) = previous {
                    self.device.release_texture(slot.texture)?;
                }
                let texture = self.device.create_texture(width, height, PixelFormat::Rgba)?;
                self.output = Some(OutputSlot {
                    texture,
                    width,
                    height,
                });
                Ok(texture)
            }
        }
    }

    fn analyze(&self, pixels: &[u8], width: u32, height: u32) -> FrameAnalysis {
        let settings = &self.settings;
        let pool = settings.threads.as_ref();
        let total = (width as u64 * height as u64).max(1) as f32;

        let motion = match (&self.previous, settings.stages.motion) {
            (Some(previous), true) => {
                let stats =
                    analysis::motion(previous, pixels, width, settings.motion_threshold, pool);
                let region = stats.bounds.map(|b| {
                    Region::from_pixel_bounds(b.x0, b.y0, b.x1, b.y1, width, height)
                        .scaled(settings.crop_scale)
                });
                Some(MotionReport {
                    energy: stats.moving_pixels as f32 / total,
                    region,
                })
            }
            _ => None,
        };

        let blob = settings
            .stages
            .blobs
            .then(|| analysis::bright_blob(pixels, width, BLOB_LUMA_THRESHOLD, pool))
            .flatten()
            .map(|b| BlobReport {
                centroid: Point2D::new(b.centroid.0 / width as f32, b.centroid.1 / height as f32),
                pixels: b.pixels,
                score: (b.pixels as f32 / total * (1.0 + settings.detection_calibration))
                    .clamp(0.0, 1.0),
            });

        FrameAnalysis {
            sequence: self.sequence,
            width,
            height,
            mean_rgb: analysis::channel_means(pixels, width, pool),
            motion,
            blob,
        }
    }

    fn render_overlay(&self, pixels: Vec<u8>, result: &FrameAnalysis) -> GazerResult<Vec<u8>> {
        let mut image = RgbaImage::from_raw(result.width, result.height, pixels)
            .ok_or_else(|| GazerError::processing("frame buffer does not match its size"))?;
        if let Some(region) = result.motion.and_then(|m| m.region) {
            let (x0, y0, x1, y1) = region.to_pixel_bounds(result.width, result.height);
            overlay::draw_region(&mut image, analysis::PixelBox { x0, y0, x1, y1 });
        }
        if let Some(blob) = result.blob {
            overlay::draw_marker(
                &mut image,
                blob.centroid.x * result.width as f32,
                blob.centroid.y * result.height as f32,
            );
        }
        Ok(image.into_raw())
    }

    fn publish(&mut self, result: FrameAnalysis) {
        let counters = &self.stats.0;
        counters.processed.fetch_add(1, Ordering::Relaxed);
        let Some(sender) = &self.results else {
            return;
        };
        let sequence = result.sequence;
        match sender.try_send(result) {
            Ok(()) => {
                counters.published.fetch_add(1, Ordering::Relaxed);
            }
            Err(TrySendError::Full(_)) => {
                let dropped = counters.dropped.fetch_add(1, Ordering::Relaxed) + 1;
                if dropped == 1 {
                    tracing::warn!(
                        parent: &self.settings.span,
                        sequence,
                        "Analysis queue full; results are being dropped"
                    );
                } else {
                    tracing::debug!(
                        parent: &self.settings.span,
                        sequence,
                        dropped,
                        "Analysis queue full; result dropped"
                    );
                }
            }
            Err(TrySendError::Disconnected(_)) => {
                tracing::debug!(parent: &self.settings.span, "Analysis receiver gone");
                self.results = None;
            }
        }
    }
}

/// Bring a readback into RGBA order.
fn to_rgba(image: HostImage) -> Vec<u8> {
    if image.format == PixelFormat::Rgba {
        return image.data;
    }
    let mut out = vec![0; image.data.len()];
    Swizzle::between(image.format, PixelFormat::Rgba).apply(&image.data, &mut out);
    out
}

impl FrameProcessor for AnalysisProcessor {
    fn process(
        &mut self,
        input: TextureHandle,
        width: u32,
        height: u32,
    ) -> GazerResult<TextureHandle> {
        let image = self.device.read_pixels(input)?;
        if (image.width, image.height) != (width, height) {
            return Err(GazerError::processing(format!(
                "{input} is {}x{}, expected {width}x{height}",
                image.width, image.height
            )));
        }
        let pixels = to_rgba(image);
        let result = self.analyze(&pixels, width, height);

        let output = if self.settings.stages.overlay {
            self.render_overlay(pixels.clone(), &result)?
        } else {
            pixels.clone()
        };
        let texture = self.output_slot(width, height)?;
        self.device.upload(texture, &output)?;

        tracing::trace!(
            parent: &self.settings.span,
            sequence = result.sequence,
            motion = result.motion.map(|m| m.energy),
            "Frame analysed"
        );
        self.previous = Some(pixels);
        self.sequence += 1;
        self.publish(result);
        Ok(texture)
    }

    fn read_output_pixels(
        &mut self,
        delegate: &mut dyn FnMut(&HostImage) -> GazerResult<()>,
    ) -> GazerResult<()> {
        let slot = self
            .output
            .ok_or_else(|| GazerError::processing("no output has been produced yet"))?;
        let image = self.device.read_pixels(slot.texture)?;
        delegate(&image)
    }
}

impl Drop for AnalysisProcessor {
    fn drop(&mut self) {
        if let Some(slot) = self.output.take() {
            if let Err(e) = self.device.release_texture(slot.texture) {
                tracing::debug!(error = %e, "Failed to release analysis output");
            }
        }
    }
}
