//! Immutable pipeline configuration shared by every stage of a run.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use gazer_common::config::ProcessingDefaults;
use gazer_common::error::{GazerError, GazerResult};

use crate::region::Point2D;

/// Pinhole camera model for the capturing sensor.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SensorIntrinsics {
    /// Focal length in pixels.
    pub focal_length_px: f32,
    /// Principal point in pixels.
    pub principal_point: Point2D,
    pub width: u32,
    pub height: u32,
}

impl SensorIntrinsics {
    /// Nominal intrinsics for a sensor of the given resolution: the focal
    /// length equals the width and the principal point sits at the center.
    pub fn from_frame_size(width: u32, height: u32) -> Self {
        Self {
            focal_length_px: width as f32,
            principal_point: Point2D::new(width as f32 / 2.0, height as f32 / 2.0),
            width,
            height,
        }
    }

    /// Horizontal field of view in degrees.
    pub fn horizontal_fov_degrees(&self) -> f32 {
        if self.focal_length_px <= 0.0 {
            return 0.0;
        }
        2.0 * (self.width as f32 / (2.0 * self.focal_length_px))
            .atan()
            .to_degrees()
    }
}

/// Which analysis stages are enabled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageFlags {
    pub motion: bool,
    pub blobs: bool,
    pub overlay: bool,
}

impl Default for StageFlags {
    fn default() -> Self {
        Self {
            motion: true,
            blobs: false,
            overlay: true,
        }
    }
}

impl From<&ProcessingDefaults> for StageFlags {
    fn from(defaults: &ProcessingDefaults) -> Self {
        Self {
            motion: defaults.motion,
            blobs: defaults.blobs,
            overlay: defaults.overlay,
        }
    }
}

/// Configuration snapshot built once before the frame loop.
///
/// Shared as `Arc<PipelineSettings>` and never mutated afterwards.
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    /// Parent span for everything the pipeline logs.
    pub span: tracing::Span,
    pub threads: Arc<rayon::ThreadPool>,
    pub sensor: SensorIntrinsics,
    pub stages: StageFlags,
    /// Per-channel difference above which a pixel counts as moving.
    pub motion_threshold: u8,
    /// Scale applied to detection scores.
    pub detection_calibration: f32,
    /// Scale applied to the motion region before it is reported.
    pub crop_scale: f32,
}

impl PipelineSettings {
    pub fn builder(sensor: SensorIntrinsics) -> PipelineSettingsBuilder {
        PipelineSettingsBuilder::new(sensor)
    }
}

/// Builder for [`PipelineSettings`].
#[derive(Debug)]
pub struct PipelineSettingsBuilder {
    span: Option<tracing::Span>,
    threads: usize,
    sensor: SensorIntrinsics,
    stages: StageFlags,
    motion_threshold: u8,
    detection_calibration: f32,
    crop_scale: f32,
}

impl PipelineSettingsBuilder {
    fn new(sensor: SensorIntrinsics) -> Self {
        Self {
            span: None,
            threads: 0,
            sensor,
            stages: StageFlags::default(),
            motion_threshold: 24,
            detection_calibration: 0.0,
            crop_scale: 1.0,
        }
    }

    /// Seed stage flags, threshold and thread count from config.
    pub fn processing_defaults(mut self, defaults: &ProcessingDefaults) -> Self {
        self.stages = StageFlags::from(defaults);
        self.motion_threshold = defaults.motion_threshold;
        self.threads = defaults.threads;
        self
    }

    pub fn span(mut self, span: tracing::Span) -> Self {
        self.span = Some(span);
        self
    }

    /// Worker threads for the analysis pool; zero lets rayon decide.
    pub fn threads(mut self, threads: usize) -> Self {
        self.threads = threads;
        self
    }

    pub fn stages(mut self, stages: StageFlags) -> Self {
        self.stages = stages;
        self
    }

    pub fn motion_threshold(mut self, threshold: u8) -> Self {
        self.motion_threshold = threshold;
        self
    }

    pub fn detection_calibration(mut self, calibration: f32) -> Self {
        self.detection_calibration = calibration;
        self
    }

    pub fn crop_scale(mut self, scale: f32) -> Self {
        self.crop_scale = scale;
        self
    }

    pub fn build(self) -> GazerResult<Arc<PipelineSettings>> {
        if !self.crop_scale.is_finite() || self.crop_scale <= 0.0 {
            return Err(GazerError::config(format!(
                "crop scale must be positive, got {}",
                self.crop_scale
            )));
        }
        if !self.detection_calibration.is_finite() {
            return Err(GazerError::config("detection calibration must be finite"));
        }

        let threads = rayon::ThreadPoolBuilder::new()
            .num_threads(self.threads)
            .thread_name(|i| format!("gazer-analysis-{i}"))
            .build()
            .map_err(|e| GazerError::config(format!("failed to build thread pool: {e}")))?;

        Ok(Arc::new(PipelineSettings {
            span: self
                .span
                .unwrap_or_else(|| tracing::info_span!("pipeline")),
            threads: Arc::new(threads),
            sensor: self.sensor,
            stages: self.stages,
            motion_threshold: self.motion_threshold,
            detection_calibration: self.detection_calibration,
            crop_scale: self.crop_scale,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn intrinsics_center_principal_point() {
        let sensor = SensorIntrinsics::from_frame_size(640, 480);
        assert_eq!(sensor.focal_length_px, 640.0);
        assert_eq!(sensor.principal_point, Point2D::new(320.0, 240.0));
        // f == width gives 2*atan(0.5)
        assert!((sensor.horizontal_fov_degrees() - 53.130_1).abs() < 1e-3);
    }

    #[test]
    fn builder_applies_processing_defaults() {
        let defaults = ProcessingDefaults {
            blobs: true,
            motion_threshold: 10,
            threads: 2,
            ..ProcessingDefaults::default()
        };
        let settings = PipelineSettings::builder(SensorIntrinsics::from_frame_size(4, 4))
            .processing_defaults(&defaults)
            .crop_scale(1.5)
            .build()
            .unwrap();
        assert!(settings.stages.blobs);
        assert_eq!(settings.motion_threshold, 10);
        assert_eq!(settings.threads.current_num_threads(), 2);
        assert_eq!(settings.crop_scale, 1.5);
    }

    #[test]
    fn builder_rejects_non_positive_scale() {
        let err = PipelineSettings::builder(SensorIntrinsics::from_frame_size(4, 4))
            .crop_scale(0.0)
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("crop scale"));
    }

    #[test]
    fn stage_flags_round_trip_json() {
        let flags = StageFlags {
            motion: false,
            blobs: true,
            overlay: false,
        };
        let json = serde_json::to_string(&flags).unwrap();
        let back: StageFlags = serde_json::from_str(&json).unwrap();
        assert_eq!(back, flags);
    }
}
