//! Command-line arguments.

use std::path::PathBuf;

use clap::Parser;

use gazer_common::config::GpuBackendKind;
use gazer_processing::ModelBundle;

#[derive(Parser, Debug, Clone)]
#[command(
    name = "gazer",
    about = "Real-time video frame pipeline: decode, analyse, display and record",
    version,
    author
)]
pub struct Args {
    /// Input video file, URI, or synthetic://WxH?frames=N
    #[arg(short, long)]
    pub input: Option<String>,

    /// Output directory
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Create a display window
    #[arg(short, long)]
    pub window: bool,

    /// Record the processed frames to a movie in the output directory
    #[arg(short, long)]
    pub movie: bool,

    /// Detection calibration
    #[arg(short, long, default_value_t = 0.0, allow_negative_numbers = true)]
    pub calibration: f32,

    /// Scale applied to the reported motion region
    #[arg(short, long, default_value_t = 1.0)]
    pub scale: f32,

    /// Detector model
    #[arg(short = 'D', long)]
    pub detector: Option<PathBuf>,

    /// Detector mean
    #[arg(short = 'M', long)]
    pub mean: Option<PathBuf>,

    /// Regressor model
    #[arg(short = 'R', long)]
    pub regressor: Option<PathBuf>,

    /// Eye model
    #[arg(short = 'E', long)]
    pub eye: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// GPU backend: auto, software or wgpu
    #[arg(long)]
    pub gpu: Option<GpuBackendKind>,

    /// Config file (defaults to the standard location)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Emit logs as JSON
    #[arg(long)]
    pub json_logs: bool,
}

impl Args {
    pub fn models(&self) -> ModelBundle {
        ModelBundle {
            detector: self.detector.clone(),
            detector_mean: self.mean.clone(),
            regressor: self.regressor.clone(),
            eye: self.eye.clone(),
        }
    }
}
