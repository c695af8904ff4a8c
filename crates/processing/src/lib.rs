//! Gazer Processing
//!
//! The [`FrameProcessor`] boundary the pipeline drives once per frame, and
//! [`AnalysisProcessor`], the built-in implementation:
//! - **Statistics:** per-channel means
//! - **Motion:** frame-difference energy and a bounding region scaled by the
//!   crop scale
//! - **Blobs:** centroid of the brightest pixels (optional)
//! - **Overlay:** motion region and blob marker painted into the output
//!
//! Results leave through a bounded channel that the pipeline never reads.

pub mod analysis;
pub mod models;
pub mod overlay;
pub mod processor;

pub use models::ModelBundle;
pub use processor::{
    analysis_channel, AnalysisProcessor, AnalysisStats, BlobReport, FrameAnalysis, FrameProcessor,
    MotionReport, ANALYSIS_QUEUE_DEPTH,
};
