//! Gazer Video I/O
//!
//! Frame sources and recording sinks behind narrow traits:
//! - **Sources:** [`FrameSource`] over GStreamer decoding (files, URIs) and a
//!   synthetic pattern generator (`synthetic://WxH?frames=N`)
//! - **Sinks:** [`RecordingSink`] with an asynchronous finalize, backed by a
//!   GStreamer `appsrc ! x264enc ! mux ! filesink` pipeline

pub mod gst_util;
pub mod gst_sink;
pub mod gst_source;
pub mod sink;
pub mod source;
pub mod synthetic;

pub use gst_sink::GstRecordingSink;
pub use gst_source::GstFrameSource;
pub use sink::{
    clear_previous_recording, Container, FinalizeCallback, RecordingSink, SinkProperties,
    SinkState,
};
pub use source::{open_source, FrameSource, SourceId};
pub use synthetic::SyntheticSource;
