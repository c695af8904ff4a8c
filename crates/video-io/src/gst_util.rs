//! Shared GStreamer plumbing.

use std::path::Path;
use std::sync::OnceLock;

use gst::prelude::*;
use gstreamer as gst;

use gazer_common::error::{GazerError, GazerResult};

/// Initialise GStreamer once per process.
pub fn init_gstreamer() -> GazerResult<()> {
    static GST_INIT: OnceLock<Result<(), String>> = OnceLock::new();
    let init_res = GST_INIT.get_or_init(|| gst::init().map_err(|e| e.to_string()));
    match init_res {
        Ok(()) => Ok(()),
        Err(e) => Err(GazerError::resource_unavailable(format!(
            "Failed to initialize GStreamer: {e}"
        ))),
    }
}

/// Parse a launch line into a pipeline. `on_error` builds the error for
/// parse failures so sources and sinks can report their own variants.
pub fn launch_pipeline(
    launch: &str,
    on_error: impl Fn(String) -> GazerError,
) -> GazerResult<gst::Pipeline> {
    init_gstreamer()?;
    let element = gst::parse::launch(launch)
        .map_err(|e| on_error(format!("Failed to build pipeline: {e}")))?;
    element
        .dynamic_cast::<gst::Pipeline>()
        .map_err(|_| on_error("Launch string did not produce a pipeline".to_string()))
}

/// First error message waiting on the pipeline bus, if any.
pub fn pending_bus_error(pipeline: &gst::Pipeline) -> Option<String> {
    let bus = pipeline.bus()?;
    let msg = bus.pop_filtered(&[gst::MessageType::Error])?;
    match msg.view() {
        gst::MessageView::Error(err) => Some(match err.debug() {
            Some(debug) => format!("{} ({debug})", err.error()),
            None => err.error().to_string(),
        }),
        _ => None,
    }
}

pub fn escape_path(path: &Path) -> String {
    path.to_string_lossy().replace('"', "\\\"")
}
