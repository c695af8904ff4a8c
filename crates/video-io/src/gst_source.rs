//! GStreamer decoder source.

use std::path::Path;

use gst::prelude::*;
use gstreamer as gst;
use gstreamer_app as gst_app;

use gazer_common::error::{GazerError, GazerResult};
use gazer_frame_model::{Frame, PixelFormat};

use crate::gst_util::{escape_path, launch_pipeline, pending_bus_error};
use crate::source::FrameSource;

/// Decoded frames queued in the appsink before the decoder blocks.
const APPSINK_MAX_BUFFERS: u32 = 4;

struct Running {
    pipeline: gst::Pipeline,
    appsink: gst_app::AppSink,
}

/// Sequential decoder over a file or URI.
///
/// Frames must be pulled in order. Pulling the index of the most recent
/// frame again returns that frame without advancing.
pub struct GstFrameSource {
    name: String,
    launch_head: String,
    format: PixelFormat,
    running: Option<Running>,
    last: Option<Frame>,
    next_index: u64,
    exhausted: bool,
}

impl GstFrameSource {
    pub fn from_file(path: &Path) -> Self {
        let head = format!("filesrc location=\"{}\" ! decodebin", escape_path(path));
        Self::with_head(path.display().to_string(), head)
    }

    pub fn from_uri(uri: &str) -> Self {
        let head = format!("uridecodebin uri=\"{}\"", uri.replace('"', "\\\""));
        Self::with_head(uri.to_string(), head)
    }

    fn with_head(name: String, launch_head: String) -> Self {
        Self {
            name,
            launch_head,
            format: PixelFormat::Bgra,
            running: None,
            last: None,
            next_index: 0,
            exhausted: false,
        }
    }

    /// The full launch line for the current output format.
    pub fn launch_line(&self) -> String {
        format!(
            "{} ! videoconvert ! appsink name=sink sync=false max-buffers={APPSINK_MAX_BUFFERS}",
            self.launch_head
        )
    }

    fn start(&mut self) -> GazerResult<&Running> {
        if self.running.is_none() {
            let pipeline = launch_pipeline(&self.launch_line(), GazerError::source)?;
            let appsink = pipeline
                .by_name("sink")
                .and_then(|e| e.downcast::<gst_app::AppSink>().ok())
                .ok_or_else(|| GazerError::source("decoder pipeline has no appsink"))?;
            appsink.set_caps(Some(
                &gst::Caps::builder("video/x-raw")
                    .field("format", self.format.as_str())
                    .build(),
            ));

            pipeline.set_state(gst::State::Playing).map_err(|e| {
                let detail = pending_bus_error(&pipeline).unwrap_or_else(|| format!("{e:?}"));
                let _ = pipeline.set_state(gst::State::Null);
                GazerError::source(format!("{}: failed to start decoding: {detail}", self.name))
            })?;

            tracing::debug!(source = %self.name, format = %self.format, "Decoder started");
            self.running = Some(Running { pipeline, appsink });
        }
        self.running
            .as_ref()
            .ok_or_else(|| GazerError::source("decoder not running"))
    }

    fn decode_next(&mut self, index: u64) -> GazerResult<Frame> {
        let name = self.name.clone();
        let running = self.start()?;

        let sample = match running.appsink.pull_sample() {
            Ok(sample) => sample,
            Err(_) if running.appsink.is_eos() => {
                tracing::info!(source = %name, frames = index, "End of stream");
                self.exhausted = true;
                return Ok(Frame::end_of_stream(index));
            }
            Err(e) => {
                let detail = pending_bus_error(&running.pipeline).unwrap_or_else(|| e.to_string());
                return Err(GazerError::source(format!("{name}: decode failed: {detail}")));
            }
        };

        sample_to_frame(&sample, index)
    }
}

/// Copy a decoded sample into a tightly packed frame.
fn sample_to_frame(sample: &gst::Sample, index: u64) -> GazerResult<Frame> {
    let caps = sample
        .caps()
        .ok_or_else(|| GazerError::source("decoded sample has no caps"))?;
    let structure = caps
        .structure(0)
        .ok_or_else(|| GazerError::source("decoded caps are empty"))?;
    let width = structure
        .get::<i32>("width")
        .map_err(|e| GazerError::source(format!("caps width: {e}")))?;
    let height = structure
        .get::<i32>("height")
        .map_err(|e| GazerError::source(format!("caps height: {e}")))?;
    let format: PixelFormat = structure
        .get::<&str>("format")
        .map_err(|e| GazerError::source(format!("caps format: {e}")))?
        .parse()?;
    let (width, height) = (width.max(0) as u32, height.max(0) as u32);

    let buffer = sample
        .buffer()
        .ok_or_else(|| GazerError::source("decoded sample has no buffer"))?;
    let map = buffer
        .map_readable()
        .map_err(|e| GazerError::source(format!("map decoded buffer: {e}")))?;

    let pixels = repack_rows(map.as_slice(), width, height)?;
    Frame::new(index, width, height, format, pixels)
}

/// Drop per-row padding so rows are exactly `width * 4` bytes.
fn repack_rows(data: &[u8], width: u32, height: u32) -> GazerResult<Vec<u8>> {
    let row = width as usize * PixelFormat::BYTES_PER_PIXEL;
    let rows = height as usize;
    if rows == 0 || row == 0 {
        return Err(GazerError::source("decoded frame has no pixels"));
    }
    let stride = data.len() / rows;
    if stride < row {
        return Err(GazerError::source(format!(
            "decoded buffer of {} bytes too small for {width}x{height}",
            data.len()
        )));
    }
    if stride == row {
        return Ok(data[..row * rows].to_vec());
    }
    let mut packed = Vec::with_capacity(row * rows);
    for chunk in data.chunks(stride).take(rows) {
        packed.extend_from_slice(&chunk[..row]);
    }
    Ok(packed)
}

impl FrameSource for GstFrameSource {
    fn describe(&self) -> &str {
        &self.name
    }

    fn output_format(&self) -> PixelFormat {
        self.format
    }

    fn set_output_format(&mut self, format: PixelFormat) -> GazerResult<()> {
        if self.running.is_some() && format != self.format {
            return Err(GazerError::source(format!(
                "{}: output format is fixed once decoding has started",
                self.name
            )));
        }
        self.format = format;
        Ok(())
    }

    fn pull(&mut self, index: u64) -> GazerResult<Frame> {
        if let Some(last) = self.last.as_ref().filter(|f| f.index == index) {
            return Ok(last.clone());
        }
        if self.exhausted {
            return Ok(Frame::end_of_stream(index));
        }
        if index != self.next_index {
            return Err(GazerError::source(format!(
                "{}: frames must be pulled in order (expected {}, got {index})",
                self.name, self.next_index
            )));
        }

        let frame = self.decode_next(index)?;
        if !frame.is_end_of_stream() {
            self.next_index = index + 1;
            self.last = Some(frame.clone());
        }
        Ok(frame)
    }
}

impl Drop for GstFrameSource {
    fn drop(&mut self) {
        if let Some(running) = self.running.take() {
            if let Err(e) = running.pipeline.set_state(gst::State::Null) {
                tracing::warn!(source = %self.name, error = ?e, "Failed to stop decoder");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn launch_lines() {
        let file = GstFrameSource::from_file(Path::new("/data/clip.mp4"));
        assert_eq!(
            file.launch_line(),
            "filesrc location=\"/data/clip.mp4\" ! decodebin ! videoconvert ! appsink name=sink sync=false max-buffers=4"
        );
        let uri = GstFrameSource::from_uri("rtsp://cam/1");
        assert!(uri.launch_line().starts_with("uridecodebin uri=\"rtsp://cam/1\""));
    }

    #[test]
    fn repack_strips_row_padding() {
        // 1x2 frame with 4 bytes of padding per row
        let data = [1, 2, 3, 4, 0, 0, 0, 0, 5, 6, 7, 8, 0, 0, 0, 0];
        assert_eq!(repack_rows(&data, 1, 2).unwrap(), vec![1, 2, 3, 4, 5, 6, 7, 8]);
    }

    #[test]
    fn repack_passes_tight_buffers_through() {
        let data = [9u8; 16];
        assert_eq!(repack_rows(&data, 2, 2).unwrap(), data.to_vec());
        assert!(repack_rows(&data, 4, 2).is_err());
    }

    #[test]
    fn format_can_change_before_start() {
        let mut source = GstFrameSource::from_uri("file:///nope");
        source.set_output_format(PixelFormat::Rgba).unwrap();
        assert_eq!(source.output_format(), PixelFormat::Rgba);
    }

    #[test]
    fn out_of_order_pull_is_rejected() {
        let mut source = GstFrameSource::from_uri("file:///nope");
        let err = source.pull(3).unwrap_err();
        assert!(err.to_string().contains("in order"));
    }
}
