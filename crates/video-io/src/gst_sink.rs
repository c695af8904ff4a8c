//! GStreamer H.264 recording sink.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

use gst::prelude::*;
use gstreamer as gst;
use gstreamer_app as gst_app;

use gazer_common::error::{GazerError, GazerResult};
use gazer_frame_model::PixelFormat;

use crate::gst_util::{escape_path, launch_pipeline, pending_bus_error};
use crate::sink::{
    check_destination, Container, FinalizeCallback, RecordingSink, SinkProperties, SinkState,
};

const DEFAULT_BITRATE_KBPS: u32 = 8000;

/// Raw frames the `appsrc` queues before `write` blocks on the encoder.
const ENCODER_QUEUE_FRAMES: usize = 4;

struct Running {
    pipeline: gst::Pipeline,
    appsrc: gst_app::AppSrc,
}

/// Encodes frames pushed through an `appsrc` into an H.264 file.
///
/// Finalization sends EOS and waits for the muxer to drain on a dedicated
/// thread.
pub struct GstRecordingSink {
    path: PathBuf,
    container: Container,
    bitrate_kbps: u32,
    properties: Option<SinkProperties>,
    state: Arc<Mutex<SinkState>>,
    running: Option<Running>,
    frames: u64,
    finalizer: Option<JoinHandle<()>>,
}

impl GstRecordingSink {
    /// Prepare a sink writing to `path`. Fails with `StreamUnavailable` if
    /// the directory is missing or the container hint is unknown.
    pub fn create(path: &Path, container_hint: &str) -> GazerResult<Self> {
        let path = check_destination(path)?;
        let container = Container::from_hint(container_hint)?;
        Ok(Self {
            path,
            container,
            bitrate_kbps: DEFAULT_BITRATE_KBPS,
            properties: None,
            state: Arc::new(Mutex::new(SinkState::Unopened)),
            running: None,
            frames: 0,
            finalizer: None,
        })
    }

    pub fn with_bitrate(mut self, kbps: u32) -> Self {
        self.bitrate_kbps = kbps.max(1);
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn container(&self) -> Container {
        self.container
    }

    /// Launch line for the configured properties.
    pub fn launch_line(&self) -> GazerResult<String> {
        let props = self
            .properties
            .ok_or_else(|| GazerError::stream_unavailable("sink properties not set"))?;
        let keyint = props.fps.saturating_mul(2).max(2);
        let max_bytes = PixelFormat::frame_size(props.width, props.height) * ENCODER_QUEUE_FRAMES;
        Ok(format!(
            "appsrc name=src format=time block=true max-bytes={max_bytes} caps=video/x-raw,format={},width={},height={},framerate={}/1 ! videoconvert ! x264enc speed-preset=veryfast bitrate={} key-int-max={keyint} ! h264parse ! {} ! filesink location=\"{}\"",
            props.format.as_str(),
            props.width,
            props.height,
            props.fps,
            self.bitrate_kbps,
            self.container.muxer(),
            escape_path(&self.path),
        ))
    }

    fn set_state(&self, state: SinkState) {
        if let Ok(mut guard) = self.state.lock() {
            *guard = state;
        }
    }

    fn frame_time(&self, frame: u64) -> gst::ClockTime {
        let fps = self.properties.map(|p| p.fps).unwrap_or(30).max(1) as u64;
        gst::ClockTime::from_nseconds(frame.saturating_mul(1_000_000_000) / fps)
    }
}

impl RecordingSink for GstRecordingSink {
    fn set_properties(&mut self, properties: SinkProperties) -> GazerResult<()> {
        if self.state() != SinkState::Unopened {
            return Err(GazerError::recording(
                "properties can only be set before begin",
            ));
        }
        if properties.width == 0 || properties.height == 0 || properties.fps == 0 {
            return Err(GazerError::recording(format!(
                "invalid recording properties {}x{} @ {} fps",
                properties.width, properties.height, properties.fps
            )));
        }
        self.properties = Some(properties);
        Ok(())
    }

    fn begin(&mut self) -> GazerResult<()> {
        if self.state() != SinkState::Unopened {
            return Err(GazerError::stream_unavailable("recording already started"));
        }
        let launch = self.launch_line()?;
        let pipeline = launch_pipeline(&launch, GazerError::stream_unavailable)?;
        let appsrc = pipeline
            .by_name("src")
            .and_then(|e| e.downcast::<gst_app::AppSrc>().ok())
            .ok_or_else(|| GazerError::stream_unavailable("encoder pipeline has no appsrc"))?;
        appsrc.set_format(gst::Format::Time);

        if let Err(e) = pipeline.set_state(gst::State::Playing) {
            let detail = pending_bus_error(&pipeline).unwrap_or_else(|| format!("{e:?}"));
            let _ = pipeline.set_state(gst::State::Null);
            return Err(GazerError::stream_unavailable(format!(
                "{}: {detail}",
                self.path.display()
            )));
        }

        tracing::info!(
            path = %self.path.display(),
            container = self.container.extension(),
            bitrate_kbps = self.bitrate_kbps,
            "Recording started"
        );
        self.running = Some(Running { pipeline, appsrc });
        self.set_state(SinkState::Open);
        Ok(())
    }

    fn write(&mut self, pixels: &[u8]) -> GazerResult<()> {
        if self.state() != SinkState::Open {
            return Err(GazerError::recording(format!(
                "write in state {:?}",
                self.state()
            )));
        }
        let (Some(running), Some(props)) = (self.running.as_ref(), self.properties) else {
            return Err(GazerError::recording("recording pipeline missing"));
        };
        let expected = PixelFormat::frame_size(props.width, props.height);
        if pixels.len() != expected {
            return Err(GazerError::recording(format!(
                "frame of {} bytes, recording expects {expected}",
                pixels.len()
            )));
        }

        let pts = self.frame_time(self.frames);
        let duration = self.frame_time(self.frames + 1) - pts;
        let mut buffer = gst::Buffer::from_mut_slice(pixels.to_vec());
        if let Some(buffer) = buffer.get_mut() {
            buffer.set_pts(pts);
            buffer.set_duration(duration);
        }
        running
            .appsrc
            .push_buffer(buffer)
            .map_err(|e| GazerError::recording(format!("push frame {}: {e:?}", self.frames)))?;
        self.frames += 1;
        Ok(())
    }

    fn end(&mut self, on_complete: FinalizeCallback) -> bool {
        if self.state() != SinkState::Open {
            tracing::debug!(state = ?self.state(), "end ignored");
            return false;
        }
        let Some(running) = self.running.take() else {
            return false;
        };
        self.set_state(SinkState::Finalizing);

        if let Err(e) = running.appsrc.end_of_stream() {
            tracing::warn!(error = ?e, "Failed to send EOS; recording may be truncated");
        }

        let state = Arc::clone(&self.state);
        let path = self.path.clone();
        let frames = self.frames;
        let spawn = std::thread::Builder::new()
            .name("gazer-finalize".to_string())
            .spawn(move || {
                drain(&running.pipeline);
                if let Err(e) = running.pipeline.set_state(gst::State::Null) {
                    tracing::warn!(error = ?e, "Failed to stop recording pipeline");
                }
                if let Ok(mut guard) = state.lock() {
                    *guard = SinkState::Closed;
                }
                tracing::info!(path = %path.display(), frames, "Recording finalized");
                on_complete();
            });

        match spawn {
            Ok(handle) => {
                self.finalizer = Some(handle);
                true
            }
            Err(e) => {
                // The closure (and callback) were dropped with the failed spawn.
                tracing::error!(error = %e, "Failed to spawn finalize thread");
                self.set_state(SinkState::Closed);
                false
            }
        }
    }

    fn state(&self) -> SinkState {
        self.state
            .lock()
            .map(|s| *s)
            .unwrap_or(SinkState::Closed)
    }

    fn frames_written(&self) -> u64 {
        self.frames
    }
}

/// Block until the pipeline reports EOS or an error.
fn drain(pipeline: &gst::Pipeline) {
    let Some(bus) = pipeline.bus() else {
        return;
    };
    let msg = bus.timed_pop_filtered(
        gst::ClockTime::NONE,
        &[gst::MessageType::Eos, gst::MessageType::Error],
    );
    if let Some(msg) = msg {
        match msg.view() {
            gst::MessageView::Eos(_) => tracing::debug!("EOS received; recording drained"),
            gst::MessageView::Error(e) => {
                tracing::warn!(error = %e.error(), "Recording pipeline error during drain")
            }
            _ => {}
        }
    }
}

impl Drop for GstRecordingSink {
    fn drop(&mut self) {
        if let Some(running) = self.running.take() {
            tracing::warn!(path = %self.path.display(), "Recording dropped without end; output may be unplayable");
            let _ = running.pipeline.set_state(gst::State::Null);
        }
        if let Some(handle) = self.finalizer.take() {
            let _ = handle.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn props() -> SinkProperties {
        SinkProperties {
            width: 64,
            height: 48,
            fps: 30,
            format: PixelFormat::Bgra,
        }
    }

    #[test]
    fn launch_line_uses_container_muxer() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = GstRecordingSink::create(&dir.path().join("movie.mov"), ".mov").unwrap();
        assert!(sink.launch_line().is_err());
        sink.set_properties(props()).unwrap();
        let line = sink.launch_line().unwrap();
        assert!(line.contains("format=BGRA,width=64,height=48,framerate=30/1"));
        assert!(line.contains("key-int-max=60"));
        assert!(line.contains("! qtmux !"));
    }

    #[test]
    fn appsrc_blocks_once_the_encoder_queue_is_full() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = GstRecordingSink::create(&dir.path().join("movie.mp4"), "mp4").unwrap();
        sink.set_properties(props()).unwrap();
        let line = sink.launch_line().unwrap();
        let queue_bytes = 64 * 48 * 4 * ENCODER_QUEUE_FRAMES;
        assert!(line.starts_with(&format!(
            "appsrc name=src format=time block=true max-bytes={queue_bytes} "
        )));
    }

    #[test]
    fn create_rejects_bad_destination() {
        let dir = tempfile::tempdir().unwrap();
        let err = GstRecordingSink::create(&dir.path().join("x/movie.mov"), ".mov")
            .err()
            .unwrap();
        assert!(matches!(err, GazerError::StreamUnavailable { .. }));
        assert!(GstRecordingSink::create(&dir.path().join("movie.avi"), ".avi").is_err());
    }

    #[test]
    fn write_and_end_before_begin() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = GstRecordingSink::create(&dir.path().join("movie.mkv"), "mkv").unwrap();
        sink.set_properties(props()).unwrap();
        assert!(sink.write(&[0; 64 * 48 * 4]).is_err());

        let called = Arc::new(Mutex::new(false));
        let flag = Arc::clone(&called);
        assert!(!sink.end(Box::new(move || *flag.lock().unwrap() = true)));
        assert!(!*called.lock().unwrap());
        assert_eq!(sink.state(), SinkState::Unopened);
    }

    #[test]
    fn invalid_properties_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = GstRecordingSink::create(&dir.path().join("movie.mp4"), "mp4").unwrap();
        let bad = SinkProperties { fps: 0, ..props() };
        assert!(sink.set_properties(bad).is_err());
    }

    #[test]
    fn timestamps_follow_frame_rate() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = GstRecordingSink::create(&dir.path().join("movie.mov"), "mov").unwrap();
        sink.set_properties(SinkProperties { fps: 25, ..props() }).unwrap();
        assert_eq!(sink.frame_time(0), gst::ClockTime::ZERO);
        assert_eq!(sink.frame_time(25), gst::ClockTime::from_seconds(1));
    }
}
