//! Output taps: the optional consumers of each processed frame.
//!
//! Taps run in the order they were added, once per cycle, and only while
//! ready. A failing tap is logged and skipped for that cycle; it never stops
//! the loop.

use gazer_common::error::GazerResult;
use gazer_common::signal::{completion_signal, CompletionWaiter};
use gazer_frame_model::{HostImage, TextureHandle};
use gazer_gpu::{DisplayGeometry, DisplaySink};
use gazer_processing::FrameProcessor;
use gazer_video_io::RecordingSink;

/// A consumer of processed frames.
pub trait OutputTap {
    fn name(&self) -> &'static str;

    /// Checked once per cycle before [`OutputTap::deliver`].
    fn is_ready(&self) -> bool;

    /// Consume the processed texture. `processor` provides readback.
    fn deliver(
        &mut self,
        output: TextureHandle,
        size: (u32, u32),
        processor: &mut dyn FrameProcessor,
    ) -> GazerResult<()>;

    /// Frames successfully delivered.
    fn delivered(&self) -> u64;

    /// Start any asynchronous finalization. The returned waiter fires when
    /// it completes.
    fn finalize(&mut self) -> Option<CompletionWaiter> {
        None
    }
}

/// Presents every frame on a display, letterboxed into the current surface.
pub struct DisplayTap {
    sink: Box<dyn DisplaySink>,
    presented: u64,
}

impl DisplayTap {
    pub fn new(sink: Box<dyn DisplaySink>) -> Self {
        Self { sink, presented: 0 }
    }
}

impl OutputTap for DisplayTap {
    fn name(&self) -> &'static str {
        "display"
    }

    fn is_ready(&self) -> bool {
        true
    }

    fn deliver(
        &mut self,
        output: TextureHandle,
        size: (u32, u32),
        _processor: &mut dyn FrameProcessor,
    ) -> GazerResult<()> {
        let geometry = DisplayGeometry::fit(size, self.sink.surface_size());
        self.sink.set_display_geometry(geometry);
        self.sink.present(output)?;
        self.presented += 1;
        Ok(())
    }

    fn delivered(&self) -> u64 {
        self.presented
    }
}

/// Reads back each processed frame and appends it to a recording.
pub struct RecordingTap {
    sink: Box<dyn RecordingSink>,
    written: u64,
}

impl RecordingTap {
    /// Wrap a sink that has already begun.
    pub fn new(sink: Box<dyn RecordingSink>) -> Self {
        Self { sink, written: 0 }
    }
}

impl OutputTap for RecordingTap {
    fn name(&self) -> &'static str {
        "recording"
    }

    fn is_ready(&self) -> bool {
        self.sink.is_open()
    }

    fn deliver(
        &mut self,
        _output: TextureHandle,
        _size: (u32, u32),
        processor: &mut dyn FrameProcessor,
    ) -> GazerResult<()> {
        let sink = &mut self.sink;
        processor.read_output_pixels(&mut |image: &HostImage| sink.write(&image.data))?;
        self.written += 1;
        Ok(())
    }

    fn delivered(&self) -> u64 {
        self.written
    }

    fn finalize(&mut self) -> Option<CompletionWaiter> {
        let (notifier, waiter) = completion_signal();
        if self.sink.end(Box::new(move || notifier.notify())) {
            Some(waiter)
        } else {
            None
        }
    }
}

/// Ordered set of taps.
#[derive(Default)]
pub struct OutputTaps {
    taps: Vec<Box<dyn OutputTap>>,
}

impl OutputTaps {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, tap: Box<dyn OutputTap>) {
        tracing::debug!(tap = tap.name(), position = self.taps.len(), "Output tap added");
        self.taps.push(tap);
    }

    /// Hand the processed frame to every ready tap, in order.
    pub fn deliver(
        &mut self,
        frame: u64,
        output: TextureHandle,
        size: (u32, u32),
        processor: &mut dyn FrameProcessor,
    ) {
        for tap in self.taps.iter_mut().filter(|t| t.is_ready()) {
            if let Err(e) = tap.deliver(output, size, processor) {
                tracing::warn!(tap = tap.name(), frame, error = %e, "Output tap failed");
            }
        }
    }

    /// Frames delivered by the tap called `name`.
    pub fn delivered(&self, name: &str) -> Option<u64> {
        self.taps
            .iter()
            .find(|t| t.name() == name)
            .map(|t| t.delivered())
    }

    /// Start finalization on every tap, returning the waiters to block on.
    pub fn finalize(&mut self) -> Vec<(&'static str, CompletionWaiter)> {
        self.taps
            .iter_mut()
            .filter_map(|tap| tap.finalize().map(|w| (tap.name(), w)))
            .collect()
    }
}
