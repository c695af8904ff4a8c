//! The frame loop.
//!
//! ```text
//! pull -> upload + swizzle -> process -> [display] -> [recording] -> loop
//! ```
//!
//! The loop runs on the thread that calls [`Orchestrator::run`], which owns
//! the GPU context for the whole run. Recording finalization is the only
//! work that happens elsewhere; the run blocks on its completion signal
//! before returning.

use std::sync::Arc;

use gazer_common::clock::ThroughputMeter;
use gazer_common::error::GazerResult;
use gazer_frame_model::PixelFormat;
use gazer_gpu::{GpuDevice, GpuResource, RenderControl, TextureIngest};
use gazer_processing::FrameProcessor;
use gazer_video_io::{FrameSource, RecordingSink, SinkProperties};

use crate::outcome::{RecordingStatus, RunOutcome, RunSummary};
use crate::taps::{DisplayTap, OutputTaps, RecordingTap};

/// Throughput reports per second.
const THROUGHPUT_REPORT_HZ: u32 = 1;

/// What a processor factory learns about the run before the first cycle.
#[derive(Clone)]
pub struct StageContext {
    pub device: Arc<dyn GpuDevice>,
    pub width: u32,
    pub height: u32,
    /// Channel order of the textures handed to the processor.
    pub format: PixelFormat,
}

impl std::fmt::Debug for StageContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StageContext")
            .field("backend", &self.device.backend_name())
            .field("width", &self.width)
            .field("height", &self.height)
            .field("format", &self.format)
            .finish()
    }
}

/// Builds the frame processor once frame geometry is known.
pub type ProcessorFactory<'a> =
    Box<dyn FnOnce(&StageContext) -> GazerResult<Box<dyn FrameProcessor>> + 'a>;

struct RecorderConfig {
    sink: Box<dyn RecordingSink>,
    fps: u32,
}

/// Drives frames from a source through the GPU context to the sinks.
pub struct Orchestrator<'a> {
    resource: GpuResource,
    source: Box<dyn FrameSource>,
    factory: ProcessorFactory<'a>,
    display: bool,
    recorder: Option<RecorderConfig>,
}

impl<'a> Orchestrator<'a> {
    pub fn new(
        resource: GpuResource,
        source: Box<dyn FrameSource>,
        factory: ProcessorFactory<'a>,
    ) -> Self {
        Self {
            resource,
            source,
            factory,
            display: false,
            recorder: None,
        }
    }

    /// Present frames on the context's window, if it has one.
    pub fn with_display(mut self, display: bool) -> Self {
        self.display = display;
        self
    }

    /// Record processed frames at `fps` into `sink`, which must not have
    /// begun yet.
    pub fn with_recorder(mut self, sink: Box<dyn RecordingSink>, fps: u32) -> Self {
        self.recorder = Some(RecorderConfig { sink, fps });
        self
    }

    /// Run until the source is exhausted, the window is closed, or a cycle
    /// fails.
    ///
    /// A processor error is returned only after any recording has been
    /// finalized.
    pub fn run(self) -> GazerResult<RunOutcome> {
        let Orchestrator {
            mut resource,
            mut source,
            factory,
            display,
            recorder,
        } = self;

        let span = tracing::info_span!("pipeline", source = source.describe());
        let _guard = span.enter();

        let first = source.pull(0)?;
        if first.is_end_of_stream() {
            tracing::warn!("Source produced no frames");
            return Ok(RunOutcome::NoFrames);
        }
        let (width, height) = (first.width, first.height);
        tracing::info!(
            width,
            height,
            format = %first.format,
            mode = %resource.mode(),
            "First frame received"
        );

        resource.resize(width, height);
        resource.activate()?;

        let device = resource.device();
        let ingest = TextureIngest::new(Arc::clone(&device), source.output_format());
        let context = StageContext {
            device,
            width,
            height,
            format: ingest.target_format(),
        };
        let processor = factory(&context)?;

        let mut taps = OutputTaps::new();
        if display {
            attach_display(&mut resource, &mut taps, &context);
        }
        // `None` while a recording is in progress.
        let mut recording = Some(RecordingStatus::Disabled);
        if let Some(config) = recorder {
            match start_recording(config, &context) {
                Ok(tap) => {
                    taps.push(Box::new(tap));
                    recording = None;
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Recording unavailable; continuing without it");
                    recording = Some(RecordingStatus::Skipped {
                        reason: e.to_string(),
                    });
                }
            }
        }

        let mut cycle = FrameCycle {
            source,
            ingest,
            processor,
            taps,
            next_index: 0,
            exhausted: false,
            meter: ThroughputMeter::new(THROUGHPUT_REPORT_HZ),
        };
        tracing::info!(started_at = %cycle.meter.clock().started_at(), "Frame loop started");
        let result = resource.run(&mut || cycle.step());
        tracing::info!(
            frames = cycle.meter.total_frames(),
            elapsed_ms = cycle.meter.clock().elapsed_ns() / 1_000_000,
            "Frame loop ended"
        );

        let recorded = cycle.taps.delivered("recording").unwrap_or(0);
        for (tap, waiter) in cycle.taps.finalize() {
            tracing::info!(tap, "Waiting for finalization");
            let status = match waiter.wait() {
                Ok(()) => RecordingStatus::Finalized { frames: recorded },
                Err(e) => {
                    tracing::error!(tap, error = %e, "Finalization did not complete");
                    RecordingStatus::Incomplete {
                        reason: e.to_string(),
                    }
                }
            };
            if tap == "recording" {
                recording = Some(status);
            }
        }
        let recording = recording.unwrap_or_else(|| RecordingStatus::Incomplete {
            reason: "finalization could not be started".to_string(),
        });

        let exit = result?;
        let summary = RunSummary {
            frames: cycle.meter.total_frames(),
            exit,
            presented: cycle.taps.delivered("display").unwrap_or(0),
            recording,
        };
        tracing::info!(
            frames = summary.frames,
            exit = ?summary.exit,
            presented = summary.presented,
            "Pipeline finished"
        );
        Ok(RunOutcome::Completed(summary))
    }
}

fn attach_display(resource: &mut GpuResource, taps: &mut OutputTaps, context: &StageContext) {
    let Some(mut sink) = resource.display_sink() else {
        tracing::debug!(mode = %resource.mode(), "No display surface");
        return;
    };
    match sink.init(context.width, context.height, context.format) {
        Ok(()) => taps.push(Box::new(DisplayTap::new(sink))),
        Err(e) => tracing::warn!(error = %e, "Display init failed; frames will not be shown"),
    }
}

fn start_recording(config: RecorderConfig, context: &StageContext) -> GazerResult<RecordingTap> {
    let RecorderConfig { mut sink, fps } = config;
    sink.set_properties(SinkProperties {
        width: context.width,
        height: context.height,
        fps,
        format: context.format,
    })?;
    sink.begin()?;
    Ok(RecordingTap::new(sink))
}

/// State owned by the render step.
struct FrameCycle {
    source: Box<dyn FrameSource>,
    ingest: TextureIngest,
    processor: Box<dyn FrameProcessor>,
    taps: OutputTaps,
    next_index: u64,
    exhausted: bool,
    meter: ThroughputMeter,
}

impl FrameCycle {
    fn step(&mut self) -> GazerResult<RenderControl> {
        if self.exhausted {
            return Ok(RenderControl::Stop);
        }

        let frame = self.source.pull(self.next_index)?;
        if frame.is_end_of_stream() {
            tracing::info!(frames = self.next_index, "Source exhausted");
            self.exhausted = true;
            return Ok(RenderControl::Stop);
        }
        self.next_index += 1;

        let input = self.ingest.upload(&frame)?;
        let output = self
            .processor
            .process(input, frame.width, frame.height)?;
        self.taps.deliver(
            frame.index,
            output,
            (frame.width, frame.height),
            self.processor.as_mut(),
        );

        if let Some(report) = self.meter.record_frame() {
            tracing::info!(
                frames = report.total_frames,
                fps = report.fps,
                "Throughput"
            );
        }
        Ok(RenderControl::Continue)
    }
}
