//! Wires validated arguments into a pipeline run.

use std::sync::Arc;

use anyhow::Context;

use gazer_common::config::GazerConfig;
use gazer_frame_model::{PipelineSettings, PixelFormat, SensorIntrinsics};
use gazer_gpu::{ContextMode, GpuResource};
use gazer_pipeline::{Orchestrator, ProcessorFactory, RunOutcome, StageContext};
use gazer_processing::{analysis_channel, AnalysisProcessor, AnalysisStats, FrameProcessor};
use gazer_video_io::{clear_previous_recording, open_source, GstRecordingSink};

use crate::analysis_log::{AnalysisLog, ANALYSIS_LOG_FILE};
use crate::args::Args;
use crate::validate;

pub fn run(args: &Args, config: &GazerConfig) -> anyhow::Result<RunOutcome> {
    let validated = validate::validate(args)?;

    let mode = if args.window {
        ContextMode::Windowed
    } else {
        ContextMode::Headless
    };
    let backend = args.gpu.unwrap_or(config.gpu.backend);
    let resource = GpuResource::new(
        &config.gpu.context_name,
        config.gpu.initial_width,
        config.gpu.initial_height,
        mode,
        backend,
    )
    .context("Failed to create GPU context")?;

    let mut source = open_source(&validated.input)
        .with_context(|| format!("Failed to open {}", validated.input))?;
    source
        .set_output_format(PixelFormat::Argb)
        .context("Source rejected ARGB output")?;

    let (results_tx, results_rx) = analysis_channel();
    let log_path = validated.output.join(ANALYSIS_LOG_FILE);
    let log = AnalysisLog::spawn(&log_path, results_rx).context("Failed to create analysis log")?;

    let stats = AnalysisStats::default();
    let processor_stats = stats.clone();
    let processing = config.processing.clone();
    let (calibration, scale) = (args.calibration, args.scale);
    let models = validated.models.clone();
    let factory: ProcessorFactory<'static> = Box::new(move |ctx: &StageContext| {
        let sensor = SensorIntrinsics::from_frame_size(ctx.width, ctx.height);
        tracing::info!(
            focal_length_px = sensor.focal_length_px,
            fov_deg = sensor.horizontal_fov_degrees(),
            "Sensor intrinsics from first frame"
        );
        let settings = PipelineSettings::builder(sensor)
            .processing_defaults(&processing)
            .detection_calibration(calibration)
            .crop_scale(scale)
            .span(tracing::info_span!("analysis"))
            .build()?;
        let processor = AnalysisProcessor::new(Arc::clone(&ctx.device), settings, models)
            .with_results(results_tx)
            .with_stats(processor_stats);
        Ok(Box::new(processor) as Box<dyn FrameProcessor>)
    });

    let mut orchestrator = Orchestrator::new(resource, source, factory).with_display(args.window);

    if args.movie {
        let path = validated.output.join(&config.recording.file_name);
        clear_previous_recording(&path)?;
        match GstRecordingSink::create(&path, &config.recording.container) {
            Ok(sink) => {
                let sink = sink.with_bitrate(config.recording.bitrate_kbps);
                orchestrator = orchestrator.with_recorder(Box::new(sink), config.recording.fps);
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Recording disabled");
            }
        }
    }

    let outcome = orchestrator.run();

    match log.finish() {
        Ok(lines) if stats.dropped() > 0 => tracing::warn!(
            lines,
            dropped = stats.dropped(),
            processed = stats.processed(),
            path = %log_path.display(),
            "Analysis log is missing frames"
        ),
        Ok(lines) => tracing::info!(lines, path = %log_path.display(), "Analysis log written"),
        Err(e) => tracing::warn!(error = %e, "Analysis log incomplete"),
    }

    Ok(outcome?)
}
