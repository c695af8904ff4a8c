//! BGRA frames through ingest and analysis on the software device.

use std::sync::Arc;

use gazer_frame_model::{Frame, PipelineSettings, PixelFormat, SensorIntrinsics, StageFlags};
use gazer_gpu::{GpuDevice, SoftwareDevice, TextureIngest};
use gazer_processing::{analysis_channel, AnalysisProcessor, FrameProcessor, ModelBundle};

const W: u32 = 32;
const H: u32 = 16;

/// Dark BGRA frame with a bright 4x4 square whose left edge is at `x`.
fn bgra_frame(index: u64, x: u32) -> Frame {
    let mut pixels = [30u8, 20, 10, 255].repeat((W * H) as usize);
    for y in 6..10 {
        for dx in 0..4 {
            let o = ((y * W + x + dx) * 4) as usize;
            pixels[o..o + 4].copy_from_slice(&[250, 250, 250, 255]);
        }
    }
    Frame::new(index, W, H, PixelFormat::Bgra, pixels).unwrap()
}

#[test]
fn moving_square_is_tracked_in_order() {
    let device: Arc<dyn GpuDevice> = Arc::new(SoftwareDevice::new());
    let settings = PipelineSettings::builder(SensorIntrinsics::from_frame_size(W, H))
        .threads(2)
        .stages(StageFlags {
            motion: true,
            blobs: true,
            overlay: true,
        })
        .build()
        .unwrap();

    let (tx, rx) = analysis_channel();
    let mut ingest = TextureIngest::new(Arc::clone(&device), PixelFormat::Bgra);
    let mut processor =
        AnalysisProcessor::new(Arc::clone(&device), settings, ModelBundle::default())
            .with_results(tx);

    let positions = [2u32, 10, 18, 26];
    for (i, &x) in positions.iter().enumerate() {
        let texture = ingest.upload(&bgra_frame(i as u64, x)).unwrap();
        processor.process(texture, W, H).unwrap();
    }
    drop(processor);

    let results: Vec<_> = rx.try_iter().collect();
    assert_eq!(results.len(), positions.len());
    for (i, result) in results.iter().enumerate() {
        assert_eq!(result.sequence, i as u64);
        let blob = result.blob.expect("square is bright");
        assert_eq!(blob.pixels, 16);
        let expected_x = (positions[i] as f32 + 1.5) / W as f32;
        assert!((blob.centroid.x - expected_x).abs() < 1e-4);
    }

    // the frame before and after both contribute to the motion box
    let region = results[2].motion.unwrap().region.unwrap();
    assert!(region.contains(11.0 / W as f32, 7.0 / H as f32));
    assert!(region.contains(21.0 / W as f32, 7.0 / H as f32));
    assert!(!region.contains(30.0 / W as f32, 7.0 / H as f32));

    // the swizzle put the blue-heavy BGRA background into RGBA order
    let mean = results[0].mean_rgb;
    assert!(mean[0] < mean[2]);
    assert_eq!(ingest.allocations(), 1);
}
