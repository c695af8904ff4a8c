//! Records synthetic frames through the GStreamer sink.
//!
//! Skips quietly when the encoder plugins are not installed.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use gazer_common::error::GazerError;
use gazer_common::signal::completion_signal;
use gazer_frame_model::PixelFormat;
use gazer_video_io::{
    open_source, GstRecordingSink, RecordingSink, SinkProperties, SinkState,
};

#[test]
fn synthetic_frames_record_and_finalize_once() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("movie.mkv");

    let mut source = open_source("synthetic://64x48?frames=5").unwrap();
    source.set_output_format(PixelFormat::Rgba).unwrap();

    let mut sink = GstRecordingSink::create(&path, ".mkv").unwrap();
    sink.set_properties(SinkProperties {
        width: 64,
        height: 48,
        fps: 30,
        format: PixelFormat::Rgba,
    })
    .unwrap();

    match sink.begin() {
        Ok(()) => {}
        Err(GazerError::StreamUnavailable { message })
        | Err(GazerError::ResourceUnavailable { message }) => {
            eprintln!("skipping: encoder unavailable: {message}");
            return;
        }
        Err(e) => panic!("unexpected begin error: {e}"),
    }
    assert!(sink.is_open());

    let mut index = 0;
    loop {
        let frame = source.pull(index).unwrap();
        if frame.is_end_of_stream() {
            break;
        }
        sink.write(frame.pixels()).unwrap();
        index += 1;
    }
    assert_eq!(sink.frames_written(), 5);

    let calls = Arc::new(AtomicUsize::new(0));
    let (notifier, waiter) = completion_signal();
    let counter = Arc::clone(&calls);
    assert!(sink.end(Box::new(move || {
        counter.fetch_add(1, Ordering::SeqCst);
        notifier.notify();
    })));
    waiter.wait().unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(sink.state(), SinkState::Closed);
    assert!(!sink.end(Box::new(|| panic!("second end must not call back"))));
    assert!(sink.write(&[0; 64 * 48 * 4]).is_err());
    assert!(std::fs::metadata(&path).unwrap().len() > 0);
}
