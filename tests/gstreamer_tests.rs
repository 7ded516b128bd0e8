// SPDX-License-Identifier: MPL-2.0

//! Integration tests for the GStreamer backend

#![cfg(feature = "gstreamer")]

use frame_capture::backends::CaptureBackend;
use frame_capture::backends::gstreamer::GstCapture;
use frame_capture::{CaptureError, SessionState};
use std::time::{Duration, Instant};

// Live so frames arrive at 30 fps instead of all before the first read
const TEST_PIPELINE: &str =
    "videotestsrc is-live=true num-buffers=10 ! video/x-raw,format=BGR,width=640,height=480 ! appsink";

const NV12_PIPELINE: &str =
    "videotestsrc is-live=true num-buffers=3 ! video/x-raw,format=NV12,width=322,height=242 ! appsink";

fn has_test_source() -> bool {
    gstreamer::init().is_ok() && gstreamer::ElementFactory::find("videotestsrc").is_some()
}

#[test]
fn test_initialize_with_invalid_pipeline() {
    if gstreamer::init().is_err() {
        return;
    }
    let mut capture = GstCapture::new();
    assert!(!capture.initialize("invalid ! pipeline ! elements"));
    assert_eq!(capture.state(), SessionState::Failed);
    assert!(matches!(
        capture.open("invalid ! pipeline ! elements"),
        Err(CaptureError::NegotiationFailure(_))
    ));
}

#[test]
fn test_read_frame_before_initialize() {
    let mut capture = GstCapture::new();
    assert!(capture.read_frame().is_none());
}

#[test]
fn test_multiple_release_calls() {
    let mut capture = GstCapture::new();
    capture.release();
    capture.release();
    assert_eq!(capture.state(), SessionState::Released);
}

#[test]
fn test_valid_pipeline_release_without_reading() {
    if !has_test_source() {
        return;
    }
    let mut capture = GstCapture::new();
    assert!(capture.initialize(TEST_PIPELINE));

    let started = Instant::now();
    capture.release();
    assert!(started.elapsed() < Duration::from_secs(5));
    assert_eq!(capture.state(), SessionState::Released);
}

#[test]
fn test_reads_until_end_of_stream() {
    if !has_test_source() {
        return;
    }
    let mut capture = GstCapture::new();
    capture.set_read_timeout(Some(Duration::from_secs(10)));
    assert!(capture.initialize(TEST_PIPELINE));

    let mut frames = 0;
    let end = loop {
        match capture.read() {
            Ok(frame) => {
                assert_eq!(frame.dimensions(), (640, 480));
                assert_eq!(frame.channels, 3);
                frames += 1;
            }
            Err(e) => break e,
        }
    };

    assert!(frames > 0 && frames <= 10);
    assert_eq!(end, CaptureError::EndOfStream);
    // A read after end-of-stream returns at once
    let started = Instant::now();
    assert_eq!(capture.read(), Err(CaptureError::EndOfStream));
    assert!(started.elapsed() < Duration::from_secs(1));
}

#[test]
fn test_nv12_pipeline_delivers_bgr() {
    if !has_test_source() || gstreamer::ElementFactory::find("videoconvert").is_none() {
        return;
    }
    let mut capture = GstCapture::new();
    capture.set_read_timeout(Some(Duration::from_secs(10)));
    assert!(capture.initialize(NV12_PIPELINE));

    let frame = capture.read().unwrap();
    assert_eq!(frame.dimensions(), (322, 242));
    assert_eq!(frame.channels, 3);
    assert_eq!(frame.data.len(), 322 * 242 * 3);
    capture.release();
}

#[test]
fn test_interrupt_handle_wakes_read_on_stalled_source() {
    if !has_test_source() {
        return;
    }
    // The valve discards every buffer, so the appsink never sees one
    if gstreamer::ElementFactory::find("valve").is_none() {
        return;
    }
    let mut capture = GstCapture::new();
    assert!(capture.initialize(
        "videotestsrc is-live=true ! valve drop=true ! video/x-raw,format=BGR ! appsink"
    ));
    let handle = capture.interrupt_handle().unwrap();
    let interrupter = std::thread::spawn(move || {
        std::thread::sleep(Duration::from_millis(200));
        handle.interrupt();
    });

    let started = Instant::now();
    assert_eq!(capture.read(), Err(CaptureError::Interrupted));
    assert!(started.elapsed() < Duration::from_secs(5));
    interrupter.join().unwrap();
    capture.release();
}

#[test]
fn test_generated_pipeline_for_missing_file() {
    let mut capture = GstCapture::new();
    assert!(!capture.initialize("/nonexistent/video.mp4"));
    assert_eq!(capture.state(), SessionState::Failed);
}
