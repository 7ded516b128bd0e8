// SPDX-License-Identifier: MPL-2.0

//! Integration tests for the backend factory

use frame_capture::backends::{self, CaptureBackend};
use frame_capture::{CaptureError, SessionState};

#[test]
fn test_create_capture() {
    let capture = backends::create();
    assert_eq!(capture.backend_type(), backends::selected_backend());
    assert_eq!(capture.state(), SessionState::Uninitialized);
}

#[test]
fn test_create_and_initialize_invalid_source() {
    let mut capture = backends::create();
    assert!(!capture.initialize("/nonexistent/video.mp4"));
    assert_eq!(capture.state(), SessionState::Failed);
    assert!(capture.read_frame().is_none());
}

#[test]
fn test_multiple_instances_are_independent() {
    let mut captures: Vec<Box<dyn CaptureBackend>> = (0..3).map(|_| backends::create()).collect();

    captures[0].release();
    assert!(!captures[1].initialize("/nonexistent/video.mp4"));

    assert_eq!(captures[0].state(), SessionState::Released);
    assert_eq!(captures[1].state(), SessionState::Failed);
    assert_eq!(captures[2].state(), SessionState::Uninitialized);
}

#[test]
fn test_release_after_create() {
    let mut capture = backends::create();
    capture.release();
    capture.release();
    assert_eq!(capture.state(), SessionState::Released);
    assert!(matches!(
        capture.read(),
        Err(CaptureError::InvalidState(SessionState::Released))
    ));
}

#[test]
fn test_capture_moves_between_threads() {
    let capture = backends::create();
    let handle = std::thread::spawn(move || {
        let mut capture = capture;
        capture.release();
        capture.state()
    });
    assert_eq!(handle.join().unwrap(), SessionState::Released);
}
