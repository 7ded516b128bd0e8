// SPDX-License-Identifier: MPL-2.0

//! OpenCV capture backend
//!
//! One synchronous `VideoCapture::read` per frame on the caller's thread.

use super::{BackendType, CaptureBackend, Frame, SessionState, source};
use crate::constants::timing;
use crate::errors::{CaptureError, CaptureResult};
use opencv::{
    core::{self, Mat},
    imgproc,
    prelude::*,
    videoio::{self, VideoCapture},
};
use tracing::{debug, info, warn};

/// Capture through OpenCV's `videoio` module
pub struct OpenCvCapture {
    capture: Option<VideoCapture>,
    /// Reused between reads; OpenCV reallocates it only when the size changes
    mat: Mat,
    state: SessionState,
    frames_read: u64,
}

impl OpenCvCapture {
    pub fn new() -> Self {
        Self {
            capture: None,
            mat: Mat::default(),
            state: SessionState::Uninitialized,
            frames_read: 0,
        }
    }
}

impl Default for OpenCvCapture {
    fn default() -> Self {
        Self::new()
    }
}

fn open_video_capture(src: &str) -> CaptureResult<VideoCapture> {
    let capture = match source::device_index(src) {
        Some(index) => {
            debug!(index, "Opening capture device");
            VideoCapture::new(index, videoio::CAP_ANY)
        }
        None => VideoCapture::from_file(src, videoio::CAP_ANY),
    }
    .map_err(|e| CaptureError::OpenFailure(format!("{}: {}", src, e)))?;

    // Some videoio backends construct successfully but never open
    let opened = capture
        .is_opened()
        .map_err(|e| CaptureError::OpenFailure(e.to_string()))?;
    if !opened {
        return Err(CaptureError::OpenFailure(format!("{}: not opened", src)));
    }
    Ok(capture)
}

/// Copy a decoded `Mat` into an owned BGR frame
fn mat_to_frame(mat: &Mat) -> opencv::Result<Option<Frame>> {
    if mat.depth() != core::CV_8U {
        return Ok(None);
    }

    let mut converted = Mat::default();
    let bgr = match mat.channels() {
        3 => mat,
        1 => {
            imgproc::cvt_color_def(mat, &mut converted, imgproc::COLOR_GRAY2BGR)?;
            &converted
        }
        4 => {
            imgproc::cvt_color_def(mat, &mut converted, imgproc::COLOR_BGRA2BGR)?;
            &converted
        }
        _ => return Ok(None),
    };

    // Region-of-interest mats have padded rows
    let owned;
    let bgr = if bgr.is_continuous() {
        bgr
    } else {
        owned = bgr.try_clone()?;
        &owned
    };

    let width = bgr.cols() as u32;
    let height = bgr.rows() as u32;
    Ok(Frame::from_bgr(width, height, bgr.data_bytes()?.to_vec()))
}

impl CaptureBackend for OpenCvCapture {
    fn open(&mut self, source: &str) -> CaptureResult<()> {
        self.release();
        self.frames_read = 0;
        info!(source, "Opening OpenCV source");

        match open_video_capture(source) {
            Ok(capture) => {
                self.capture = Some(capture);
                self.state = SessionState::Ready;
                Ok(())
            }
            Err(e) => {
                self.state = SessionState::Failed;
                Err(e)
            }
        }
    }

    fn read(&mut self) -> CaptureResult<Frame> {
        let capture = match (&mut self.capture, self.state) {
            (Some(capture), SessionState::Ready) => capture,
            (_, state) => return Err(CaptureError::InvalidState(state)),
        };

        let grabbed = capture
            .read(&mut self.mat)
            .map_err(|e| CaptureError::DecodeFailure(e.to_string()))?;
        // videoio reports a closed stream and a failed grab the same way
        if !grabbed || self.mat.empty() {
            return Err(CaptureError::EndOfStream);
        }

        let frame = mat_to_frame(&self.mat)
            .map_err(|e| CaptureError::DecodeFailure(e.to_string()))?
            .ok_or_else(|| {
                CaptureError::DecodeFailure(format!(
                    "Unsupported Mat type {} ({} channels)",
                    self.mat.typ(),
                    self.mat.channels()
                ))
            })?;

        self.frames_read += 1;
        if self.frames_read % timing::FRAME_LOG_INTERVAL == 0 {
            debug!(
                frames = self.frames_read,
                width = frame.width,
                height = frame.height,
                "OpenCV read progress"
            );
        }
        Ok(frame)
    }

    fn release(&mut self) {
        if let Some(mut capture) = self.capture.take() {
            info!(frames = self.frames_read, "Releasing OpenCV capture");
            if let Err(e) = capture.release() {
                warn!(error = %e, "VideoCapture release failed");
            }
        }
        self.mat = Mat::default();
        self.state = SessionState::Released;
    }

    fn state(&self) -> SessionState {
        self.state
    }

    fn backend_type(&self) -> BackendType {
        BackendType::OpenCv
    }
}

impl Drop for OpenCvCapture {
    fn drop(&mut self) {
        self.release();
    }
}
