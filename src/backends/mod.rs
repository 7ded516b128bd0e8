// SPDX-License-Identifier: MPL-2.0

//! Capture backend abstraction
//!
//! One capture interface with three interchangeable implementations, chosen
//! at build time through Cargo features:
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │             App Layer (viewer)              │
//! └────────────────────┬────────────────────────┘
//!                      │  Box<dyn CaptureBackend>
//! ┌────────────────────┴────────────────────────┐
//! │               Backend Layer                 │
//! │  ┌──────────┐  ┌──────────┐  ┌───────────┐  │
//! │  │  OpenCV  │  │  FFmpeg  │  │ GStreamer │  │
//! │  │  (pull)  │  │ (demux)  │  │  (push)   │  │
//! │  └──────────┘  └──────────┘  └─────┬─────┘  │
//! │                                    │        │
//! │                              ┌─────┴─────┐  │
//! │                              │ FrameSlot │  │
//! │                              └───────────┘  │
//! └─────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//!
//! - [`source`]: Source descriptor heuristics shared by the backends
//! - [`types`]: Frame, backend and session types
//! - `opencv`: Direct-pull capture through OpenCV `videoio`
//! - `ffmpeg`: Demux, decode and scale through libav*
//! - `gstreamer`: Pipeline capture bridged through a single-frame slot

pub mod source;
pub mod types;

#[cfg(feature = "ffmpeg")]
pub mod ffmpeg;
#[cfg(feature = "gstreamer")]
pub mod gstreamer;
#[cfg(feature = "opencv")]
pub mod opencv;

pub use types::*;

use crate::errors::{CaptureError, CaptureResult};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, warn};

#[cfg(not(any(feature = "opencv", feature = "ffmpeg", feature = "gstreamer")))]
compile_error!("enable one of the capture backend features: opencv, ffmpeg, gstreamer");

/// Cancels a blocked [`CaptureBackend::read`] from another thread
pub trait Interrupt: Send + Sync {
    /// Make the pending or next `read` return `CaptureError::Interrupted`
    ///
    /// Stays in effect until the capture is opened again.
    fn interrupt(&self);
}

pub type InterruptHandle = Arc<dyn Interrupt>;

/// Common interface for all capture backends
///
/// A capture instance moves between [`SessionState`]s: `open` succeeds into
/// `Ready`, fails into `Failed`, and `release` ends in `Released`. `open`
/// may be called again from any state; it releases the current session
/// first. Instances are independent and may be moved between threads, but a
/// single instance is driven by one thread at a time.
pub trait CaptureBackend: Send {
    /// Open a source and prepare it for reading
    ///
    /// The descriptor is interpreted by the backend (device index, file
    /// path, URL or pipeline description).
    fn open(&mut self, source: &str) -> CaptureResult<()>;

    /// Read the next frame
    ///
    /// Frames are returned in source order as owned BGR buffers. Blocks
    /// until a frame is available or the source ends.
    fn read(&mut self) -> CaptureResult<Frame>;

    /// Release every resource held by the session
    ///
    /// Idempotent, and safe to call in any state.
    fn release(&mut self);

    /// Current lifecycle state
    fn state(&self) -> SessionState;

    /// Which implementation this is
    fn backend_type(&self) -> BackendType;

    /// Bound how long `read` waits for a frame
    ///
    /// Only push-based backends wait on their own; the others ignore this.
    fn set_read_timeout(&mut self, _timeout: Option<Duration>) {}

    /// Handle that can wake a `read` blocked on this capture
    ///
    /// `None` for backends whose reads never wait on a producer thread.
    fn interrupt_handle(&self) -> Option<InterruptHandle> {
        None
    }

    /// Open a source, reporting failure as `false`
    fn initialize(&mut self, source: &str) -> bool {
        match self.open(source) {
            Ok(()) => true,
            Err(e) => {
                error!(backend = %self.backend_type(), source, error = %e, "Failed to open source");
                false
            }
        }
    }

    /// Read a frame, reporting failure as `None`
    fn read_frame(&mut self) -> Option<Frame> {
        match self.read() {
            Ok(frame) => Some(frame),
            Err(CaptureError::Interrupted) => {
                debug!(backend = %self.backend_type(), "Read interrupted");
                None
            }
            Err(e) if e.is_transient() => {
                debug!(backend = %self.backend_type(), error = %e, "Frame read failed");
                None
            }
            Err(e) => {
                warn!(backend = %self.backend_type(), error = %e, "No frame");
                None
            }
        }
    }
}

/// The backend compiled into this build
///
/// When several backend features are enabled, GStreamer wins over FFmpeg,
/// which wins over OpenCV.
pub const fn selected_backend() -> BackendType {
    #[cfg(feature = "gstreamer")]
    {
        BackendType::GStreamer
    }
    #[cfg(all(feature = "ffmpeg", not(feature = "gstreamer")))]
    {
        BackendType::Ffmpeg
    }
    #[cfg(all(
        feature = "opencv",
        not(feature = "ffmpeg"),
        not(feature = "gstreamer")
    ))]
    {
        BackendType::OpenCv
    }
}

/// Backends compiled into this build, in priority order
pub fn available_backends() -> Vec<BackendType> {
    let mut backends = Vec::new();
    #[cfg(feature = "gstreamer")]
    backends.push(BackendType::GStreamer);
    #[cfg(feature = "ffmpeg")]
    backends.push(BackendType::Ffmpeg);
    #[cfg(feature = "opencv")]
    backends.push(BackendType::OpenCv);
    backends
}

/// Create a fresh, unopened capture instance of the selected backend
pub fn create() -> Box<dyn CaptureBackend> {
    #[cfg(feature = "gstreamer")]
    {
        Box::new(gstreamer::GstCapture::new())
    }
    #[cfg(all(feature = "ffmpeg", not(feature = "gstreamer")))]
    {
        Box::new(ffmpeg::FfmpegCapture::new())
    }
    #[cfg(all(
        feature = "opencv",
        not(feature = "ffmpeg"),
        not(feature = "gstreamer")
    ))]
    {
        Box::new(opencv::OpenCvCapture::new())
    }
}

/// Create a capture instance of a specific backend, if compiled in
pub fn create_for(backend: BackendType) -> Option<Box<dyn CaptureBackend>> {
    match backend {
        #[cfg(feature = "opencv")]
        BackendType::OpenCv => Some(Box::new(opencv::OpenCvCapture::new())),
        #[cfg(feature = "ffmpeg")]
        BackendType::Ffmpeg => Some(Box::new(ffmpeg::FfmpegCapture::new())),
        #[cfg(feature = "gstreamer")]
        BackendType::GStreamer => Some(Box::new(gstreamer::GstCapture::new())),
        #[allow(unreachable_patterns)]
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_selected_backend_is_available() {
        let available = available_backends();
        assert!(!available.is_empty());
        assert_eq!(available[0], selected_backend());
    }

    #[test]
    fn test_create_starts_uninitialized() {
        let capture = create();
        assert_eq!(capture.state(), SessionState::Uninitialized);
        assert_eq!(capture.backend_type(), selected_backend());
    }

    #[test]
    fn test_only_push_backends_are_interruptible() {
        for backend in available_backends() {
            let capture = create_for(backend).unwrap();
            assert_eq!(capture.interrupt_handle().is_some(), backend.is_push_based());
        }
    }

    #[test]
    fn test_create_for_missing_backend() {
        for backend in BackendType::ALL {
            let compiled = available_backends().contains(&backend);
            assert_eq!(create_for(backend).is_some(), compiled);
        }
    }
}
