// SPDX-License-Identifier: MPL-2.0

//! Frame Capture - uniform video frame capture over interchangeable backends
//!
//! This library opens a camera, file, network stream or pipeline description
//! and returns decoded frames as owned BGR buffers, through one interface
//! implemented by an OpenCV, an FFmpeg or a GStreamer backend chosen at build
//! time.
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - [`backends`]: Capture interface, backend factory and implementations
//! - [`config`]: User configuration handling
//! - [`terminal`]: Terminal frame viewer
//!
//! # Example
//!
//! ```no_run
//! let mut capture = frame_capture::backends::create();
//! if capture.initialize("0") {
//!     while let Some(frame) = capture.read_frame() {
//!         println!("{}x{}", frame.width, frame.height);
//!     }
//! }
//! capture.release();
//! ```

pub mod backends;
pub mod config;
pub mod constants;
pub mod errors;
pub mod terminal;

// Re-export commonly used types
pub use backends::{BackendType, CaptureBackend, Frame, SessionState};
pub use config::Config;
pub use errors::{AppError, CaptureError, CaptureResult};
