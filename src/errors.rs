// SPDX-License-Identifier: MPL-2.0

//! Error types for frame capture

use crate::backends::SessionState;
use std::fmt;

/// Result type for capture backend operations
pub type CaptureResult<T> = Result<T, CaptureError>;

/// Failure kinds reported at the capture interface boundary
///
/// Library-specific errors (OpenCV, FFmpeg, GStreamer) are translated into
/// one of these kinds inside each backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureError {
    /// Source could not be opened or resolved
    OpenFailure(String),
    /// No usable video stream, unsupported codec, or malformed pipeline
    NegotiationFailure(String),
    /// A decode, scale or conversion resource could not be allocated
    AllocationFailure(String),
    /// Transient decode failure; the next read may succeed
    DecodeFailure(String),
    /// No frame arrived within the read timeout
    TimedOut,
    /// The source failed while streaming; the session cannot continue
    StreamFailure(String),
    /// A blocked read was cancelled through an [`InterruptHandle`](crate::backends::InterruptHandle)
    Interrupted,
    /// The source has no more frames
    EndOfStream,
    /// Operation called outside the `Ready` state
    InvalidState(SessionState),
}

impl CaptureError {
    /// Whether retrying the same read is sensible
    pub fn is_transient(&self) -> bool {
        matches!(self, CaptureError::DecodeFailure(_) | CaptureError::TimedOut)
    }

    pub fn is_end_of_stream(&self) -> bool {
        matches!(self, CaptureError::EndOfStream)
    }
}

impl fmt::Display for CaptureError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CaptureError::OpenFailure(msg) => write!(f, "Could not open source: {}", msg),
            CaptureError::NegotiationFailure(msg) => write!(f, "Negotiation failed: {}", msg),
            CaptureError::AllocationFailure(msg) => write!(f, "Allocation failed: {}", msg),
            CaptureError::DecodeFailure(msg) => write!(f, "Decode failed: {}", msg),
            CaptureError::TimedOut => write!(f, "Timed out waiting for a frame"),
            CaptureError::StreamFailure(msg) => write!(f, "Stream failed: {}", msg),
            CaptureError::Interrupted => write!(f, "Read interrupted"),
            CaptureError::EndOfStream => write!(f, "End of stream"),
            CaptureError::InvalidState(state) => {
                write!(f, "Capture is not ready (state: {})", state)
            }
        }
    }
}

impl std::error::Error for CaptureError {}

/// Top-level error for the capture application
#[derive(Debug)]
pub enum AppError {
    /// Capture backend errors
    Capture(CaptureError),
    /// Configuration file errors
    Config(String),
    /// Terminal, snapshot or other I/O errors
    Io(std::io::Error),
    /// Generic error with message
    Other(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Capture(e) => write!(f, "Capture error: {}", e),
            AppError::Config(msg) => write!(f, "Configuration error: {}", msg),
            AppError::Io(e) => write!(f, "I/O error: {}", e),
            AppError::Other(msg) => write!(f, "{}", msg),
        }
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AppError::Capture(e) => Some(e),
            AppError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<CaptureError> for AppError {
    fn from(err: CaptureError) -> Self {
        AppError::Capture(err)
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Io(err)
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Config(err.to_string())
    }
}

impl From<image::ImageError> for AppError {
    fn from(err: image::ImageError) -> Self {
        AppError::Other(format!("Failed to write image: {}", err))
    }
}

impl From<String> for AppError {
    fn from(msg: String) -> Self {
        AppError::Other(msg)
    }
}

impl From<&str> for AppError {
    fn from(msg: &str) -> Self {
        AppError::Other(msg.to_string())
    }
}
