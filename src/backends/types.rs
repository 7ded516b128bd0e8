// SPDX-License-Identifier: GPL-3.0-only
// Shared types for capture backends

//! Shared types for capture backends

use serde::{Deserialize, Serialize};

/// Capture backend type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendType {
    /// OpenCV `videoio`: one synchronous library call per frame
    OpenCv,
    /// FFmpeg demux → decode → swscale pipeline driven by the caller
    Ffmpeg,
    /// GStreamer pipeline delivering frames from its own streaming thread
    GStreamer,
}

impl BackendType {
    pub const ALL: [BackendType; 3] = [
        BackendType::OpenCv,
        BackendType::Ffmpeg,
        BackendType::GStreamer,
    ];

    /// Name of the Cargo feature that compiles this backend in
    pub fn feature_name(&self) -> &'static str {
        match self {
            BackendType::OpenCv => "opencv",
            BackendType::Ffmpeg => "ffmpeg",
            BackendType::GStreamer => "gstreamer",
        }
    }

    /// Whether frames are produced on a thread owned by the media library
    pub fn is_push_based(&self) -> bool {
        matches!(self, BackendType::GStreamer)
    }
}

impl std::fmt::Display for BackendType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BackendType::OpenCv => write!(f, "OpenCV"),
            BackendType::Ffmpeg => write!(f, "FFmpeg"),
            BackendType::GStreamer => write!(f, "GStreamer"),
        }
    }
}

impl std::str::FromStr for BackendType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lowered = s.trim().to_ascii_lowercase();
        BackendType::ALL
            .into_iter()
            .find(|b| b.feature_name() == lowered)
            .ok_or_else(|| format!("Unknown backend: {}", s))
    }
}

/// Lifecycle of one capture instance
///
/// `Failed` and `Released` behave like `Uninitialized` for retry purposes:
/// `initialize` may be called again from any state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SessionState {
    #[default]
    Uninitialized,
    Ready,
    Failed,
    Released,
}

impl SessionState {
    pub fn is_ready(&self) -> bool {
        matches!(self, SessionState::Ready)
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionState::Uninitialized => write!(f, "uninitialized"),
            SessionState::Ready => write!(f, "ready"),
            SessionState::Failed => write!(f, "failed"),
            SessionState::Released => write!(f, "released"),
        }
    }
}

/// A decoded frame owned by the caller
///
/// Rows are tightly packed (`stride == width * channels`). Three-channel
/// frames are in BGR byte order, single-channel frames are grayscale.
/// `Clone` is a deep copy, so a frame never aliases backend buffers.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Frame {
    pub width: u32,
    pub height: u32,
    pub channels: u32,
    pub data: Vec<u8>,
}

impl Frame {
    /// Create a frame, checking that `data` holds exactly one image
    pub fn new(width: u32, height: u32, channels: u32, data: Vec<u8>) -> Option<Self> {
        let expected = width as usize * height as usize * channels as usize;
        if data.len() != expected {
            return None;
        }
        Some(Self {
            width,
            height,
            channels,
            data,
        })
    }

    /// Create a 3-channel BGR frame
    pub fn from_bgr(width: u32, height: u32, data: Vec<u8>) -> Option<Self> {
        Self::new(width, height, 3, data)
    }

    /// Copy a BGR image out of a buffer whose rows are `stride` bytes apart
    ///
    /// `data` may start with an offset already applied and may end with a
    /// short final row, as mapped decoder buffers often do.
    pub fn from_bgr_rows(width: u32, height: u32, stride: usize, data: &[u8]) -> Option<Self> {
        let row_bytes = width as usize * 3;
        if stride < row_bytes || height == 0 {
            return None;
        }
        let needed = stride * (height as usize - 1) + row_bytes;
        let data = data.get(..needed)?;

        let mut packed = Vec::with_capacity(row_bytes * height as usize);
        for row in data.chunks(stride) {
            packed.extend_from_slice(&row[..row_bytes]);
        }
        Self::from_bgr(width, height, packed)
    }

    /// The empty frame returned alongside a failed read
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0 || self.data.is_empty()
    }

    /// Bytes per row
    pub fn stride(&self) -> usize {
        self.width as usize * self.channels as usize
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Bytes of the pixel at (x, y), or `None` when out of bounds
    pub fn pixel(&self, x: u32, y: u32) -> Option<&[u8]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let channels = self.channels as usize;
        let start = y as usize * self.stride() + x as usize * channels;
        self.data.get(start..start + channels)
    }

    /// Pixel at (x, y) as RGB, clamping coordinates into the frame
    pub fn rgb_at(&self, x: u32, y: u32) -> (u8, u8, u8) {
        if self.is_empty() {
            return (0, 0, 0);
        }
        let x = x.min(self.width - 1);
        let y = y.min(self.height - 1);
        match self.pixel(x, y) {
            Some([b, g, r]) => (*r, *g, *b),
            Some([b, g, r, _]) => (*r, *g, *b),
            Some([v]) => (*v, *v, *v),
            _ => (0, 0, 0),
        }
    }

    /// Convert to an RGB image for saving
    pub fn to_rgb_image(&self) -> Option<image::RgbImage> {
        if self.is_empty() {
            return None;
        }
        let mut rgb = Vec::with_capacity(self.width as usize * self.height as usize * 3);
        for y in 0..self.height {
            for x in 0..self.width {
                let (r, g, b) = self.rgb_at(x, y);
                rgb.extend_from_slice(&[r, g, b]);
            }
        }
        image::RgbImage::from_raw(self.width, self.height, rgb)
    }
}

impl std::fmt::Debug for Frame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Frame({}x{}x{}, {} bytes)",
            self.width,
            self.height,
            self.channels,
            self.data.len()
        )
    }
}
