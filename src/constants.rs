// SPDX-License-Identifier: GPL-3.0-only

//! Application-wide constants

/// Source opened when none is given on the command line or in the config
pub const DEFAULT_SOURCE: &str =
    "http://47.51.131.147/-wvhttp-01-/GetOneShot?image_size=1280x720&frame_count=1000000000";

/// Source descriptor conventions
pub mod source {
    /// A descriptor containing this token is a complete GStreamer pipeline
    pub const STAGE_SEPARATOR: char = '!';

    /// Substring marking a network stream for the GStreamer templates
    pub const NETWORK_HINT: &str = "rtsp";

    /// Prefix selecting FFmpeg's libavfilter virtual input (e.g. `lavfi:testsrc`)
    pub const LAVFI_PREFIX: &str = "lavfi:";

    /// Input format name used for `LAVFI_PREFIX` descriptors
    pub const LAVFI_FORMAT: &str = "lavfi";
}

/// GStreamer pipeline constants
pub mod pipeline {
    /// Name given to the appsink in generated pipelines
    pub const SINK_NAME: &str = "sink";

    /// Raw format requested from `videoconvert` in generated pipelines
    pub const SINK_FORMAT: &str = "NV12";

    /// Maximum buffer queue size on the appsink (one frame in flight)
    pub const MAX_BUFFERS: u32 = 1;

    /// Decode → convert → appsink tail appended to generated pipelines
    pub fn decode_tail() -> String {
        format!(
            "decodebin ! videoconvert ! video/x-raw,format={} ! appsink name={}",
            SINK_FORMAT, SINK_NAME
        )
    }
}

/// Timing constants
pub mod timing {
    /// Frame counter modulo for periodic logging
    pub const FRAME_LOG_INTERVAL: u64 = 30;

    /// Pipeline state change timeout on stop
    pub const STOP_TIMEOUT_SECS: u64 = 2;

    /// Pipeline playing state timeout on start
    pub const START_TIMEOUT_SECS: u64 = 5;

    /// Key polling interval between displayed frames
    pub const DEFAULT_POLL_INTERVAL_MS: u64 = 10;

    /// Read wait in the viewer when no read timeout is configured
    pub const VIEWER_READ_TIMEOUT_MS: u64 = 100;
}

/// Snapshot output
pub mod snapshot {
    /// Directory used when no snapshot directory is configured
    pub const DEFAULT_DIR: &str = "snapshots";

    /// File name prefix for saved frames
    pub const FILE_PREFIX: &str = "FRAME_";
}
