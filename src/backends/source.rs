// SPDX-License-Identifier: GPL-3.0-only

//! Source descriptor heuristics
//!
//! A source descriptor is an opaque string. No structural validation happens
//! here; each backend only asks the questions it needs answered.

use crate::constants::{pipeline, source};

/// How the GStreamer backend turns a descriptor into a pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineKind {
    /// Descriptor is already a full pipeline description
    Verbatim,
    /// Network stream wrapped in an `rtspsrc` template
    Network,
    /// Local file wrapped in a `filesrc` template
    File,
}

/// Device index for a purely numeric descriptor
///
/// `"0"` opens camera 0; anything else (including the empty string) is a
/// path or URL.
pub fn device_index(descriptor: &str) -> Option<i32> {
    if descriptor.is_empty() || !descriptor.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    descriptor.parse().ok()
}

pub fn classify_pipeline(descriptor: &str) -> PipelineKind {
    if descriptor.contains(source::STAGE_SEPARATOR) {
        PipelineKind::Verbatim
    } else if descriptor.contains(source::NETWORK_HINT) {
        PipelineKind::Network
    } else {
        PipelineKind::File
    }
}

/// Runnable GStreamer pipeline description for a descriptor
pub fn pipeline_description(descriptor: &str) -> String {
    match classify_pipeline(descriptor) {
        PipelineKind::Verbatim => descriptor.to_string(),
        PipelineKind::Network => format!(
            "rtspsrc location=\"{}\" ! {}",
            descriptor,
            pipeline::decode_tail()
        ),
        PipelineKind::File => format!(
            "filesrc location=\"{}\" ! {}",
            descriptor,
            pipeline::decode_tail()
        ),
    }
}

/// Split a descriptor into an optional forced input format and the URL
///
/// `lavfi:testsrc=size=640x480` becomes `(Some("lavfi"), "testsrc=size=640x480")`.
pub fn ffmpeg_input(descriptor: &str) -> (Option<&'static str>, &str) {
    match descriptor.strip_prefix(source::LAVFI_PREFIX) {
        Some(graph) => (Some(source::LAVFI_FORMAT), graph),
        None => (None, descriptor),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_index() {
        assert_eq!(device_index("0"), Some(0));
        assert_eq!(device_index("12"), Some(12));
        assert_eq!(device_index(""), None);
        assert_eq!(device_index("/dev/video0"), None);
        assert_eq!(device_index("-1"), None);
        assert_eq!(device_index("/nonexistent/path"), None);
        // Too large for a device index: treated as a path
        assert_eq!(device_index("99999999999"), None);
    }

    #[test]
    fn test_classify_pipeline() {
        assert_eq!(
            classify_pipeline("videotestsrc ! appsink"),
            PipelineKind::Verbatim
        );
        assert_eq!(
            classify_pipeline("rtsp://camera.local/stream"),
            PipelineKind::Network
        );
        assert_eq!(classify_pipeline("/tmp/movie.mp4"), PipelineKind::File);
        // Separator wins over the protocol hint
        assert_eq!(
            classify_pipeline("rtspsrc location=rtsp://x ! fakesink"),
            PipelineKind::Verbatim
        );
    }

    #[test]
    fn test_pipeline_description_templates() {
        let verbatim = "videotestsrc num-buffers=1 ! appsink";
        assert_eq!(pipeline_description(verbatim), verbatim);

        let network = pipeline_description("rtsp://10.0.0.2/live");
        assert!(network.starts_with("rtspsrc location=\"rtsp://10.0.0.2/live\" ! decodebin"));
        assert!(network.ends_with("appsink name=sink"));

        let file = pipeline_description("/videos/clip.mkv");
        assert!(file.starts_with("filesrc location=\"/videos/clip.mkv\" ! decodebin"));
    }

    #[test]
    fn test_ffmpeg_input() {
        assert_eq!(
            ffmpeg_input("lavfi:testsrc=duration=1:size=640x480:rate=30"),
            (Some("lavfi"), "testsrc=duration=1:size=640x480:rate=30")
        );
        assert_eq!(ffmpeg_input("/tmp/a.mp4"), (None, "/tmp/a.mp4"));
        assert_eq!(ffmpeg_input(""), (None, ""));
    }
}
