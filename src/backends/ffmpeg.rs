// SPDX-License-Identifier: MPL-2.0

//! FFmpeg capture backend
//!
//! Demuxes the source with libavformat, decodes the first video stream and
//! converts each decoded picture to BGR24 with libswscale, all on the
//! caller's thread.

use super::{BackendType, CaptureBackend, Frame, SessionState, source};
use crate::constants::timing;
use crate::errors::{CaptureError, CaptureResult};
use ffmpeg_next as ffmpeg;
use ffmpeg::format::{self, Pixel};
use ffmpeg::software::scaling;
use ffmpeg::{Dictionary, Packet, codec, decoder, frame, media};
use std::ffi::CString;
use std::sync::OnceLock;
use tracing::{debug, info, warn};

static FFMPEG_INIT: OnceLock<Result<(), String>> = OnceLock::new();

fn ensure_initialized() -> CaptureResult<()> {
    FFMPEG_INIT
        .get_or_init(|| {
            debug!("Initializing FFmpeg");
            ffmpeg::init().map_err(|e| e.to_string())?;
            ffmpeg::device::register_all();
            ffmpeg::util::log::set_level(ffmpeg::util::log::Level::Error);
            Ok(())
        })
        .clone()
        .map_err(|e| CaptureError::OpenFailure(format!("FFmpeg init failed: {}", e)))
}

/// Demuxer registered under `name` (e.g. `lavfi`)
fn find_input_format(name: &str) -> Option<format::Input> {
    let name = CString::new(name).ok()?;
    // SAFETY: av_find_input_format returns a static demuxer description or null
    let ptr = unsafe { ffmpeg::ffi::av_find_input_format(name.as_ptr()) };
    if ptr.is_null() {
        return None;
    }
    // SAFETY: non-null pointer to a static AVInputFormat
    Some(unsafe { format::Input::wrap(ptr as *mut _) })
}

fn open_input(src: &str) -> CaptureResult<format::context::Input> {
    let (forced, url) = source::ffmpeg_input(src);
    let opened = match forced {
        Some(name) => {
            let input_format = find_input_format(name).ok_or_else(|| {
                CaptureError::OpenFailure(format!("Input format '{}' is not available", name))
            })?;
            format::open_with(
                &url,
                &format::format::Format::Input(input_format),
                Dictionary::new(),
            )
            .and_then(|context| match context {
                format::context::Context::Input(input) => Ok(input),
                format::context::Context::Output(_) => Err(ffmpeg::Error::InvalidData),
            })
        }
        None => format::input(&url),
    };
    opened.map_err(|e| CaptureError::OpenFailure(format!("{}: {}", src, e)))
}

/// Everything needed to turn packets into BGR frames
///
/// Fields drop in declaration order: scaler, output buffer, decode buffer,
/// decoder, demuxer.
struct Session {
    scaler: scaling::Context,
    converted: frame::Video,
    decoded: frame::Video,
    decoder: decoder::Video,
    input: format::context::Input,
    stream_index: usize,
    draining: bool,
}

// SAFETY: the libav contexts are owned by one session and only touched
// through `&mut FfmpegCapture`.
unsafe impl Send for Session {}

impl Session {
    fn open(src: &str) -> CaptureResult<Self> {
        let input = open_input(src)?;

        let stream = input
            .streams()
            .find(|stream| stream.parameters().medium() == media::Type::Video)
            .ok_or_else(|| CaptureError::NegotiationFailure("No video stream found".into()))?;
        let stream_index = stream.index();
        let parameters = stream.parameters();
        let codec_id = parameters.id();

        if decoder::find(codec_id).is_none() {
            return Err(CaptureError::NegotiationFailure(format!(
                "Unsupported codec {:?}",
                codec_id
            )));
        }
        let decoder = codec::context::Context::from_parameters(parameters)
            .and_then(|context| context.decoder().video())
            .map_err(|e| {
                CaptureError::NegotiationFailure(format!("Failed to open decoder: {}", e))
            })?;

        let (width, height) = (decoder.width(), decoder.height());
        if width == 0 || height == 0 {
            return Err(CaptureError::AllocationFailure(format!(
                "Stream reports an empty frame size {}x{}",
                width, height
            )));
        }

        let scaler = create_scaler(decoder.format(), width, height)?;
        let converted = frame::Video::new(Pixel::BGR24, width, height);

        info!(
            stream = stream_index,
            codec = ?codec_id,
            width,
            height,
            pixel_format = ?decoder.format(),
            "Video stream selected"
        );

        Ok(Self {
            scaler,
            converted,
            decoded: frame::Video::empty(),
            decoder,
            input,
            stream_index,
            draining: false,
        })
    }

    /// Decode until one picture is available or the demuxer runs dry
    fn next_frame(&mut self) -> CaptureResult<Frame> {
        loop {
            match self.decoder.receive_frame(&mut self.decoded) {
                Ok(()) => return self.convert(),
                Err(ffmpeg::Error::Other { errno }) if errno == ffmpeg::util::error::EAGAIN => {}
                Err(ffmpeg::Error::Eof) => return Err(CaptureError::EndOfStream),
                Err(e) => warn!(error = %e, "Failed to receive decoded frame"),
            }

            if self.draining {
                return Err(CaptureError::EndOfStream);
            }

            let mut packet = Packet::empty();
            match packet.read(&mut self.input) {
                Ok(()) => {
                    if packet.stream() != self.stream_index {
                        continue;
                    }
                    if let Err(e) = self.decoder.send_packet(&packet) {
                        warn!(error = %e, "Failed to decode packet");
                    }
                }
                Err(ffmpeg::Error::Eof) => {
                    debug!("Demuxer reached end of input, draining decoder");
                    self.draining = true;
                    if let Err(e) = self.decoder.send_eof() {
                        debug!(error = %e, "Decoder refused end of stream");
                        return Err(CaptureError::EndOfStream);
                    }
                }
                Err(e) => {
                    return Err(CaptureError::DecodeFailure(format!(
                        "Failed to read packet: {}",
                        e
                    )));
                }
            }
        }
    }

    /// Scale the decoded picture into the BGR buffer and copy it out
    fn convert(&mut self) -> CaptureResult<Frame> {
        let (format, width, height) = (
            self.decoded.format(),
            self.decoded.width(),
            self.decoded.height(),
        );
        let input = self.scaler.input();
        if input.format != format || input.width != width || input.height != height {
            debug!(?format, width, height, "Decoded picture changed, rebuilding scaler");
            self.scaler = create_scaler(format, width, height)?;
            self.converted = frame::Video::new(Pixel::BGR24, width, height);
        }

        self.scaler
            .run(&self.decoded, &mut self.converted)
            .map_err(|e| CaptureError::DecodeFailure(format!("Scaling failed: {}", e)))?;

        Frame::from_bgr_rows(width, height, self.converted.stride(0), self.converted.data(0))
            .ok_or_else(|| CaptureError::DecodeFailure("Short BGR buffer".into()))
    }
}

fn create_scaler(format: Pixel, width: u32, height: u32) -> CaptureResult<scaling::Context> {
    scaling::Context::get(
        format,
        width,
        height,
        Pixel::BGR24,
        width,
        height,
        scaling::Flags::BILINEAR,
    )
    .map_err(|e| {
        CaptureError::AllocationFailure(format!("No converter from {:?} to BGR24: {}", format, e))
    })
}

/// Capture through libavformat/libavcodec/libswscale
pub struct FfmpegCapture {
    session: Option<Session>,
    state: SessionState,
    frames_read: u64,
}

impl FfmpegCapture {
    pub fn new() -> Self {
        Self {
            session: None,
            state: SessionState::Uninitialized,
            frames_read: 0,
        }
    }
}

impl Default for FfmpegCapture {
    fn default() -> Self {
        Self::new()
    }
}

impl CaptureBackend for FfmpegCapture {
    fn open(&mut self, source: &str) -> CaptureResult<()> {
        self.release();
        self.frames_read = 0;
        info!(source, "Opening FFmpeg source");

        let opened = ensure_initialized().and_then(|()| Session::open(source));
        match opened {
            Ok(session) => {
                self.session = Some(session);
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
        let session = match (&mut self.session, self.state) {
            (Some(session), SessionState::Ready) => session,
            (_, state) => return Err(CaptureError::InvalidState(state)),
        };

        let frame = session.next_frame()?;
        self.frames_read += 1;
        if self.frames_read % timing::FRAME_LOG_INTERVAL == 0 {
            debug!(frames = self.frames_read, "FFmpeg read progress");
        }
        Ok(frame)
    }

    fn release(&mut self) {
        if self.session.take().is_some() {
            info!(frames = self.frames_read, "Released FFmpeg session");
        }
        self.state = SessionState::Released;
    }

    fn state(&self) -> SessionState {
        self.state
    }

    fn backend_type(&self) -> BackendType {
        BackendType::Ffmpeg
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_is_open_failure() {
        let mut capture = FfmpegCapture::new();
        let result = capture.open("/nonexistent/path/video.mp4");
        assert!(matches!(result, Err(CaptureError::OpenFailure(_))));
        assert_eq!(capture.state(), SessionState::Failed);
    }

    #[test]
    fn test_lavfi_format_lookup() {
        ensure_initialized().unwrap();
        assert!(find_input_format("definitely-not-a-demuxer").is_none());
    }
}
