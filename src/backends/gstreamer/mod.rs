// SPDX-License-Identifier: MPL-2.0

//! GStreamer capture backend
//!
//! Frames are produced on GStreamer's streaming thread by the appsink
//! `new_sample` callback and handed to the reading thread through a
//! [`FrameSlot`]:
//!
//! ```text
//! streaming thread                      caller thread
//! ────────────────                      ─────────────
//! appsink new_sample                    GstCapture::read
//!   → convert to BGR                      → FrameSlot::take (blocks)
//!   → FrameSlot::publish ──── notify ──→  ← frame
//!
//! bus sync handler
//!   EOS / error → FrameSlot::close ─────→ ← Err(EndOfStream / StreamFailure)
//! ```

pub mod pipeline;
pub mod slot;

pub use slot::{Closed, FrameSlot, TakeError};

use super::{BackendType, CaptureBackend, Frame, InterruptHandle, SessionState, source};
use crate::constants::timing;
use crate::errors::{CaptureError, CaptureResult};
use gstreamer_app::AppSink;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// A running pipeline and the appsink feeding the slot
struct Session {
    pipeline: gstreamer::Pipeline,
    appsink: AppSink,
}

impl Session {
    fn shutdown(self) {
        pipeline::stop(&self.pipeline, &self.appsink);
    }
}

/// Capture through a GStreamer pipeline ending in an appsink
pub struct GstCapture {
    session: Option<Session>,
    slot: Arc<FrameSlot>,
    state: SessionState,
    read_timeout: Option<Duration>,
    frames_read: u64,
}

impl GstCapture {
    pub fn new() -> Self {
        Self {
            session: None,
            slot: Arc::new(FrameSlot::new()),
            state: SessionState::Uninitialized,
            read_timeout: None,
            frames_read: 0,
        }
    }

    /// Shared handle to the frame slot
    pub fn slot(&self) -> Arc<FrameSlot> {
        Arc::clone(&self.slot)
    }

    fn start_session(&mut self, description: &str) -> CaptureResult<Session> {
        pipeline::ensure_initialized()?;

        let (gst_pipeline, appsink) = pipeline::build(description)?;
        pipeline::attach_sink(&appsink, Arc::clone(&self.slot));
        let session = Session {
            pipeline: gst_pipeline,
            appsink,
        };

        let started = pipeline::watch_bus(&session.pipeline, Arc::clone(&self.slot))
            .and_then(|()| pipeline::start(&session.pipeline));
        match started {
            Ok(()) => Ok(session),
            Err(e) => {
                session.shutdown();
                Err(e)
            }
        }
    }
}

impl Default for GstCapture {
    fn default() -> Self {
        Self::new()
    }
}

impl CaptureBackend for GstCapture {
    fn open(&mut self, source: &str) -> CaptureResult<()> {
        self.release();
        self.slot.reset();
        self.frames_read = 0;

        let description = source::pipeline_description(source);
        info!(source, pipeline = %description, "Opening GStreamer source");

        match self.start_session(&description) {
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

    /// Wait for the next frame from the appsink
    ///
    /// Once the bus reports end-of-stream every read fails at once, and a
    /// frame still waiting in the slot at that point is discarded. A pipeline
    /// error moves the capture to `Failed`.
    fn read(&mut self) -> CaptureResult<Frame> {
        if !self.state.is_ready() {
            return Err(CaptureError::InvalidState(self.state));
        }

        let frame = match self.slot.take(self.read_timeout) {
            Ok(frame) => frame,
            Err(TakeError::Closed(Closed::EndOfStream)) => return Err(CaptureError::EndOfStream),
            Err(TakeError::Closed(Closed::Error(msg))) => {
                self.state = SessionState::Failed;
                return Err(CaptureError::StreamFailure(msg));
            }
            Err(TakeError::Closed(Closed::Released)) => {
                return Err(CaptureError::InvalidState(SessionState::Released));
            }
            Err(TakeError::Closed(Closed::Interrupted)) => return Err(CaptureError::Interrupted),
            Err(TakeError::TimedOut) => return Err(CaptureError::TimedOut),
        };

        if frame.is_empty() {
            return Err(CaptureError::DecodeFailure("Empty frame".into()));
        }

        self.frames_read += 1;
        if self.frames_read % timing::FRAME_LOG_INTERVAL == 0 {
            debug!(
                frames = self.frames_read,
                dropped = self.slot.overwritten(),
                "GStreamer read progress"
            );
        }
        Ok(frame)
    }

    fn release(&mut self) {
        self.slot.close(Closed::Released);
        if let Some(session) = self.session.take() {
            info!(frames = self.frames_read, "Releasing GStreamer pipeline");
            session.shutdown();
        }
        self.state = SessionState::Released;
    }

    fn state(&self) -> SessionState {
        self.state
    }

    fn backend_type(&self) -> BackendType {
        BackendType::GStreamer
    }

    fn set_read_timeout(&mut self, timeout: Option<Duration>) {
        self.read_timeout = timeout;
    }

    fn interrupt_handle(&self) -> Option<InterruptHandle> {
        let handle: InterruptHandle = self.slot();
        Some(handle)
    }
}

impl Drop for GstCapture {
    fn drop(&mut self) {
        self.release();
    }
}
