// SPDX-License-Identifier: MPL-2.0

//! Pipeline construction and appsink wiring

use super::slot::{Closed, FrameSlot};
use crate::backends::Frame;
use crate::constants::{pipeline, timing};
use crate::errors::{CaptureError, CaptureResult};
use gstreamer::prelude::*;
use gstreamer_app::AppSink;
use gstreamer_video::{VideoFormat, VideoInfo};
use std::sync::{Arc, OnceLock};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, error, info, warn};

static GST_INIT: OnceLock<Result<(), String>> = OnceLock::new();

/// Initialize GStreamer once per process
pub fn ensure_initialized() -> CaptureResult<()> {
    GST_INIT
        .get_or_init(|| {
            debug!("Initializing GStreamer");
            gstreamer::init().map_err(|e| e.to_string())
        })
        .clone()
        .map_err(|e| CaptureError::OpenFailure(format!("GStreamer init failed: {}", e)))
}

/// Parse a pipeline description and locate its appsink
pub fn build(description: &str) -> CaptureResult<(gstreamer::Pipeline, AppSink)> {
    let pipeline = gstreamer::parse::launch(description)
        .map_err(|e| CaptureError::NegotiationFailure(format!("Invalid pipeline: {}", e)))?
        .downcast::<gstreamer::Pipeline>()
        .map_err(|_| {
            CaptureError::NegotiationFailure("Description did not produce a pipeline".into())
        })?;

    let appsink = find_appsink(&pipeline).ok_or_else(|| {
        CaptureError::NegotiationFailure("Pipeline has no appsink".into())
    })?;
    convert_to_bgr(&pipeline, &appsink)?;

    Ok((pipeline, appsink))
}

/// Appsink named `sink`, or the first appsink anywhere in the pipeline
fn find_appsink(pipeline: &gstreamer::Pipeline) -> Option<AppSink> {
    if let Some(sink) = pipeline
        .by_name(pipeline::SINK_NAME)
        .and_then(|element| element.downcast::<AppSink>().ok())
    {
        return Some(sink);
    }
    pipeline
        .iterate_sinks()
        .into_iter()
        .filter_map(Result::ok)
        .find_map(|element| element.downcast::<AppSink>().ok())
}

fn linking_error(what: &str, e: impl std::fmt::Debug) -> CaptureError {
    CaptureError::NegotiationFailure(format!("{}: {:?}", what, e))
}

/// Restrict the appsink to BGR and put a `videoconvert` in front of it
///
/// Whatever raw format the pipeline produces is converted by GStreamer. An
/// appsink that is only linked once streaming starts (behind `decodebin`,
/// say) keeps the BGR caps and relies on upstream negotiation.
fn convert_to_bgr(pipeline: &gstreamer::Pipeline, appsink: &AppSink) -> CaptureResult<()> {
    appsink.set_caps(Some(
        &gstreamer_video::VideoCapsBuilder::new()
            .format(VideoFormat::Bgr)
            .build(),
    ));

    let sink_pad = appsink
        .static_pad("sink")
        .ok_or_else(|| CaptureError::NegotiationFailure("Appsink has no sink pad".into()))?;
    let Some(upstream) = sink_pad.peer() else {
        debug!("Appsink not linked yet, leaving conversion to caps negotiation");
        return Ok(());
    };

    let convert = gstreamer::ElementFactory::make("videoconvert")
        .build()
        .map_err(|e| linking_error("videoconvert unavailable", e))?;
    pipeline
        .add(&convert)
        .map_err(|e| linking_error("Failed to add videoconvert", e))?;
    let convert_sink = convert
        .static_pad("sink")
        .ok_or_else(|| CaptureError::NegotiationFailure("videoconvert has no sink pad".into()))?;

    upstream
        .unlink(&sink_pad)
        .map_err(|e| linking_error("Failed to unlink appsink", e))?;
    upstream
        .link(&convert_sink)
        .map_err(|e| linking_error("Failed to link videoconvert", e))?;
    convert
        .link(appsink)
        .map_err(|e| linking_error("Failed to link appsink", e))?;
    Ok(())
}

/// Configure the appsink to hand frames to `slot` without back-pressure
pub fn attach_sink(appsink: &AppSink, slot: Arc<FrameSlot>) {
    appsink.set_property("drop", true);
    appsink.set_property("max-buffers", pipeline::MAX_BUFFERS);
    appsink.set_property("enable-last-sample", false);

    let counter = AtomicU64::new(0);
    appsink.set_callbacks(
        gstreamer_app::AppSinkCallbacks::builder()
            .new_sample(move |appsink| {
                let frame_num = counter.fetch_add(1, Ordering::Relaxed);

                let sample = appsink.pull_sample().map_err(|e| {
                    debug!(error = ?e, "Failed to pull sample");
                    gstreamer::FlowError::Eos
                })?;

                let frame = sample_to_frame(&sample).map_err(|e| {
                    error!(frame = frame_num, error = %e, "Unusable sample");
                    gstreamer::FlowError::NotNegotiated
                })?;

                if frame_num % timing::FRAME_LOG_INTERVAL == 0 {
                    debug!(
                        frame = frame_num,
                        width = frame.width,
                        height = frame.height,
                        "Frame delivered"
                    );
                }

                if !slot.publish(frame) {
                    return Err(gstreamer::FlowError::Flushing);
                }
                Ok(gstreamer::FlowSuccess::Ok)
            })
            .build(),
    );
}

/// Copy one BGR appsink sample into an owned frame
pub fn sample_to_frame(sample: &gstreamer::Sample) -> Result<Frame, String> {
    let buffer = sample.buffer().ok_or("No buffer in sample")?;
    let caps = sample.caps().ok_or("No caps in sample")?;
    let info = VideoInfo::from_caps(caps).map_err(|e| format!("Bad video caps: {}", e))?;
    if info.format() != VideoFormat::Bgr {
        return Err(format!("Expected BGR samples, got {:?}", info.format()));
    }

    // Rows are padded to 4 bytes
    let stride = usize::try_from(info.stride()[0]).map_err(|_| "Negative stride".to_string())?;
    let map = buffer
        .map_readable()
        .map_err(|e| format!("Failed to map buffer: {}", e))?;
    let plane = map
        .as_slice()
        .get(info.offset()[0]..)
        .ok_or("Plane offset past end of buffer")?;

    Frame::from_bgr_rows(info.width(), info.height(), stride, plane)
        .ok_or_else(|| format!("Buffer of {} bytes is too small for {:?}", map.len(), caps))
}

/// Route end-of-stream and errors from the bus straight into the slot
///
/// The handler runs on whichever thread posts the message, so no main loop
/// has to be iterated for the slot to learn about them.
pub fn watch_bus(pipeline: &gstreamer::Pipeline, slot: Arc<FrameSlot>) -> CaptureResult<()> {
    let bus = pipeline
        .bus()
        .ok_or_else(|| CaptureError::NegotiationFailure("No bus on pipeline".into()))?;

    bus.set_sync_handler(move |_, msg| {
        use gstreamer::MessageView;

        match msg.view() {
            MessageView::Eos(..) => {
                info!("End of stream");
                slot.close(Closed::EndOfStream);
            }
            MessageView::Error(err) => {
                let source = err.src().map(|s| s.path_string().to_string());
                error!(
                    source = ?source,
                    error = %err.error(),
                    debug = ?err.debug(),
                    "Pipeline error"
                );
                slot.close(Closed::Error(err.error().to_string()));
            }
            MessageView::Warning(w) => {
                warn!(error = %w.error(), debug = ?w.debug(), "Pipeline warning");
            }
            _ => {}
        }
        gstreamer::BusSyncReply::Drop
    });
    Ok(())
}

/// Bring a pipeline to `Playing`, waiting for asynchronous state changes
pub fn start(pipeline: &gstreamer::Pipeline) -> CaptureResult<()> {
    pipeline
        .set_state(gstreamer::State::Playing)
        .map_err(|e| CaptureError::NegotiationFailure(format!("Failed to start pipeline: {}", e)))?;

    let (result, state, pending) = pipeline.state(gstreamer::ClockTime::from_seconds(
        timing::START_TIMEOUT_SECS,
    ));
    match result {
        Ok(success) => {
            debug!(?success, ?state, ?pending, "Pipeline started");
            Ok(())
        }
        Err(e) => Err(CaptureError::NegotiationFailure(format!(
            "Pipeline did not reach playing state: {}",
            e
        ))),
    }
}

/// Stop a pipeline and detach everything that refers to the frame slot
///
/// Setting `Null` joins the streaming threads, so no callback runs after
/// this returns.
pub fn stop(pipeline: &gstreamer::Pipeline, appsink: &AppSink) {
    if let Err(e) = pipeline.set_state(gstreamer::State::Null) {
        warn!(error = %e, "Failed to stop pipeline");
    }
    let (result, state, _) = pipeline.state(gstreamer::ClockTime::from_seconds(
        timing::STOP_TIMEOUT_SECS,
    ));
    match result {
        Ok(_) => debug!(?state, "Pipeline stopped"),
        Err(e) => debug!(error = ?e, ?state, "Pipeline state change had issues"),
    }

    appsink.set_callbacks(gstreamer_app::AppSinkCallbacks::builder().build());
    if let Some(bus) = pipeline.bus() {
        bus.unset_sync_handler();
    }
}
