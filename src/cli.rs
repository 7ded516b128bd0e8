// SPDX-License-Identifier: GPL-3.0-only

//! Headless capture loop
//!
//! Reads frames without a display and reports progress, for servers, CI and
//! quick source checks.

use frame_capture::CaptureError;
use frame_capture::backends::CaptureBackend;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;
use tracing::{debug, info, warn};

pub struct HeadlessOptions {
    pub max_frames: Option<u64>,
    /// Print a progress line every N frames (0 = never)
    pub log_interval: u64,
}

/// Read frames until the source ends, the frame limit is hit or Ctrl+C
pub fn run_headless(
    capture: &mut dyn CaptureBackend,
    options: &HeadlessOptions,
) -> Result<u64, Box<dyn std::error::Error>> {
    // Ctrl+C stops the loop and wakes a read waiting on a pushed frame.
    // A second Ctrl+C exits even if a pull backend is stuck inside a read.
    let stop_flag = Arc::new(AtomicBool::new(false));
    let handler_flag = stop_flag.clone();
    let interrupt = capture.interrupt_handle();
    ctrlc::set_handler(move || {
        if handler_flag.swap(true, Ordering::SeqCst) {
            std::process::exit(130);
        }
        if let Some(interrupt) = &interrupt {
            interrupt.interrupt();
        }
    })?;

    println!("Reading frames... (press Ctrl+C to stop)");

    let start = Instant::now();
    let mut frames = 0u64;
    let mut last_size = None;

    loop {
        if stop_flag.load(Ordering::SeqCst) {
            println!();
            println!("Stopping early...");
            break;
        }
        if options.max_frames.is_some_and(|max| frames >= max) {
            break;
        }

        let frame = match capture.read() {
            Ok(frame) => frame,
            Err(e) if e.is_end_of_stream() => {
                info!(frames, "End of stream");
                break;
            }
            Err(CaptureError::Interrupted) => continue,
            Err(CaptureError::TimedOut) => {
                debug!(frames, "No frame yet");
                continue;
            }
            Err(e) => {
                warn!(frames, error = %e, "Capture stopped");
                break;
            }
        };
        frames += 1;

        let size = frame.dimensions();
        if last_size != Some(size) {
            if last_size.is_some() {
                warn!(width = size.0, height = size.1, "Frame size changed");
            }
            println!("Frame size: {}x{} ({} channels)", size.0, size.1, frame.channels);
            last_size = Some(size);
        }

        if options.log_interval > 0 && frames % options.log_interval == 0 {
            let elapsed = start.elapsed().as_secs_f64();
            println!(
                "Frames: {} ({:.1} fps)",
                frames,
                frames as f64 / elapsed.max(f64::EPSILON)
            );
        }
    }

    let elapsed = start.elapsed();
    println!(
        "Read {} frames in {:.2}s",
        frames,
        elapsed.as_secs_f64()
    );

    Ok(frames)
}
