// SPDX-License-Identifier: GPL-3.0-only

//! Single-frame handoff between a streaming thread and a reader
//!
//! The producer (a GStreamer streaming thread) publishes frames without ever
//! blocking; a newer frame replaces one the reader has not collected yet. The
//! reader blocks in [`FrameSlot::take`] until a frame is published or the
//! slot is closed. Each published frame is delivered at most once.

use crate::backends::{Frame, Interrupt};
use std::sync::{Condvar, Mutex, MutexGuard};
use std::time::Duration;
use tracing::debug;

/// Why a slot stopped delivering frames
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Closed {
    /// The source reached its end
    EndOfStream,
    /// The pipeline reported an error
    Error(String),
    /// The owning capture was released
    Released,
    /// A reader asked to stop waiting
    Interrupted,
}

/// Outcome of a [`FrameSlot::take`] that produced no frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TakeError {
    Closed(Closed),
    TimedOut,
}

#[derive(Debug, Default)]
struct SlotState {
    frame: Option<Frame>,
    closed: Option<Closed>,
    published: u64,
    overwritten: u64,
}

/// Frame slot shared between the producer callback and the reader
#[derive(Debug, Default)]
pub struct FrameSlot {
    state: Mutex<SlotState>,
    ready: Condvar,
}

impl FrameSlot {
    pub fn new() -> Self {
        Self::default()
    }

    // A poisoned lock only means a producer panicked mid-publish; the slot
    // contents are still a valid Option.
    fn lock(&self) -> MutexGuard<'_, SlotState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Store a frame, replacing any frame not yet taken
    ///
    /// Returns `false` when the slot is closed and the frame was discarded.
    pub fn publish(&self, frame: Frame) -> bool {
        let mut state = self.lock();
        if state.closed.is_some() {
            return false;
        }
        if state.frame.replace(frame).is_some() {
            state.overwritten += 1;
        }
        state.published += 1;
        drop(state);
        self.ready.notify_all();
        true
    }

    /// Wait for the next frame and take ownership of it
    ///
    /// With `timeout == None` this waits indefinitely. Once the slot is
    /// closed, takes never wait and always return the close reason.
    pub fn take(&self, timeout: Option<Duration>) -> Result<Frame, TakeError> {
        let state = self.lock();
        let waiting = |s: &mut SlotState| s.frame.is_none() && s.closed.is_none();

        let mut state = match timeout {
            None => self
                .ready
                .wait_while(state, waiting)
                .unwrap_or_else(|e| e.into_inner()),
            Some(timeout) => self
                .ready
                .wait_timeout_while(state, timeout, waiting)
                .map(|(guard, _)| guard)
                .unwrap_or_else(|e| e.into_inner().0),
        };

        if let Some(frame) = state.frame.take() {
            return Ok(frame);
        }
        match &state.closed {
            Some(reason) => Err(TakeError::Closed(reason.clone())),
            None => Err(TakeError::TimedOut),
        }
    }

    /// Stop accepting frames and wake every waiting reader
    ///
    /// The first reason wins. A frame not yet taken is dropped.
    pub fn close(&self, reason: Closed) {
        let mut state = self.lock();
        state.frame = None;
        if state.closed.is_none() {
            debug!(?reason, "Frame slot closed");
            state.closed = Some(reason);
        }
        drop(state);
        self.ready.notify_all();
    }

    /// Clear the frame, the close reason and the counters
    pub fn reset(&self) {
        *self.lock() = SlotState::default();
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed.is_some()
    }

    pub fn closed_reason(&self) -> Option<Closed> {
        self.lock().closed.clone()
    }

    /// Frames published since the last reset
    pub fn published(&self) -> u64 {
        self.lock().published
    }

    /// Frames replaced before a reader collected them
    pub fn overwritten(&self) -> u64 {
        self.lock().overwritten
    }
}

impl Interrupt for FrameSlot {
    fn interrupt(&self) {
        self.close(Closed::Interrupted);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;
    use std::time::Instant;

    fn frame(tag: u8) -> Frame {
        Frame::from_bgr(1, 1, vec![tag, tag, tag]).unwrap()
    }

    #[test]
    fn test_take_returns_published_frame() {
        let slot = FrameSlot::new();
        assert!(slot.publish(frame(1)));
        assert_eq!(slot.take(None).unwrap(), frame(1));
        assert_eq!(slot.published(), 1);
    }

    #[test]
    fn test_newer_frame_replaces_uncollected() {
        let slot = FrameSlot::new();
        slot.publish(frame(1));
        slot.publish(frame(2));
        slot.publish(frame(3));
        assert_eq!(slot.take(None).unwrap(), frame(3));
        assert_eq!(slot.overwritten(), 2);
    }

    #[test]
    fn test_frame_is_not_redelivered() {
        let slot = FrameSlot::new();
        slot.publish(frame(1));
        assert!(slot.take(Some(Duration::from_millis(10))).is_ok());
        assert_eq!(
            slot.take(Some(Duration::from_millis(20))),
            Err(TakeError::TimedOut)
        );
    }

    #[test]
    fn test_close_wakes_blocked_reader() {
        let slot = Arc::new(FrameSlot::new());
        let reader = {
            let slot = Arc::clone(&slot);
            thread::spawn(move || slot.take(None))
        };
        thread::sleep(Duration::from_millis(50));
        slot.close(Closed::EndOfStream);
        assert_eq!(
            reader.join().unwrap(),
            Err(TakeError::Closed(Closed::EndOfStream))
        );
    }

    #[test]
    fn test_publish_wakes_blocked_reader() {
        let slot = Arc::new(FrameSlot::new());
        let reader = {
            let slot = Arc::clone(&slot);
            thread::spawn(move || slot.take(Some(Duration::from_secs(5))))
        };
        thread::sleep(Duration::from_millis(50));
        slot.publish(frame(7));
        assert_eq!(reader.join().unwrap(), Ok(frame(7)));
    }

    #[test]
    fn test_first_close_reason_wins() {
        let slot = FrameSlot::new();
        slot.close(Closed::Error("decoder exploded".into()));
        slot.close(Closed::Released);
        assert_eq!(
            slot.closed_reason(),
            Some(Closed::Error("decoder exploded".into()))
        );
        assert!(!slot.publish(frame(1)));
        assert_eq!(slot.published(), 0);
    }

    #[test]
    fn test_closed_slot_fails_fast() {
        let slot = FrameSlot::new();
        slot.publish(frame(1));
        slot.close(Closed::Released);
        let started = Instant::now();
        assert_eq!(
            slot.take(None),
            Err(TakeError::Closed(Closed::Released))
        );
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn test_end_of_stream_drops_pending_frame() {
        let slot = FrameSlot::new();
        slot.publish(frame(4));
        slot.close(Closed::EndOfStream);
        for _ in 0..2 {
            assert_eq!(
                slot.take(None),
                Err(TakeError::Closed(Closed::EndOfStream))
            );
        }
    }

    #[test]
    fn test_interrupt_wakes_blocked_reader() {
        let slot = Arc::new(FrameSlot::new());
        let reader = {
            let slot = Arc::clone(&slot);
            thread::spawn(move || slot.take(None))
        };
        thread::sleep(Duration::from_millis(50));
        let handle: crate::backends::InterruptHandle = slot.clone();
        handle.interrupt();
        assert_eq!(
            reader.join().unwrap(),
            Err(TakeError::Closed(Closed::Interrupted))
        );
        assert!(!slot.publish(frame(1)));
    }

    #[test]
    fn test_reset_reopens_slot() {
        let slot = FrameSlot::new();
        slot.publish(frame(1));
        slot.close(Closed::EndOfStream);
        slot.reset();
        assert!(!slot.is_closed());
        assert_eq!(slot.published(), 0);
        assert!(slot.publish(frame(2)));
        assert_eq!(slot.take(None).unwrap(), frame(2));
    }

    #[test]
    fn test_concurrent_producer_never_blocks() {
        let slot = Arc::new(FrameSlot::new());
        let producer = {
            let slot = Arc::clone(&slot);
            thread::spawn(move || {
                for i in 0..1000u16 {
                    let [hi, lo] = i.to_be_bytes();
                    slot.publish(Frame::new(2, 1, 1, vec![hi, lo]).unwrap());
                }
                slot.close(Closed::EndOfStream);
            })
        };

        let mut received = 0u64;
        let mut last: Option<u16> = None;
        while let Ok(f) = slot.take(Some(Duration::from_secs(5))) {
            // Frames arrive in publish order even when some are skipped
            let seq = u16::from_be_bytes([f.data[0], f.data[1]]);
            if let Some(prev) = last {
                assert!(seq > prev, "frame {} after {}", seq, prev);
            }
            last = Some(seq);
            received += 1;
        }
        producer.join().unwrap();

        assert!(received <= 1000);
        assert_eq!(slot.published(), 1000);
        assert_eq!(
            slot.closed_reason(),
            Some(Closed::EndOfStream)
        );
    }
}
