use crate::frame::Frame;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::Notify;
use tracing::trace;

/// Capacity-one, latest-frame-wins handoff between the capture context and
/// the decode context.
///
/// The capture callback offers frames at device cadence; the decode worker
/// takes them when it is ready. An undelivered frame is replaced, not queued,
/// so memory use and end-to-end latency are bounded by construction.
pub struct FrameSlot {
    slot: Mutex<Option<Frame>>,
    notify: Notify,
    stats: SlotStats,
}

/// Handoff counters for monitoring capture/decode pacing.
#[derive(Debug, Default)]
pub struct SlotStats {
    /// Frames offered by the capture context.
    pub offered: AtomicU64,
    /// Frames taken by the decode context.
    pub delivered: AtomicU64,
    /// Frames replaced before delivery (decode was still busy).
    pub dropped: AtomicU64,
}

/// Snapshot of slot statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotStatsSnapshot {
    pub offered: u64,
    pub delivered: u64,
    pub dropped: u64,
}

impl FrameSlot {
    pub fn new() -> Self {
        Self {
            slot: Mutex::new(None),
            notify: Notify::new(),
            stats: SlotStats::default(),
        }
    }

    /// Offer a frame from the capture context. Replaces any frame the worker
    /// has not yet taken.
    pub fn offer(&self, frame: Frame) {
        let replaced = {
            let mut guard = self.slot.lock();
            guard.replace(frame).is_some()
        };
        self.stats.offered.fetch_add(1, Ordering::Relaxed);
        if replaced {
            self.stats.dropped.fetch_add(1, Ordering::Relaxed);
            trace!("Replaced undelivered frame (decode busy)");
        }
        self.notify.notify_one();
    }

    /// Await the next frame. Cancellation-safe: a frame that arrives while
    /// the future is dropped stays in the slot.
    pub async fn take(&self) -> Frame {
        loop {
            // Register interest before checking to avoid a missed wakeup.
            let notified = self.notify.notified();
            if let Some(frame) = self.slot.lock().take() {
                self.stats.delivered.fetch_add(1, Ordering::Relaxed);
                return frame;
            }
            notified.await;
        }
    }

    /// Take the pending frame without waiting, if any.
    pub fn try_take(&self) -> Option<Frame> {
        let frame = self.slot.lock().take();
        if frame.is_some() {
            self.stats.delivered.fetch_add(1, Ordering::Relaxed);
        }
        frame
    }

    /// Discard any pending frame.
    pub fn clear(&self) {
        self.slot.lock().take();
    }

    pub fn stats(&self) -> SlotStatsSnapshot {
        SlotStatsSnapshot {
            offered: self.stats.offered.load(Ordering::Relaxed),
            delivered: self.stats.delivered.load(Ordering::Relaxed),
            dropped: self.stats.dropped.load(Ordering::Relaxed),
        }
    }
}

impl Default for FrameSlot {
    fn default() -> Self {
        Self::new()
    }
}
