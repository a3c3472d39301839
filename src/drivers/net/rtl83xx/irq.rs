//! Interrupt to poll-task message passing.
//!
//! The interrupt handler only reads and acknowledges status, then posts work here. Poll
//! tasks pick it up in priority order: overrun recovery, notifications, then RX rings.

use core::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use super::profile::IrqStatus;

/// Deferred work posted by the interrupt handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollTask {
    /// Resynchronize the RX rings in the bitmap after a buffer runout.
    Recover { rings: u32 },
    /// Drain the notification ring.
    Notify,
    /// Drain one RX ring.
    Rx { ring: usize },
}

/// Interrupt state of one RX ring.
#[cfg(test)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RingIrqState {
    /// RX done interrupt unmasked.
    Armed,
    /// Interrupt masked, poll pass queued.
    Scheduled,
    /// A poll pass is running.
    Draining,
}

/// Bitmap bit of `ring`; rings past 31 have none.
#[inline]
fn ring_bit(ring: usize) -> u32 {
    u32::try_from(ring)
        .ok()
        .and_then(|ring| 1u32.checked_shl(ring))
        .unwrap_or(0)
}

#[derive(Debug, Default)]
pub struct IrqCoordinator {
    rx_pending: AtomicU32,
    draining: AtomicU32,
    runout_pending: AtomicU32,
    notify_pending: AtomicBool,
}

impl IrqCoordinator {
    pub const fn new() -> Self {
        Self {
            rx_pending: AtomicU32::new(0),
            draining: AtomicU32::new(0),
            runout_pending: AtomicU32::new(0),
            notify_pending: AtomicBool::new(false),
        }
    }

    /// Queue the work an acknowledged status asks for.
    pub fn post(&self, status: &IrqStatus) {
        if status.rx_done != 0 {
            self.rx_pending.fetch_or(status.rx_done, Ordering::AcqRel);
        }
        if status.runout != 0 {
            self.runout_pending.fetch_or(status.runout, Ordering::AcqRel);
        }
        if !status.notify.is_empty() {
            self.notify_pending.store(true, Ordering::Release);
        }
    }

    /// Take the most urgent queued task.
    pub fn next_task(&self) -> Option<PollTask> {
        let rings = self.runout_pending.swap(0, Ordering::AcqRel);
        if rings != 0 {
            return Some(PollTask::Recover { rings });
        }
        if self.notify_pending.swap(false, Ordering::AcqRel) {
            return Some(PollTask::Notify);
        }
        loop {
            let pending = self.rx_pending.load(Ordering::Acquire);
            if pending == 0 {
                return None;
            }
            let bit = pending & pending.wrapping_neg();
            if self
                .rx_pending
                .compare_exchange(pending, pending & !bit, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
            {
                self.draining.fetch_or(bit, Ordering::AcqRel);
                return Some(PollTask::Rx {
                    ring: bit.trailing_zeros() as usize,
                });
            }
        }
    }

    /// The ring caught up; its interrupt is unmasked again.
    pub fn rearm(&self, ring: usize) {
        self.draining.fetch_and(!ring_bit(ring), Ordering::AcqRel);
    }

    /// The ring used its whole budget and needs another pass.
    pub fn reschedule(&self, ring: usize) {
        let bit = ring_bit(ring);
        self.draining.fetch_and(!bit, Ordering::AcqRel);
        self.rx_pending.fetch_or(bit, Ordering::AcqRel);
    }

    #[cfg(test)]
    pub fn ring_state(&self, ring: usize) -> RingIrqState {
        let bit = ring_bit(ring);
        if self.draining.load(Ordering::Acquire) & bit != 0 {
            RingIrqState::Draining
        } else if self.rx_pending.load(Ordering::Acquire) & bit != 0 {
            RingIrqState::Scheduled
        } else {
            RingIrqState::Armed
        }
    }

    pub fn has_work(&self) -> bool {
        self.rx_pending.load(Ordering::Acquire) != 0
            || self.runout_pending.load(Ordering::Acquire) != 0
            || self.notify_pending.load(Ordering::Acquire)
    }

    /// Drop all queued work, used when the device stops.
    pub fn reset(&self) {
        self.rx_pending.store(0, Ordering::Release);
        self.draining.store(0, Ordering::Release);
        self.runout_pending.store(0, Ordering::Release);
        self.notify_pending.store(false, Ordering::Release);
    }
}
