//! Transmit path: ring selection, tagging and handoff of one frame.

use core::sync::atomic::{AtomicU8, Ordering};

use super::common::RegisterIo;
use super::device::NicStats;
use super::kernel_func::KernelFunc;
use super::pool::{BufferPool, RingKind};
use super::profile::{CpuTag, RegisterProfile, TxQueuePolicy};
use super::ring::DescriptorRing;
use crate::config::{ETH_FCS_LEN, RING_BUFFER};
use crate::{NicError, NicResult};

/// Per-frame transmit options.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TxRequest {
    /// Switch port to send out of; `None` lets the switch forward the frame.
    pub dest_port: Option<u32>,
    /// Socket priority of the frame.
    pub priority: Option<u32>,
    /// VLAN to insert, where the switch supports it.
    pub vlan: Option<u16>,
}

/// Pick the TX ring for a frame of `priority`.
pub(crate) fn pick_ring(
    policy: TxQueuePolicy,
    rings: usize,
    priority: Option<u32>,
    rr: &AtomicU8,
) -> usize {
    match policy {
        TxQueuePolicy::RoundRobin => {
            let last = rr.fetch_add(1, Ordering::Relaxed).wrapping_add(1);
            last as usize % rings
        }
        TxQueuePolicy::Priority { threshold } => {
            if priority.unwrap_or(0) >= threshold {
                1
            } else {
                0
            }
        }
    }
}

/// Destination port of a trailer-tagged frame, if `frame` ends in one.
pub(crate) fn dsa_dest_port(frame: &[u8], cpu_port: u32) -> Option<u32> {
    match frame {
        [.., 0x80, port, 0x10, 0x00] if (*port as u32) < cpu_port => Some(*port as u32),
        _ => None,
    }
}

/// Shared state a transmit works on.
pub(crate) struct TxPath<'a, K: KernelFunc> {
    pub io: &'a dyn RegisterIo,
    pub profile: &'a dyn RegisterProfile,
    pub pool: &'a mut BufferPool<K>,
    pub stats: &'a mut NicStats,
    pub dsa: bool,
}

impl<K: KernelFunc> TxPath<'_, K> {
    /// Queue `frame` on `ring` and kick the switch.
    ///
    /// Fails with [`NicError::Busy`] only when the switch still owns the slot under the
    /// cursor; the frame is not consumed then.
    pub fn transmit(
        &mut self,
        ring: &mut DescriptorRing,
        frame: &[u8],
        request: &TxRequest,
    ) -> NicResult {
        let mut dest_port = request.dest_port;
        let mut payload = frame;
        if self.dsa {
            if let Some(port) = dsa_dest_port(frame, self.profile.cpu_port()) {
                dest_port = Some(port);
                payload = &frame[..frame.len() - 4];
            }
        }
        if payload.is_empty() {
            return Err(NicError::InvalidParameter("empty frame"));
        }
        let len = payload.len() + ETH_FCS_LEN;
        if len > RING_BUFFER {
            return Err(NicError::InvalidParameter("frame exceeds ring buffer"));
        }

        let q = ring.index();
        let slot = ring.cursor();
        let Some(mut hdr) = ring.acquire_if_owned(self.pool, slot) else {
            warn!("[rtl83xx] TX ring {q} slot {slot} is owned by the switch");
            self.stats.tx_busy += 1;
            return Err(NicError::Busy);
        };

        hdr.size = len as u16;
        hdr.len = self.profile.tx_encoded_len(len as u16);
        hdr.cpu_tag = CpuTag::default();
        if let Some(port) = dest_port {
            let prio = request.priority.map(|p| p >> 1);
            self.profile.encode_tx_tag(&mut hdr.cpu_tag, port, prio);
            if let Some(vid) = request.vlan {
                if !self.profile.set_tx_vlan(&mut hdr.cpu_tag, vid) {
                    debug!("[rtl83xx] VLAN insertion unsupported, sending untagged");
                }
            }
        }
        self.pool.set_header(RingKind::Tx, q, slot, &hdr);
        self.pool.write_buffer(RingKind::Tx, q, slot, payload, ETH_FCS_LEN);

        ring.hand_to_hardware_for_tx(self.pool, slot);
        self.profile.pre_kick(self.io);
        self.profile.kick_tx(self.io, q);
        ring.advance();

        self.stats.tx_packets += 1;
        self.stats.tx_bytes += len as u64;
        Ok(())
    }
}
