//! Receive path: drain CPU-owned RX slots into frames and recycle them.

use alloc::vec::Vec;

use super::FrameSink;
use super::common::RegisterIo;
use super::device::NicStats;
use super::kernel_func::KernelFunc;
use super::pool::{BufferPool, RingKind};
use super::profile::{CpuTag, RegisterProfile};
use super::ring::DescriptorRing;
use crate::config::ETH_FCS_LEN;

/// A frame received from the switch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RxFrame {
    pub data: Vec<u8>,
    /// RX ring the frame arrived on.
    pub ring: usize,
    /// Ingress switch port.
    pub port: u16,
    pub queue: u8,
    pub reason: u8,
    /// Already forwarded by the switch fabric.
    pub offload: bool,
    /// The switch found no CRC error.
    pub checksum_ok: bool,
}

impl FrameSink for Vec<RxFrame> {
    fn deliver_frame(&mut self, frame: RxFrame) {
        self.push(frame);
    }
}

/// Shared state an RX pass works on.
pub(crate) struct RxPath<'a, K: KernelFunc> {
    pub io: &'a dyn RegisterIo,
    pub profile: &'a dyn RegisterProfile,
    pub pool: &'a mut BufferPool<K>,
    pub stats: &'a mut NicStats,
    /// Frames carry the switch trailer in place of the CRC.
    pub dsa: bool,
}

impl<K: KernelFunc> RxPath<'_, K> {
    /// Drain at most `budget` frames from `ring`, returning how many slots were consumed.
    pub fn receive(
        &mut self,
        ring: &mut DescriptorRing,
        budget: usize,
        sink: &mut dyn FrameSink,
    ) -> usize {
        let r = ring.index();
        let cur_reg = self.profile.regs().rx_cur(r);
        let mut hw_cur = self.io.read32(cur_reg);
        let mut work_done = 0;

        while work_done < budget {
            let Some(hdr) = ring.acquire_if_owned(self.pool, ring.cursor()) else {
                let ours = ring.cursor_bus_addr(self.pool);
                if ours != hw_cur {
                    warn!(
                        "[rtl83xx] ring contention: ring {r}, cursor {ours:#x}, hw {hw_cur:#x}"
                    );
                    self.stats.ring_contention += 1;
                }
                break;
            };
            if hdr.len == 0 {
                break;
            }
            work_done += 1;

            let slot = ring.cursor();
            let len = hdr.len as usize;
            if len < ETH_FCS_LEN {
                debug!("[rtl83xx] runt slot {slot} on ring {r}: {len} bytes");
                self.stats.rx_dropped += 1;
            } else {
                let len = if self.dsa { len } else { len - ETH_FCS_LEN };
                self.profile.rx_frame_quirk(self.io);
                self.deliver(ring, slot, len, &hdr.cpu_tag, sink);
            }

            ring.release_to_hardware(self.pool, slot);
            ring.advance();
            hw_cur = self.io.read32(cur_reg);
            if ring.cursor_bus_addr(self.pool) == hw_cur {
                break;
            }
        }

        self.profile.update_cntr(self.io, r, 0);
        work_done
    }

    fn deliver(
        &mut self,
        ring: &DescriptorRing,
        slot: usize,
        len: usize,
        cpu_tag: &CpuTag,
        sink: &mut dyn FrameSink,
    ) {
        let mut data = Vec::new();
        if data.try_reserve_exact(len).is_err() {
            warn!("[rtl83xx] low on memory, dropping {len} byte frame");
            self.stats.rx_dropped += 1;
            return;
        }
        data.resize(len, 0);
        self.pool.read_buffer(RingKind::Rx, ring.index(), slot, &mut data);

        let tag = self.profile.decode_rx_tag(cpu_tag);
        if self.dsa {
            // the CRC slot becomes the switch trailer
            let port = tag.port as u8 | if tag.offload { 0x40 } else { 0 };
            data[len - 4..].copy_from_slice(&[0x80, port, 0x10, 0x00]);
        }
        trace!(
            "[rtl83xx] rx ring {} port {} queue {} reason {}",
            ring.index(),
            tag.port,
            tag.queue,
            tag.reason
        );

        self.stats.rx_packets += 1;
        self.stats.rx_bytes += len as u64;
        sink.deliver_frame(RxFrame {
            data,
            ring: ring.index(),
            port: tag.port,
            queue: tag.queue,
            reason: tag.reason,
            offload: tag.offload,
            checksum_ok: !tag.crc_error,
        });
    }
}
