//! DMA arena holding every descriptor array, packet header, notification block and packet
//! buffer of one device.
//!
//! Slots are addressed by `(RingKind, ring, slot)`; nothing outside this module sees a raw
//! pointer into the region.

use super::common::{DmaBuffer, Rtl83xxCommon};
use super::kernel_func::KernelFunc;
use super::profile::{CPU_TAG_WORDS, CpuTag};
use crate::NicResult;
use crate::config::{NOTIFY_BLOCKS, NOTIFY_EVENTS, RING_BUFFER};

/// Size of one packet header as seen by the switch.
pub const HEADER_SIZE: usize = 32;

/// Size of one notification event record.
pub const EVENT_SIZE: usize = 12;

/// Size of one notification block.
pub const NOTIFY_BLOCK_SIZE: usize = NOTIFY_EVENTS * EVENT_SIZE;

const DESC_SIZE: usize = 4;
const SECTION_ALIGN: usize = 32;

// header field offsets
const HDR_BUF: usize = 0;
const HDR_SIZE: usize = 6;
const HDR_OFFSET: usize = 8;
const HDR_LEN: usize = 10;
const HDR_CPU_TAG: usize = 12;

/// Ring counts and depths of one switch family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RingGeometry {
    pub rx_rings: usize,
    pub rx_len: usize,
    pub tx_rings: usize,
    pub tx_len: usize,
    /// The family has a notification ring.
    pub notify: bool,
}

impl RingGeometry {
    pub fn rings(&self, kind: RingKind) -> usize {
        match kind {
            RingKind::Rx => self.rx_rings,
            RingKind::Tx => self.tx_rings,
            RingKind::Notify => self.notify as usize,
        }
    }

    pub fn ring_len(&self, kind: RingKind) -> usize {
        match kind {
            RingKind::Rx => self.rx_len,
            RingKind::Tx => self.tx_len,
            RingKind::Notify => NOTIFY_BLOCKS,
        }
    }

    fn slots(&self, kind: RingKind) -> usize {
        self.rings(kind) * self.ring_len(kind)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RingKind {
    Rx,
    Tx,
    Notify,
}

/// Software view of a packet header.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PacketHeader {
    /// Bus address of the packet buffer.
    pub buf: u32,
    /// Buffer capacity.
    pub size: u16,
    pub offset: u16,
    /// Bytes occupied, including the 4 byte CRC.
    pub len: u16,
    pub cpu_tag: CpuTag,
}

impl PacketHeader {
    /// Empty header owning a full-size buffer.
    pub fn empty(buf: u32) -> Self {
        Self {
            buf,
            size: RING_BUFFER as u16,
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Layout {
    desc: [usize; 3],
    rx_hdr: usize,
    tx_hdr: usize,
    notify: usize,
    rx_buf: usize,
    tx_buf: usize,
    total: usize,
}

impl Layout {
    fn new(g: &RingGeometry) -> Self {
        let mut cursor = 0;
        let mut section = |bytes: usize| {
            let start = cursor;
            cursor = Rtl83xxCommon::align_up(start + bytes, SECTION_ALIGN);
            start
        };
        let desc = [
            section(g.slots(RingKind::Rx) * DESC_SIZE),
            section(g.slots(RingKind::Tx) * DESC_SIZE),
            section(g.slots(RingKind::Notify) * DESC_SIZE),
        ];
        let rx_hdr = section(g.slots(RingKind::Rx) * HEADER_SIZE);
        let tx_hdr = section(g.slots(RingKind::Tx) * HEADER_SIZE);
        let notify = section(g.slots(RingKind::Notify) * NOTIFY_BLOCK_SIZE);
        let rx_buf = section(g.slots(RingKind::Rx) * RING_BUFFER);
        let tx_buf = section(g.slots(RingKind::Tx) * RING_BUFFER);
        Self {
            desc,
            rx_hdr,
            tx_hdr,
            notify,
            rx_buf,
            tx_buf,
            total: cursor,
        }
    }
}

/// The coherent region of one device, allocated once and never resized.
pub struct BufferPool<K: KernelFunc> {
    dma: DmaBuffer<K>,
    geometry: RingGeometry,
    layout: Layout,
}

impl<K: KernelFunc> BufferPool<K> {
    pub fn new(geometry: RingGeometry) -> NicResult<Self> {
        let layout = Layout::new(&geometry);
        let dma = DmaBuffer::alloc(layout.total)?;
        debug!(
            "[rtl83xx] buffer pool: {} bytes at {:#x}",
            dma.size(),
            dma.paddr().as_usize()
        );
        Ok(Self {
            dma,
            geometry,
            layout,
        })
    }

    pub fn geometry(&self) -> &RingGeometry {
        &self.geometry
    }

    fn slot_index(&self, kind: RingKind, ring: usize, slot: usize) -> usize {
        let len = self.geometry.ring_len(kind);
        assert!(
            ring < self.geometry.rings(kind) && slot < len,
            "{kind:?} slot {ring}/{slot} out of range"
        );
        ring * len + slot
    }

    fn desc_offset(&self, kind: RingKind, ring: usize, slot: usize) -> usize {
        self.layout.desc[kind as usize] + self.slot_index(kind, ring, slot) * DESC_SIZE
    }

    fn header_offset(&self, kind: RingKind, ring: usize, slot: usize) -> usize {
        let base = match kind {
            RingKind::Rx => self.layout.rx_hdr,
            RingKind::Tx => self.layout.tx_hdr,
            RingKind::Notify => panic!("notification ring has no packet headers"),
        };
        base + self.slot_index(kind, ring, slot) * HEADER_SIZE
    }

    fn buffer_offset(&self, kind: RingKind, ring: usize, slot: usize) -> usize {
        let base = match kind {
            RingKind::Rx => self.layout.rx_buf,
            RingKind::Tx => self.layout.tx_buf,
            RingKind::Notify => panic!("notification ring has no packet buffers"),
        };
        base + self.slot_index(kind, ring, slot) * RING_BUFFER
    }

    fn block_offset(&self, block: usize) -> usize {
        self.layout.notify + self.slot_index(RingKind::Notify, 0, block) * NOTIFY_BLOCK_SIZE
    }

    // ==================== Descriptors ====================

    #[inline]
    pub fn desc(&self, kind: RingKind, ring: usize, slot: usize) -> u32 {
        self.dma.read32(self.desc_offset(kind, ring, slot))
    }

    #[inline]
    pub fn set_desc(&mut self, kind: RingKind, ring: usize, slot: usize, value: u32) {
        let offset = self.desc_offset(kind, ring, slot);
        self.dma.write32(offset, value);
    }

    /// Bus address of a descriptor word, as reported by the current-descriptor registers.
    #[inline]
    pub fn desc_bus_addr(&self, kind: RingKind, ring: usize, slot: usize) -> u32 {
        self.dma.bus_addr(self.desc_offset(kind, ring, slot))
    }

    /// Bus address of the descriptor array of a ring.
    #[inline]
    pub fn ring_bus_addr(&self, kind: RingKind, ring: usize) -> u32 {
        self.desc_bus_addr(kind, ring, 0)
    }

    /// Bus address a descriptor of this slot points at: the packet header, or the
    /// event block on the notification ring.
    pub fn payload_bus_addr(&self, kind: RingKind, ring: usize, slot: usize) -> u32 {
        match kind {
            RingKind::Notify => self.dma.bus_addr(self.block_offset(slot)),
            _ => self.dma.bus_addr(self.header_offset(kind, ring, slot)),
        }
    }

    // ==================== Packet headers ====================

    pub fn header(&self, kind: RingKind, ring: usize, slot: usize) -> PacketHeader {
        let base = self.header_offset(kind, ring, slot);
        let mut cpu_tag = CpuTag::default();
        for (i, word) in cpu_tag.0.iter_mut().enumerate() {
            *word = self.dma.read16(base + HDR_CPU_TAG + i * 2);
        }
        PacketHeader {
            buf: self.dma.read32(base + HDR_BUF),
            size: self.dma.read16(base + HDR_SIZE),
            offset: self.dma.read16(base + HDR_OFFSET),
            len: self.dma.read16(base + HDR_LEN),
            cpu_tag,
        }
    }

    pub fn set_header(&mut self, kind: RingKind, ring: usize, slot: usize, hdr: &PacketHeader) {
        let base = self.header_offset(kind, ring, slot);
        self.dma.write32(base + HDR_BUF, hdr.buf);
        self.dma.write16(base + 4, 0);
        self.dma.write16(base + HDR_SIZE, hdr.size);
        self.dma.write16(base + HDR_OFFSET, hdr.offset);
        self.dma.write16(base + HDR_LEN, hdr.len);
        for i in 0..CPU_TAG_WORDS {
            self.dma.write16(base + HDR_CPU_TAG + i * 2, hdr.cpu_tag.0[i]);
        }
    }

    #[inline]
    pub fn buffer_bus_addr(&self, kind: RingKind, ring: usize, slot: usize) -> u32 {
        self.dma.bus_addr(self.buffer_offset(kind, ring, slot))
    }

    // ==================== Packet buffers ====================

    /// Copy the first `dst.len()` bytes of a slot buffer.
    pub fn read_buffer(&self, kind: RingKind, ring: usize, slot: usize, dst: &mut [u8]) {
        assert!(dst.len() <= RING_BUFFER);
        self.dma.read_bytes(self.buffer_offset(kind, ring, slot), dst);
    }

    /// Copy `src` into a slot buffer and zero the following `pad` bytes.
    pub fn write_buffer(
        &mut self,
        kind: RingKind,
        ring: usize,
        slot: usize,
        src: &[u8],
        pad: usize,
    ) {
        assert!(src.len() + pad <= RING_BUFFER);
        let offset = self.buffer_offset(kind, ring, slot);
        self.dma.write_bytes(offset, src);
        self.dma.fill(offset + src.len(), pad, 0);
    }

    // ==================== Notification blocks ====================

    pub fn notify_event(&self, block: usize, event: usize) -> [u8; EVENT_SIZE] {
        assert!(event < NOTIFY_EVENTS);
        let mut raw = [0; EVENT_SIZE];
        let offset = self.block_offset(block) + event * EVENT_SIZE;
        self.dma.read_bytes(offset, &mut raw);
        raw
    }

    pub fn set_notify_event(&mut self, block: usize, event: usize, raw: &[u8; EVENT_SIZE]) {
        assert!(event < NOTIFY_EVENTS);
        let offset = self.block_offset(block) + event * EVENT_SIZE;
        self.dma.write_bytes(offset, raw);
    }

    /// Zero every event record of a block.
    pub fn clear_notify_block(&mut self, block: usize) {
        let offset = self.block_offset(block);
        self.dma.fill(offset, NOTIFY_BLOCK_SIZE, 0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{RX_RING_LEN, TX_RING_LEN, TX_RINGS};
    use crate::drivers::net::rtl83xx::testing::{HOST_BUS_BASE, HostKernel};

    fn geometry(rx_rings: usize, notify: bool) -> RingGeometry {
        RingGeometry {
            rx_rings,
            rx_len: RX_RING_LEN,
            tx_rings: TX_RINGS,
            tx_len: TX_RING_LEN,
            notify,
        }
    }

    #[test]
    fn test_layout_sections_disjoint() {
        let layout = Layout::new(&geometry(8, true));
        assert_eq!(layout.desc[0], 0);
        assert_eq!(layout.desc[1], 8 * 300 * 4);
        assert!(layout.rx_hdr >= layout.desc[2] + NOTIFY_BLOCKS * 4);
        assert!(layout.notify >= layout.tx_hdr + 2 * 160 * HEADER_SIZE);
        assert_eq!(layout.tx_buf, layout.rx_buf + 8 * 300 * RING_BUFFER);
        assert_eq!(layout.total, layout.tx_buf + 2 * 160 * RING_BUFFER);
        for off in [layout.rx_hdr, layout.tx_hdr, layout.notify, layout.rx_buf] {
            assert_eq!(off % SECTION_ALIGN, 0);
        }
    }

    #[test]
    fn test_bus_addresses() {
        let pool = BufferPool::<HostKernel>::new(geometry(8, false)).unwrap();
        let base = HOST_BUS_BASE as u32;
        assert_eq!(pool.ring_bus_addr(RingKind::Rx, 0), base);
        assert_eq!(pool.ring_bus_addr(RingKind::Rx, 1), base + 300 * 4);
        assert_eq!(pool.desc_bus_addr(RingKind::Tx, 1, 2), base + (8 * 300 + 162) * 4);
        assert_eq!(pool.payload_bus_addr(RingKind::Rx, 0, 1) % 4, 0);
    }

    #[test]
    fn test_header_fields() {
        let mut pool = BufferPool::<HostKernel>::new(geometry(8, false)).unwrap();
        let mut hdr = PacketHeader::empty(pool.buffer_bus_addr(RingKind::Tx, 1, 159));
        hdr.len = 64;
        hdr.cpu_tag.0[9] = 0xbeef;
        pool.set_header(RingKind::Tx, 1, 159, &hdr);
        assert_eq!(pool.header(RingKind::Tx, 1, 159), hdr);
        assert_eq!(pool.header(RingKind::Tx, 1, 158), PacketHeader::default());
    }

    #[test]
    fn test_buffer_padding() {
        let mut pool = BufferPool::<HostKernel>::new(geometry(8, false)).unwrap();
        pool.write_buffer(RingKind::Tx, 0, 0, &[0xff; 8], 0);
        pool.write_buffer(RingKind::Tx, 0, 0, &[1, 2, 3], 4);
        let mut out = [0; 8];
        pool.read_buffer(RingKind::Tx, 0, 0, &mut out);
        assert_eq!(out, [1, 2, 3, 0, 0, 0, 0, 0xff]);
    }

    #[test]
    #[should_panic]
    fn test_slot_out_of_range() {
        let pool = BufferPool::<HostKernel>::new(geometry(8, false)).unwrap();
        pool.desc(RingKind::Rx, 8, 0);
    }

    #[test]
    fn test_notify_blocks() {
        let mut pool = BufferPool::<HostKernel>::new(geometry(8, true)).unwrap();
        pool.set_notify_event(9, 9, &[0xab; EVENT_SIZE]);
        assert_eq!(pool.notify_event(9, 9), [0xab; EVENT_SIZE]);
        assert_eq!(pool.notify_event(9, 8), [0; EVENT_SIZE]);
        pool.clear_notify_block(9);
        assert_eq!(pool.notify_event(9, 9), [0; EVENT_SIZE]);
    }
}
