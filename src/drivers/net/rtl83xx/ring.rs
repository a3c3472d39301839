//! Descriptor rings and the ownership/wrap handoff protocol.
//!
//! A descriptor word carries the bus address of its payload in bits 31..2, the wrap marker in
//! bit 1 and the owner in bit 0: set while the switch owns the slot, clear once the CPU may
//! touch it.

use core::sync::atomic::{Ordering, fence};

use bitflags::bitflags;

use super::kernel_func::KernelFunc;
use super::pool::{BufferPool, PacketHeader, RingKind};
use super::regs::descriptor;
use crate::{NicError, NicResult};

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct DescFlags: u32 {
        const OWNED_BY_HW = descriptor::OWNED_BY_HW;
        const WRAP = descriptor::WRAP;
    }
}

/// One hardware-visible descriptor word.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Descriptor(pub u32);

impl Descriptor {
    #[inline]
    pub fn new(addr: u32, flags: DescFlags) -> Self {
        debug_assert_eq!(addr & !descriptor::ADDR_MASK, 0);
        Self((addr & descriptor::ADDR_MASK) | flags.bits())
    }

    #[inline]
    pub fn addr(self) -> u32 {
        self.0 & descriptor::ADDR_MASK
    }

    #[inline]
    pub fn flags(self) -> DescFlags {
        DescFlags::from_bits_truncate(self.0)
    }

    #[inline]
    pub fn is_hw_owned(self) -> bool {
        self.flags().contains(DescFlags::OWNED_BY_HW)
    }

    #[inline]
    pub fn is_wrap(self) -> bool {
        self.flags().contains(DescFlags::WRAP)
    }
}

/// Software state of one ring: which slots it spans and where the cursor is.
#[derive(Debug)]
pub struct DescriptorRing {
    kind: RingKind,
    index: usize,
    len: usize,
    cursor: usize,
}

impl DescriptorRing {
    pub fn new(kind: RingKind, index: usize, len: usize) -> NicResult<Self> {
        if len < 2 {
            return Err(NicError::InvalidParameter("ring needs at least two slots"));
        }
        Ok(Self {
            kind,
            index,
            len,
            cursor: 0,
        })
    }

    #[inline]
    pub fn kind(&self) -> RingKind {
        self.kind
    }

    #[inline]
    pub fn index(&self) -> usize {
        self.index
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Next slot software will service.
    #[inline]
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    #[inline]
    pub fn slot(&self, n: usize) -> usize {
        n % self.len
    }

    #[inline]
    pub fn advance(&mut self) {
        self.cursor = (self.cursor + 1) % self.len;
    }

    #[inline]
    fn wrap_for(&self, slot: usize) -> DescFlags {
        if slot == self.len - 1 {
            DescFlags::WRAP
        } else {
            DescFlags::empty()
        }
    }

    pub fn descriptor<K: KernelFunc>(&self, pool: &BufferPool<K>, slot: usize) -> Descriptor {
        Descriptor(pool.desc(self.kind, self.index, self.slot(slot)))
    }

    /// Bus address of the descriptor under the cursor.
    pub fn cursor_bus_addr<K: KernelFunc>(&self, pool: &BufferPool<K>) -> u32 {
        pool.desc_bus_addr(self.kind, self.index, self.cursor)
    }

    /// Header of `slot`, or `None` while the switch still owns it.
    pub fn acquire_if_owned<K: KernelFunc>(
        &self,
        pool: &BufferPool<K>,
        slot: usize,
    ) -> Option<PacketHeader> {
        let slot = self.slot(slot);
        if self.descriptor(pool, slot).is_hw_owned() {
            return None;
        }
        fence(Ordering::Acquire);
        match self.kind {
            RingKind::Notify => Some(PacketHeader::default()),
            kind => Some(pool.header(kind, self.index, slot)),
        }
    }

    /// Reset the slot to an empty full-size buffer and give it back to the switch.
    ///
    /// Notification blocks only get their descriptor restamped.
    pub fn release_to_hardware<K: KernelFunc>(&self, pool: &mut BufferPool<K>, slot: usize) {
        let slot = self.slot(slot);
        if self.kind != RingKind::Notify {
            let buf = pool.buffer_bus_addr(self.kind, self.index, slot);
            pool.set_header(self.kind, self.index, slot, &PacketHeader::empty(buf));
        }
        // the header must be visible before the switch sees the owner bit
        fence(Ordering::SeqCst);
        let addr = pool.payload_bus_addr(self.kind, self.index, slot);
        let desc = Descriptor::new(addr, DescFlags::OWNED_BY_HW | self.wrap_for(slot));
        pool.set_desc(self.kind, self.index, slot, desc.0);
    }

    /// Flip a populated TX slot over to the switch.
    pub fn hand_to_hardware_for_tx<K: KernelFunc>(&self, pool: &mut BufferPool<K>, slot: usize) {
        let slot = self.slot(slot);
        fence(Ordering::SeqCst);
        let desc = self.descriptor(pool, slot).0 | DescFlags::OWNED_BY_HW.bits();
        pool.set_desc(self.kind, self.index, slot, desc);
    }

    /// Stamp every slot and rewind the cursor.
    ///
    /// RX and notification slots start owned by the switch, TX slots by the CPU.
    pub fn init<K: KernelFunc>(&mut self, pool: &mut BufferPool<K>) {
        self.cursor = 0;
        match self.kind {
            RingKind::Tx => {
                for slot in 0..self.len {
                    let buf = pool.buffer_bus_addr(self.kind, self.index, slot);
                    pool.set_header(self.kind, self.index, slot, &PacketHeader::empty(buf));
                    let addr = pool.payload_bus_addr(self.kind, self.index, slot);
                    let desc = Descriptor::new(addr, self.wrap_for(slot));
                    pool.set_desc(self.kind, self.index, slot, desc.0);
                }
            }
            RingKind::Notify => {
                for slot in 0..self.len {
                    pool.clear_notify_block(slot);
                    self.release_to_hardware(pool, slot);
                }
            }
            RingKind::Rx => {
                for slot in 0..self.len {
                    self.release_to_hardware(pool, slot);
                }
            }
        }
    }
}
