//! Common utilities for the switch NIC core
//!
//! Register access, the DMA coherent region and bounded hardware polls shared by
//! every chip family.

use core::marker::PhantomData;
use core::ptr::{NonNull, read_volatile, write_volatile};
use core::time::Duration;

use memory_addr::PhysAddr;

use super::kernel_func::KernelFunc;
use crate::{NicError, NicResult};

const PAGE_SIZE: usize = 4096;

/// 32-bit access to the switch register window.
///
/// Offsets are relative to the switch base; every register of the DMA interface is
/// 32 bits wide.
pub trait RegisterIo: Send + Sync {
    fn read32(&self, offset: u32) -> u32;

    fn write32(&self, offset: u32, value: u32);

    /// Read-modify-write: clear `clear`, then set `set`.
    #[inline]
    fn mask32(&self, clear: u32, set: u32, offset: u32) {
        let value = self.read32(offset);
        self.write32(offset, (value & !clear) | set);
    }
}

/// MMIO register access helper
pub struct MmioOps {
    base_addr: usize,
}

impl MmioOps {
    /// Create a new MMIO operations helper
    ///
    /// # Safety
    /// `base_addr` must map the switch register window for the lifetime of the helper.
    #[inline]
    pub const unsafe fn new(base_addr: usize) -> Self {
        Self { base_addr }
    }

    /// Get base address
    #[inline]
    pub fn base_addr(&self) -> usize {
        self.base_addr
    }
}

impl RegisterIo for MmioOps {
    #[inline]
    fn read32(&self, offset: u32) -> u32 {
        unsafe { read_volatile((self.base_addr + offset as usize) as *const u32) }
    }

    #[inline]
    fn write32(&self, offset: u32, value: u32) {
        unsafe { write_volatile((self.base_addr + offset as usize) as *mut u32, value) }
    }
}

/// DMA buffer management
pub struct DmaBuffer<K: KernelFunc> {
    vaddr: NonNull<u8>,
    paddr: PhysAddr,
    size: usize,
    _kernel: PhantomData<fn() -> K>,
}

// The region is only reached through `&self`/`&mut self` methods below.
unsafe impl<K: KernelFunc> Send for DmaBuffer<K> {}
unsafe impl<K: KernelFunc> Sync for DmaBuffer<K> {}

impl<K: KernelFunc> DmaBuffer<K> {
    /// Allocate a new zeroed DMA buffer reachable with 32-bit bus addresses.
    pub fn alloc(size: usize) -> NicResult<Self> {
        let size = Rtl83xxCommon::pages_for_size(size) * PAGE_SIZE;
        let (vaddr, paddr) = K::dma_alloc_coherent(size).ok_or(NicError::NoMemory)?;
        let buf = Self {
            vaddr,
            paddr,
            size,
            _kernel: PhantomData,
        };
        if paddr.as_usize() + size > u32::MAX as usize {
            log::error!("DMA region {:#x} is not 32-bit addressable", paddr.as_usize());
            return Err(NicError::InvalidParameter("DMA region above 4 GiB"));
        }
        Ok(buf)
    }

    /// Get physical address
    #[inline]
    pub fn paddr(&self) -> PhysAddr {
        self.paddr
    }

    /// Get size in bytes
    #[inline]
    pub fn size(&self) -> usize {
        self.size
    }

    /// Bus address of the byte at `offset`, as programmed into descriptors.
    #[inline]
    pub fn bus_addr(&self, offset: usize) -> u32 {
        (self.paddr.as_usize() + offset) as u32
    }

    #[inline]
    fn ptr(&self, offset: usize, len: usize) -> *mut u8 {
        assert!(offset + len <= self.size, "DMA access out of bounds");
        unsafe { self.vaddr.as_ptr().add(offset) }
    }

    #[inline]
    pub fn read32(&self, offset: usize) -> u32 {
        unsafe { read_volatile(self.ptr(offset, 4) as *const u32) }
    }

    #[inline]
    pub fn write32(&mut self, offset: usize, value: u32) {
        unsafe { write_volatile(self.ptr(offset, 4) as *mut u32, value) }
    }

    #[inline]
    pub fn read16(&self, offset: usize) -> u16 {
        unsafe { read_volatile(self.ptr(offset, 2) as *const u16) }
    }

    #[inline]
    pub fn write16(&mut self, offset: usize, value: u16) {
        unsafe { write_volatile(self.ptr(offset, 2) as *mut u16, value) }
    }

    pub fn read_bytes(&self, offset: usize, dst: &mut [u8]) {
        let src = self.ptr(offset, dst.len());
        unsafe { core::ptr::copy_nonoverlapping(src, dst.as_mut_ptr(), dst.len()) }
    }

    pub fn write_bytes(&mut self, offset: usize, src: &[u8]) {
        let dst = self.ptr(offset, src.len());
        unsafe { core::ptr::copy_nonoverlapping(src.as_ptr(), dst, src.len()) }
    }

    pub fn fill(&mut self, offset: usize, len: usize, byte: u8) {
        let dst = self.ptr(offset, len);
        unsafe { core::ptr::write_bytes(dst, byte, len) }
    }
}

impl<K: KernelFunc> Drop for DmaBuffer<K> {
    fn drop(&mut self) {
        unsafe { K::dma_free_coherent(self.vaddr, self.size) };
    }
}

/// Common helpers for the switch NIC core
pub struct Rtl83xxCommon;

impl Rtl83xxCommon {
    /// Wait for a register bit to be set/cleared
    ///
    /// # Arguments
    /// * `io` - Register window
    /// * `reg` - Register offset
    /// * `mask` - Bit mask to check
    /// * `expected` - Expected value (true = all set, false = all cleared)
    /// * `timeout_us` - Timeout in microseconds
    /// * `what` - Name reported on timeout
    pub fn wait_for_bit<K: KernelFunc>(
        io: &dyn RegisterIo,
        reg: u32,
        mask: u32,
        expected: bool,
        timeout_us: u32,
        what: &'static str,
    ) -> NicResult {
        let iterations = (timeout_us / 10).max(1);
        for _ in 0..iterations {
            let value = io.read32(reg) & mask;
            let done = if expected { value == mask } else { value == 0 };
            if done {
                return Ok(());
            }
            K::busy_wait(Duration::from_micros(10));
        }

        log::error!("Timeout waiting for {what} (reg {reg:#06x}, mask {mask:#010x})");
        Err(NicError::Timeout(what))
    }

    /// Calculate pages needed for a given size
    #[inline]
    pub fn pages_for_size(size: usize) -> usize {
        size.div_ceil(PAGE_SIZE)
    }

    /// Round `value` up to a multiple of `align` (a power of two).
    #[inline]
    pub const fn align_up(value: usize, align: usize) -> usize {
        (value + align - 1) & !(align - 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drivers::net::rtl83xx::testing::{FakeSwitch, HostKernel};

    #[test]
    fn test_pages_for_size() {
        assert_eq!(Rtl83xxCommon::pages_for_size(0), 0);
        assert_eq!(Rtl83xxCommon::pages_for_size(1), 1);
        assert_eq!(Rtl83xxCommon::pages_for_size(4096), 1);
        assert_eq!(Rtl83xxCommon::pages_for_size(4097), 2);
    }

    #[test]
    fn test_align_up() {
        assert_eq!(Rtl83xxCommon::align_up(0, 32), 0);
        assert_eq!(Rtl83xxCommon::align_up(33, 32), 64);
        assert_eq!(Rtl83xxCommon::align_up(64, 32), 64);
    }

    #[test]
    fn test_mask32() {
        let io = FakeSwitch::new();
        io.write32(0x100, 0xf0f0);
        io.mask32(0x00f0, 0x0003, 0x100);
        assert_eq!(io.read32(0x100), 0xf003);
    }

    #[test]
    fn test_wait_for_bit() {
        let io = FakeSwitch::new();
        io.write32(0x10, 0x4);
        assert_eq!(
            Rtl83xxCommon::wait_for_bit::<HostKernel>(&io, 0x10, 0x4, true, 100, "bit"),
            Ok(())
        );
        assert_eq!(
            Rtl83xxCommon::wait_for_bit::<HostKernel>(&io, 0x10, 0x4, false, 100, "bit"),
            Err(NicError::Timeout("bit"))
        );
    }

    #[test]
    fn test_dma_buffer_access() {
        let mut buf = DmaBuffer::<HostKernel>::alloc(100).unwrap();
        assert_eq!(buf.size(), 4096);
        buf.write32(8, 0xdead_beef);
        buf.write16(12, 0x1234);
        buf.write_bytes(16, &[1, 2, 3]);
        assert_eq!(buf.read32(8), 0xdead_beef);
        assert_eq!(buf.read16(12), 0x1234);
        let mut out = [0u8; 3];
        buf.read_bytes(16, &mut out);
        assert_eq!(out, [1, 2, 3]);
        assert_eq!(buf.bus_addr(16), buf.paddr().as_usize() as u32 + 16);
    }
}
