//! Services the driver needs from the host kernel.

use core::ptr::NonNull;
use core::time::Duration;

use memory_addr::PhysAddr;

/// Kernel services used by the NIC core.
///
/// Implemented by the embedder as a zero-sized type; all functions are static so the
/// driver can be generic over it without storing a handle.
pub trait KernelFunc: 'static {
    /// Allocate zeroed DMA coherent memory
    ///
    /// # Returns
    /// (cpu pointer, bus address as seen by the switch), or `None` when out of memory.
    fn dma_alloc_coherent(size: usize) -> Option<(NonNull<u8>, PhysAddr)>;

    /// Free DMA coherent memory
    ///
    /// # Safety
    /// `vaddr` and `size` must come from a previous [`KernelFunc::dma_alloc_coherent`].
    unsafe fn dma_free_coherent(vaddr: NonNull<u8>, size: usize);

    /// Busy wait for specified duration
    fn busy_wait(duration: Duration);

    /// Get current time in microseconds
    fn current_time_us() -> u64 {
        0
    }

    /// Disable local interrupts, returning the previous state.
    fn local_irq_save() -> usize {
        0
    }

    fn local_irq_restore(_flags: usize) {}
}
