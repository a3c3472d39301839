//! Host-side stand-ins for the switch used by the unit tests.

use std::alloc::{Layout, alloc_zeroed, dealloc};
use std::cell::Cell;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use core::ptr::NonNull;

use memory_addr::PhysAddr;

use super::common::RegisterIo;
use super::kernel_func::KernelFunc;
use super::pool::{BufferPool, EVENT_SIZE, RingKind};
use super::profile::CpuTag;
use super::ring::DescFlags;

/// Bus address every host DMA allocation appears at.
pub const HOST_BUS_BASE: usize = 0x0100_0000;

const HOST_DMA_ALIGN: usize = 4096;

thread_local! {
    static IRQ_ENABLED: Cell<bool> = const { Cell::new(true) };
}

/// [`KernelFunc`] backed by the global allocator.
pub struct HostKernel;

impl HostKernel {
    pub fn irqs_disabled() -> bool {
        !IRQ_ENABLED.with(|e| e.get())
    }
}

impl KernelFunc for HostKernel {
    fn dma_alloc_coherent(size: usize) -> Option<(NonNull<u8>, PhysAddr)> {
        if size == 0 {
            return None;
        }
        let layout = Layout::from_size_align(size, HOST_DMA_ALIGN).ok()?;
        let vaddr = NonNull::new(unsafe { alloc_zeroed(layout) })?;
        Some((vaddr, PhysAddr::from(HOST_BUS_BASE)))
    }

    unsafe fn dma_free_coherent(vaddr: NonNull<u8>, size: usize) {
        let layout = Layout::from_size_align(size, HOST_DMA_ALIGN).unwrap();
        unsafe { dealloc(vaddr.as_ptr(), layout) }
    }

    fn busy_wait(_duration: Duration) {}

    fn current_time_us() -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_micros() as u64)
            .unwrap_or(0)
    }

    fn local_irq_save() -> usize {
        IRQ_ENABLED.with(|e| e.replace(false)) as usize
    }

    fn local_irq_restore(flags: usize) {
        IRQ_ENABLED.with(|e| e.set(flags != 0));
    }
}

#[derive(Default)]
struct SwitchState {
    regs: HashMap<u32, u32>,
    writes: Vec<(u32, u32)>,
    self_clearing: HashMap<u32, u32>,
    w1c: HashSet<u32>,
}

/// Register file of a switch that completes every command instantly.
///
/// Clones share the same registers, so a test can keep a handle after moving one into
/// the driver.
#[derive(Clone, Default)]
pub struct FakeSwitch {
    state: Arc<Mutex<SwitchState>>,
}

impl FakeSwitch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Preload a register without recording a write.
    pub fn set(&self, reg: u32, value: u32) {
        self.state.lock().unwrap().regs.insert(reg, value);
    }

    pub fn get(&self, reg: u32) -> u32 {
        self.state.lock().unwrap().regs.get(&reg).copied().unwrap_or(0)
    }

    /// Whether `value` was ever written to `reg`.
    pub fn wrote(&self, reg: u32, value: u32) -> bool {
        self.state.lock().unwrap().writes.contains(&(reg, value))
    }

    pub fn writes(&self) -> Vec<(u32, u32)> {
        self.state.lock().unwrap().writes.clone()
    }

    /// Index of the first write of `value` to `reg`.
    pub fn write_index(&self, reg: u32, value: u32) -> Option<usize> {
        let state = self.state.lock().unwrap();
        state.writes.iter().position(|w| *w == (reg, value))
    }

    pub fn clear_writes(&self) {
        self.state.lock().unwrap().writes.clear();
    }

    /// Bits of `mask` in `reg` drop back to zero right after being written.
    pub fn self_clearing(&self, reg: u32, mask: u32) {
        self.state.lock().unwrap().self_clearing.insert(reg, mask);
    }

    /// Writing ones to `reg` clears those bits.
    pub fn w1c(&self, reg: u32) {
        self.state.lock().unwrap().w1c.insert(reg);
    }
}

impl RegisterIo for FakeSwitch {
    fn read32(&self, offset: u32) -> u32 {
        self.get(offset)
    }

    fn write32(&self, offset: u32, value: u32) {
        let mut state = self.state.lock().unwrap();
        state.writes.push((offset, value));
        let old = state.regs.get(&offset).copied().unwrap_or(0);
        let mut new = if state.w1c.contains(&offset) {
            old & !value
        } else {
            value
        };
        if let Some(mask) = state.self_clearing.get(&offset) {
            new &= !mask;
        }
        state.regs.insert(offset, new);
    }
}

// ==================== Switch side of the rings ====================

/// CRC bytes the switch appends to every received frame.
pub const FAKE_FCS: [u8; 4] = [0xde, 0xad, 0xbe, 0xef];

fn clear_owner<K: KernelFunc>(pool: &mut BufferPool<K>, kind: RingKind, ring: usize, slot: usize) {
    let desc = pool.desc(kind, ring, slot) & !DescFlags::OWNED_BY_HW.bits();
    pool.set_desc(kind, ring, slot, desc);
}

/// Deliver `frame` plus CRC into an RX slot and hand the slot to the CPU.
pub fn hw_fill_rx<K: KernelFunc>(
    pool: &mut BufferPool<K>,
    ring: usize,
    slot: usize,
    frame: &[u8],
    tag: CpuTag,
) {
    let mut data = frame.to_vec();
    data.extend_from_slice(&FAKE_FCS);
    pool.write_buffer(RingKind::Rx, ring, slot, &data, 0);
    let mut hdr = pool.header(RingKind::Rx, ring, slot);
    hdr.len = data.len() as u16;
    hdr.cpu_tag = tag;
    pool.set_header(RingKind::Rx, ring, slot, &hdr);
    clear_owner(pool, RingKind::Rx, ring, slot);
}

/// The switch finished sending a TX slot.
pub fn hw_complete_tx<K: KernelFunc>(pool: &mut BufferPool<K>, ring: usize, slot: usize) {
    clear_owner(pool, RingKind::Tx, ring, slot);
}

/// Bytes the switch would transmit from a TX slot.
pub fn tx_slot_bytes<K: KernelFunc>(pool: &BufferPool<K>, ring: usize, slot: usize) -> Vec<u8> {
    let hdr = pool.header(RingKind::Tx, ring, slot);
    let mut data = vec![0; hdr.size as usize];
    pool.read_buffer(RingKind::Tx, ring, slot, &mut data);
    data
}

/// One learned or aged entry as the switch reports it.
#[derive(Debug, Clone, Copy)]
pub struct FakeEvent {
    pub add: bool,
    pub fid: u16,
    pub mac: [u8; 6],
    pub port: u8,
    pub valid: bool,
}

/// Pack an event into its 96-bit big-endian record.
pub fn encode_event(event: &FakeEvent) -> [u8; EVENT_SIZE] {
    let mac = event.mac.iter().fold(0u128, |acc, b| acc << 8 | *b as u128);
    let value = (event.add as u128) << 94
        | ((event.fid & 0xfff) as u128) << 82
        | mac << 34
        | ((event.port & 0x3f) as u128) << 28
        | (event.valid as u128) << 27;
    let bytes = value.to_be_bytes();
    let mut raw = [0; EVENT_SIZE];
    raw.copy_from_slice(&bytes[16 - EVENT_SIZE..]);
    raw
}

/// Fill a notification block with `events` (the rest zeroed) and hand it to the CPU.
pub fn hw_post_notify<K: KernelFunc>(
    pool: &mut BufferPool<K>,
    block: usize,
    events: &[FakeEvent],
) {
    pool.clear_notify_block(block);
    for (i, event) in events.iter().enumerate() {
        pool.set_notify_event(block, i, &encode_event(event));
    }
    clear_owner(pool, RingKind::Notify, 0, block);
}
