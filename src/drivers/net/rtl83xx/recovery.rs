//! Resynchronization of RX rings after the switch ran out of descriptors.

use super::common::RegisterIo;
use super::device::NicStats;
use super::kernel_func::KernelFunc;
use super::pool::BufferPool;
use super::profile::RegisterProfile;
use super::ring::DescriptorRing;

/// Walk `ring` from its cursor towards the switch's current descriptor, returning every
/// CPU-owned slot to the switch empty. Frames in those slots are dropped.
///
/// Returns the number of slots restamped.
pub(crate) fn recover_ring<K: KernelFunc>(
    io: &dyn RegisterIo,
    profile: &dyn RegisterProfile,
    pool: &mut BufferPool<K>,
    ring: &mut DescriptorRing,
    stats: &mut NicStats,
) -> usize {
    let hw_cur = io.read32(profile.regs().rx_cur(ring.index()));
    let mut restamped = 0;

    while restamped < ring.len() {
        let slot = ring.cursor();
        let Some(hdr) = ring.acquire_if_owned(pool, slot) else {
            break;
        };
        if hdr.len != 0 {
            stats.rx_dropped += 1;
        }
        ring.release_to_hardware(pool, slot);
        ring.advance();
        restamped += 1;
        if ring.cursor_bus_addr(pool) == hw_cur {
            break;
        }
    }

    if restamped != 0 {
        debug!(
            "[rtl83xx] ring {} recovered {} slots, cursor now {}",
            ring.index(),
            restamped,
            ring.cursor()
        );
        stats.rx_recovered += restamped as u64;
    }
    restamped
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drivers::net::rtl83xx::pool::{PacketHeader, RingKind};
    use crate::drivers::net::rtl83xx::profile::{CpuTag, Rtl839x};
    use crate::drivers::net::rtl83xx::testing::{FakeSwitch, HostKernel, hw_fill_rx};

    fn setup() -> (FakeSwitch, BufferPool<HostKernel>, DescriptorRing) {
        let mut pool = BufferPool::new(Rtl839x.geometry()).unwrap();
        let mut ring = DescriptorRing::new(RingKind::Rx, 2, 300).unwrap();
        ring.init(&mut pool);
        (FakeSwitch::new(), pool, ring)
    }

    #[test]
    fn test_recover_five_behind() {
        let (io, mut pool, mut ring) = setup();
        for _ in 0..297 {
            ring.advance();
        }
        for n in 297..302 {
            hw_fill_rx(&mut pool, 2, n % 300, &[0xee; 64], CpuTag::default());
        }
        let hw_cur = pool.desc_bus_addr(RingKind::Rx, 2, 2);
        io.set(Rtl839x.regs().rx_cur(2), hw_cur);

        let mut stats = NicStats::default();
        let n = recover_ring(&io, &Rtl839x, &mut pool, &mut ring, &mut stats);
        assert_eq!(n, 5);
        assert_eq!(ring.cursor(), 2);
        for n in 297..302 {
            let slot = n % 300;
            let desc = ring.descriptor(&pool, slot);
            assert!(desc.is_hw_owned());
            assert_eq!(desc.is_wrap(), slot == 299);
            let hdr = pool.header(RingKind::Rx, 2, slot);
            assert_eq!(hdr, PacketHeader::empty(pool.buffer_bus_addr(RingKind::Rx, 2, slot)));
        }
        assert_eq!((stats.rx_recovered, stats.rx_dropped), (5, 5));
    }

    #[test]
    fn test_recover_stops_at_hw_owned() {
        let (io, mut pool, mut ring) = setup();
        hw_fill_rx(&mut pool, 2, 0, &[1; 64], CpuTag::default());
        io.set(Rtl839x.regs().rx_cur(2), pool.desc_bus_addr(RingKind::Rx, 2, 50));
        let mut stats = NicStats::default();
        assert_eq!(recover_ring(&io, &Rtl839x, &mut pool, &mut ring, &mut stats), 1);
        assert_eq!(ring.cursor(), 1);
        assert_eq!(recover_ring(&io, &Rtl839x, &mut pool, &mut ring, &mut stats), 0);
    }

    #[test]
    fn test_recover_bounded_by_ring_len() {
        let (io, mut pool, mut ring) = setup();
        for slot in 0..300 {
            pool.set_desc(RingKind::Rx, 2, slot, 0);
        }
        // current register points outside the ring
        io.set(Rtl839x.regs().rx_cur(2), 0);
        let mut stats = NicStats::default();
        assert_eq!(recover_ring(&io, &Rtl839x, &mut pool, &mut ring, &mut stats), 300);
        assert_eq!(stats.rx_dropped, 0);
        assert!((0..300).all(|s| ring.descriptor(&pool, s).is_hw_owned()));
    }
}
