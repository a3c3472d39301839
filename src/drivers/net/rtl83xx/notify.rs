//! MAC learning notifications of the RTL839x.
//!
//! The switch fills blocks of ten 96-bit event records and hands them to the CPU over
//! their own ownership ring. Decoded batches wait in an [`FdbMailbox`] until an
//! independent task forwards them to the bridge.

use alloc::collections::VecDeque;
use alloc::vec::Vec;

use super::EthernetAddress;
use super::device::NicStats;
use super::kernel_func::KernelFunc;
use super::pool::{BufferPool, EVENT_SIZE};
use super::ring::DescriptorRing;
use crate::config::NOTIFY_EVENTS;
use crate::hal::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FdbAction {
    /// Entry learned.
    Add,
    /// Entry aged out or removed.
    Delete,
}

/// One forwarding database change reported by the switch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FdbUpdate {
    pub action: FdbAction,
    pub mac: EthernetAddress,
    /// FID or VID the entry was learned in.
    pub vid: u16,
    /// Source port.
    pub port: u8,
}

/// Updates decoded from one notification block.
pub type FdbBatch = Vec<FdbUpdate>;

/// Decode a big-endian event record laid out as
/// `type:2 fid_vid:12 mac:48 slp:6 valid:1 reserved:27`.
pub fn decode_event(raw: &[u8; EVENT_SIZE]) -> Option<FdbUpdate> {
    let mut bytes = [0; 16];
    bytes[16 - EVENT_SIZE..].copy_from_slice(raw);
    let v = u128::from_be_bytes(bytes);

    if (v >> 27) & 1 == 0 {
        return None;
    }
    let mac = ((v >> 34) as u64 & 0xffff_ffff_ffff).to_be_bytes();
    Some(FdbUpdate {
        action: if (v >> 94) & 0x3 != 0 {
            FdbAction::Add
        } else {
            FdbAction::Delete
        },
        mac: EthernetAddress([mac[2], mac[3], mac[4], mac[5], mac[6], mac[7]]),
        vid: ((v >> 82) & 0xfff) as u16,
        port: ((v >> 28) & 0x3f) as u8,
    })
}

/// Collect every CPU-owned block from the cursor onwards, one batch per block, and give
/// the blocks back to the switch.
pub(crate) fn drain_notify_ring<K: KernelFunc>(
    pool: &mut BufferPool<K>,
    ring: &mut DescriptorRing,
    stats: &mut NicStats,
) -> Vec<FdbBatch> {
    let mut batches = Vec::new();
    for _ in 0..ring.len() {
        let block = ring.cursor();
        if ring.acquire_if_owned(pool, block).is_none() {
            break;
        }
        let batch: FdbBatch = (0..NOTIFY_EVENTS)
            .filter_map(|i| decode_event(&pool.notify_event(block, i)))
            .collect();
        stats.fdb_events += batch.len() as u64;
        if !batch.is_empty() {
            batches.push(batch);
        }
        ring.release_to_hardware(pool, block);
        ring.advance();
    }
    batches
}

/// Bounded queue of batches waiting for the FDB task.
pub struct FdbMailbox<K: KernelFunc> {
    queue: Mutex<K, VecDeque<FdbBatch>>,
    depth: usize,
}

impl<K: KernelFunc> FdbMailbox<K> {
    pub fn new(depth: usize) -> Self {
        Self {
            queue: Mutex::new(VecDeque::new()),
            depth,
        }
    }

    /// Queue a batch, handing it back when the mailbox is full.
    pub fn push(&self, batch: FdbBatch) -> Result<(), FdbBatch> {
        let mut queue = self.queue.lock();
        if queue.len() >= self.depth {
            return Err(batch);
        }
        queue.push_back(batch);
        Ok(())
    }

    pub fn pop(&self) -> Option<FdbBatch> {
        self.queue.lock().pop_front()
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.queue.lock().len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop batches left over from a previous run.
    pub fn clear(&self) {
        self.queue.lock().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drivers::net::rtl83xx::pool::RingKind;
    use crate::drivers::net::rtl83xx::profile::{RegisterProfile, Rtl839x};
    use crate::drivers::net::rtl83xx::testing::{
        FakeEvent, HostKernel, encode_event, hw_post_notify,
    };

    const MAC: [u8; 6] = [0x00, 0x11, 0x22, 0x33, 0x44, 0x55];

    fn event(add: bool, valid: bool, port: u8) -> FakeEvent {
        FakeEvent {
            add,
            fid: 0x123,
            mac: MAC,
            port,
            valid,
        }
    }

    fn setup() -> (BufferPool<HostKernel>, DescriptorRing) {
        let mut pool = BufferPool::new(Rtl839x.geometry()).unwrap();
        let mut ring = DescriptorRing::new(RingKind::Notify, 0, 10).unwrap();
        ring.init(&mut pool);
        (pool, ring)
    }

    #[test]
    fn test_decode_event() {
        let update = decode_event(&encode_event(&event(true, true, 42))).unwrap();
        assert_eq!(update.action, FdbAction::Add);
        assert_eq!(update.mac, EthernetAddress(MAC));
        assert_eq!(update.vid, 0x123);
        assert_eq!(update.port, 42);
        let update = decode_event(&encode_event(&event(false, true, 0))).unwrap();
        assert_eq!(update.action, FdbAction::Delete);
        assert!(decode_event(&encode_event(&event(true, false, 1))).is_none());
        assert!(decode_event(&[0; EVENT_SIZE]).is_none());
    }

    #[test]
    fn test_decode_raw_bits() {
        // type 1, fid 0, mac 00:00:00:00:00:01, slp 0, valid
        let mut raw = [0; EVENT_SIZE];
        raw[0] = 0x40;
        raw[7] = 0x04;
        raw[8] = 0x08;
        let update = decode_event(&raw).unwrap();
        assert_eq!(update.mac, EthernetAddress([0, 0, 0, 0, 0, 1]));
        assert_eq!(update.action, FdbAction::Add);
    }

    #[test]
    fn test_three_valid_of_ten() {
        let (mut pool, mut ring) = setup();
        let mut events = [event(true, false, 0); NOTIFY_EVENTS];
        events[1] = event(true, true, 1);
        events[4] = event(false, true, 4);
        events[9] = event(true, true, 9);
        hw_post_notify(&mut pool, 0, &events);

        let mut stats = NicStats::default();
        let batches = drain_notify_ring(&mut pool, &mut ring, &mut stats);
        assert_eq!(batches.len(), 1);
        let ports: Vec<u8> = batches[0].iter().map(|u| u.port).collect();
        assert_eq!(ports, [1, 4, 9]);
        assert_eq!(batches[0][1].action, FdbAction::Delete);
        assert_eq!(ring.cursor(), 1);
        assert!(ring.descriptor(&pool, 0).is_hw_owned());
        assert_eq!(stats.fdb_events, 3);
    }

    #[test]
    fn test_drain_wraps_and_stops() {
        let (mut pool, mut ring) = setup();
        for _ in 0..9 {
            ring.advance();
        }
        hw_post_notify(&mut pool, 9, &[event(true, true, 1)]);
        hw_post_notify(&mut pool, 0, &[event(true, true, 2)]);
        hw_post_notify(&mut pool, 2, &[event(true, true, 3)]);
        let mut stats = NicStats::default();
        let batches = drain_notify_ring(&mut pool, &mut ring, &mut stats);
        assert_eq!(batches.len(), 2);
        assert_eq!(ring.cursor(), 1);
        assert!(ring.descriptor(&pool, 9).is_wrap());
    }

    #[test]
    fn test_empty_block_released() {
        let (mut pool, mut ring) = setup();
        hw_post_notify(&mut pool, 0, &[]);
        let mut stats = NicStats::default();
        assert!(drain_notify_ring(&mut pool, &mut ring, &mut stats).is_empty());
        assert_eq!(ring.cursor(), 1);
    }

    #[test]
    fn test_mailbox_bounded() {
        let mailbox = FdbMailbox::<HostKernel>::new(2);
        let batch = alloc::vec![decode_event(&encode_event(&event(true, true, 1))).unwrap()];
        assert!(mailbox.push(batch.clone()).is_ok());
        assert!(mailbox.push(batch.clone()).is_ok());
        assert!(mailbox.push(batch.clone()).is_err());
        assert_eq!(mailbox.len(), 2);
        assert_eq!(mailbox.pop(), Some(batch));
        mailbox.clear();
        assert!(mailbox.is_empty());
    }
}
