//! Realtek switch CPU port NIC
//!
//! This module drives the DMA interface between the CPU and the switch ASIC of the
//! RTL838x, RTL839x, RTL930x and RTL931x SoC families: descriptor rings for frames in
//! both directions and, on the RTL839x, a ring of MAC learning notifications.

mod common;
mod device;
mod device_info;
mod irq;
mod kernel_func;
mod notify;
mod pool;
mod profile;
mod recovery;
mod regs;
mod ring;
mod rx;
mod tx;

#[cfg(test)]
pub(crate) mod testing;

use core::fmt;

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

pub use common::{DmaBuffer, MmioOps, RegisterIo, Rtl83xxCommon};
pub use device::{NicState, NicStats, Rtl83xxNic};
pub use device_info::{SWITCH_FAMILIES, SwitchFamily, SwitchFamilyInfo, find_family};
pub use irq::{IrqCoordinator, PollTask};
pub use kernel_func::KernelFunc;
pub use notify::{FdbAction, FdbBatch, FdbUpdate, decode_event};
pub use pool::{RingGeometry, RingKind};
pub use profile::{
    CpuTag, DmaRegs, InitStep, IrqStatus, L2Flush, NotifyIrq, RegisterProfile, ResetSaved, RxMode,
    RxTag, TxQueuePolicy,
};
pub use ring::{DescFlags, Descriptor};
pub use rx::RxFrame;
pub use tx::TxRequest;

use crate::NicResult;

/// The ethernet address of the NIC (MAC address).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EthernetAddress(pub [u8; 6]);

impl EthernetAddress {
    /// Unicast and not all zero.
    pub fn is_valid(&self) -> bool {
        self.0[0] & 0x01 == 0 && self.0 != [0; 6]
    }

    /// Random unicast address with the locally administered bit set.
    pub fn random_local(seed: u64) -> Self {
        let mut rng = SmallRng::seed_from_u64(seed);
        let mut addr = [0u8; 6];
        rng.fill(&mut addr[..]);
        addr[0] = (addr[0] & 0xfe) | 0x02;
        Self(addr)
    }
}

impl fmt::Display for EthernetAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let a = &self.0;
        write!(
            f,
            "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
            a[0], a[1], a[2], a[3], a[4], a[5]
        )
    }
}

/// Receiver of frames drained from the RX rings.
pub trait FrameSink {
    fn deliver_frame(&mut self, frame: RxFrame);
}

/// Forwarding database that consumes decoded notification batches.
pub trait FdbSink {
    fn fdb_update(&mut self, batch: &FdbBatch);
}

/// Common operations that require all device drivers to implement.
pub trait BaseDriverOps: Send + Sync {
    /// The name of the device.
    fn device_name(&self) -> &str;

    /// The IRQ number of the device.
    fn irq_number(&self) -> Option<u32> {
        None
    }
}

/// Operations that require a network device (NIC) driver to implement.
pub trait NetDriverOps {
    /// The ethernet address of the NIC.
    fn mac_address(&self) -> EthernetAddress;

    /// Program a new unicast address.
    fn set_mac_address(&self, mac: EthernetAddress) -> NicResult;

    /// Size of the receive queue.
    fn rx_queue_size(&self) -> usize;

    /// Size of the transmit queue.
    fn tx_queue_size(&self) -> usize;

    /// Transmits a frame without blocking.
    ///
    /// Returns [`crate::NicError::Busy`] when the ring is full; the frame is not
    /// consumed and may be retried.
    fn request_transmit(
        &self,
        frame: &[u8],
        dest_port: Option<u32>,
        priority: Option<u32>,
    ) -> NicResult;

    /// Flood unknown traffic (`flood_all`) or multicast to the CPU.
    fn set_multicast_policy(&self, flood_all: bool, flood_multicast: bool);
}

impl<IO: RegisterIo, K: KernelFunc> BaseDriverOps for Rtl83xxNic<IO, K> {
    fn device_name(&self) -> &str {
        self.family().name
    }

    fn irq_number(&self) -> Option<u32> {
        self.config().irq
    }
}

impl<IO: RegisterIo, K: KernelFunc> NetDriverOps for Rtl83xxNic<IO, K> {
    #[inline]
    fn mac_address(&self) -> EthernetAddress {
        Rtl83xxNic::mac_address(self)
    }

    #[inline]
    fn set_mac_address(&self, mac: EthernetAddress) -> NicResult {
        Rtl83xxNic::set_mac_address(self, mac)
    }

    fn rx_queue_size(&self) -> usize {
        self.geometry().rx_len
    }

    fn tx_queue_size(&self) -> usize {
        self.geometry().tx_len
    }

    #[inline]
    fn request_transmit(
        &self,
        frame: &[u8],
        dest_port: Option<u32>,
        priority: Option<u32>,
    ) -> NicResult {
        Rtl83xxNic::request_transmit(self, frame, dest_port, priority)
    }

    #[inline]
    fn set_multicast_policy(&self, flood_all: bool, flood_multicast: bool) {
        Rtl83xxNic::set_multicast_policy(self, flood_all, flood_multicast)
    }
}

#[cfg(test)]
mod tests {
    use super::testing::{FakeSwitch, HostKernel};
    use super::*;
    use crate::NicError;
    use crate::config::NicConfig;

    #[test]
    fn test_address_validity() {
        assert!(EthernetAddress([0x00, 0xe0, 0x4c, 1, 2, 3]).is_valid());
        assert!(!EthernetAddress([0x01, 0x00, 0x5e, 0, 0, 1]).is_valid());
        assert!(!EthernetAddress::default().is_valid());
    }

    #[test]
    fn test_random_local() {
        for seed in 0..32 {
            let mac = EthernetAddress::random_local(seed);
            assert!(mac.is_valid());
            assert_eq!(mac.0[0] & 0x02, 0x02);
        }
        assert_eq!(
            EthernetAddress::random_local(7),
            EthernetAddress::random_local(7)
        );
    }

    #[test]
    fn test_display() {
        let mac = EthernetAddress([0x00, 0xe0, 0x4c, 0x0a, 0xbc, 0xff]);
        assert_eq!(alloc::format!("{mac}"), "00:e0:4c:0a:bc:ff");
    }

    #[test]
    fn test_driver_traits() {
        let io = FakeSwitch::new();
        let config = NicConfig {
            irq: Some(19),
            mac: Some(EthernetAddress([0x00, 0xe0, 0x4c, 0, 0, 7])),
            ..NicConfig::default()
        };
        let nic = Rtl83xxNic::<FakeSwitch, HostKernel>::probe(0x8380, io, config).unwrap();
        let base: &dyn BaseDriverOps = &nic;
        assert_eq!(base.device_name(), "RTL838x");
        assert_eq!(base.irq_number(), Some(19));

        let net: &dyn NetDriverOps = &nic;
        assert_eq!(net.rx_queue_size(), 300);
        assert_eq!(net.tx_queue_size(), 160);
        assert_eq!(net.mac_address().0[5], 7);
        assert_eq!(
            net.request_transmit(&[0; 60], None, None),
            Err(NicError::BadState)
        );
        assert_eq!(
            net.set_mac_address(EthernetAddress([0x03, 0, 0, 0, 0, 0])),
            Err(NicError::AddrNotAvailable)
        );
    }
}
