//! Per-family register profiles.
//!
//! Each supported switch family is a unit struct implementing [`RegisterProfile`].
//! The engines only talk to `&'static dyn RegisterProfile`, selected once at probe
//! from the family id, so no hot path ever branches on the chip family.

mod rtl838x;
mod rtl839x;
mod rtl93xx;

pub use rtl838x::Rtl838x;
pub use rtl839x::Rtl839x;
pub use rtl93xx::{Rtl930x, Rtl931x};

use bitflags::bitflags;

use super::common::RegisterIo;
use super::device_info::SwitchFamily;
use super::pool::RingGeometry;

/// Number of 16-bit words in the CPU tag area of a packet header.
pub const CPU_TAG_WORDS: usize = 10;

/// Sideband words exchanged with the ASIC in every packet header.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CpuTag(pub [u16; CPU_TAG_WORDS]);

/// Fields decoded from the CPU tag of a received frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RxTag {
    /// Ingress switch port.
    pub port: u16,
    pub queue: u8,
    /// Forwarding reason code.
    pub reason: u8,
    /// The switch already forwarded the frame in hardware.
    pub offload: bool,
    pub crc_error: bool,
}

bitflags! {
    /// Notification interrupt bits of the RTL839x.
    #[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
    pub struct NotifyIrq: u32 {
        const NTFY_DONE = 1 << 22;
        const NTFY_BF_RUNOUT = 1 << 21;
        const LOCAL_NTFY_BUF_RUNOUT = 1 << 20;
    }
}

bitflags! {
    /// Flood policy towards the CPU port.
    #[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
    pub struct RxMode: u32 {
        const PROMISC = 1 << 0;
        const ALLMULTI = 1 << 1;
    }
}

/// Decoded interrupt status, one bit per ring where applicable.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IrqStatus {
    /// Raw TX done/all-done bits as read from the hardware.
    pub tx: u32,
    pub rx_done: u32,
    pub runout: u32,
    pub notify: NotifyIrq,
}

impl IrqStatus {
    pub fn is_empty(&self) -> bool {
        self.tx == 0 && self.rx_done == 0 && self.runout == 0 && self.notify.is_empty()
    }
}

/// How the TX engine chooses a ring.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxQueuePolicy {
    RoundRobin,
    /// Priorities at or above `threshold` go to the high ring.
    Priority { threshold: u32 },
}

/// One register write of a bring-up sequence, optionally followed by a wait for
/// `busy` bits to clear.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InitStep {
    pub reg: u32,
    pub value: u32,
    pub busy: u32,
    pub name: &'static str,
}

/// Port-based L2 table flush command register.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct L2Flush {
    pub reg: u32,
    /// Start bit, cleared by the hardware when done.
    pub busy: u32,
    pub port_based: u32,
}

impl L2Flush {
    pub fn command(&self, port: u32) -> u32 {
        self.busy | self.port_based | (port << 5)
    }
}

/// Register addresses shared by every family.
#[derive(Debug)]
pub struct DmaRegs {
    pub dma_if_ctrl: u32,
    pub dma_rx_base: u32,
    pub dma_rx_cur: u32,
    pub dma_tx_base: u32,
    pub dma_tx_cur: u32,
    pub mac: u32,
    pub rst_glb_ctrl: u32,
    pub reset_mask: u32,
    /// RX_EN | TX_EN in `dma_if_ctrl`.
    pub dma_rxtx_en: u32,
}

impl DmaRegs {
    #[inline]
    pub fn rx_base(&self, ring: usize) -> u32 {
        self.dma_rx_base + ring as u32 * 4
    }

    #[inline]
    pub fn rx_cur(&self, ring: usize) -> u32 {
        self.dma_rx_cur + ring as u32 * 4
    }

    #[inline]
    pub fn tx_base(&self, ring: usize) -> u32 {
        self.dma_tx_base + ring as u32 * 4
    }

    #[inline]
    pub fn tx_cur(&self, ring: usize) -> u32 {
        self.dma_tx_cur + ring as u32 * 4
    }
}

/// Values saved across a NIC reset.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResetSaved {
    pub intr_msk: u32,
    pub nbuf: u32,
}

mod sealed {
    pub trait Sealed {}
}

/// Capability interface of one switch family.
///
/// Pure functions over a register window: a profile keeps no state of its own.
pub trait RegisterProfile: Send + Sync + sealed::Sealed {
    fn family(&self) -> SwitchFamily;

    fn geometry(&self) -> RingGeometry;

    fn cpu_port(&self) -> u32;

    fn regs(&self) -> &'static DmaRegs;

    fn tx_queue_policy(&self) -> TxQueuePolicy;

    // ==================== CPU tag ====================

    /// Address `tag` to `port`, with an optional switch priority.
    fn encode_tx_tag(&self, tag: &mut CpuTag, port: u32, prio: Option<u32>);

    /// Request VLAN insertion. Returns false where unsupported.
    fn set_tx_vlan(&self, _tag: &mut CpuTag, _vid: u16) -> bool {
        false
    }

    fn decode_rx_tag(&self, tag: &CpuTag) -> RxTag;

    /// Length written to the header `len` field for a TX frame of `len` bytes.
    fn tx_encoded_len(&self, len: u16) -> u16 {
        len
    }

    // ==================== RX accounting ====================

    /// Return `released` buffers to the ring fill counter.
    fn update_cntr(&self, _io: &dyn RegisterIo, _ring: usize, _released: u32) {}

    /// Called after each received frame.
    fn rx_frame_quirk(&self, _io: &dyn RegisterIo) {}

    // ==================== Interrupts ====================

    fn read_irq_status(&self, io: &dyn RegisterIo) -> IrqStatus;

    /// Acknowledge `status` and mask RX done for the rings it names.
    fn ack_irq(&self, io: &dyn RegisterIo, status: &IrqStatus);

    fn unmask_rx(&self, io: &dyn RegisterIo, ring: usize);

    /// Mask every interrupt source and clear pending status.
    fn mask_all_irqs(&self, io: &dyn RegisterIo);

    // ==================== TX kick ====================

    /// Runs right before the fetch kick.
    fn pre_kick(&self, _io: &dyn RegisterIo) {}

    fn kick_tx(&self, io: &dyn RegisterIo, ring: usize);

    // ==================== Lifecycle ====================

    /// Disable TX/RX of the CPU facing MAC port.
    fn disable_cpu_port(&self, _io: &dyn RegisterIo) {}

    /// Runs after interrupts are masked and before the reset bit is asserted.
    fn prepare_reset(&self, _io: &dyn RegisterIo) -> Option<ResetSaved> {
        None
    }

    /// Head-of-line and ring counter setup after reset, then restore of `saved`.
    fn finish_reset(&self, io: &dyn RegisterIo, saved: Option<ResetSaved>);

    /// Program the DMA control, unmask interrupts and enable the CPU port.
    fn enable_rxtx(&self, io: &dyn RegisterIo);

    /// Trap and flood settings applied when the interface opens.
    fn install_traps(&self, _io: &dyn RegisterIo) {}

    fn block_ports(&self, _io: &dyn RegisterIo) {}

    fn l2_flush(&self) -> Option<L2Flush> {
        None
    }

    /// Return the CPU port force-mode register to its link-down value.
    fn force_link_down(&self, _io: &dyn RegisterIo) {}

    /// Arm the notification ring whose descriptor array starts at `ring_bus_addr`.
    fn setup_notify(&self, _io: &dyn RegisterIo, _ring_bus_addr: u32) {}

    fn set_rx_mode(&self, io: &dyn RegisterIo, mode: RxMode);

    fn write_mac(&self, io: &dyn RegisterIo, mac: &[u8; 6]) {
        let regs = self.regs();
        io.write32(regs.mac, mac_hi(mac));
        io.write32(regs.mac + 4, mac_lo(mac));
    }

    fn read_mac(&self, io: &dyn RegisterIo) -> [u8; 6] {
        let regs = self.regs();
        mac_from_regs(io.read32(regs.mac), io.read32(regs.mac + 4))
    }

    /// Register writes performed once at probe.
    fn bring_up_steps(&self) -> &'static [InitStep] {
        &[]
    }
}

#[inline]
pub(crate) fn mac_hi(mac: &[u8; 6]) -> u32 {
    (mac[0] as u32) << 8 | mac[1] as u32
}

#[inline]
pub(crate) fn mac_lo(mac: &[u8; 6]) -> u32 {
    u32::from_be_bytes([mac[2], mac[3], mac[4], mac[5]])
}

#[inline]
pub(crate) fn mac_from_regs(hi: u32, lo: u32) -> [u8; 6] {
    let lo = lo.to_be_bytes();
    [(hi >> 8) as u8, hi as u8, lo[0], lo[1], lo[2], lo[3]]
}

/// Destination portmask split into the (high, low) halves of a 32-bit word.
#[inline]
pub(crate) fn port_mask_words(port: u32) -> (u16, u16) {
    let mask = 1u32 << (port % 32);
    ((mask >> 16) as u16, (mask & 0xffff) as u16)
}

/// Ring bitmap for `rings` rings.
#[inline]
pub(crate) fn ring_mask(rings: usize) -> u32 {
    if rings >= 32 {
        u32::MAX
    } else {
        (1 << rings) - 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drivers::net::rtl83xx::testing::FakeSwitch;

    static PROFILES: [&dyn RegisterProfile; 4] = [&Rtl838x, &Rtl839x, &Rtl930x, &Rtl931x];

    /// Plays the switch: forwards a frame the CPU addressed with `tx` back to the CPU
    /// as if it had been received on the destination port with the requested priority.
    fn loopback(family: SwitchFamily, tx: &CpuTag) -> CpuTag {
        let t = &tx.0;
        let low_port = |hi: u16, lo: u16| (((hi as u32) << 16) | lo as u32).trailing_zeros() as u16;
        let mut rx = CpuTag::default();
        match family {
            SwitchFamily::Rtl838x => {
                let port = low_port(t[4], t[5]);
                let prio = (t[2] >> 12) & 0x7;
                rx.0[1] = (prio << 5) | port;
                rx.0[4] = 1; // reason: forwarded
            }
            SwitchFamily::Rtl839x => {
                let port = if t[4] | t[5] != 0 {
                    low_port(t[4], t[5])
                } else {
                    32 + low_port(t[2] & 0xf, t[3])
                };
                let prio = (t[2] >> 8) & 0x7;
                rx.0[1] = port;
                rx.0[4] = prio << 13;
            }
            SwitchFamily::Rtl930x | SwitchFamily::Rtl931x => {
                let port = if t[6] | t[7] != 0 {
                    low_port(t[6], t[7])
                } else {
                    32 + low_port(t[4], t[5])
                };
                let prio = (t[2] >> 8) & 0x1f;
                rx.0[0] = port << 8;
                rx.0[2] = prio << 11;
            }
        }
        rx
    }

    #[test]
    fn test_tag_loopback_roundtrip() {
        for profile in PROFILES {
            let ports = profile.cpu_port();
            for port in 0..ports {
                for prio in 0..8 {
                    let mut tag = CpuTag::default();
                    profile.encode_tx_tag(&mut tag, port, Some(prio));
                    let rx = profile.decode_rx_tag(&loopback(profile.family(), &tag));
                    assert_eq!(rx.port as u32, port, "{:?} port", profile.family());
                    assert_eq!(rx.queue as u32, prio, "{:?} prio", profile.family());
                    assert!(!rx.crc_error);
                }
            }
        }
    }

    #[test]
    fn test_838x_tx_tag() {
        let mut tag = CpuTag::default();
        Rtl838x.encode_tx_tag(&mut tag, 20, Some(3));
        assert_eq!(tag.0[1], 0x0400);
        assert_eq!(tag.0[2], 0x0200 | ((3 | 8) << 12));
        assert_eq!(tag.0[4], 0x0010);
        assert_eq!(tag.0[5], 0x0000);

        Rtl838x.encode_tx_tag(&mut tag, 2, None);
        assert_eq!(tag.0[2], 0x0200);
        assert_eq!(tag.0[4], 0);
        assert_eq!(tag.0[5], 0x0004);
    }

    #[test]
    fn test_839x_high_ports() {
        let mut tag = CpuTag::default();
        Rtl839x.encode_tx_tag(&mut tag, 50, None);
        assert_eq!(tag.0[1], 0x0100);
        assert_eq!(tag.0[2], 0x0010 | 0x0004);
        assert_eq!(tag.0[3], 0);
        assert_eq!((tag.0[4], tag.0[5]), (0, 0));

        Rtl839x.encode_tx_tag(&mut tag, 33, Some(5));
        assert_eq!(tag.0[2], 0x0010 | ((5 | 8) << 8));
        assert_eq!(tag.0[3], 0x0002);
    }

    #[test]
    fn test_93xx_tx_tag_and_vlan() {
        let mut tag = CpuTag::default();
        Rtl930x.encode_tx_tag(&mut tag, 27, Some(7));
        assert_eq!(tag.0[0], 0x8000);
        assert_eq!(tag.0[2], (0x20 | 7) << 8);
        assert_eq!((tag.0[6], tag.0[7]), (0x0800, 0));
        assert!(Rtl930x.set_tx_vlan(&mut tag, 0x123));
        assert_eq!(tag.0[2], ((0x20 | 7) << 8) | 0x10 | 0x1);
        assert_eq!(tag.0[3], 0x2300);

        Rtl931x.encode_tx_tag(&mut tag, 40, None);
        assert_eq!(tag.0[2], 0);
        assert_eq!((tag.0[4], tag.0[5]), (0, 0x0100));
        assert_eq!((tag.0[6], tag.0[7]), (0, 0));
        assert!(!Rtl838x.set_tx_vlan(&mut tag, 1));
    }

    #[test]
    fn test_rx_decode_reasons() {
        let mut tag = CpuTag::default();
        tag.0[4] = 13;
        let rx = Rtl838x.decode_rx_tag(&tag);
        assert!(rx.crc_error && rx.offload);
        tag.0[4] = 6;
        assert!(!Rtl838x.decode_rx_tag(&tag).offload);

        let mut tag = CpuTag::default();
        tag.0[5] = 24;
        tag.0[4] = 1 << 6;
        let rx = Rtl839x.decode_rx_tag(&tag);
        assert!(rx.crc_error && !rx.offload);
        tag.0[5] = 14;
        assert!(Rtl839x.decode_rx_tag(&tag).offload);

        let mut tag = CpuTag::default();
        tag.0[0] = 45 << 8;
        tag.0[7] = 20;
        assert_eq!(Rtl930x.decode_rx_tag(&tag).port, 45 & 0x1f);
        let rx = Rtl931x.decode_rx_tag(&tag);
        assert_eq!(rx.port, 45);
        assert!(!rx.offload);
    }

    #[test]
    fn test_mac_register_encoding() {
        let mac = [0x00, 0xe0, 0x4c, 0x12, 0x34, 0x56];
        assert_eq!(mac_hi(&mac), 0x00e0);
        assert_eq!(mac_lo(&mac), 0x4c12_3456);
        assert_eq!(mac_from_regs(0x00e0, 0x4c12_3456), mac);

        for profile in PROFILES {
            let io = FakeSwitch::new();
            profile.write_mac(&io, &mac);
            assert_eq!(profile.read_mac(&io), mac);
        }
    }

    #[test]
    fn test_ring_mask() {
        assert_eq!(ring_mask(8), 0xff);
        assert_eq!(ring_mask(32), u32::MAX);
    }

    #[test]
    fn test_geometry() {
        assert_eq!(Rtl838x.geometry().rx_rings, 8);
        assert_eq!(Rtl839x.geometry().rx_rings, 8);
        assert!(Rtl839x.geometry().notify);
        assert_eq!(Rtl930x.geometry().rx_rings, 32);
        assert_eq!(Rtl931x.geometry().tx_rings, 2);
        assert!(!Rtl931x.geometry().notify);
    }
}
