//! RTL838x (Maple): 8 RX rings, shared 83xx interrupt register.

use tock_registers::LocalRegisterCopy;

use super::{
    CpuTag, DmaRegs, InitStep, IrqStatus, L2Flush, RegisterProfile, ResetSaved, RxMode, RxTag,
    TxQueuePolicy, mac_hi, mac_lo, port_mask_words, sealed,
};
use crate::config::{ETH_ZLEN, RING_BUFFER, RX_RING_LEN, TX_RING_LEN, TX_RINGS};
use crate::drivers::net::rtl83xx::common::RegisterIo;
use crate::drivers::net::rtl83xx::device_info::SwitchFamily;
use crate::drivers::net::rtl83xx::pool::RingGeometry;
use crate::drivers::net::rtl83xx::regs::{CTRL_838X, INTR_83XX, MAC_PORT_CTRL, genmask, rtl838x};

const RX_RINGS: usize = 8;

/// TX and RX done, runout; no notification channel.
const INTR_ALL: u32 = genmask(19, 0);

static REGS: DmaRegs = DmaRegs {
    dma_if_ctrl: rtl838x::DMA_IF_CTRL,
    dma_rx_base: rtl838x::DMA_RX_BASE,
    dma_rx_cur: rtl838x::DMA_RX_CUR,
    dma_tx_base: rtl838x::DMA_TX_BASE,
    dma_tx_cur: rtl838x::DMA_TX_CUR,
    mac: rtl838x::MAC,
    rst_glb_ctrl: rtl838x::RST_GLB_CTRL_0,
    reset_mask: rtl838x::SW_NIC_RST | rtl838x::SW_Q_RST,
    dma_rxtx_en: 1 << 3 | 1 << 2,
};

static BRING_UP: [InitStep; 2] = [
    InitStep {
        reg: rtl838x::EEE_TX_TIMER_GIGA_CTRL,
        value: rtl838x::EEE_TX_TIMER_GIGA,
        busy: 0,
        name: "EEE giga timer",
    },
    InitStep {
        reg: rtl838x::EEE_TX_TIMER_GELITE_CTRL,
        value: rtl838x::EEE_TX_TIMER_GELITE,
        busy: 0,
        name: "EEE gelite timer",
    },
];

#[inline]
fn mac_port_ctrl(port: u32) -> u32 {
    rtl838x::MAC_PORT_CTRL + (port << 7)
}

#[inline]
fn force_mode_ctrl(port: u32) -> u32 {
    rtl838x::MAC_FORCE_MODE_CTRL + port * 4
}

/// Shared interrupt register handling of the 83xx families.
pub(super) struct Intr83xx {
    pub msk: u32,
    pub sts: u32,
}

impl Intr83xx {
    pub fn read(&self, io: &dyn RegisterIo) -> IrqStatus {
        let raw = io.read32(self.sts);
        let sts = LocalRegisterCopy::<u32, INTR_83XX::Register>::new(raw);
        IrqStatus {
            tx: raw & (INTR_83XX::TX_DONE::SET + INTR_83XX::TX_ALL_DONE::SET).value,
            rx_done: sts.read(INTR_83XX::RX_DONE),
            runout: sts.read(INTR_83XX::RUNOUT),
            notify: super::NotifyIrq::from_bits_truncate(raw),
        }
    }

    pub fn ack(&self, io: &dyn RegisterIo, status: &IrqStatus) {
        if status.tx != 0 {
            io.write32(self.sts, status.tx);
        }
        if status.rx_done != 0 {
            let bits = INTR_83XX::RX_DONE.val(status.rx_done).value;
            io.mask32(bits, 0, self.msk);
            io.write32(self.sts, bits);
        }
        if status.runout != 0 {
            io.write32(self.sts, INTR_83XX::RUNOUT.val(status.runout).value);
        }
        for bit in status.notify.iter() {
            io.write32(self.sts, bit.bits());
        }
    }

    pub fn unmask_rx(&self, io: &dyn RegisterIo, ring: usize) {
        let set = INTR_83XX::TX_ALL_DONE::SET
            + INTR_83XX::RUNOUT::SET
            + INTR_83XX::RX_DONE.val(1 << ring);
        io.mask32(0, set.value, self.msk);
    }

    pub fn mask_all(&self, io: &dyn RegisterIo, all: u32) {
        io.write32(self.msk, 0);
        io.write32(self.sts, all);
    }
}

const INTR: Intr83xx = Intr83xx {
    msk: rtl838x::DMA_IF_INTR_MSK,
    sts: rtl838x::DMA_IF_INTR_STS,
};

/// RTL8380/RTL8382 register profile.
pub struct Rtl838x;

impl sealed::Sealed for Rtl838x {}

impl RegisterProfile for Rtl838x {
    fn family(&self) -> SwitchFamily {
        SwitchFamily::Rtl838x
    }

    fn geometry(&self) -> RingGeometry {
        RingGeometry {
            rx_rings: RX_RINGS,
            rx_len: RX_RING_LEN,
            tx_rings: TX_RINGS,
            tx_len: TX_RING_LEN,
            notify: false,
        }
    }

    fn cpu_port(&self) -> u32 {
        rtl838x::CPU_PORT
    }

    fn regs(&self) -> &'static DmaRegs {
        &REGS
    }

    fn tx_queue_policy(&self) -> TxQueuePolicy {
        TxQueuePolicy::RoundRobin
    }

    fn encode_tx_tag(&self, tag: &mut CpuTag, port: u32, prio: Option<u32>) {
        let (hi, lo) = port_mask_words(port);
        // word 0 is reserved
        tag.0[1] = 0x0400; // CPU tag marker
        tag.0[2] = 0x0200; // AS_DPM
        tag.0[3] = 0;
        tag.0[4] = hi;
        tag.0[5] = lo;
        if let Some(prio) = prio {
            tag.0[2] |= (((prio & 0x7) | 1 << 3) << 12) as u16; // PRI + AS_PRI
        }
    }

    fn decode_rx_tag(&self, tag: &CpuTag) -> RxTag {
        let t = &tag.0;
        let reason = (t[4] & 0xf) as u8;
        RxTag {
            port: t[1] & 0x1f,
            queue: ((t[1] & 0xe0) >> 5) as u8,
            reason,
            offload: reason != 6, // special trap
            crc_error: reason == 13,
        }
    }

    fn tx_encoded_len(&self, len: u16) -> u16 {
        if (len as usize) < ETH_ZLEN - 4 {
            len - 4
        } else {
            len
        }
    }

    fn rx_frame_quirk(&self, io: &dyn RegisterIo) {
        io.write32(rtl838x::DMA_IF_RX_RING_SIZE, u32::MAX);
        for ring in 0..RX_RINGS as u32 {
            let reg = rtl838x::DMA_IF_RX_RING_CNTR + (ring / 8) * 4;
            io.write32(reg, io.read32(reg));
        }
    }

    fn read_irq_status(&self, io: &dyn RegisterIo) -> IrqStatus {
        let mut status = INTR.read(io);
        status.notify = Default::default();
        status
    }

    fn ack_irq(&self, io: &dyn RegisterIo, status: &IrqStatus) {
        INTR.ack(io, status);
    }

    fn unmask_rx(&self, io: &dyn RegisterIo, ring: usize) {
        INTR.unmask_rx(io, ring);
    }

    fn mask_all_irqs(&self, io: &dyn RegisterIo) {
        INTR.mask_all(io, INTR_ALL);
    }

    fn pre_kick(&self, io: &dyn RegisterIo) {
        let en = (CTRL_838X::TX_EN::SET + CTRL_838X::RX_EN::SET).value;
        for _ in 0..10 {
            if io.read32(rtl838x::DMA_IF_CTRL) & en == en {
                break;
            }
        }
    }

    fn kick_tx(&self, io: &dyn RegisterIo, _ring: usize) {
        let fetch = CTRL_838X::TX_FETCH::SET + CTRL_838X::TX_BUSY::SET;
        io.mask32(0, fetch.value, rtl838x::DMA_IF_CTRL);
    }

    fn disable_cpu_port(&self, io: &dyn RegisterIo) {
        let txrx = (MAC_PORT_CTRL::TX_EN::SET + MAC_PORT_CTRL::RX_EN::SET).value;
        io.mask32(txrx, 0, mac_port_ctrl(rtl838x::CPU_PORT));
    }

    fn finish_reset(&self, io: &dyn RegisterIo, _saved: Option<ResetSaved>) {
        io.write32(rtl838x::DMA_IF_RX_RING_SIZE, 0); // head of line disabled
    }

    fn enable_rxtx(&self, io: &dyn RegisterIo) {
        io.write32(rtl838x::DMA_IF_RX_RING_SIZE, u32::MAX);
        let ctrl = CTRL_838X::RX_TRUNCATE_LEN.val(RING_BUFFER as u32) + CTRL_838X::TX_PAD_EN::SET;
        io.write32(rtl838x::DMA_IF_CTRL, ctrl.value);
        io.write32(rtl838x::DMA_IF_INTR_MSK, INTR_ALL);
        io.mask32(0, REGS.dma_rxtx_en, rtl838x::DMA_IF_CTRL);

        let port_ctrl = mac_port_ctrl(rtl838x::CPU_PORT);
        let txrx = (MAC_PORT_CTRL::TX_EN::SET + MAC_PORT_CTRL::RX_EN::SET).value;
        io.mask32(txrx, 0, port_ctrl);
        io.mask32(0, txrx, port_ctrl);
        io.write32(
            force_mode_ctrl(rtl838x::CPU_PORT),
            rtl838x::FORCE_MODE_CPU_LINK_UP,
        );
        io.mask32(0, MAC_PORT_CTRL::RX_CHK_CRC_EN::SET.value, port_ctrl);
    }

    fn install_traps(&self, io: &dyn RegisterIo) {
        io.write32(rtl838x::SPCL_TRAP_IGMP_CTRL, 0x3);
        io.mask32(0, 1 << 7, rtl838x::L2_CTRL_0); // flush FDB on link down
    }

    fn block_ports(&self, io: &dyn RegisterIo) {
        io.write32(rtl838x::TBL_ACCESS_DATA_0, 0x0300_0000);
        io.write32(rtl838x::TBL_ACCESS_DATA_0 + 4, 0);
        io.write32(rtl838x::TBL_ACCESS_CTRL_0, 1 << 15 | 2 << 12);
    }

    fn l2_flush(&self) -> Option<L2Flush> {
        Some(L2Flush {
            reg: rtl838x::L2_TBL_FLUSH_CTRL,
            busy: rtl838x::L2_FLUSH_STS,
            port_based: rtl838x::L2_FLUSH_PORT_BASED,
        })
    }

    fn force_link_down(&self, io: &dyn RegisterIo) {
        io.write32(
            force_mode_ctrl(rtl838x::CPU_PORT),
            rtl838x::FORCE_MODE_CPU_LINK_DOWN,
        );
    }

    fn set_rx_mode(&self, io: &dyn RegisterIo, mode: RxMode) {
        if mode.contains(RxMode::PROMISC) {
            io.write32(rtl838x::RMA_CTRL_0, genmask(21, 0));
            io.write32(rtl838x::RMA_CTRL_1, genmask(14, 0));
        } else if mode.contains(RxMode::ALLMULTI) {
            // RMA_CTRL_1 keeps its previous value
            io.write32(rtl838x::RMA_CTRL_0, genmask(21, 0));
        } else {
            io.write32(rtl838x::RMA_CTRL_0, 0);
            io.write32(rtl838x::RMA_CTRL_1, 0);
        }
    }

    fn write_mac(&self, io: &dyn RegisterIo, mac: &[u8; 6]) {
        for reg in [rtl838x::MAC, rtl838x::MAC_ALE, rtl838x::MAC2] {
            io.write32(reg, mac_hi(mac));
            io.write32(reg + 4, mac_lo(mac));
        }
    }

    fn bring_up_steps(&self) -> &'static [InitStep] {
        &BRING_UP
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drivers::net::rtl83xx::testing::FakeSwitch;

    #[test]
    fn test_irq_status_decode() {
        let io = FakeSwitch::new();
        io.set(rtl838x::DMA_IF_INTR_STS, 0x0003_0300 | 0x4 | 0x0040_0000);
        let status = Rtl838x.read_irq_status(&io);
        assert_eq!(status.tx, 0x0003_0000);
        assert_eq!(status.rx_done, 0x03);
        assert_eq!(status.runout, 0x04);
        assert!(status.notify.is_empty());
    }

    #[test]
    fn test_ack_masks_rx_rings() {
        let io = FakeSwitch::new();
        io.set(rtl838x::DMA_IF_INTR_MSK, INTR_ALL);
        let status = IrqStatus {
            rx_done: 0b101,
            ..Default::default()
        };
        Rtl838x.ack_irq(&io, &status);
        assert_eq!(io.get(rtl838x::DMA_IF_INTR_MSK), INTR_ALL & !(0b101 << 8));
        assert!(io.wrote(rtl838x::DMA_IF_INTR_STS, 0b101 << 8));

        Rtl838x.unmask_rx(&io, 2);
        assert_eq!(io.get(rtl838x::DMA_IF_INTR_MSK) & (1 << 10), 1 << 10);
        assert_eq!(io.get(rtl838x::DMA_IF_INTR_MSK) & (1 << 8), 0);
    }

    #[test]
    fn test_short_frame_len() {
        assert_eq!(Rtl838x.tx_encoded_len(46), 42);
        assert_eq!(Rtl838x.tx_encoded_len(56), 56);
        assert_eq!(Rtl838x.tx_encoded_len(1504), 1504);
    }

    #[test]
    fn test_rx_mode() {
        let io = FakeSwitch::new();
        Rtl838x.set_rx_mode(&io, RxMode::ALLMULTI);
        assert_eq!(io.get(rtl838x::RMA_CTRL_0), 0x003f_ffff);
        assert_eq!(io.get(rtl838x::RMA_CTRL_1), 0);
        Rtl838x.set_rx_mode(&io, RxMode::PROMISC | RxMode::ALLMULTI);
        assert_eq!(io.get(rtl838x::RMA_CTRL_1), 0x7fff);

        io.clear_writes();
        Rtl838x.set_rx_mode(&io, RxMode::ALLMULTI);
        assert!(io.writes().iter().all(|&(reg, _)| reg != rtl838x::RMA_CTRL_1));
        assert_eq!(io.get(rtl838x::RMA_CTRL_1), 0x7fff);

        Rtl838x.set_rx_mode(&io, RxMode::empty());
        assert_eq!(io.get(rtl838x::RMA_CTRL_0), 0);
        assert_eq!(io.get(rtl838x::RMA_CTRL_1), 0);
    }

    #[test]
    fn test_enable_rxtx() {
        let io = FakeSwitch::new();
        Rtl838x.enable_rxtx(&io);
        let ctrl = io.get(rtl838x::DMA_IF_CTRL);
        assert_eq!(ctrl, (1600 << 16) | 1 << 5 | 1 << 3 | 1 << 2);
        assert_eq!(io.get(rtl838x::DMA_IF_INTR_MSK), 0xfffff);
        assert_eq!(io.get(mac_port_ctrl(28)), 0b1011);
        assert_eq!(io.get(force_mode_ctrl(28)), 0x6192f);
    }

    #[test]
    fn test_mac_copies() {
        let io = FakeSwitch::new();
        Rtl838x.write_mac(&io, &[2, 0, 0, 0, 0, 1]);
        assert_eq!(io.get(rtl838x::MAC_ALE), 0x0200);
        assert_eq!(io.get(rtl838x::MAC2 + 4), 1);
    }
}
