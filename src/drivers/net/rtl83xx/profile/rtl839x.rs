//! RTL839x (Cypress): 8 RX rings plus the L2 notification ring.

use super::rtl838x::Intr83xx;
use super::{
    CpuTag, DmaRegs, IrqStatus, L2Flush, NotifyIrq, RegisterProfile, ResetSaved, RxMode, RxTag,
    TxQueuePolicy, port_mask_words, sealed,
};
use crate::config::{RING_BUFFER, RX_RING_LEN, TX_RING_LEN, TX_RINGS};
use crate::drivers::net::rtl83xx::common::RegisterIo;
use crate::drivers::net::rtl83xx::device_info::SwitchFamily;
use crate::drivers::net::rtl83xx::pool::RingGeometry;
use crate::drivers::net::rtl83xx::regs::{
    CTRL_839X, FORCE_MODE_839X, MAC_PORT_CTRL, genmask, rtl839x,
};

const RX_RINGS: usize = 8;

/// Notification, TX and RX done, runout.
const INTR_ALL: u32 = genmask(22, 0);

static REGS: DmaRegs = DmaRegs {
    dma_if_ctrl: rtl839x::DMA_IF_CTRL,
    dma_rx_base: rtl839x::DMA_RX_BASE,
    dma_rx_cur: rtl839x::DMA_RX_CUR,
    dma_tx_base: rtl839x::DMA_TX_BASE,
    dma_tx_cur: rtl839x::DMA_TX_CUR,
    mac: rtl839x::MAC,
    rst_glb_ctrl: rtl839x::RST_GLB_CTRL,
    reset_mask: rtl839x::SW_NIC_RST | rtl839x::SW_Q_RST,
    dma_rxtx_en: 1 << 3 | 1 << 2,
};

const INTR: Intr83xx = Intr83xx {
    msk: rtl839x::DMA_IF_INTR_MSK,
    sts: rtl839x::DMA_IF_INTR_STS,
};

#[inline]
fn mac_port_ctrl(port: u32) -> u32 {
    rtl839x::MAC_PORT_CTRL + (port << 7)
}

#[inline]
fn force_mode_ctrl(port: u32) -> u32 {
    rtl839x::MAC_FORCE_MODE_CTRL + port * 4
}

/// Write a 53-port bitmap to a pair of link-change registers.
fn write_port_bitmap(io: &dyn RegisterIo, reg: u32, ports: u64) {
    io.write32(reg, ports as u32);
    io.write32(reg + 4, (ports >> 32) as u32);
}

const ALL_PORTS: u64 = (1 << rtl839x::PORT_CNT) - 1;

/// RTL8390/RTL8391/RTL8393 register profile.
pub struct Rtl839x;

impl sealed::Sealed for Rtl839x {}

impl RegisterProfile for Rtl839x {
    fn family(&self) -> SwitchFamily {
        SwitchFamily::Rtl839x
    }

    fn geometry(&self) -> RingGeometry {
        RingGeometry {
            rx_rings: RX_RINGS,
            rx_len: RX_RING_LEN,
            tx_rings: TX_RINGS,
            tx_len: TX_RING_LEN,
            notify: true,
        }
    }

    fn cpu_port(&self) -> u32 {
        rtl839x::CPU_PORT
    }

    fn regs(&self) -> &'static DmaRegs {
        &REGS
    }

    fn tx_queue_policy(&self) -> TxQueuePolicy {
        TxQueuePolicy::RoundRobin
    }

    fn encode_tx_tag(&self, tag: &mut CpuTag, port: u32, prio: Option<u32>) {
        let (hi, lo) = port_mask_words(port);
        tag.0[1] = 0x0100; // CPU tag marker
        tag.0[2] = 1 << 4; // AS_DPM
        tag.0[3] = 0;
        tag.0[4] = 0;
        tag.0[5] = 0;
        if port >= 32 {
            tag.0[2] |= hi & 0xf;
            tag.0[3] = lo;
        } else {
            tag.0[4] = hi;
            tag.0[5] = lo;
        }
        if let Some(prio) = prio {
            tag.0[2] |= (((prio & 0x7) | 1 << 3) << 8) as u16;
        }
    }

    fn decode_rx_tag(&self, tag: &CpuTag) -> RxTag {
        let t = &tag.0;
        let reason = (t[5] & 0x1f) as u8;
        RxTag {
            port: t[1] & 0x3f,
            queue: ((t[4] & 0xe000) >> 13) as u8,
            reason,
            // RMA and special trap reasons were not forwarded by the switch
            offload: !matches!(reason, 7..=13 | 23..=25),
            crc_error: t[4] & (1 << 6) != 0,
        }
    }

    fn read_irq_status(&self, io: &dyn RegisterIo) -> IrqStatus {
        INTR.read(io)
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

    fn kick_tx(&self, io: &dyn RegisterIo, _ring: usize) {
        let fetch = CTRL_839X::TX_FETCH::SET + CTRL_839X::TX_BUSY::SET;
        io.mask32(0, fetch.value, rtl839x::DMA_IF_CTRL);
    }

    fn disable_cpu_port(&self, io: &dyn RegisterIo) {
        let txrx = (MAC_PORT_CTRL::TX_EN::SET + MAC_PORT_CTRL::RX_EN::SET).value;
        io.mask32(txrx, 0, mac_port_ctrl(rtl839x::CPU_PORT));
    }

    fn prepare_reset(&self, io: &dyn RegisterIo) -> Option<ResetSaved> {
        let saved = ResetSaved {
            intr_msk: io.read32(rtl839x::DMA_IF_INTR_MSK),
            nbuf: io.read32(rtl839x::DMA_IF_NBUF_BASE_DESC_ADDR_CTRL),
        };
        write_port_bitmap(io, rtl839x::IMR_PORT_LINK_STS_CHG, 0);
        INTR.mask_all(io, INTR_ALL);
        Some(saved)
    }

    fn finish_reset(&self, io: &dyn RegisterIo, saved: Option<ResetSaved>) {
        io.write32(rtl839x::DMA_IF_RX_RING_CNTR, u32::MAX);

        write_port_bitmap(io, rtl839x::ISR_PORT_LINK_STS_CHG, ALL_PORTS);
        write_port_bitmap(io, rtl839x::IMR_PORT_LINK_STS_CHG, ALL_PORTS);

        if let Some(saved) = saved {
            let notify = NotifyIrq::all().bits();
            io.mask32(0, notify | (saved.intr_msk & notify), rtl839x::DMA_IF_INTR_MSK);
            io.write32(rtl839x::DMA_IF_NBUF_BASE_DESC_ADDR_CTRL, saved.nbuf);
        }
    }

    fn enable_rxtx(&self, io: &dyn RegisterIo) {
        let ctrl = CTRL_839X::RX_TRUNCATE_LEN.val(RING_BUFFER as u32) + CTRL_839X::TX_EN::SET;
        io.write32(rtl839x::DMA_IF_CTRL, ctrl.value);
        io.write32(rtl839x::DMA_IF_INTR_MSK, INTR_ALL);
        io.mask32(0, REGS.dma_rxtx_en, rtl839x::DMA_IF_CTRL);

        let port = MAC_PORT_CTRL::TX_EN::SET
            + MAC_PORT_CTRL::RX_EN::SET
            + MAC_PORT_CTRL::RX_CHK_CRC_EN::SET;
        io.mask32(0, port.value, mac_port_ctrl(rtl839x::CPU_PORT));

        // CPU port joins the lookup miss flooding portmask
        io.write32(rtl839x::TBL_ACCESS_L2_CTRL, 0x28000);
        io.mask32(0, 0x8000_0000, rtl839x::TBL_ACCESS_L2_DATA);
        io.write32(rtl839x::TBL_ACCESS_L2_CTRL, 0x38000);

        let force = FORCE_MODE_839X::LINK_EN::SET + FORCE_MODE_839X::EN::SET;
        io.mask32(0, force.value, force_mode_ctrl(rtl839x::CPU_PORT));
    }

    fn install_traps(&self, io: &dyn RegisterIo) {
        io.write32(rtl839x::SPCL_TRAP_IGMP_CTRL, 0x3);
        io.mask32(0, rtl839x::L2_CTRL_0_FLUSH_ON_LINK_DOWN, rtl839x::L2_CTRL_0);
    }

    fn l2_flush(&self) -> Option<L2Flush> {
        Some(L2Flush {
            reg: rtl839x::L2_TBL_FLUSH_CTRL,
            busy: rtl839x::L2_FLUSH_STS,
            port_based: rtl839x::L2_FLUSH_PORT_BASED,
        })
    }

    fn force_link_down(&self, io: &dyn RegisterIo) {
        let value = FORCE_MODE_839X::RX_PAUSE_EN::SET
            + FORCE_MODE_839X::TX_PAUSE_EN::SET
            + FORCE_MODE_839X::SPD_SEL::Speed1000M
            + FORCE_MODE_839X::DUP_SEL::SET
            + FORCE_MODE_839X::EN::SET;
        io.write32(force_mode_ctrl(rtl839x::CPU_PORT), value.value);
    }

    fn setup_notify(&self, io: &dyn RegisterIo, ring_bus_addr: u32) {
        io.write32(rtl839x::DMA_IF_NBUF_BASE_DESC_ADDR_CTRL, ring_bus_addr);
        io.mask32(
            rtl839x::NOTIFY_TIMEOUT_MASK,
            rtl839x::NOTIFY_TIMEOUT << rtl839x::NOTIFY_TIMEOUT_SHIFT,
            rtl839x::L2_NOTIFICATION_CTRL,
        );
        io.mask32(0, rtl839x::L2_CTRL_0_FLUSH_NOTIFY_EN, rtl839x::L2_CTRL_0);
        io.mask32(0, rtl839x::SUSPEND_NOTIFICATION_EN, rtl839x::L2_NOTIFICATION_CTRL);
        io.mask32(0, rtl839x::NOTIFY_EN, rtl839x::L2_NOTIFICATION_CTRL);
    }

    fn set_rx_mode(&self, io: &dyn RegisterIo, mode: RxMode) {
        let flood = mode.intersects(RxMode::PROMISC | RxMode::ALLMULTI);
        let (rma0, rma12) = if flood { (genmask(31, 2), u32::MAX) } else { (0, 0) };
        let rma3 = if mode.contains(RxMode::PROMISC) { genmask(10, 0) } else { 0 };
        io.write32(rtl839x::RMA_CTRL_0, rma0);
        io.write32(rtl839x::RMA_CTRL_1, rma12);
        io.write32(rtl839x::RMA_CTRL_2, rma12);
        io.write32(rtl839x::RMA_CTRL_3, rma3);
    }
}
