//! RTL930x (Longan) and RTL931x (Mango): 32 RX rings, split interrupt registers,
//! 10-bit ring size and fill counters packed three per register.

use super::{
    CpuTag, DmaRegs, InitStep, IrqStatus, RegisterProfile, ResetSaved, RxMode, RxTag,
    TxQueuePolicy, port_mask_words, ring_mask, sealed,
};
use crate::config::{RING_BUFFER, RX_RING_LEN, TC_PRIO_CONTROL, TX_RING_LEN, TX_RINGS};
use crate::drivers::net::rtl83xx::common::RegisterIo;
use crate::drivers::net::rtl83xx::device_info::SwitchFamily;
use crate::drivers::net::rtl83xx::pool::RingGeometry;
use crate::drivers::net::rtl83xx::regs::{CTRL_93XX, TX_DONE_93XX, genmask, rtl930x, rtl931x};

const RX_RINGS: usize = 32;
const RING_FIELD_MASK: u32 = 0x3ff;

/// Register layout shared by both 93xx families.
struct Dma93xx {
    regs: &'static DmaRegs,
    rx_ring_size: u32,
    rx_ring_cntr: u32,
    runout_msk: u32,
    rx_done_msk: u32,
    tx_done_msk: u32,
    runout_sts: u32,
    rx_done_sts: u32,
    tx_done_sts: u32,
    unkn_uc_fld_pmsk: u32,
    rma_ctrl: [u32; 3],
    cpu_port: u32,
}

/// Register and shift of the 10-bit field of `ring` in a packed ring register.
#[inline]
fn ring_field(base: u32, ring: usize) -> (u32, u32) {
    let ring = ring as u32;
    (base + (ring / 3) * 4, (ring % 3) * 10)
}

const TX_DONE_ALL: u32 = genmask(3, 0);

impl Dma93xx {
    fn read_irq_status(&self, io: &dyn RegisterIo) -> IrqStatus {
        let rings = ring_mask(RX_RINGS);
        IrqStatus {
            tx: io.read32(self.tx_done_sts) & TX_DONE_ALL,
            rx_done: io.read32(self.rx_done_sts) & rings,
            runout: io.read32(self.runout_sts) & rings,
            notify: Default::default(),
        }
    }

    fn ack_irq(&self, io: &dyn RegisterIo, status: &IrqStatus) {
        if status.tx != 0 {
            io.write32(self.tx_done_sts, status.tx);
        }
        if status.rx_done != 0 {
            io.write32(self.rx_done_sts, status.rx_done);
            io.mask32(status.rx_done, 0, self.rx_done_msk);
        }
        if status.runout != 0 {
            io.write32(self.runout_sts, status.runout);
        }
    }

    fn mask_all_irqs(&self, io: &dyn RegisterIo) {
        io.write32(self.runout_msk, 0);
        io.write32(self.runout_sts, u32::MAX);
        io.write32(self.rx_done_msk, 0);
        io.write32(self.rx_done_sts, u32::MAX);
        io.write32(self.tx_done_msk, 0);
        io.write32(self.tx_done_sts, TX_DONE_ALL);
    }

    fn kick_tx(&self, io: &dyn RegisterIo, ring: usize) {
        let fetch = if ring == 0 {
            CTRL_93XX::TX_LOW_FETCH::SET
        } else {
            CTRL_93XX::TX_HIGH_FETCH::SET
        };
        io.mask32(0, fetch.value, self.regs.dma_if_ctrl);
    }

    fn update_cntr(&self, io: &dyn RegisterIo, ring: usize, released: u32) {
        let (reg, shift) = ring_field(self.rx_ring_cntr, ring);
        let current = (io.read32(reg) >> shift) & RING_FIELD_MASK;
        io.mask32(RING_FIELD_MASK << shift, (released & RING_FIELD_MASK) << shift, reg);
        io.write32(reg, current);
    }

    fn finish_reset(&self, io: &dyn RegisterIo) {
        for ring in 0..RX_RINGS {
            let (reg, shift) = ring_field(self.rx_ring_size, ring);
            io.mask32(RING_FIELD_MASK << shift, 0, reg);
            let (reg, shift) = ring_field(self.rx_ring_cntr, ring);
            io.mask32(RING_FIELD_MASK << shift, (RX_RING_LEN as u32) << shift, reg);
        }
    }

    fn enable_rxtx(&self, io: &dyn RegisterIo) {
        let ctrl =
            CTRL_93XX::RX_TRUNCATE_LEN.val(RING_BUFFER as u32) + CTRL_93XX::RX_TRUNCATE_EN::SET;
        io.write32(self.regs.dma_if_ctrl, ctrl.value);

        for ring in 0..RX_RINGS {
            let (reg, shift) = ring_field(self.rx_ring_size, ring);
            io.mask32(RING_FIELD_MASK << shift, (RX_RING_LEN as u32) << shift, reg);
            // rewrite the fill counter, some SoCs lack underflow protection
            let (reg, shift) = ring_field(self.rx_ring_cntr, ring);
            let cntr = io.read32(reg) & (RING_FIELD_MASK << shift);
            io.mask32(RING_FIELD_MASK << shift, cntr, reg);
        }

        io.write32(self.runout_msk, u32::MAX);
        io.write32(self.rx_done_msk, u32::MAX);
        io.write32(self.tx_done_msk, TX_DONE_93XX::DONE::SET.value);
        io.mask32(0, self.regs.dma_rxtx_en, self.regs.dma_if_ctrl);

        let port = self.cpu_port;
        io.mask32(0, 1 << (port % 32), self.unkn_uc_fld_pmsk + (port / 32) * 4);
    }

    fn set_rx_mode(&self, io: &dyn RegisterIo, mode: RxMode) {
        let values = if mode.intersects(RxMode::PROMISC | RxMode::ALLMULTI) {
            [genmask(31, 2), u32::MAX, u32::MAX]
        } else {
            [0; 3]
        };
        for (reg, value) in self.rma_ctrl.iter().zip(values) {
            io.write32(*reg, value);
        }
    }
}

fn encode_93xx_tag(tag: &mut CpuTag, port: u32, prio: Option<u32>, split_high_ports: bool) {
    let (hi, lo) = port_mask_words(port);
    tag.0[..8].fill(0);
    tag.0[0] = 0x8000; // CPU tag marker
    if split_high_ports && port >= 32 {
        tag.0[4] = hi;
        tag.0[5] = lo;
    } else {
        tag.0[6] = hi;
        tag.0[7] = lo;
    }
    if let Some(prio) = prio {
        tag.0[2] = ((1 << 5 | (prio & 0x1f)) << 8) as u16; // AS_QID + QID
    }
}

fn set_93xx_vlan(tag: &mut CpuTag, vid: u16) -> bool {
    tag.0[2] |= 1 << 4; // VLAN forwarding offload
    tag.0[2] |= (vid >> 8) & 0xf;
    tag.0[3] |= (vid & 0xff) << 8;
    true
}

fn decode_93xx_tag(tag: &CpuTag, port_mask: u16) -> RxTag {
    let t = &tag.0;
    let reason = (t[7] & 0x3f) as u8;
    RxTag {
        port: (t[0] >> 8) & port_mask,
        queue: ((t[2] >> 11) & 0x1f) as u8,
        reason,
        offload: !matches!(reason, 19..=27), // RMA
        crc_error: t[1] & (1 << 6) != 0,
    }
}

const GEOMETRY_93XX: RingGeometry = RingGeometry {
    rx_rings: RX_RINGS,
    rx_len: RX_RING_LEN,
    tx_rings: TX_RINGS,
    tx_len: TX_RING_LEN,
    notify: false,
};

const DMA_RXTX_EN_93XX: u32 = 1 << 5 | 1 << 4;

// ==================== RTL930x ====================

static REGS_930X: DmaRegs = DmaRegs {
    dma_if_ctrl: rtl930x::DMA_IF_CTRL,
    dma_rx_base: rtl930x::DMA_RX_BASE,
    dma_rx_cur: rtl930x::DMA_RX_CUR,
    dma_tx_base: rtl930x::DMA_TX_BASE,
    dma_tx_cur: rtl930x::DMA_TX_CUR,
    mac: rtl930x::MAC,
    rst_glb_ctrl: rtl930x::RST_GLB_CTRL_0,
    reset_mask: rtl930x::SW_NIC_RST | rtl930x::SW_Q_RST,
    dma_rxtx_en: DMA_RXTX_EN_93XX,
};

static DMA_930X: Dma93xx = Dma93xx {
    regs: &REGS_930X,
    rx_ring_size: rtl930x::DMA_IF_RX_RING_SIZE,
    rx_ring_cntr: rtl930x::DMA_IF_RX_RING_CNTR,
    runout_msk: rtl930x::DMA_IF_INTR_RX_RUNOUT_MSK,
    rx_done_msk: rtl930x::DMA_IF_INTR_RX_DONE_MSK,
    tx_done_msk: rtl930x::DMA_IF_INTR_TX_DONE_MSK,
    runout_sts: rtl930x::DMA_IF_INTR_RX_RUNOUT_STS,
    rx_done_sts: rtl930x::DMA_IF_INTR_RX_DONE_STS,
    tx_done_sts: rtl930x::DMA_IF_INTR_TX_DONE_STS,
    unkn_uc_fld_pmsk: rtl930x::L2_UNKN_UC_FLD_PMSK,
    rma_ctrl: [rtl930x::RMA_CTRL_0, rtl930x::RMA_CTRL_1, rtl930x::RMA_CTRL_2],
    cpu_port: rtl930x::CPU_PORT,
};

/// RTL9301/RTL9302 register profile.
pub struct Rtl930x;

impl sealed::Sealed for Rtl930x {}

impl RegisterProfile for Rtl930x {
    fn family(&self) -> SwitchFamily {
        SwitchFamily::Rtl930x
    }

    fn geometry(&self) -> RingGeometry {
        GEOMETRY_93XX
    }

    fn cpu_port(&self) -> u32 {
        rtl930x::CPU_PORT
    }

    fn regs(&self) -> &'static DmaRegs {
        &REGS_930X
    }

    fn tx_queue_policy(&self) -> TxQueuePolicy {
        TxQueuePolicy::Priority {
            threshold: TC_PRIO_CONTROL,
        }
    }

    fn encode_tx_tag(&self, tag: &mut CpuTag, port: u32, prio: Option<u32>) {
        encode_93xx_tag(tag, port, prio, false);
    }

    fn set_tx_vlan(&self, tag: &mut CpuTag, vid: u16) -> bool {
        set_93xx_vlan(tag, vid)
    }

    fn decode_rx_tag(&self, tag: &CpuTag) -> RxTag {
        decode_93xx_tag(tag, 0x1f)
    }

    fn update_cntr(&self, io: &dyn RegisterIo, ring: usize, released: u32) {
        DMA_930X.update_cntr(io, ring, released);
    }

    fn read_irq_status(&self, io: &dyn RegisterIo) -> IrqStatus {
        DMA_930X.read_irq_status(io)
    }

    fn ack_irq(&self, io: &dyn RegisterIo, status: &IrqStatus) {
        DMA_930X.ack_irq(io, status);
    }

    fn unmask_rx(&self, io: &dyn RegisterIo, ring: usize) {
        io.mask32(0, 1 << ring, rtl930x::DMA_IF_INTR_RX_DONE_MSK);
    }

    fn mask_all_irqs(&self, io: &dyn RegisterIo) {
        DMA_930X.mask_all_irqs(io);
    }

    fn kick_tx(&self, io: &dyn RegisterIo, ring: usize) {
        DMA_930X.kick_tx(io, ring);
    }

    fn finish_reset(&self, io: &dyn RegisterIo, _saved: Option<ResetSaved>) {
        DMA_930X.finish_reset(io);
    }

    fn enable_rxtx(&self, io: &dyn RegisterIo) {
        DMA_930X.enable_rxtx(io);
    }

    fn install_traps(&self, io: &dyn RegisterIo) {
        io.mask32(0, 1 << 7, rtl930x::L2_CTRL); // flush FDB on link down
        io.write32(rtl930x::VLAN_APP_PKT_CTRL, (0x2 << 3) | 0x2); // trap IGMP/MLD
    }

    fn set_rx_mode(&self, io: &dyn RegisterIo, mode: RxMode) {
        DMA_930X.set_rx_mode(io, mode);
    }
}

// ==================== RTL931x ====================

static REGS_931X: DmaRegs = DmaRegs {
    dma_if_ctrl: rtl931x::DMA_IF_CTRL,
    dma_rx_base: rtl931x::DMA_RX_BASE,
    dma_rx_cur: rtl931x::DMA_RX_CUR,
    dma_tx_base: rtl931x::DMA_TX_BASE,
    dma_tx_cur: rtl931x::DMA_TX_CUR,
    mac: rtl931x::MAC,
    rst_glb_ctrl: rtl931x::RST_GLB_CTRL,
    reset_mask: rtl931x::SW_NIC_RST | rtl931x::SW_Q_RST,
    dma_rxtx_en: DMA_RXTX_EN_93XX,
};

static DMA_931X: Dma93xx = Dma93xx {
    regs: &REGS_931X,
    rx_ring_size: rtl931x::DMA_IF_RX_RING_SIZE,
    rx_ring_cntr: rtl931x::DMA_IF_RX_RING_CNTR,
    runout_msk: rtl931x::DMA_IF_INTR_RX_RUNOUT_MSK,
    rx_done_msk: rtl931x::DMA_IF_INTR_RX_DONE_MSK,
    tx_done_msk: rtl931x::DMA_IF_INTR_TX_DONE_MSK,
    runout_sts: rtl931x::DMA_IF_INTR_RX_RUNOUT_STS,
    rx_done_sts: rtl931x::DMA_IF_INTR_RX_DONE_STS,
    tx_done_sts: rtl931x::DMA_IF_INTR_TX_DONE_STS,
    unkn_uc_fld_pmsk: rtl931x::L2_UNKN_UC_FLD_PMSK,
    rma_ctrl: [rtl931x::RMA_CTRL_0, rtl931x::RMA_CTRL_1, rtl931x::RMA_CTRL_2],
    cpu_port: rtl931x::CPU_PORT,
};

static BRING_UP_931X: [InitStep; 7] = [
    InitStep {
        reg: rtl931x::MEM_ENCAP_INIT,
        value: 1,
        busy: 1,
        name: "ENCAP memory init",
    },
    InitStep {
        reg: rtl931x::MEM_MIB_INIT,
        value: 1,
        busy: 1,
        name: "MIB memory init",
    },
    InitStep {
        reg: rtl931x::MEM_ACL_INIT,
        value: 1,
        busy: 1,
        name: "ACL memory init",
    },
    InitStep {
        reg: rtl931x::MEM_ALE_INIT_0,
        value: u32::MAX,
        busy: u32::MAX,
        name: "ALE memory init",
    },
    InitStep {
        reg: rtl931x::MEM_ALE_INIT_0 + 4,
        value: genmask(6, 0),
        busy: 0,
        name: "ALE memory init",
    },
    InitStep {
        reg: rtl931x::MEM_RALE_INIT,
        value: genmask(10, 0),
        busy: genmask(10, 0),
        name: "RALE memory init",
    },
    InitStep {
        reg: rtl931x::MDX_CTRL_RSVD,
        value: rtl931x::ESD_AUTO_RECOVERY,
        busy: 0,
        name: "ESD auto recovery",
    },
];

/// RTL9311/RTL9313 register profile.
pub struct Rtl931x;

impl sealed::Sealed for Rtl931x {}

impl RegisterProfile for Rtl931x {
    fn family(&self) -> SwitchFamily {
        SwitchFamily::Rtl931x
    }

    fn geometry(&self) -> RingGeometry {
        GEOMETRY_93XX
    }

    fn cpu_port(&self) -> u32 {
        rtl931x::CPU_PORT
    }

    fn regs(&self) -> &'static DmaRegs {
        &REGS_931X
    }

    fn tx_queue_policy(&self) -> TxQueuePolicy {
        TxQueuePolicy::Priority {
            threshold: TC_PRIO_CONTROL,
        }
    }

    fn encode_tx_tag(&self, tag: &mut CpuTag, port: u32, prio: Option<u32>) {
        encode_93xx_tag(tag, port, prio, true);
    }

    fn set_tx_vlan(&self, tag: &mut CpuTag, vid: u16) -> bool {
        set_93xx_vlan(tag, vid)
    }

    fn decode_rx_tag(&self, tag: &CpuTag) -> RxTag {
        decode_93xx_tag(tag, 0x3f)
    }

    fn update_cntr(&self, io: &dyn RegisterIo, ring: usize, released: u32) {
        DMA_931X.update_cntr(io, ring, released);
    }

    fn read_irq_status(&self, io: &dyn RegisterIo) -> IrqStatus {
        DMA_931X.read_irq_status(io)
    }

    fn ack_irq(&self, io: &dyn RegisterIo, status: &IrqStatus) {
        DMA_931X.ack_irq(io, status);
    }

    fn unmask_rx(&self, io: &dyn RegisterIo, ring: usize) {
        io.mask32(0, 1 << ring, rtl931x::DMA_IF_INTR_RX_DONE_MSK);
    }

    fn mask_all_irqs(&self, io: &dyn RegisterIo) {
        DMA_931X.mask_all_irqs(io);
    }

    fn kick_tx(&self, io: &dyn RegisterIo, ring: usize) {
        DMA_931X.kick_tx(io, ring);
    }

    fn finish_reset(&self, io: &dyn RegisterIo, _saved: Option<ResetSaved>) {
        DMA_931X.finish_reset(io);
    }

    fn enable_rxtx(&self, io: &dyn RegisterIo) {
        DMA_931X.enable_rxtx(io);
    }

    fn install_traps(&self, io: &dyn RegisterIo) {
        io.write32(rtl931x::VLAN_APP_PKT_CTRL, (0x2 << 3) | 0x2); // trap IGMP/MLD
        io.mask32(0, 1 << 1, rtl931x::PS_SOC_CTRL); // PCIE_PWR_DOWN
    }

    fn set_rx_mode(&self, io: &dyn RegisterIo, mode: RxMode) {
        DMA_931X.set_rx_mode(io, mode);
    }

    fn bring_up_steps(&self) -> &'static [InitStep] {
        &BRING_UP_931X
    }
}
