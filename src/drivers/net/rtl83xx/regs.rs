//! Register map of the switch CPU port DMA interface.
#![allow(dead_code)]

use tock_registers::register_bitfields;

#[inline]
pub const fn bit(n: u32) -> u32 {
    1 << n
}

/// Contiguous mask of bits `l..=h`.
#[inline]
pub const fn genmask(h: u32, l: u32) -> u32 {
    (u32::MAX >> (31 - h)) & (u32::MAX << l)
}

register_bitfields![u32,
    /// DMA_IF_CTRL on the RTL838x.
    pub CTRL_838X [
        RX_TRUNCATE_LEN OFFSET(16) NUMBITS(14) [],
        TX_PAD_EN OFFSET(5) NUMBITS(1) [],
        RX_TRUNCATE_EN OFFSET(4) NUMBITS(1) [],
        TX_EN OFFSET(3) NUMBITS(1) [],
        RX_EN OFFSET(2) NUMBITS(1) [],
        TX_FETCH OFFSET(1) NUMBITS(1) [],
        TX_BUSY OFFSET(0) NUMBITS(1) []
    ],
    /// DMA_IF_CTRL on the RTL839x.
    pub CTRL_839X [
        RX_TRUNCATE_LEN OFFSET(5) NUMBITS(14) [],
        RX_TRUNCATE_EN OFFSET(4) NUMBITS(1) [],
        TX_EN OFFSET(3) NUMBITS(1) [],
        RX_EN OFFSET(2) NUMBITS(1) [],
        TX_FETCH OFFSET(1) NUMBITS(1) [],
        TX_BUSY OFFSET(0) NUMBITS(1) []
    ],
    /// DMA_IF_CTRL on the RTL930x and RTL931x.
    pub CTRL_93XX [
        RX_TRUNCATE_LEN OFFSET(16) NUMBITS(14) [],
        RX_TRUNCATE_EN OFFSET(6) NUMBITS(1) [],
        TX_EN OFFSET(5) NUMBITS(1) [],
        RX_EN OFFSET(4) NUMBITS(1) [],
        TX_HIGH_FETCH OFFSET(3) NUMBITS(1) [],
        TX_LOW_FETCH OFFSET(2) NUMBITS(1) [],
        TX_HIGH_BUSY OFFSET(1) NUMBITS(1) [],
        TX_LOW_BUSY OFFSET(0) NUMBITS(1) []
    ],
    /// Shared interrupt status/mask layout of the 83xx families.
    pub INTR_83XX [
        NTFY_DONE OFFSET(22) NUMBITS(1) [],
        NTFY_BF_RUNOUT OFFSET(21) NUMBITS(1) [],
        LOCAL_NTFY_BUF_RUNOUT OFFSET(20) NUMBITS(1) [],
        TX_ALL_DONE OFFSET(18) NUMBITS(2) [],
        TX_DONE OFFSET(16) NUMBITS(2) [],
        RX_DONE OFFSET(8) NUMBITS(8) [],
        RUNOUT OFFSET(0) NUMBITS(8) []
    ],
    /// TX done status/mask on the 93xx families.
    pub TX_DONE_93XX [
        ALL_DONE OFFSET(2) NUMBITS(2) [],
        DONE OFFSET(0) NUMBITS(2) []
    ],
    pub MAC_PORT_CTRL [
        RX_CHK_CRC_EN OFFSET(3) NUMBITS(1) [],
        TX_EN OFFSET(1) NUMBITS(1) [],
        RX_EN OFFSET(0) NUMBITS(1) []
    ],
    /// MAC_FORCE_MODE_CTRL on the RTL839x.
    pub FORCE_MODE_839X [
        RX_PAUSE_EN OFFSET(6) NUMBITS(1) [],
        TX_PAUSE_EN OFFSET(5) NUMBITS(1) [],
        SPD_SEL OFFSET(3) NUMBITS(2) [
            Speed10M = 0b00,
            Speed100M = 0b01,
            Speed1000M = 0b10
        ],
        DUP_SEL OFFSET(2) NUMBITS(1) [],
        LINK_EN OFFSET(1) NUMBITS(1) [],
        EN OFFSET(0) NUMBITS(1) []
    ]
];

pub mod rtl838x {
    pub const DMA_RX_BASE: u32 = 0x9f00; // + ring * 4
    pub const DMA_RX_CUR: u32 = 0x9f20;
    pub const DMA_TX_BASE: u32 = 0x9f40;
    pub const DMA_TX_CUR: u32 = 0x9f48;
    pub const DMA_IF_INTR_MSK: u32 = 0x9f50;
    pub const DMA_IF_INTR_STS: u32 = 0x9f54;
    pub const DMA_IF_CTRL: u32 = 0x9f58;
    pub const DMA_IF_RX_RING_SIZE: u32 = 0xb7e4; // + (ring / 8) * 4
    pub const DMA_IF_RX_RING_CNTR: u32 = 0xb7e8; // + (ring / 8) * 4

    pub const MAC: u32 = 0xa9ec;
    pub const MAC_ALE: u32 = 0x6b04;
    pub const MAC2: u32 = 0xa320;

    pub const RST_GLB_CTRL_0: u32 = 0x003c;
    pub const SW_NIC_RST: u32 = 1 << 3;
    pub const SW_Q_RST: u32 = 1 << 2;

    pub const MAC_PORT_CTRL: u32 = 0xd560; // + port << 7
    pub const MAC_FORCE_MODE_CTRL: u32 = 0xa104; // + port * 4
    pub const FORCE_MODE_CPU_LINK_UP: u32 = 0x6192f;
    pub const FORCE_MODE_CPU_LINK_DOWN: u32 = 0x6192c;

    pub const L2_TBL_FLUSH_CTRL: u32 = 0x3370;
    pub const L2_FLUSH_STS: u32 = 1 << 26;
    pub const L2_FLUSH_PORT_BASED: u32 = 1 << 23;
    pub const TBL_ACCESS_CTRL_0: u32 = 0x6914;
    pub const TBL_ACCESS_DATA_0: u32 = 0x6918; // + idx * 4
    pub const L2_CTRL_0: u32 = 0x3200;
    pub const SPCL_TRAP_IGMP_CTRL: u32 = 0x6984;
    pub const RMA_CTRL_0: u32 = 0x4300;
    pub const RMA_CTRL_1: u32 = 0x4304;

    pub const EEE_TX_TIMER_GIGA_CTRL: u32 = 0xaa04;
    pub const EEE_TX_TIMER_GELITE_CTRL: u32 = 0xaa08;
    pub const EEE_TX_TIMER_GIGA: u32 = 0x5001411;
    pub const EEE_TX_TIMER_GELITE: u32 = 0x5001417;

    pub const CPU_PORT: u32 = 28;
}

pub mod rtl839x {
    pub const DMA_IF_RX_RING_SIZE: u32 = 0x6038; // + (ring / 8) * 4
    pub const DMA_IF_RX_RING_CNTR: u32 = 0x603c;
    pub const DMA_RX_BASE: u32 = 0x780c;
    pub const DMA_RX_CUR: u32 = 0x782c;
    pub const DMA_TX_BASE: u32 = 0x784c;
    pub const DMA_TX_CUR: u32 = 0x7854;
    pub const DMA_IF_NBUF_BASE_DESC_ADDR_CTRL: u32 = 0x785c;
    pub const DMA_IF_INTR_MSK: u32 = 0x7864;
    pub const DMA_IF_INTR_STS: u32 = 0x7868;
    pub const DMA_IF_CTRL: u32 = 0x786c;

    pub const MAC: u32 = 0x02b4;

    pub const RST_GLB_CTRL: u32 = 0x0014;
    pub const SW_NIC_RST: u32 = 1 << 2;
    pub const SW_Q_RST: u32 = 1 << 1;

    pub const MAC_PORT_CTRL: u32 = 0x8004; // + port << 7
    pub const MAC_FORCE_MODE_CTRL: u32 = 0x02bc; // + port * 4
    pub const FORCE_MODE_CPU_LINK_DOWN: u32 = 0x75;

    pub const L2_CTRL_0: u32 = 0x3800;
    pub const L2_CTRL_0_FLUSH_ON_LINK_DOWN: u32 = 1 << 7;
    pub const L2_CTRL_0_FLUSH_NOTIFY_EN: u32 = 1 << 14;
    pub const L2_TBL_FLUSH_CTRL: u32 = 0x3ba0;
    pub const L2_FLUSH_STS: u32 = 1 << 28;
    pub const L2_FLUSH_PORT_BASED: u32 = 1 << 25;
    pub const L2_NOTIFICATION_CTRL: u32 = 0x7808;
    pub const NOTIFY_EN: u32 = 1 << 0;
    pub const SUSPEND_NOTIFICATION_EN: u32 = 1 << 12;
    pub const NOTIFY_TIMEOUT_SHIFT: u32 = 2;
    pub const NOTIFY_TIMEOUT_MASK: u32 = 0x3ff << NOTIFY_TIMEOUT_SHIFT;
    pub const NOTIFY_TIMEOUT: u32 = 100;

    pub const TBL_ACCESS_L2_CTRL: u32 = 0x1180;
    pub const TBL_ACCESS_L2_DATA: u32 = 0x1184; // + idx * 4
    pub const SPCL_TRAP_IGMP_CTRL: u32 = 0x1058;
    pub const RMA_CTRL_0: u32 = 0x1200;
    pub const RMA_CTRL_1: u32 = 0x1204;
    pub const RMA_CTRL_2: u32 = 0x1208;
    pub const RMA_CTRL_3: u32 = 0x120c;

    pub const IMR_PORT_LINK_STS_CHG: u32 = 0x0068; // + (port / 32) * 4
    pub const ISR_PORT_LINK_STS_CHG: u32 = 0x00a0;
    pub const PORT_CNT: u32 = 53;

    pub const CPU_PORT: u32 = 52;
}

pub mod rtl930x {
    pub const DMA_IF_RX_RING_SIZE: u32 = 0x7c60; // + (ring / 3) * 4, 10 bits per ring
    pub const DMA_IF_RX_RING_CNTR: u32 = 0x7c8c;
    pub const DMA_RX_BASE: u32 = 0xdf00;
    pub const DMA_RX_CUR: u32 = 0xdf80;
    pub const DMA_TX_BASE: u32 = 0xe000;
    pub const DMA_TX_CUR: u32 = 0xe008;
    pub const DMA_IF_INTR_RX_RUNOUT_MSK: u32 = 0xe010;
    pub const DMA_IF_INTR_RX_DONE_MSK: u32 = 0xe014;
    pub const DMA_IF_INTR_TX_DONE_MSK: u32 = 0xe018;
    pub const DMA_IF_INTR_RX_RUNOUT_STS: u32 = 0xe01c;
    pub const DMA_IF_INTR_RX_DONE_STS: u32 = 0xe020;
    pub const DMA_IF_INTR_TX_DONE_STS: u32 = 0xe024;
    pub const DMA_IF_CTRL: u32 = 0xe028;

    pub const MAC: u32 = 0xc714;

    pub const RST_GLB_CTRL_0: u32 = 0x000c;
    pub const SW_NIC_RST: u32 = 1 << 2;
    pub const SW_Q_RST: u32 = 1 << 1;

    pub const L2_CTRL: u32 = 0x8fd8;
    pub const L2_UNKN_UC_FLD_PMSK: u32 = 0x9064;
    pub const VLAN_APP_PKT_CTRL: u32 = 0xa23c;
    pub const RMA_CTRL_0: u32 = 0x9e60;
    pub const RMA_CTRL_1: u32 = 0x9e64;
    pub const RMA_CTRL_2: u32 = 0x9e68;

    pub const CPU_PORT: u32 = 28;
}

pub mod rtl931x {
    pub const DMA_RX_BASE: u32 = 0x0800;
    pub const DMA_RX_CUR: u32 = 0x0880;
    pub const DMA_IF_INTR_RX_RUNOUT_MSK: u32 = 0x0910;
    pub const DMA_IF_INTR_RX_DONE_MSK: u32 = 0x0914;
    pub const DMA_IF_INTR_TX_DONE_MSK: u32 = 0x0918;
    pub const DMA_IF_INTR_RX_RUNOUT_STS: u32 = 0x091c;
    pub const DMA_IF_INTR_RX_DONE_STS: u32 = 0x0920;
    pub const DMA_IF_INTR_TX_DONE_STS: u32 = 0x0924;
    pub const DMA_IF_CTRL: u32 = 0x0928;
    pub const MDX_CTRL_RSVD: u32 = 0x0fcc;
    pub const ESD_AUTO_RECOVERY: u32 = 1 << 0;

    pub const MAC: u32 = 0x135c;
    pub const DMA_IF_RX_RING_SIZE: u32 = 0x2080; // + (ring / 3) * 4, 10 bits per ring
    pub const DMA_IF_RX_RING_CNTR: u32 = 0x20ac;
    pub const DMA_TX_BASE: u32 = 0x9000;
    pub const DMA_TX_CUR: u32 = 0x9008;

    pub const RST_GLB_CTRL: u32 = 0x0400;
    pub const SW_NIC_RST: u32 = 1 << 2;
    pub const SW_Q_RST: u32 = 1 << 1;

    pub const MEM_ENCAP_INIT: u32 = 0x4854;
    pub const MEM_MIB_INIT: u32 = 0x7e18;
    pub const MEM_ACL_INIT: u32 = 0x40bc;
    pub const MEM_ALE_INIT_0: u32 = 0x83f0; // + (port / 32) * 4
    pub const MEM_RALE_INIT: u32 = 0x82e4;

    pub const L2_UNKN_UC_FLD_PMSK: u32 = 0xc8f4; // + (port / 32) * 4
    pub const VLAN_APP_PKT_CTRL: u32 = 0x9600;
    pub const PS_SOC_CTRL: u32 = 0x13f8;
    pub const RMA_CTRL_0: u32 = 0x881c;
    pub const RMA_CTRL_1: u32 = 0x8820;
    pub const RMA_CTRL_2: u32 = 0x8824;

    pub const CPU_PORT: u32 = 56;
}

/// Bits of a descriptor word other than the header address.
pub mod descriptor {
    pub const OWNED_BY_HW: u32 = 1 << 0; // 1 = switch, 0 = CPU
    pub const WRAP: u32 = 1 << 1; // last slot of a ring
    pub const ADDR_MASK: u32 = !0x3;
}

#[cfg(test)]
mod tests {
    use super::*;
    use tock_registers::LocalRegisterCopy;

    #[test]
    fn test_genmask() {
        assert_eq!(genmask(31, 0), 0xffff_ffff);
        assert_eq!(genmask(21, 0), 0x003f_ffff);
        assert_eq!(genmask(31, 2), 0xffff_fffc);
        assert_eq!(genmask(10, 0), 0x7ff);
    }

    #[test]
    fn test_ctrl_layout() {
        let v = CTRL_838X::RX_TRUNCATE_LEN.val(1600) + CTRL_838X::TX_PAD_EN::SET;
        assert_eq!(v.value, (1600 << 16) | (1 << 5));
        let v = CTRL_839X::RX_TRUNCATE_LEN.val(1600) + CTRL_839X::TX_EN::SET;
        assert_eq!(v.value, (1600 << 5) | (1 << 3));
        assert_eq!((CTRL_93XX::TX_EN::SET + CTRL_93XX::RX_EN::SET).value, 0x30);
    }

    #[test]
    fn test_intr_fields() {
        let sts = LocalRegisterCopy::<u32, INTR_83XX::Register>::new(0x0040_0500 | 0x3);
        assert!(sts.is_set(INTR_83XX::NTFY_DONE));
        assert_eq!(sts.read(INTR_83XX::RX_DONE), 0x05);
        assert_eq!(sts.read(INTR_83XX::RUNOUT), 0x3);
        assert_eq!(sts.read(INTR_83XX::TX_DONE), 0);
    }
}
