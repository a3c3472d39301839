//! Build-time constants and per-device runtime options.

use const_env::from_env;

use crate::drivers::net::rtl83xx::EthernetAddress;

pub const RING_BUFFER: usize = 1600; // bytes per packet buffer
pub const RX_RING_LEN: usize = 300;
pub const TX_RING_LEN: usize = 160;
pub const TX_RINGS: usize = 2;
pub const NOTIFY_EVENTS: usize = 10; // events per notification block
pub const NOTIFY_BLOCKS: usize = 10;
pub const ETH_ZLEN: usize = 60;
pub const ETH_FCS_LEN: usize = 4;
pub const TC_PRIO_CONTROL: u32 = 7;

/// Frames drained per poll pass before yielding.
#[from_env("RTL83XX_NAPI_WEIGHT")]
pub const NAPI_POLL_WEIGHT: usize = 64;

/// Notification batches buffered for the FDB task.
#[from_env("RTL83XX_FDB_QUEUE_DEPTH")]
pub const FDB_QUEUE_DEPTH: usize = 64;

pub const RESET_TIMEOUT_US: u32 = 100_000;
pub const L2_FLUSH_TIMEOUT_US: u32 = 10_000;

/// Runtime options for one NIC instance.
#[derive(Debug, Clone)]
pub struct NicConfig {
    /// Frames carry a 4-byte switch trailer instead of the CRC.
    pub dsa: bool,
    /// Address from the platform, used when valid.
    pub mac: Option<EthernetAddress>,
    pub poll_budget: usize,
    pub fdb_queue_depth: usize,
    pub reset_timeout_us: u32,
    pub flush_timeout_us: u32,
    pub irq: Option<u32>,
}

impl Default for NicConfig {
    fn default() -> Self {
        Self {
            dsa: true,
            mac: None,
            poll_budget: NAPI_POLL_WEIGHT,
            fdb_queue_depth: FDB_QUEUE_DEPTH,
            reset_timeout_us: RESET_TIMEOUT_US,
            flush_timeout_us: L2_FLUSH_TIMEOUT_US,
            irq: None,
        }
    }
}
