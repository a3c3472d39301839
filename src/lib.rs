//! DMA core for the CPU port NIC of Realtek RTL838x/RTL839x/RTL930x/RTL931x switch SoCs.
//!
//! The crate moves Ethernet frames between software and the switch ASIC over
//! ownership-bit descriptor rings and decodes the MAC-learning notification ring of
//! the RTL839x. Hardware access goes through two seams supplied by the embedder:
//! [`drivers::net::rtl83xx::RegisterIo`] for the register window and
//! [`drivers::net::rtl83xx::KernelFunc`] for DMA memory, delays and IRQ masking.

#![cfg_attr(not(test), no_std)]

extern crate alloc;
#[macro_use]
extern crate log;

pub mod config;
pub mod drivers;
pub mod error;
pub mod hal;
pub mod logging;

pub use error::{InitResult, NicError, NicResult};
