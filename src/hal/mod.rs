//! Synchronization primitives shared by the drivers.

pub mod spin;

pub use spin::{Mutex, MutexGuard, SpinNoIrq};
