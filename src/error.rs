//! Error types for the switch NIC core.
//!
//! Hot paths (transmit, drain, lifecycle) return [`NicResult`] so callers can tell
//! backpressure apart from real faults without allocating. Device bring-up uses
//! anyhow so a failed probe carries the full context chain.
//!
//! ## Usage Examples
//!
//! Backpressure on transmit:
//! ```ignore
//! match nic.request_transmit(&frame, Some(3), None) {
//!     Err(NicError::Busy) => requeue(frame),
//!     other => other?,
//! }
//! ```
//!
//! Adding context during bring-up:
//! ```ignore
//! BufferPool::<K>::new(geometry).context("Failed to allocate ring memory")?;
//! ```

use core::fmt;

/// Errors reported by the NIC core.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NicError {
    /// The TX slot is still owned by the switch; retry later.
    Busy,
    /// Operation is not valid in the current device state.
    BadState,
    /// DMA or frame memory could not be allocated.
    NoMemory,
    InvalidParameter(&'static str),
    /// A bounded hardware poll ran out of iterations.
    Timeout(&'static str),
    /// Unknown chip family identifier.
    Unsupported(u16),
    /// Multicast or all-zero MAC address.
    AddrNotAvailable,
    LoggerInitFailed,
}

impl fmt::Display for NicError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Busy => write!(f, "transmit ring busy"),
            Self::BadState => write!(f, "device in wrong state"),
            Self::NoMemory => write!(f, "out of memory"),
            Self::InvalidParameter(what) => write!(f, "invalid parameter: {what}"),
            Self::Timeout(what) => write!(f, "timeout waiting for {what}"),
            Self::Unsupported(id) => write!(f, "unsupported switch family {id:#06x}"),
            Self::AddrNotAvailable => write!(f, "invalid MAC address"),
            Self::LoggerInitFailed => write!(f, "logger already installed"),
        }
    }
}

impl core::error::Error for NicError {}

/// Result type for hot-path and lifecycle operations.
pub type NicResult<T = ()> = Result<T, NicError>;

/// Result type alias using anyhow::Error, used by bring-up.
pub type InitResult<T> = anyhow::Result<T>;
