//! Device drivers module.

pub mod net;
