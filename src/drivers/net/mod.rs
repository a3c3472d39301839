//! Network device drivers

pub mod rtl83xx;
