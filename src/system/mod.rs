//! System-level modules
//!
//! This module contains process-level setup such as logging initialization.

pub mod logging;

pub use logging::init_logging;
