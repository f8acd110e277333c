//! Application Layer
//!
//! Use cases orchestrating the domain through driven ports.

pub mod ports;
pub mod use_cases;
