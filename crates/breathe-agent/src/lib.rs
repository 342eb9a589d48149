//! Forecast agent: HTTP API, configuration and the AQICN live source
//!
//! The binary in `main.rs` wires these together; integration tests drive the
//! router directly.

pub mod api;
pub mod aqicn;
pub mod config;
