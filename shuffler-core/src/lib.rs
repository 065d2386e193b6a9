#![cfg_attr(not(feature = "std"), no_std)]

//! # Shuffler Core
//!
//! Cell-balancing link for a pair of small microcontrollers.
//! The client reports its cell voltage as a unary pulse train on a single
//! shared line; the master counts the pulses and decides whether to keep
//! moving charge to the client's cell.

pub mod types;
pub mod config;
pub mod hal;
pub mod sampler;
pub mod encoder;
pub mod decoder;
pub mod control;
pub mod power;
pub mod indicator;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

#[cfg(test)]
mod hal_tests;

pub use types::*;
pub use config::*;
pub use hal::{Duration, HalError};
pub use sampler::VoltageSampler;
pub use encoder::{LineEncoder, Segments};
pub use decoder::LineDecoder;
pub use control::{ControlLoop, MasterPeripherals};
pub use power::{DutyCycleCounter, PowerManager};
pub use indicator::ActivityBlinker;

/// Shuffler library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default master node configuration
pub fn default_master_config() -> MasterConfig {
    MasterConfig::DEFAULT
}

/// Default client node configuration
pub fn default_client_config() -> ClientConfig {
    ClientConfig::DEFAULT
}
