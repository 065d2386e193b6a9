#![no_std]

//! CH32V003 bindings shared by the master and client node binaries

pub use embassy_time::Delay;

pub use shuffler_core::*;

pub use crate::ch32v003_hardware::*;

pub mod ch32v003_hardware;

// Time driver for embassy
mod time_driver;
